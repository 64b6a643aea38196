//! Raffle recurrence rules.
//!
//! Five surface grammars, case-insensitive and whitespace-trimmed:
//!   `off`; `daily HH:MM`; `weekdays HH:MM`; `weekly <mon..sun> HH:MM`;
//!   `every N<h|d>`.
//!
//! Everything here is pure: parsing, formatting, calendar projection,
//! due-ness, and run-key derivation take values in and return values out.
//! Minute-level granularity only: the poll loop sweeps once a minute and
//! compares local hour/minute exactly.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::Tz;

/// Days from 0001-01-01 (CE) to 1970-01-01, for the epoch-day counter.
const UNIX_EPOCH_CE_DAYS: i64 = 719_163;

/// A parsed, normalized recurrence rule. Either fully valid or rejected at
/// parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// No recurrence.
    Off,
    /// Once per day at the given local time.
    Daily { hour: u32, minute: u32 },
    /// Monday through Friday at the given local time.
    Weekdays { hour: u32, minute: u32 },
    /// Once per week.
    Weekly { day: Weekday, hour: u32, minute: u32 },
    /// Every `n` hours (aligned to `hour % n == 0`, minute 0) or every `n`
    /// days (aligned to the epoch-day counter, local midnight).
    Every { n: u32, unit: EveryUnit },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EveryUnit {
    Hours,
    Days,
}

impl Schedule {
    /// Parse a schedule rule. Returns `None` when the input matches none of
    /// the grammars or has out-of-range fields, distinct from `Some(Off)`,
    /// which is the explicit "no schedule" rule.
    pub fn parse(input: &str) -> Option<Self> {
        let normalized = input.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }
        if normalized == "off" {
            return Some(Self::Off);
        }

        let tokens: Vec<&str> = normalized.split_whitespace().collect();
        match tokens.as_slice() {
            ["daily", time] => {
                let (hour, minute) = parse_time(time)?;
                Some(Self::Daily { hour, minute })
            }
            ["weekdays", time] => {
                let (hour, minute) = parse_time(time)?;
                Some(Self::Weekdays { hour, minute })
            }
            ["weekly", day, time] => {
                let day = parse_day(day)?;
                let (hour, minute) = parse_time(time)?;
                Some(Self::Weekly { day, hour, minute })
            }
            // "every 6h" and "every 6 h" are both accepted.
            ["every", rest @ ..] if !rest.is_empty() => parse_every(&rest.concat()),
            _ => None,
        }
    }

    /// Whether this rule fires at the given local calendar fields.
    pub fn is_due(&self, parts: &ZonedParts) -> bool {
        match *self {
            Self::Off => false,
            Self::Daily { hour, minute } => hour == parts.hour && minute == parts.minute,
            Self::Weekdays { hour, minute } => {
                parts.weekday.number_from_monday() <= 5
                    && hour == parts.hour
                    && minute == parts.minute
            }
            Self::Weekly { day, hour, minute } => {
                day == parts.weekday && hour == parts.hour && minute == parts.minute
            }
            Self::Every {
                n,
                unit: EveryUnit::Hours,
            } => parts.minute == 0 && parts.hour % n == 0,
            Self::Every {
                n,
                unit: EveryUnit::Days,
            } => {
                // Anchored to the local calendar date, not the absolute
                // instant, so DST shifts do not move the firing day.
                parts.hour == 0
                    && parts.minute == 0
                    && parts.epoch_day_index().rem_euclid(n as i64) == 0
            }
        }
    }

    /// Idempotency key for one firing instant: equal for any two due
    /// evaluations within the same firing window, different across windows.
    /// `None` for `Off`.
    pub fn run_key(&self, parts: &ZonedParts) -> Option<String> {
        match *self {
            Self::Off => None,
            Self::Daily { .. } | Self::Weekdays { .. } | Self::Weekly { .. } => Some(format!(
                "{}-{:02}:{:02}",
                parts.date_key(),
                parts.hour,
                parts.minute
            )),
            Self::Every {
                unit: EveryUnit::Hours,
                ..
            } => Some(format!("{}-h{:02}", parts.date_key(), parts.hour)),
            Self::Every {
                n,
                unit: EveryUnit::Days,
            } => Some(format!("{}-d{}", parts.date_key(), n)),
        }
    }
}

impl std::fmt::Display for Schedule {
    /// Normalized text form; inverse of [`Schedule::parse`] for every valid
    /// rule.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Off => write!(f, "off"),
            Self::Daily { hour, minute } => write!(f, "daily {hour:02}:{minute:02}"),
            Self::Weekdays { hour, minute } => write!(f, "weekdays {hour:02}:{minute:02}"),
            Self::Weekly { day, hour, minute } => {
                write!(f, "weekly {} {hour:02}:{minute:02}", day_token(day))
            }
            Self::Every { n, unit } => {
                let unit = match unit {
                    EveryUnit::Hours => 'h',
                    EveryUnit::Days => 'd',
                };
                write!(f, "every {n}{unit}")
            }
        }
    }
}

/// Local calendar fields of an absolute instant as observed in a timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZonedParts {
    pub date: NaiveDate,
    pub hour: u32,
    pub minute: u32,
    pub weekday: Weekday,
}

impl ZonedParts {
    /// Project an absolute instant into a timezone's local calendar.
    pub fn project(instant: DateTime<Utc>, tz: Tz) -> Self {
        let local = instant.with_timezone(&tz);
        Self::from_local(local.date_naive(), local.hour(), local.minute())
    }

    pub fn from_local(date: NaiveDate, hour: u32, minute: u32) -> Self {
        Self {
            date,
            hour,
            minute,
            weekday: date.weekday(),
        }
    }

    /// Zero-padded `YYYY-MM-DD`, unique per local calendar day.
    pub fn date_key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Days since 1970-01-01 of the local calendar date.
    fn epoch_day_index(&self) -> i64 {
        i64::from(self.date.num_days_from_ce()) - UNIX_EPOCH_CE_DAYS
    }
}

/// Resolve an IANA timezone name. `None` when unrecognized; the caller
/// decides on the fallback and logs it.
pub fn resolve_timezone(name: &str) -> Option<Tz> {
    name.parse().ok()
}

/// `HH:MM` with a 1-2 digit hour and exactly 2-digit minute.
fn parse_time(value: &str) -> Option<(u32, u32)> {
    let (hour_str, minute_str) = value.split_once(':')?;
    if hour_str.is_empty() || hour_str.len() > 2 || minute_str.len() != 2 {
        return None;
    }
    let hour: u32 = hour_str.parse().ok()?;
    let minute: u32 = minute_str.parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

fn parse_day(token: &str) -> Option<Weekday> {
    match token {
        "mon" => Some(Weekday::Mon),
        "tue" => Some(Weekday::Tue),
        "wed" => Some(Weekday::Wed),
        "thu" => Some(Weekday::Thu),
        "fri" => Some(Weekday::Fri),
        "sat" => Some(Weekday::Sat),
        "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn day_token(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

/// `N<h|d>` with N ≥ 1; the unit may be separated from N by whitespace
/// (already collapsed by the caller).
fn parse_every(spec: &str) -> Option<Schedule> {
    let digits: &str = spec.strip_suffix(['h', 'd']).filter(|d| !d.is_empty())?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u32 = digits.parse().ok()?;
    if n < 1 {
        return None;
    }
    let unit = if spec.ends_with('h') {
        EveryUnit::Hours
    } else {
        EveryUnit::Days
    };
    Some(Schedule::Every { n, unit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parts(date: (i32, u32, u32), hour: u32, minute: u32) -> ZonedParts {
        let date = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
        ZonedParts::from_local(date, hour, minute)
    }

    #[test]
    fn parses_all_grammars() {
        assert_eq!(Schedule::parse("off"), Some(Schedule::Off));
        assert_eq!(
            Schedule::parse("daily 09:00"),
            Some(Schedule::Daily { hour: 9, minute: 0 })
        );
        assert_eq!(
            Schedule::parse("weekdays 12:30"),
            Some(Schedule::Weekdays {
                hour: 12,
                minute: 30
            })
        );
        assert_eq!(
            Schedule::parse("weekly fri 20:00"),
            Some(Schedule::Weekly {
                day: Weekday::Fri,
                hour: 20,
                minute: 0
            })
        );
        assert_eq!(
            Schedule::parse("every 6h"),
            Some(Schedule::Every {
                n: 6,
                unit: EveryUnit::Hours
            })
        );
        assert_eq!(
            Schedule::parse("every 2d"),
            Some(Schedule::Every {
                n: 2,
                unit: EveryUnit::Days
            })
        );
    }

    #[test]
    fn parse_is_case_insensitive_and_trimmed() {
        assert_eq!(Schedule::parse("  OFF  "), Some(Schedule::Off));
        assert_eq!(
            Schedule::parse("Daily 9:05"),
            Some(Schedule::Daily { hour: 9, minute: 5 })
        );
        assert_eq!(
            Schedule::parse("WEEKLY Mon 08:15"),
            Some(Schedule::Weekly {
                day: Weekday::Mon,
                hour: 8,
                minute: 15
            })
        );
        // Whitespace between N and the unit is allowed.
        assert_eq!(
            Schedule::parse("every 6 h"),
            Some(Schedule::Every {
                n: 6,
                unit: EveryUnit::Hours
            })
        );
    }

    #[test]
    fn rejects_malformed_input() {
        for input in [
            "",
            "   ",
            "daily",
            "daily 25:00",
            "daily 09:60",
            "daily 9:5",
            "daily 123:00",
            "weekdays 24:00",
            "weekly xyz 09:00",
            "weekly monday 09:00",
            "weekly fri",
            "every 0h",
            "every h",
            "every 6m",
            "every 6",
            "every -1d",
            "hourly 09:00",
            "off please",
        ] {
            assert_eq!(Schedule::parse(input), None, "should reject {input:?}");
        }
    }

    #[test]
    fn format_round_trips() {
        for text in [
            "off",
            "daily 09:00",
            "daily 23:59",
            "weekdays 12:30",
            "weekly mon 00:00",
            "weekly sun 20:05",
            "every 1h",
            "every 6h",
            "every 2d",
        ] {
            let schedule = Schedule::parse(text).unwrap();
            assert_eq!(schedule.to_string(), text);
            assert_eq!(Schedule::parse(&schedule.to_string()), Some(schedule));
        }
        // Formatting normalizes what parsing accepted loosely.
        let schedule = Schedule::parse("DAILY 9:05").unwrap();
        assert_eq!(schedule.to_string(), "daily 09:05");
    }

    #[test]
    fn daily_due_at_exactly_one_minute_of_day() {
        let schedule = Schedule::Daily { hour: 9, minute: 0 };
        for hour in 0..24 {
            for minute in 0..60 {
                let due = schedule.is_due(&parts((2026, 2, 2), hour, minute));
                assert_eq!(due, hour == 9 && minute == 0, "at {hour:02}:{minute:02}");
            }
        }
    }

    #[test]
    fn weekdays_skips_weekends() {
        let schedule = Schedule::Weekdays {
            hour: 12,
            minute: 30,
        };
        // 2026-02-02 is a Monday.
        for day in 2..=6 {
            assert!(schedule.is_due(&parts((2026, 2, day), 12, 30)));
        }
        assert!(!schedule.is_due(&parts((2026, 2, 7), 12, 30))); // Sat
        assert!(!schedule.is_due(&parts((2026, 2, 8), 12, 30))); // Sun
        assert!(!schedule.is_due(&parts((2026, 2, 2), 12, 31)));
    }

    #[test]
    fn weekly_matches_exact_day() {
        let schedule = Schedule::Weekly {
            day: Weekday::Fri,
            hour: 20,
            minute: 0,
        };
        assert!(schedule.is_due(&parts((2026, 2, 6), 20, 0))); // Friday
        assert!(!schedule.is_due(&parts((2026, 2, 5), 20, 0))); // Thursday
        assert!(!schedule.is_due(&parts((2026, 2, 6), 20, 1)));
    }

    #[test]
    fn every_six_hours_fires_on_aligned_hours_only() {
        let schedule = Schedule::Every {
            n: 6,
            unit: EveryUnit::Hours,
        };
        for hour in 0..24 {
            for minute in 0..60 {
                let due = schedule.is_due(&parts((2026, 2, 1), hour, minute));
                let expected = minute == 0 && matches!(hour, 0 | 6 | 12 | 18);
                assert_eq!(due, expected, "at {hour:02}:{minute:02}");
            }
        }
    }

    #[test]
    fn every_day_fires_at_local_midnight() {
        let schedule = Schedule::Every {
            n: 1,
            unit: EveryUnit::Days,
        };
        for day in 1..=28 {
            assert!(schedule.is_due(&parts((2026, 2, day), 0, 0)));
            assert!(!schedule.is_due(&parts((2026, 2, day), 0, 1)));
            assert!(!schedule.is_due(&parts((2026, 2, day), 12, 0)));
        }
    }

    #[test]
    fn every_two_days_alternates_on_epoch_parity() {
        let schedule = Schedule::Every {
            n: 2,
            unit: EveryUnit::Days,
        };
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        for day in 1..=28 {
            let date = NaiveDate::from_ymd_opt(2026, 2, day).unwrap();
            let index = date.signed_duration_since(epoch).num_days();
            let due = schedule.is_due(&parts((2026, 2, day), 0, 0));
            assert_eq!(due, index % 2 == 0, "on 2026-02-{day:02}");
        }
    }

    #[test]
    fn run_keys_are_stable_and_distinct() {
        let daily = Schedule::Daily { hour: 9, minute: 0 };
        let at = parts((2026, 2, 1), 9, 0);
        assert_eq!(daily.run_key(&at), Some("2026-02-01-09:00".into()));
        assert_eq!(daily.run_key(&at), daily.run_key(&at));
        assert_ne!(daily.run_key(&parts((2026, 2, 2), 9, 0)), daily.run_key(&at));

        let hourly = Schedule::Every {
            n: 6,
            unit: EveryUnit::Hours,
        };
        assert_eq!(
            hourly.run_key(&parts((2026, 2, 1), 6, 0)),
            Some("2026-02-01-h06".into())
        );

        let every_two_days = Schedule::Every {
            n: 2,
            unit: EveryUnit::Days,
        };
        assert_eq!(
            every_two_days.run_key(&parts((2026, 2, 1), 0, 0)),
            Some("2026-02-01-d2".into())
        );

        assert_eq!(Schedule::Off.run_key(&at), None);
    }

    #[test]
    fn projection_honors_timezone() {
        let tz = resolve_timezone("Europe/Kyiv").unwrap();
        // Winter: UTC+2.
        let instant = Utc.with_ymd_and_hms(2026, 2, 1, 7, 0, 0).unwrap();
        let parts = ZonedParts::project(instant, tz);
        assert_eq!(parts.hour, 9);
        assert_eq!(parts.minute, 0);
        assert_eq!(parts.date_key(), "2026-02-01");
        // Summer: UTC+3.
        let instant = Utc.with_ymd_and_hms(2026, 7, 1, 6, 0, 0).unwrap();
        assert_eq!(ZonedParts::project(instant, tz).hour, 9);
    }

    #[test]
    fn projection_crosses_date_boundary() {
        let tz = resolve_timezone("Europe/Kyiv").unwrap();
        let instant = Utc.with_ymd_and_hms(2026, 1, 31, 23, 30, 0).unwrap();
        let parts = ZonedParts::project(instant, tz);
        assert_eq!(parts.date_key(), "2026-02-01");
        assert_eq!(parts.hour, 1);
        assert_eq!(parts.weekday, Weekday::Sun);
    }

    #[test]
    fn unknown_timezone_is_reported() {
        assert!(resolve_timezone("Europe/Kyiv").is_some());
        assert!(resolve_timezone("Mars/Olympus").is_none());
        assert!(resolve_timezone("").is_none());
    }
}
