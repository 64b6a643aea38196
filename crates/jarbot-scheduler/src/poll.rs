//! Schedule poll loop.
//!
//! Sweeps every chat with a stored schedule on a fixed cadence. A chat
//! fires when its rule is due in its own timezone and the run key for this
//! instant differs from the last recorded one. Firing only initiates the
//! raffle; the announcement sequence runs independently and the sweep moves
//! on to the next chat.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use jarbot_core::config::ScheduleConfig;
use jarbot_core::types::{ChatKind, ChatRoom};
use jarbot_core::{Result, Store};
use jarbot_raffle::{RaffleRunner, StartOptions};

use crate::recurrence::{Schedule, ZonedParts, resolve_timezone};

/// Decide whether a chat's schedule should fire at `now`, returning the run
/// key to record when it should. `None` means: no valid rule, rule not due,
/// or this instant was already fired (stored key matches).
pub fn due_run_key(
    schedule_text: &str,
    timezone: Option<&str>,
    default_tz: Tz,
    last_run_key: Option<&str>,
    now: DateTime<Utc>,
) -> Option<String> {
    let schedule = Schedule::parse(schedule_text)?;
    if schedule == Schedule::Off {
        return None;
    }

    let tz = match timezone {
        Some(name) => resolve_timezone(name).unwrap_or_else(|| {
            tracing::warn!("Unknown timezone '{name}', falling back to {default_tz}");
            default_tz
        }),
        None => default_tz,
    };

    let parts = ZonedParts::project(now, tz);
    if !schedule.is_due(&parts) {
        return None;
    }
    let run_key = schedule.run_key(&parts)?;
    if last_run_key == Some(run_key.as_str()) {
        return None;
    }
    Some(run_key)
}

/// Spawn the schedule sweep as a background tokio task.
pub fn spawn_schedule_loop(
    store: Arc<dyn Store>,
    runner: RaffleRunner,
    config: ScheduleConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let default_tz = resolve_timezone(&config.default_timezone).unwrap_or_else(|| {
            tracing::warn!(
                "Unknown default timezone '{}', falling back to UTC",
                config.default_timezone
            );
            chrono_tz::UTC
        });

        tracing::info!(
            "Schedule loop started (check every {}s, default timezone {default_tz})",
            config.check_interval_secs
        );

        let mut interval = tokio::time::interval(Duration::from_secs(config.check_interval_secs));
        loop {
            interval.tick().await;
            if let Err(e) = sweep(store.as_ref(), &runner, default_tz).await {
                tracing::warn!("Schedule sweep failed: {e}");
            }
        }
    })
}

async fn sweep(store: &dyn Store, runner: &RaffleRunner, default_tz: Tz) -> Result<()> {
    let scheduled = store.scheduled_chats().await?;
    if scheduled.is_empty() {
        return Ok(());
    }

    let now = Utc::now();
    for entry in scheduled {
        let Some(run_key) = due_run_key(
            &entry.schedule,
            entry.timezone.as_deref(),
            default_tz,
            entry.last_run_key.as_deref(),
            now,
        ) else {
            continue;
        };

        tracing::info!(
            chat_id = entry.chat_id,
            run_key = %run_key,
            "Schedule due, starting raffle"
        );

        // The stored chat id is all we have here; the room object is long
        // gone, so the group-type check is bypassed.
        let chat = ChatRoom::new(entry.chat_id, ChatKind::Supergroup);
        let outcome = runner.start(&chat, StartOptions::scheduled()).await;
        tracing::debug!(chat_id = entry.chat_id, ?outcome, "Schedule-driven start");

        // Recorded after initiation, whether or not the start was declined.
        // A crash between initiation and this write can double-fire on the
        // next process start; accepted for a once-a-minute sweep.
        store.set_last_run_key(entry.chat_id, &run_key).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn kyiv() -> Tz {
        resolve_timezone("Europe/Kyiv").unwrap()
    }

    /// 2026-02-01 06:00 Kyiv time (UTC+2 in winter).
    fn due_instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 4, 0, 0).unwrap()
    }

    #[test]
    fn fires_when_due_and_unrecorded() {
        let key = due_run_key("every 6h", Some("Europe/Kyiv"), kyiv(), None, due_instant());
        assert_eq!(key.as_deref(), Some("2026-02-01-h06"));
    }

    #[test]
    fn skips_when_run_key_already_recorded() {
        let key = due_run_key(
            "every 6h",
            Some("Europe/Kyiv"),
            kyiv(),
            Some("2026-02-01-h06"),
            due_instant(),
        );
        assert_eq!(key, None);
    }

    #[test]
    fn refires_for_a_new_instant() {
        let later = Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap();
        let key = due_run_key(
            "every 6h",
            Some("Europe/Kyiv"),
            kyiv(),
            Some("2026-02-01-h06"),
            later,
        );
        assert_eq!(key.as_deref(), Some("2026-02-01-h12"));
    }

    #[test]
    fn not_due_yields_nothing() {
        let off_hour = Utc.with_ymd_and_hms(2026, 2, 1, 5, 0, 0).unwrap();
        assert_eq!(
            due_run_key("every 6h", Some("Europe/Kyiv"), kyiv(), None, off_hour),
            None
        );
    }

    #[test]
    fn off_and_garbage_schedules_never_fire() {
        assert_eq!(
            due_run_key("off", Some("Europe/Kyiv"), kyiv(), None, due_instant()),
            None
        );
        assert_eq!(
            due_run_key("nonsense", Some("Europe/Kyiv"), kyiv(), None, due_instant()),
            None
        );
    }

    #[test]
    fn unknown_timezone_falls_back_to_default() {
        // 09:00 Kyiv; the broken timezone name falls back to the default
        // zone rather than being dropped.
        let instant = Utc.with_ymd_and_hms(2026, 2, 1, 7, 0, 0).unwrap();
        let key = due_run_key("daily 09:00", Some("Mars/Olympus"), kyiv(), None, instant);
        assert_eq!(key.as_deref(), Some("2026-02-01-09:00"));
    }

    #[test]
    fn missing_timezone_uses_default() {
        let instant = Utc.with_ymd_and_hms(2026, 2, 1, 7, 0, 0).unwrap();
        let key = due_run_key("daily 09:00", None, kyiv(), None, instant);
        assert_eq!(key.as_deref(), Some("2026-02-01-09:00"));
    }
}
