//! Shared domain types.

use serde::{Deserialize, Serialize};
use url::Url;

/// Kind of Telegram chat, as reported by the Bot API `chat.type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
    Unknown,
}

impl ChatKind {
    pub fn from_api(kind: &str) -> Self {
        match kind {
            "private" => Self::Private,
            "group" => Self::Group,
            "supergroup" => Self::Supergroup,
            "channel" => Self::Channel,
            _ => Self::Unknown,
        }
    }

    /// Raffles only run in group-style chats.
    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group | Self::Supergroup)
    }
}

/// An addressable chat room.
#[derive(Debug, Clone, Copy)]
pub struct ChatRoom {
    pub id: i64,
    pub kind: ChatKind,
}

impl ChatRoom {
    pub fn new(id: i64, kind: ChatKind) -> Self {
        Self { id, kind }
    }
}

/// A registered raffle participant with lifetime statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub id: i64,
    pub name: String,
    pub username: Option<String>,
    pub wins: i64,
    pub donated: i64,
}

impl Participant {
    /// Display line: "Name (@username)" when the username is known.
    pub fn mention(&self) -> String {
        match &self.username {
            Some(username) => format!("{} (@{})", self.name, username),
            None => self.name.clone(),
        }
    }
}

/// Per-chat donation bounds, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DonationLimits {
    pub min: i64,
    pub max: i64,
}

impl Default for DonationLimits {
    fn default() -> Self {
        Self { min: 10, max: 100 }
    }
}

/// One row from the schedule listing the poll loop sweeps over.
#[derive(Debug, Clone)]
pub struct ScheduledChat {
    pub chat_id: i64,
    pub schedule: String,
    pub timezone: Option<String>,
    pub last_run_key: Option<String>,
}

/// Display name for a Telegram user: first + last name, falling back to
/// the username.
pub fn display_name(first_name: &str, last_name: Option<&str>, username: Option<&str>) -> String {
    let full = match last_name {
        Some(last) => format!("{first_name} {last}"),
        None => first_name.to_string(),
    };
    let full = full.trim().to_string();
    if !full.is_empty() {
        return full;
    }
    username.map(str::to_string).unwrap_or_else(|| "Користувач".into())
}

/// Inject the donation amount into a Monobank jar link (`?a=<amount>`).
/// Other links are returned unchanged.
pub fn build_jar_url(jar_url: &str, amount: i64) -> String {
    if !jar_url.contains("send.monobank.ua/jar") {
        return jar_url.to_string();
    }
    match Url::parse(jar_url) {
        Ok(mut url) => {
            url.query_pairs_mut()
                .clear()
                .append_pair("a", &amount.to_string());
            url.to_string()
        }
        Err(_) => jar_url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_kind_from_api() {
        assert!(ChatKind::from_api("group").is_group());
        assert!(ChatKind::from_api("supergroup").is_group());
        assert!(!ChatKind::from_api("private").is_group());
        assert!(!ChatKind::from_api("channel").is_group());
        assert!(!ChatKind::from_api("whatever").is_group());
    }

    #[test]
    fn mention_with_and_without_username() {
        let with = Participant {
            id: 1,
            name: "Anna".into(),
            username: Some("anna".into()),
            wins: 0,
            donated: 0,
        };
        let without = Participant {
            id: 2,
            name: "Oleh".into(),
            username: None,
            wins: 0,
            donated: 0,
        };
        assert_eq!(with.mention(), "Anna (@anna)");
        assert_eq!(without.mention(), "Oleh");
    }

    #[test]
    fn display_name_fallbacks() {
        assert_eq!(display_name("Anna", Some("K"), None), "Anna K");
        assert_eq!(display_name("Anna", None, Some("anna")), "Anna");
        assert_eq!(display_name("", None, Some("anna")), "anna");
        assert_eq!(display_name("", None, None), "Користувач");
    }

    #[test]
    fn jar_url_amount_injection() {
        let jar = "https://send.monobank.ua/jar/abc123";
        assert_eq!(
            build_jar_url(jar, 50),
            "https://send.monobank.ua/jar/abc123?a=50"
        );
        // Existing amount is replaced, not appended.
        let with_amount = "https://send.monobank.ua/jar/abc123?a=10";
        assert_eq!(
            build_jar_url(with_amount, 75),
            "https://send.monobank.ua/jar/abc123?a=75"
        );
        // Non-jar links pass through untouched.
        let other = "https://example.com/donate?x=1";
        assert_eq!(build_jar_url(other, 50), other);
    }
}
