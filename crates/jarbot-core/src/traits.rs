//! Collaborator traits: persistence, outbound transport, and randomness.
//!
//! The raffle engine and the schedule poll loop are written against these
//! traits so tests can swap in an in-memory store, a recording transport,
//! and a scripted random source.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{DonationLimits, Participant, ScheduledChat};

/// Per-chat persistent state: participants, settings, schedule cursor.
#[async_trait]
pub trait Store: Send + Sync {
    /// Registered participants for a chat, excluding opted-out users,
    /// ordered by user id.
    async fn participants(&self, chat_id: i64) -> Result<Vec<Participant>>;

    async fn participant(&self, chat_id: i64, user_id: i64) -> Result<Option<Participant>>;

    async fn upsert_participant(&self, chat_id: i64, participant: &Participant) -> Result<()>;

    /// Apply win/donation deltas to one participant record in a single
    /// statement, atomic with respect to concurrent reads.
    async fn record_win(
        &self,
        chat_id: i64,
        user_id: i64,
        wins_delta: i64,
        donated_delta: i64,
    ) -> Result<()>;

    /// Opt a user out of raffles. Returns true when the user was actually
    /// registered and not already opted out.
    async fn opt_out(&self, chat_id: i64, user_id: i64) -> Result<bool>;

    async fn is_opted_out(&self, chat_id: i64, user_id: i64) -> Result<bool>;

    async fn clear_opt_out(&self, chat_id: i64, user_id: i64) -> Result<()>;

    async fn jar_url(&self, chat_id: i64) -> Result<Option<String>>;

    async fn set_jar_url(&self, chat_id: i64, url: &str) -> Result<()>;

    async fn donation_limits(&self, chat_id: i64) -> Result<DonationLimits>;

    async fn set_donation_limits(&self, chat_id: i64, min: i64, max: i64) -> Result<()>;

    async fn auto_register(&self, chat_id: i64) -> Result<bool>;

    async fn set_auto_register(&self, chat_id: i64, enabled: bool) -> Result<()>;

    async fn trigger_words(&self, chat_id: i64) -> Result<Vec<String>>;

    /// Returns false when the (normalized) word was already present.
    async fn add_trigger_word(&self, chat_id: i64, word: &str) -> Result<bool>;

    /// Returns false when the word was not present.
    async fn remove_trigger_word(&self, chat_id: i64, word: &str) -> Result<bool>;

    /// Unix-millisecond timestamp of the last trigger-activated raffle start.
    async fn cooldown_mark(&self, chat_id: i64) -> Result<Option<i64>>;

    async fn set_cooldown_mark(&self, chat_id: i64, at_ms: i64) -> Result<()>;

    async fn schedule(&self, chat_id: i64) -> Result<Option<String>>;

    /// Storing `None` disables the schedule and clears the run-key cursor.
    async fn set_schedule(&self, chat_id: i64, schedule: Option<&str>) -> Result<()>;

    async fn schedule_timezone(&self, chat_id: i64) -> Result<Option<String>>;

    async fn set_schedule_timezone(&self, chat_id: i64, timezone: &str) -> Result<()>;

    async fn last_run_key(&self, chat_id: i64) -> Result<Option<String>>;

    async fn set_last_run_key(&self, chat_id: i64, key: &str) -> Result<()>;

    /// All chats with a non-empty stored schedule.
    async fn scheduled_chats(&self) -> Result<Vec<ScheduledChat>>;
}

/// Fire-and-forget outbound message transport. Failures are logged by the
/// caller, never retried (at-most-once delivery per step).
#[async_trait]
pub trait Outbound: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> Result<()>;
}

/// Injected random source so draws are reproducible under test.
pub trait RandomSource: Send + Sync {
    /// Uniform index in `[0, len)`. `len` must be non-zero.
    fn pick_index(&self, len: usize) -> usize;

    /// Uniform integer in `[lo, hi]` inclusive.
    fn int_between(&self, lo: i64, hi: i64) -> i64;
}

/// Production random source backed by the thread-local generator.
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick_index(&self, len: usize) -> usize {
        use rand::Rng;
        rand::thread_rng().gen_range(0..len)
    }

    fn int_between(&self, lo: i64, hi: i64) -> i64 {
        use rand::Rng;
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        rand::thread_rng().gen_range(lo..=hi)
    }
}
