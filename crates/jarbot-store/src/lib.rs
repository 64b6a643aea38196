//! # Jarbot Store
//! SQLite-backed persistence: per-chat settings, the participant registry
//! with win/donation statistics, opt-outs, and the schedule cursor.

pub mod sqlite;

pub use sqlite::SqliteStore;
