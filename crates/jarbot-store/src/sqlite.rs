//! SQLite store backend.
//!
//! One `chats` row per chat holds every setting; participants live in
//! `users` keyed by (chat_id, user_id); `opt_outs` remembers who left so
//! auto-registration will not re-add them.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};

use jarbot_core::error::{JarbotError, Result};
use jarbot_core::types::{DonationLimits, Participant, ScheduledChat};
use jarbot_core::Store;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn storage_err(e: impl std::fmt::Display) -> JarbotError {
    JarbotError::Storage(e.to_string())
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(storage_err)?;
        Self::init_schema(&conn)?;
        tracing::info!("SQLite store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS chats (
                chat_id INTEGER PRIMARY KEY,
                jar_url TEXT,
                min_donation INTEGER,
                max_donation INTEGER,
                auto_register INTEGER NOT NULL DEFAULT 1,
                trigger_words TEXT,
                trigger_cooldown_at INTEGER,
                raffle_schedule TEXT,
                schedule_timezone TEXT,
                schedule_last_run_key TEXT
            );
            CREATE TABLE IF NOT EXISTS users (
                chat_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                username TEXT,
                wins INTEGER NOT NULL DEFAULT 0,
                donated INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (chat_id, user_id)
            );
            CREATE TABLE IF NOT EXISTS opt_outs (
                chat_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                PRIMARY KEY (chat_id, user_id)
            );",
        )
        .map_err(storage_err)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(storage_err)
    }

    fn ensure_chat(conn: &Connection, chat_id: i64) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO chats (chat_id) VALUES (?1)",
            params![chat_id],
        )
        .map_err(storage_err)?;
        Ok(())
    }

    fn chat_column<T: rusqlite::types::FromSql>(
        &self,
        chat_id: i64,
        column: &str,
    ) -> Result<Option<T>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {column} FROM chats WHERE chat_id = ?1");
        conn.query_row(&sql, params![chat_id], |row| row.get::<_, Option<T>>(0))
            .optional()
            .map(Option::flatten)
            .map_err(storage_err)
    }

    fn set_chat_column<T: rusqlite::ToSql>(
        &self,
        chat_id: i64,
        column: &str,
        value: T,
    ) -> Result<()> {
        let conn = self.lock()?;
        Self::ensure_chat(&conn, chat_id)?;
        let sql = format!("UPDATE chats SET {column} = ?2 WHERE chat_id = ?1");
        conn.execute(&sql, params![chat_id, value])
            .map_err(storage_err)?;
        Ok(())
    }

    fn read_trigger_words(&self, chat_id: i64) -> Result<Vec<String>> {
        let raw: Option<String> = self.chat_column(chat_id, "trigger_words")?;
        let Some(raw) = raw else {
            return Ok(Vec::new());
        };
        Ok(serde_json::from_str(&raw).unwrap_or_default())
    }

    fn write_trigger_words(&self, chat_id: i64, words: &[String]) -> Result<()> {
        let json = serde_json::to_string(words).map_err(storage_err)?;
        self.set_chat_column(chat_id, "trigger_words", json)
    }
}

fn row_to_participant(row: &rusqlite::Row<'_>) -> rusqlite::Result<Participant> {
    Ok(Participant {
        id: row.get(0)?,
        name: row.get(1)?,
        username: row.get(2)?,
        wins: row.get(3)?,
        donated: row.get(4)?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn participants(&self, chat_id: i64) -> Result<Vec<Participant>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT user_id, name, username, wins, donated FROM users u
                 WHERE chat_id = ?1
                   AND NOT EXISTS (
                       SELECT 1 FROM opt_outs o
                       WHERE o.chat_id = u.chat_id AND o.user_id = u.user_id
                   )
                 ORDER BY user_id",
            )
            .map_err(storage_err)?;
        let rows = stmt
            .query_map(params![chat_id], row_to_participant)
            .map_err(storage_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage_err)
    }

    async fn participant(&self, chat_id: i64, user_id: i64) -> Result<Option<Participant>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT user_id, name, username, wins, donated FROM users
             WHERE chat_id = ?1 AND user_id = ?2",
            params![chat_id, user_id],
            row_to_participant,
        )
        .optional()
        .map_err(storage_err)
    }

    async fn upsert_participant(&self, chat_id: i64, participant: &Participant) -> Result<()> {
        let conn = self.lock()?;
        Self::ensure_chat(&conn, chat_id)?;
        conn.execute(
            "INSERT INTO users (chat_id, user_id, name, username, wins, donated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (chat_id, user_id) DO UPDATE SET
                 name = excluded.name,
                 username = excluded.username,
                 wins = excluded.wins,
                 donated = excluded.donated",
            params![
                chat_id,
                participant.id,
                participant.name,
                participant.username,
                participant.wins,
                participant.donated,
            ],
        )
        .map_err(storage_err)?;
        Ok(())
    }

    async fn record_win(
        &self,
        chat_id: i64,
        user_id: i64,
        wins_delta: i64,
        donated_delta: i64,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE users SET wins = wins + ?3, donated = donated + ?4
             WHERE chat_id = ?1 AND user_id = ?2",
            params![chat_id, user_id, wins_delta, donated_delta],
        )
        .map_err(storage_err)?;
        Ok(())
    }

    async fn opt_out(&self, chat_id: i64, user_id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let registered: Option<i64> = conn
            .query_row(
                "SELECT user_id FROM users WHERE chat_id = ?1 AND user_id = ?2",
                params![chat_id, user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage_err)?;
        let newly_opted_out = conn
            .execute(
                "INSERT OR IGNORE INTO opt_outs (chat_id, user_id) VALUES (?1, ?2)",
                params![chat_id, user_id],
            )
            .map_err(storage_err)?
            > 0;
        Ok(registered.is_some() && newly_opted_out)
    }

    async fn is_opted_out(&self, chat_id: i64, user_id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let row: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM opt_outs WHERE chat_id = ?1 AND user_id = ?2",
                params![chat_id, user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage_err)?;
        Ok(row.is_some())
    }

    async fn clear_opt_out(&self, chat_id: i64, user_id: i64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM opt_outs WHERE chat_id = ?1 AND user_id = ?2",
            params![chat_id, user_id],
        )
        .map_err(storage_err)?;
        Ok(())
    }

    async fn jar_url(&self, chat_id: i64) -> Result<Option<String>> {
        self.chat_column(chat_id, "jar_url")
    }

    async fn set_jar_url(&self, chat_id: i64, url: &str) -> Result<()> {
        self.set_chat_column(chat_id, "jar_url", url)
    }

    async fn donation_limits(&self, chat_id: i64) -> Result<DonationLimits> {
        let defaults = DonationLimits::default();
        let min: Option<i64> = self.chat_column(chat_id, "min_donation")?;
        let max: Option<i64> = self.chat_column(chat_id, "max_donation")?;
        Ok(DonationLimits {
            min: min.unwrap_or(defaults.min),
            max: max.unwrap_or(defaults.max),
        })
    }

    async fn set_donation_limits(&self, chat_id: i64, min: i64, max: i64) -> Result<()> {
        let conn = self.lock()?;
        Self::ensure_chat(&conn, chat_id)?;
        conn.execute(
            "UPDATE chats SET min_donation = ?2, max_donation = ?3 WHERE chat_id = ?1",
            params![chat_id, min, max],
        )
        .map_err(storage_err)?;
        Ok(())
    }

    async fn auto_register(&self, chat_id: i64) -> Result<bool> {
        let flag: Option<i64> = self.chat_column(chat_id, "auto_register")?;
        Ok(flag.unwrap_or(1) != 0)
    }

    async fn set_auto_register(&self, chat_id: i64, enabled: bool) -> Result<()> {
        self.set_chat_column(chat_id, "auto_register", enabled as i64)
    }

    async fn trigger_words(&self, chat_id: i64) -> Result<Vec<String>> {
        self.read_trigger_words(chat_id)
    }

    async fn add_trigger_word(&self, chat_id: i64, word: &str) -> Result<bool> {
        let normalized = word.trim().to_lowercase();
        if normalized.is_empty() {
            return Ok(false);
        }
        let mut words = self.read_trigger_words(chat_id)?;
        if words.contains(&normalized) {
            return Ok(false);
        }
        words.push(normalized);
        words.sort();
        self.write_trigger_words(chat_id, &words)?;
        Ok(true)
    }

    async fn remove_trigger_word(&self, chat_id: i64, word: &str) -> Result<bool> {
        let normalized = word.trim().to_lowercase();
        let words = self.read_trigger_words(chat_id)?;
        let remaining: Vec<String> = words
            .iter()
            .filter(|entry| **entry != normalized)
            .cloned()
            .collect();
        if remaining.len() == words.len() {
            return Ok(false);
        }
        self.write_trigger_words(chat_id, &remaining)?;
        Ok(true)
    }

    async fn cooldown_mark(&self, chat_id: i64) -> Result<Option<i64>> {
        self.chat_column(chat_id, "trigger_cooldown_at")
    }

    async fn set_cooldown_mark(&self, chat_id: i64, at_ms: i64) -> Result<()> {
        self.set_chat_column(chat_id, "trigger_cooldown_at", at_ms)
    }

    async fn schedule(&self, chat_id: i64) -> Result<Option<String>> {
        self.chat_column(chat_id, "raffle_schedule")
    }

    async fn set_schedule(&self, chat_id: i64, schedule: Option<&str>) -> Result<()> {
        let conn = self.lock()?;
        Self::ensure_chat(&conn, chat_id)?;
        conn.execute(
            "UPDATE chats SET raffle_schedule = ?2 WHERE chat_id = ?1",
            params![chat_id, schedule],
        )
        .map_err(storage_err)?;
        if schedule.is_none() {
            conn.execute(
                "UPDATE chats SET schedule_last_run_key = NULL WHERE chat_id = ?1",
                params![chat_id],
            )
            .map_err(storage_err)?;
        }
        Ok(())
    }

    async fn schedule_timezone(&self, chat_id: i64) -> Result<Option<String>> {
        self.chat_column(chat_id, "schedule_timezone")
    }

    async fn set_schedule_timezone(&self, chat_id: i64, timezone: &str) -> Result<()> {
        self.set_chat_column(chat_id, "schedule_timezone", timezone)
    }

    async fn last_run_key(&self, chat_id: i64) -> Result<Option<String>> {
        self.chat_column(chat_id, "schedule_last_run_key")
    }

    async fn set_last_run_key(&self, chat_id: i64, key: &str) -> Result<()> {
        self.set_chat_column(chat_id, "schedule_last_run_key", key)
    }

    async fn scheduled_chats(&self) -> Result<Vec<ScheduledChat>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT chat_id, raffle_schedule, schedule_timezone, schedule_last_run_key
                 FROM chats WHERE raffle_schedule IS NOT NULL",
            )
            .map_err(storage_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ScheduledChat {
                    chat_id: row.get(0)?,
                    schedule: row.get(1)?,
                    timezone: row.get(2)?,
                    last_run_key: row.get(3)?,
                })
            })
            .map_err(storage_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage_err)
    }
}
