//! Jarbot configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{JarbotError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JarbotConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub raffle: RaffleConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl JarbotConfig {
    /// Load config from the default path (~/.jarbot/config.toml), falling
    /// back to defaults when the file does not exist. The `JARBOT_BOT_TOKEN`
    /// environment variable overrides the configured token either way.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        if let Ok(token) = std::env::var("JARBOT_BOT_TOKEN") {
            config.telegram.bot_token = token;
        }
        Ok(config)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| JarbotError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| JarbotError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| JarbotError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the jarbot home directory (~/.jarbot).
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".jarbot")
    }
}

/// Telegram transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

fn default_poll_interval() -> u64 {
    1
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            poll_interval: default_poll_interval(),
        }
    }
}

/// Raffle sequence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaffleConfig {
    /// Base delay between announcement steps, in milliseconds. The full
    /// sequence resolves at five times this interval.
    #[serde(default = "default_step_interval_ms")]
    pub step_interval_ms: u64,
    /// Trigger-activation cooldown window, in seconds.
    #[serde(default = "default_cooldown_secs")]
    pub trigger_cooldown_secs: u64,
    /// Fallback fundraising jar link used when a chat has none configured.
    #[serde(default)]
    pub default_jar_url: String,
    /// Flavor phrases posted between start and winner announcement.
    /// Empty means the built-in set.
    #[serde(default)]
    pub phrases: Vec<String>,
}

fn default_step_interval_ms() -> u64 {
    1200
}

fn default_cooldown_secs() -> u64 {
    5 * 60
}

impl Default for RaffleConfig {
    fn default() -> Self {
        Self {
            step_interval_ms: default_step_interval_ms(),
            trigger_cooldown_secs: default_cooldown_secs(),
            default_jar_url: String::new(),
            phrases: Vec::new(),
        }
    }
}

/// Schedule sweep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// How often the poll loop re-evaluates stored schedules, in seconds.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Timezone used when a chat has none stored or an unknown one.
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
}

fn default_check_interval_secs() -> u64 {
    60
}

fn default_timezone() -> String {
    "Europe/Kyiv".into()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            default_timezone: default_timezone(),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "~/.jarbot/registry.sqlite".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = JarbotConfig::default();
        assert_eq!(config.raffle.step_interval_ms, 1200);
        assert_eq!(config.raffle.trigger_cooldown_secs, 300);
        assert_eq!(config.schedule.check_interval_secs, 60);
        assert_eq!(config.schedule.default_timezone, "Europe/Kyiv");
    }

    #[test]
    fn parses_partial_toml() {
        let config: JarbotConfig = toml::from_str(
            r#"
            [telegram]
            bot_token = "123:abc"

            [schedule]
            default_timezone = "Europe/Warsaw"
            "#,
        )
        .unwrap();
        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.schedule.default_timezone, "Europe/Warsaw");
        // Untouched sections keep their defaults.
        assert_eq!(config.raffle.step_interval_ms, 1200);
    }
}
