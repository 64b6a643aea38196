//! Jarbot error types.

use thiserror::Error;

/// All errors the bot can produce, grouped by subsystem.
#[derive(Error, Debug)]
pub enum JarbotError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Schedule error: {0}")]
    Schedule(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, JarbotError>;
