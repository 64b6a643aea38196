//! # Jarbot Core
//! Shared types, configuration, errors, and the traits that connect the
//! raffle engine to its collaborators (storage, chat transport, randomness).

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::JarbotConfig;
pub use error::{JarbotError, Result};
pub use traits::{Outbound, RandomSource, Store, ThreadRandom};
pub use types::{ChatKind, ChatRoom, DonationLimits, Participant, ScheduledChat};
