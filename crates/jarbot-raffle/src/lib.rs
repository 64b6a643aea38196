//! # Jarbot Raffle
//!
//! The raffle session state machine. One chat room holds at most one live
//! session; a session is a short sequence of delayed announcement steps
//! ending in a weighted-random winner draw and a donation prize.

pub mod session;
pub mod texts;

pub use session::{RaffleRunner, StartOptions, StartOutcome};
