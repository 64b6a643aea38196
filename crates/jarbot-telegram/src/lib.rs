//! # Jarbot Telegram
//! Telegram Bot API transport: long-polling client, outbound messaging,
//! and the command router that wires chat commands to the raffle engine.

pub mod api;
pub mod bot;
pub mod texts;

pub use api::TelegramApi;
pub use bot::RaffleBot;
