//! # Jarbot Scheduler
//!
//! Recurrence rules for automatic raffles, plus the poll loop that fires
//! them.
//!
//! The recurrence engine ([`recurrence`]) is a set of pure functions: parse
//! and format the five surface grammars (`off`, `daily HH:MM`,
//! `weekdays HH:MM`, `weekly <day> HH:MM`, `every N<h|d>`), project an
//! instant into a timezone's calendar fields, decide due-ness, and derive
//! the idempotency run key for a firing instant.
//!
//! The poll loop ([`poll`]) sweeps stored schedules on a fixed cadence and
//! initiates schedule-driven raffles, using the run key to avoid firing
//! twice for the same instant.

pub mod poll;
pub mod recurrence;

pub use poll::{due_run_key, spawn_schedule_loop};
pub use recurrence::{EveryUnit, Schedule, ZonedParts, resolve_timezone};
