#![deny(missing_docs)]
//! Katy bot library.
//!
//! IMDb lookup with per-user caption preferences, scheduled member removal
//! and channel posting for a Telegram bot.

/// Scheduled removal of group members.
pub mod autokick;
/// Telegram handlers, keyboards and delivery.
pub mod bot;
/// Configuration management.
pub mod config;
/// IMDb search, fetch, extraction and caption rendering.
pub mod imdb;
/// Redacted log output.
pub mod logging;
/// Channel posting with URL buttons.
pub mod post;
/// Storage layer (R2/S3).
pub mod storage;
/// Utility functions.
pub mod utils;

/// Storage doubles for unit tests.
#[cfg(test)]
pub mod testing;
