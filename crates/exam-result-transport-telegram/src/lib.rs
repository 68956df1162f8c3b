#![deny(missing_docs)]
//! Telegram transport adapter for the Exam Result Bot.

/// Telegram-specific bot/transport implementation.
pub mod bot;
/// Telegram transport configuration.
pub mod config;
/// Telegram runtime entrypoint.
pub mod runner;
