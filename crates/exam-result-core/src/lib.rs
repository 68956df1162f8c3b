#![deny(missing_docs)]
//! Exam Result Bot core library.
//!
//! Transport-agnostic dialogue engine, result fetching pipeline, caching,
//! rendering and storage.

/// Admin tooling: broadcast, feedback replies, usage statistics.
pub mod admin;
/// Time-expiring memo of fetched records.
pub mod cache;
/// Configuration management.
pub mod config;
/// Per-user conversation engine driving the dialogue and fetch pipeline.
pub mod engine;
/// Result fetching through the proxy.
pub mod fetcher;
/// Pure dialogue state machine.
pub mod fsm;
/// Transport-neutral inline keyboards and button actions.
pub mod keyboard;
/// Domain model: regions, languages and result records.
pub mod model;
/// Rendering of fetched records.
pub mod presenter;
/// Proxy extract client.
pub mod proxy;
/// Conversation sessions and the per-user session registry.
pub mod session;
/// Result statistics.
pub mod stats;
/// Storage layer (R2/S3 and in-memory).
pub mod storage;
/// Chat transport interface consumed by the engine.
pub mod transport;
/// Utility functions.
pub mod utils;
/// Static string tables for both supported languages.
pub mod views;

/// Recording fakes shared by the unit tests.
#[cfg(test)]
pub mod testing;
