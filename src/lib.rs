#![deny(missing_docs)]
//! Discord to Telegram relay.
//!
//! Mirrors messages and attachments posted in selected Discord channels into
//! one Telegram chat, respecting Telegram's media limits.

/// Configuration management.
pub mod config;
/// Outbound chat platform (Telegram).
pub mod destination;
/// Inbound chat platform (Discord).
pub mod gateway;
/// Logging setup with token redaction.
pub mod logging;
/// Fetch, classify, plan and deliver pipeline.
pub mod relay;
/// Utility functions.
pub mod utils;

#[cfg(test)]
pub mod testing;
