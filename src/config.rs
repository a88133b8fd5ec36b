//! Configuration and settings management
//!
//! Loads settings from environment variables and config files, and defines
//! the destination platform limits.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::relay::planner::{DocumentCaptionPolicy, PlannerLimits};

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_bot_token: String,
    /// Target Telegram chat: numeric chat id or `@channel` username
    pub telegram_chat_id: String,
    /// Discord bot token
    pub discord_bot_token: String,

    /// Comma-separated list of Discord channel IDs to relay from
    #[serde(rename = "allowed_channel_ids")]
    pub allowed_channel_ids_str: Option<String>,

    /// Root directory for staged attachments
    #[serde(default = "default_temp_dir")]
    pub temp_dir: String,

    /// Timeout for a single attachment download
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Upper bound for relaying one message end to end
    #[serde(default = "default_relay_timeout_secs")]
    pub relay_timeout_secs: u64,

    /// Largest photo sent as a photo; bigger ones go out as documents
    #[serde(default = "default_photo_max_bytes")]
    pub photo_max_bytes: u64,
    /// Largest video accepted by the destination
    #[serde(default = "default_media_max_bytes")]
    pub video_max_bytes: u64,
    /// Largest document (or animation) accepted by the destination
    #[serde(default = "default_media_max_bytes")]
    pub document_max_bytes: u64,

    /// Whether every document repeats the message text as caption
    #[serde(default)]
    pub document_caption_policy: DocumentCaptionPolicy,
}

fn default_temp_dir() -> String {
    "temp".to_string()
}

const fn default_fetch_timeout_secs() -> u64 {
    FETCH_TIMEOUT_SECS
}

const fn default_relay_timeout_secs() -> u64 {
    RELAY_TIMEOUT_SECS
}

const fn default_photo_max_bytes() -> u64 {
    TELEGRAM_PHOTO_MAX_BYTES
}

const fn default_media_max_bytes() -> u64 {
    TELEGRAM_MEDIA_MAX_BYTES
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use discord_telegram_relay::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or a required token is empty.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Local overrides, not checked into git
            .add_source(File::with_name("config/local").required(false))
            // Eg.. `APP__TEMP_DIR=/tmp/relay ./target/app` would set the `temp_dir` key
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Plain UPPER_SNAKE_CASE variables map to snake_case keys
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        let settings: Self = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram_bot_token.trim().is_empty() {
            return Err(ConfigError::Message(
                "TELEGRAM_BOT_TOKEN environment variable is required".into(),
            ));
        }
        if self.telegram_chat_id.trim().is_empty() {
            return Err(ConfigError::Message(
                "TELEGRAM_CHAT_ID environment variable is required".into(),
            ));
        }
        if self.discord_bot_token.trim().is_empty() {
            return Err(ConfigError::Message(
                "DISCORD_BOT_TOKEN environment variable is required".into(),
            ));
        }
        Ok(())
    }

    /// Returns the set of Discord channel IDs whose messages are relayed
    #[must_use]
    pub fn allowed_channels(&self) -> HashSet<u64> {
        self.allowed_channel_ids_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .filter_map(|id| id.parse::<u64>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Size limits handed to the batch planner
    #[must_use]
    pub const fn planner_limits(&self) -> PlannerLimits {
        PlannerLimits {
            photo_max_bytes: self.photo_max_bytes,
            video_max_bytes: self.video_max_bytes,
            document_max_bytes: self.document_max_bytes,
            group_max_items: TELEGRAM_MEDIA_GROUP_MAX,
            caption_max_chars: TELEGRAM_CAPTION_LIMIT,
        }
    }

    /// Timeout for one attachment download
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Timeout for one message's whole relay operation
    #[must_use]
    pub const fn relay_timeout(&self) -> Duration {
        Duration::from_secs(self.relay_timeout_secs)
    }
}

// Telegram Bot API limits
/// Maximum photo upload size (10 MiB)
pub const TELEGRAM_PHOTO_MAX_BYTES: u64 = 10 * 1024 * 1024;
/// Maximum video/document upload size (50 MiB)
pub const TELEGRAM_MEDIA_MAX_BYTES: u64 = 50 * 1024 * 1024;
/// Maximum number of items in one media group
pub const TELEGRAM_MEDIA_GROUP_MAX: usize = 10;
/// Maximum caption length in characters
pub const TELEGRAM_CAPTION_LIMIT: usize = 1024;
/// Maximum text message length in characters
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

// Relay timeouts
/// Default attachment download timeout in seconds
pub const FETCH_TIMEOUT_SECS: u64 = 30;
/// Default end-to-end relay timeout in seconds
pub const RELAY_TIMEOUT_SECS: u64 = 300; // 5 minutes

// Telegram API retry configuration
/// Maximum attempts for retried Telegram text sends
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Initial backoff delay in milliseconds
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff delay in milliseconds
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;

/// Filename prefix Discord uses to mark an attachment as a spoiler
pub const SPOILER_PREFIX: &str = "SPOILER_";
