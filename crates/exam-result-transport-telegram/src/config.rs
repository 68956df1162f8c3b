//! Telegram transport settings.

use config::ConfigError;
use exam_result_core::config::ResultSettings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use teloxide::types::{ChatId, Recipient};

/// Telegram transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TelegramSettings {
    /// Telegram Bot API token.
    pub telegram_token: String,
    /// Channel users must join, as `@handle` or numeric chat id.
    pub channel_id: String,
}

/// Combined settings used by the Telegram transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Lookup, admin and storage settings shared with the core.
    pub results: Arc<ResultSettings>,
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(results: ResultSettings, telegram: TelegramSettings) -> Self {
        Self {
            results: Arc::new(results),
            telegram: Arc::new(telegram),
        }
    }
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        exam_result_core::config::build_config()?.try_deserialize()
    }

    /// Gating channel as a Bot API recipient.
    #[must_use]
    pub fn channel(&self) -> Recipient {
        channel_recipient(&self.channel_id)
    }
}

/// Numeric ids address the chat directly; anything else is a public username.
#[must_use]
pub fn channel_recipient(raw: &str) -> Recipient {
    let raw = raw.trim();
    raw.parse::<i64>().map_or_else(
        |_| {
            let handle = raw.trim_start_matches('@');
            Recipient::ChannelUsername(format!("@{handle}"))
        },
        |id| Recipient::Id(ChatId(id)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_recipient_parsing() {
        assert_eq!(
            channel_recipient("@exam_results"),
            Recipient::ChannelUsername("@exam_results".to_string())
        );
        assert_eq!(
            channel_recipient(" exam_results "),
            Recipient::ChannelUsername("@exam_results".to_string())
        );
        assert_eq!(
            channel_recipient("-1001234567890"),
            Recipient::Id(ChatId(-1_001_234_567_890))
        );
    }
}
