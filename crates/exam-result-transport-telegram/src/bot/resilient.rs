//! Resilient messaging utilities with automatic retry for Telegram API operations.
//!
//! Every call goes through [`exam_result_core::utils::retry_transport_operation`],
//! which retries transient failures with exponential backoff and jitter.
//! All texts are sent with HTML parse mode.

use anyhow::Result;
use exam_result_core::utils::{retry_transport_operation, truncate_str};
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup, InputFile, Message, MessageId, ParseMode};
use tracing::debug;

/// Telegram caps message text at 4096 characters
const MESSAGE_LIMIT: usize = 4000;

const ERROR_NOT_MODIFIED: &str = "message is not modified";

fn bounded(text: &str) -> String {
    if text.chars().count() > MESSAGE_LIMIT {
        format!("{}...", truncate_str(text, MESSAGE_LIMIT))
    } else {
        text.to_string()
    }
}

/// Send an HTML message with automatic retry on network failures.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    markup: Option<InlineKeyboardMarkup>,
) -> Result<Message> {
    let text = bounded(text);
    retry_transport_operation(|| async {
        let mut req = bot
            .send_message(chat_id, text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup.clone() {
            req = req.reply_markup(markup);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Edit an HTML message with automatic retry on network failures.
///
/// An edit that would not change the message counts as success.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn edit_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: &str,
    markup: Option<InlineKeyboardMarkup>,
) -> Result<()> {
    let text = bounded(text);
    retry_transport_operation(|| async {
        let mut req = bot
            .edit_message_text(chat_id, msg_id, text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup.clone() {
            req = req.reply_markup(markup);
        }
        match req.await {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains(ERROR_NOT_MODIFIED) => {
                debug!("Message update skipped: message is not modified");
                Ok(())
            }
            Err(e) => Err(anyhow::anyhow!("Telegram edit error: {e}")),
        }
    })
    .await
}

/// Send a photo from memory with an HTML caption.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_photo_resilient(
    bot: &Bot,
    chat_id: ChatId,
    photo: Vec<u8>,
    caption: &str,
    markup: Option<InlineKeyboardMarkup>,
) -> Result<Message> {
    retry_transport_operation(|| async {
        let mut req = bot
            .send_photo(chat_id, InputFile::memory(photo.clone()).file_name("photo.jpg"))
            .caption(caption.to_string())
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup.clone() {
            req = req.reply_markup(markup);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram photo error: {e}"))
    })
    .await
}

/// Delete a message with automatic retry on network failures.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn delete_message_resilient(bot: &Bot, chat_id: ChatId, msg_id: MessageId) -> Result<()> {
    retry_transport_operation(|| async {
        bot.delete_message(chat_id, msg_id)
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("Telegram delete error: {e}"))
    })
    .await
}
