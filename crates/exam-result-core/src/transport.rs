//! Chat transport interface consumed by the engine
//!
//! Texts and captions are Telegram HTML. Implementations are expected to
//! retry transient failures themselves.

use crate::keyboard::Keyboard;
use async_trait::async_trait;
use thiserror::Error;

/// Reference to a message emitted into a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef(pub i32);

/// Errors reported by a chat transport
#[derive(Error, Debug)]
pub enum TransportError {
    /// The chat API rejected or failed the call
    #[error("Chat API error: {0}")]
    Api(String),
}

/// Outbound side of the chat platform
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a text message
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, TransportError>;

    /// Replaces the text (and keyboard) of an existing message
    async fn edit_text(
        &self,
        chat_id: i64,
        message: MessageRef,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<(), TransportError>;

    /// Deletes a message
    async fn delete_message(&self, chat_id: i64, message: MessageRef)
        -> Result<(), TransportError>;

    /// Sends a photo with a caption
    async fn send_photo(
        &self,
        chat_id: i64,
        photo: Vec<u8>,
        caption: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, TransportError>;

    /// Whether the user belongs to the gating channel; lookup failures count as "no"
    async fn is_member(&self, user_id: i64) -> bool;

    /// Shows a typing indicator, best-effort
    async fn show_typing(&self, chat_id: i64);
}
