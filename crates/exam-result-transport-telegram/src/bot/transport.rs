//! Bot API implementation of the core chat transport

use crate::bot::keyboard::to_markup;
use crate::bot::resilient::{
    delete_message_resilient, edit_message_resilient, send_message_resilient, send_photo_resilient,
};
use async_trait::async_trait;
use exam_result_core::keyboard::Keyboard;
use exam_result_core::transport::{MessageRef, Transport, TransportError};
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ChatId, MessageId, Recipient, UserId};
use tracing::{debug, warn};

/// Sends, edits and deletes messages through a Telegram bot
pub struct TelegramTransport {
    bot: Bot,
    channel: Recipient,
}

impl TelegramTransport {
    /// Creates a transport that checks membership of `channel`
    #[must_use]
    pub const fn new(bot: Bot, channel: Recipient) -> Self {
        Self { bot, channel }
    }
}

fn api_error(e: &anyhow::Error) -> TransportError {
    TransportError::Api(e.to_string())
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, TransportError> {
        let markup = keyboard.as_ref().map(to_markup);
        let message = send_message_resilient(&self.bot, ChatId(chat_id), text, markup)
            .await
            .map_err(|e| api_error(&e))?;
        Ok(MessageRef(message.id.0))
    }

    async fn edit_text(
        &self,
        chat_id: i64,
        message: MessageRef,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<(), TransportError> {
        let markup = keyboard.as_ref().map(to_markup);
        edit_message_resilient(&self.bot, ChatId(chat_id), MessageId(message.0), text, markup)
            .await
            .map_err(|e| api_error(&e))
    }

    async fn delete_message(
        &self,
        chat_id: i64,
        message: MessageRef,
    ) -> Result<(), TransportError> {
        delete_message_resilient(&self.bot, ChatId(chat_id), MessageId(message.0))
            .await
            .map_err(|e| api_error(&e))
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        photo: Vec<u8>,
        caption: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, TransportError> {
        let markup = keyboard.as_ref().map(to_markup);
        let message = send_photo_resilient(&self.bot, ChatId(chat_id), photo, caption, markup)
            .await
            .map_err(|e| api_error(&e))?;
        Ok(MessageRef(message.id.0))
    }

    async fn is_member(&self, user_id: i64) -> bool {
        match self
            .bot
            .get_chat_member(self.channel.clone(), UserId(user_id.cast_unsigned()))
            .await
        {
            Ok(member) => {
                let present = member.is_present();
                debug!(user_id, present, "Channel membership checked");
                present
            }
            Err(e) => {
                warn!(user_id, error = %e, "Membership check failed, treating as non-member");
                false
            }
        }
    }

    async fn show_typing(&self, chat_id: i64) {
        if let Err(e) = self
            .bot
            .send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await
        {
            debug!(chat_id, error = %e, "Typing indicator failed");
        }
    }
}
