//! Turns Telegram updates into engine events and admin commands

use crate::bot::resilient::send_message_resilient;
use anyhow::Result;
use exam_result_core::admin::{AdminCommand, AdminConsole};
use exam_result_core::engine::{ConversationEngine, Event, EventKind};
use exam_result_core::model::UserRef;
use exam_result_core::transport::MessageRef;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, User};
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Start the bot and show the language picker
    #[command(description = "Start the bot.")]
    Start,
    /// Send feedback to the admins
    #[command(description = "Send feedback.")]
    Feedback,
    /// Broadcast to subscribers (admins only)
    #[command(description = "Broadcast a message to subscribers.")]
    Broadcast(String),
    /// Reply to a feedback entry (admins only)
    #[command(description = "Reply to feedback.")]
    Reply(String),
    /// Show usage statistics (admins only)
    #[command(description = "Show bot statistics.")]
    Stats,
}

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Core view of a Telegram user
#[must_use]
pub fn user_ref(user: &User) -> UserRef {
    UserRef {
        id: user.id.0.cast_signed(),
        username: user.username.clone(),
    }
}

fn sender(msg: &Message) -> UserRef {
    msg.from.as_ref().map_or(
        UserRef {
            id: get_user_id_safe(msg),
            username: None,
        },
        user_ref,
    )
}

fn message_event(msg: &Message, kind: EventKind) -> Event {
    Event {
        user: sender(msg),
        chat_id: msg.chat.id.0,
        kind,
    }
}

/// Dispatches a bot command
///
/// # Errors
///
/// Returns an error if the engine or the admin reply fails to deliver a message.
pub async fn command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    engine: Arc<ConversationEngine>,
    admin: Arc<AdminConsole>,
) -> Result<()> {
    let message = MessageRef(msg.id.0);
    let admin_command = match cmd {
        Command::Start => {
            info!(user_id = get_user_id_safe(&msg), "User initiated /start command.");
            engine
                .handle(message_event(&msg, EventKind::Start { message }))
                .await?;
            return Ok(());
        }
        Command::Feedback => {
            engine
                .handle(message_event(&msg, EventKind::FeedbackCommand { message }))
                .await?;
            return Ok(());
        }
        Command::Broadcast(text) => AdminCommand::Broadcast(text),
        Command::Reply(args) => AdminCommand::Reply(args),
        Command::Stats => AdminCommand::Stats,
    };

    let reply = admin.run(get_user_id_safe(&msg), admin_command).await;
    send_message_resilient(&bot, msg.chat.id, &reply, None).await?;
    Ok(())
}

/// Forwards a plain text message to the engine
///
/// # Errors
///
/// Returns an error if the engine fails to deliver a reply.
pub async fn text(msg: Message, engine: Arc<ConversationEngine>) -> Result<()> {
    let Some(text) = msg.text().map(str::to_string) else {
        return Ok(());
    };
    let event = message_event(
        &msg,
        EventKind::Text {
            message: MessageRef(msg.id.0),
            text,
        },
    );
    engine.handle(event).await?;
    Ok(())
}

/// Acknowledges a button press and forwards it to the engine
///
/// # Errors
///
/// Returns an error if the engine fails to deliver a reply.
pub async fn callback(bot: Bot, q: CallbackQuery, engine: Arc<ConversationEngine>) -> Result<()> {
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!(error = %e, "Failed to answer callback query");
    }

    let Some(data) = q.data.clone() else {
        return Ok(());
    };
    let user = user_ref(&q.from);
    let origin = q.message.as_ref().map(|m| MessageRef(m.id().0));
    let chat_id = q.message.as_ref().map_or(user.id, |m| m.chat().id.0);

    engine
        .handle(Event {
            user,
            chat_id,
            kind: EventKind::Button { data, origin },
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_commands_keep_their_arguments() {
        assert_eq!(
            Command::parse("/broadcast Results are out", "exam_bot").ok(),
            Some(Command::Broadcast("Results are out".to_string()))
        );
        assert_eq!(
            Command::parse("/reply 3 thanks", "exam_bot").ok(),
            Some(Command::Reply("3 thanks".to_string()))
        );
        assert_eq!(Command::parse("/stats", "exam_bot").ok(), Some(Command::Stats));
        assert_eq!(Command::parse("/start", "exam_bot").ok(), Some(Command::Start));
        assert!(Command::parse("/unknown", "exam_bot").is_err());
    }
}
