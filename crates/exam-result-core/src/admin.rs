//! Admin tooling: notifications, broadcast, feedback replies, usage statistics

use crate::model::UserRef;
use crate::storage::StorageProvider;
use crate::transport::Transport;
use chrono::Utc;
use html_escape::encode_text;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

const NOT_AUTHORIZED: &str = "🚫 You are not authorized to use this command.";
const NOT_AUTHORIZED_STATS: &str = "🚫 You are not authorized to view stats.";
const GENERIC_FAILURE: &str = "❌ An error occurred";

/// Admin-only command with its raw argument text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// `/broadcast <message>`
    Broadcast(String),
    /// `/reply <feedback_id> <message>`
    Reply(String),
    /// `/stats`
    Stats,
}

/// Executes admin commands and delivers admin notifications
pub struct AdminConsole {
    transport: Arc<dyn Transport>,
    storage: Arc<dyn StorageProvider>,
    admin_ids: HashSet<i64>,
}

impl AdminConsole {
    /// Creates a console for the given admin ids
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        storage: Arc<dyn StorageProvider>,
        admin_ids: HashSet<i64>,
    ) -> Self {
        Self {
            transport,
            storage,
            admin_ids,
        }
    }

    /// Whether `user_id` may run admin commands
    #[must_use]
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    /// Sends `text` to every admin; failures are only logged
    pub async fn notify_admins(&self, text: &str) {
        for admin_id in &self.admin_ids {
            if let Err(e) = self.transport.send_text(*admin_id, text, None).await {
                error!(admin_id, error = %e, "Failed to notify admin");
            }
        }
    }

    /// Runs `command` for `caller` and returns the HTML reply for the caller's chat
    pub async fn run(&self, caller: i64, command: AdminCommand) -> String {
        if !self.is_admin(caller) {
            warn!(user_id = caller, ?command, "Unauthorized admin command");
            return match command {
                AdminCommand::Stats => NOT_AUTHORIZED_STATS.to_string(),
                AdminCommand::Broadcast(_) | AdminCommand::Reply(_) => NOT_AUTHORIZED.to_string(),
            };
        }

        match command {
            AdminCommand::Broadcast(message) => self.broadcast(message.trim()).await,
            AdminCommand::Reply(args) => self.reply(args.trim()).await,
            AdminCommand::Stats => self.stats().await,
        }
    }

    async fn broadcast(&self, message: &str) -> String {
        if message.is_empty() {
            return "ℹ️ Usage: /broadcast &lt;message&gt;".to_string();
        }

        let subscribers = match self.storage.list_subscribers().await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                error!(error = %e, "Failed to load subscribers for broadcast");
                return GENERIC_FAILURE.to_string();
            }
        };

        let text = format!("📢 Update: {}", encode_text(message));
        let mut delivered = 0_usize;
        for user_id in subscribers {
            match self.transport.send_text(user_id, &text, None).await {
                Ok(_) => delivered += 1,
                Err(e) => error!(user_id, error = %e, "Failed to deliver broadcast"),
            }
        }

        info!(delivered, "Broadcast finished");
        format!("✅ Broadcast sent to {delivered} users.")
    }

    async fn reply(&self, args: &str) -> String {
        let Some((id, message)) = args
            .split_once(char::is_whitespace)
            .map(|(id, message)| (id, message.trim()))
            .filter(|(_, message)| !message.is_empty())
        else {
            return "ℹ️ Usage: /reply &lt;feedback_id&gt; &lt;message&gt;".to_string();
        };

        let Ok(feedback_id) = id.parse::<u64>() else {
            return "❌ Feedback ID must be a number".to_string();
        };

        let entry = match self.storage.pending_feedback(feedback_id).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return "❌ Feedback ID not found or already replied".to_string(),
            Err(e) => {
                error!(feedback_id, error = %e, "Failed to load feedback");
                return GENERIC_FAILURE.to_string();
            }
        };

        let text = format!(
            "📩 Admin reply to your feedback:\n\n{}",
            encode_text(message)
        );
        if let Err(e) = self.transport.send_text(entry.user_id, &text, None).await {
            error!(feedback_id, error = %e, "Failed to deliver feedback reply");
            return GENERIC_FAILURE.to_string();
        }

        if let Err(e) = self.storage.mark_feedback_replied(feedback_id).await {
            error!(feedback_id, error = %e, "Failed to mark feedback as replied");
        }

        format!("✅ Reply sent to feedback ID {feedback_id}")
    }

    async fn stats(&self) -> String {
        match self.storage.usage_summary(Utc::now()).await {
            Ok(summary) => format!(
                "📊 <b>Bot Statistics</b>\n\n\
                 👥 Total Subscribers: {}\n\
                 📝 Feedback Received: {}\n\
                 🔍 Result Lookups: {}\n\
                 🕒 Active Users (24h): {}",
                summary.subscribers, summary.feedback, summary.lookups, summary.active_users_24h
            ),
            Err(e) => {
                error!(error = %e, "Failed to compute usage summary");
                GENERIC_FAILURE.to_string()
            }
        }
    }
}

fn profile(user: &UserRef) -> Option<String> {
    user.username
        .as_deref()
        .filter(|name| !name.is_empty())
        .map(|name| encode_text(name).into_owned())
}

/// Admin notice for a user who passed the membership gate
#[must_use]
pub fn new_user_notice(user: &UserRef) -> String {
    let profile = profile(user).map_or_else(
        || "No username set".to_string(),
        |name| format!("<a href='https://t.me/{name}'>@{name}</a>"),
    );
    format!(
        "🆕 <b>New User Joined</b>\n👤 <b>ID:</b> {}\n🔗 <b>Profile:</b> {profile}",
        user.id
    )
}

/// Admin notice for new feedback
#[must_use]
pub fn feedback_notice(user: &UserRef, feedback_id: u64, message: &str) -> String {
    let username = profile(user).map_or_else(|| "No username".to_string(), |name| format!("@{name}"));
    format!(
        "📬 <b>New Feedback</b> #{feedback_id}\n👤 <b>ID:</b> {}\n🔗 <b>Username:</b> {username}\n📝 <b>Message:</b> {}",
        user.id,
        encode_text(message)
    )
}
