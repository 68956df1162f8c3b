//! Per-user conversation engine
//!
//! Decodes inbound events into dialogue inputs, runs the state machine under
//! the user's session lock and then carries out the resulting effects,
//! including the result-fetch pipeline. The session lock is only held for
//! bookkeeping, never across a network call.

use crate::admin::{feedback_notice, new_user_notice, AdminConsole};
use crate::fetcher::{FetchOutcome, ResultFetcher};
use crate::fsm::{transition, Effect, Input};
use crate::keyboard::{Action, Keyboard};
use crate::model::{Language, ResultRecord, UserRef};
use crate::presenter::{
    post_result_menu, progress_frame, render_summary, result_messages, stats_text, without_photo,
    ResultMessage,
};
use crate::session::{ConversationSession, SessionRegistry, Stage};
use crate::stats::compute_stats;
use crate::storage::{StorageProvider, UsageAction};
use crate::transport::{MessageRef, Transport, TransportError};
use crate::views::Reply;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Errors surfaced to the dispatcher
#[derive(Error, Debug)]
pub enum EngineError {
    /// A message the dialogue depends on could not be delivered
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),
}

/// Inbound event from a user
#[derive(Debug, Clone)]
pub struct Event {
    /// Sender
    pub user: UserRef,
    /// Chat the event happened in
    pub chat_id: i64,
    /// What happened
    pub kind: EventKind,
}

/// Kind of inbound event
#[derive(Debug, Clone)]
pub enum EventKind {
    /// `/start` command
    Start {
        /// The command message
        message: MessageRef,
    },
    /// `/feedback` command
    FeedbackCommand {
        /// The command message
        message: MessageRef,
    },
    /// Free text
    Text {
        /// The text message
        message: MessageRef,
        /// Its content
        text: String,
    },
    /// Inline button press
    Button {
        /// Callback data
        data: String,
        /// Message carrying the button, if still accessible
        origin: Option<MessageRef>,
    },
}

impl EventKind {
    /// Message authored by the user, tracked for cleanup
    #[must_use]
    pub const fn user_message(&self) -> Option<MessageRef> {
        match self {
            Self::Start { message }
            | Self::FeedbackCommand { message }
            | Self::Text { message, .. } => Some(*message),
            Self::Button { .. } => None,
        }
    }
}

/// Context of one handled event
struct Turn {
    user: UserRef,
    chat_id: i64,
    origin: Option<MessageRef>,
    session: Arc<Mutex<ConversationSession>>,
    generation: u64,
    language: Language,
}

/// Drives every user's dialogue
pub struct ConversationEngine {
    transport: Arc<dyn Transport>,
    storage: Arc<dyn StorageProvider>,
    fetcher: Arc<ResultFetcher>,
    admin: Arc<AdminConsole>,
    sessions: SessionRegistry<i64>,
    channel: String,
}

impl ConversationEngine {
    /// Creates an engine; `channel` is the gating channel handle shown in the join notice
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        storage: Arc<dyn StorageProvider>,
        fetcher: Arc<ResultFetcher>,
        admin: Arc<AdminConsole>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            storage,
            fetcher,
            admin,
            sessions: SessionRegistry::new(),
            channel: channel.into(),
        }
    }

    /// Per-user sessions
    #[must_use]
    pub const fn sessions(&self) -> &SessionRegistry<i64> {
        &self.sessions
    }

    /// Handles one inbound event to completion.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Transport` when a message the dialogue depends on
    /// cannot be sent. Best-effort operations only log their failures.
    pub async fn handle(&self, event: Event) -> Result<(), EngineError> {
        let input = match &event.kind {
            EventKind::Start { .. } => Input::Start {
                is_member: self.transport.is_member(event.user.id).await,
            },
            EventKind::FeedbackCommand { .. } => Input::FeedbackCommand,
            EventKind::Text { text, .. } => Input::Text(text.clone()),
            EventKind::Button { data, .. } => Input::Action(Action::parse(data)),
        };

        let session = self.sessions.get_or_create(event.user.id).await;
        let (effects, generation, language) = {
            let mut guard = session.lock().await;
            let effects = transition(&mut guard, input);
            if let Some(message) = event.kind.user_message() {
                guard.track(message);
            }
            (effects, guard.generation(), guard.language())
        };

        let origin = match event.kind {
            EventKind::Button { origin, .. } => origin,
            _ => None,
        };
        let turn = Turn {
            user: event.user,
            chat_id: event.chat_id,
            origin,
            session,
            generation,
            language,
        };

        for effect in effects {
            self.apply(&turn, effect).await?;
        }
        Ok(())
    }

    async fn apply(&self, turn: &Turn, effect: Effect) -> Result<(), EngineError> {
        match effect {
            Effect::Show(reply) => self.show(turn, reply).await,
            Effect::Send(reply) => self.send(turn, reply).await,
            Effect::NotifyNewUser => {
                self.admin.notify_admins(&new_user_notice(&turn.user)).await;
                Ok(())
            }
            Effect::RecordUsage(action) => {
                self.record_usage(turn.user.id, action).await;
                Ok(())
            }
            Effect::Subscribe => self.subscribe(turn).await,
            Effect::SaveFeedback(text) => self.save_feedback(turn, text).await,
            Effect::ResetToMenu => self.reset_to_menu(turn).await,
            Effect::RunPipeline => self.run_pipeline(turn).await,
        }
    }

    /// Tracks `message`; returns whether the session is still current.
    ///
    /// A message sent on behalf of a superseded generation is deleted again,
    /// since the reset that superseded it has already cleared the chat.
    async fn track(&self, turn: &Turn, message: MessageRef) -> bool {
        {
            let mut session = turn.session.lock().await;
            if session.generation() == turn.generation {
                session.track(message);
                return true;
            }
        }

        debug!(message = message.0, "Deleting message of a superseded session");
        if let Err(e) = self.transport.delete_message(turn.chat_id, message).await {
            warn!(message = message.0, error = %e, "Error deleting stale message");
        }
        false
    }

    async fn is_current(&self, turn: &Turn) -> bool {
        turn.session.lock().await.generation() == turn.generation
    }

    async fn send_tracked(
        &self,
        turn: &Turn,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<bool, EngineError> {
        let message = self.transport.send_text(turn.chat_id, text, keyboard).await?;
        Ok(self.track(turn, message).await)
    }

    async fn send(&self, turn: &Turn, reply: Reply) -> Result<(), EngineError> {
        let (text, keyboard) = reply.render(turn.language, &self.channel);
        self.send_tracked(turn, &text, keyboard).await?;
        Ok(())
    }

    async fn show(&self, turn: &Turn, reply: Reply) -> Result<(), EngineError> {
        let (text, keyboard) = reply.render(turn.language, &self.channel);
        if let Some(origin) = turn.origin {
            match self
                .transport
                .edit_text(turn.chat_id, origin, &text, keyboard.clone())
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => warn!(error = %e, "Edit failed, sending a new message instead"),
            }
        }
        self.send_tracked(turn, &text, keyboard).await?;
        Ok(())
    }

    async fn record_usage(&self, user_id: i64, action: UsageAction) {
        if let Err(e) = self.storage.record_usage_event(user_id, action).await {
            warn!(user_id, ?action, error = %e, "Failed to record usage event");
        }
    }

    async fn subscribe(&self, turn: &Turn) -> Result<(), EngineError> {
        match self.storage.record_subscriber(turn.user.id).await {
            Ok(newly_added) => {
                info!(user_id = turn.user.id, newly_added, "User subscribed");
                self.show(turn, Reply::Subscribed).await
            }
            Err(e) => {
                error!(user_id = turn.user.id, error = %e, "Failed to record subscriber");
                self.send(turn, Reply::GenericError).await
            }
        }
    }

    async fn save_feedback(&self, turn: &Turn, text: String) -> Result<(), EngineError> {
        let saved = self
            .storage
            .save_feedback(turn.user.id, turn.user.username.clone(), text.clone())
            .await;

        match saved {
            Ok(feedback_id) => {
                info!(user_id = turn.user.id, feedback_id, "Feedback stored");
                self.record_usage(turn.user.id, UsageAction::Feedback).await;
                self.send(turn, Reply::FeedbackThanks).await?;
                self.admin
                    .notify_admins(&feedback_notice(&turn.user, feedback_id, &text))
                    .await;
                Ok(())
            }
            Err(e) => {
                error!(user_id = turn.user.id, error = %e, "Error saving feedback");
                {
                    let mut session = turn.session.lock().await;
                    if session.generation() == turn.generation {
                        session.set_stage(Stage::Feedback);
                    }
                }
                self.send(turn, Reply::FeedbackFailed).await
            }
        }
    }

    async fn reset_to_menu(&self, turn: &Turn) -> Result<(), EngineError> {
        let (stale, generation) = {
            let mut session = turn.session.lock().await;
            let stale = session.take_rendered();
            session.reset();
            (stale, session.generation())
        };

        debug!(user_id = turn.user.id, count = stale.len(), "Clearing tracked messages");
        for message in stale {
            if let Err(e) = self.transport.delete_message(turn.chat_id, message).await {
                warn!(message = message.0, error = %e, "Error deleting message");
            }
        }

        let fresh = Turn {
            user: turn.user.clone(),
            chat_id: turn.chat_id,
            origin: None,
            session: Arc::clone(&turn.session),
            generation,
            language: turn.language,
        };
        self.send(&fresh, Reply::MainMenu).await
    }

    async fn progress(&self, turn: &Turn, message: MessageRef, percent: u8) {
        if let Err(e) = self
            .transport
            .edit_text(turn.chat_id, message, &progress_frame(percent), None)
            .await
        {
            warn!(percent, error = %e, "Progress update failed");
        }
    }

    /// Runs one lookup; a second lookup in the same generation is refused while one is in flight
    async fn run_pipeline(&self, turn: &Turn) -> Result<(), EngineError> {
        let claimed = {
            let mut session = turn.session.lock().await;
            if session.generation() != turn.generation {
                return Ok(());
            }
            session.begin_lookup()
        };
        if !claimed {
            info!(user_id = turn.user.id, "Lookup already running, refusing another");
            return self.send(turn, Reply::LookupInProgress).await;
        }

        let result = self.lookup(turn).await;

        let mut session = turn.session.lock().await;
        if session.generation() == turn.generation {
            session.finish_lookup();
        }
        result
    }

    async fn lookup(&self, turn: &Turn) -> Result<(), EngineError> {
        let request = turn.session.lock().await.lookup_request();
        let Some(request) = request else {
            warn!(user_id = turn.user.id, "Lookup started with missing fields");
            return self.send(turn, Reply::MissingInformation).await;
        };

        self.record_usage(turn.user.id, UsageAction::ResultLookup).await;
        self.transport.show_typing(turn.chat_id).await;

        let progress = self
            .transport
            .send_text(turn.chat_id, &progress_frame(0), None)
            .await?;
        if !self.track(turn, progress).await {
            return Ok(());
        }

        let outcome = self
            .fetcher
            .fetch_record(request.region, &request.registration, &request.first_name)
            .await;
        if !self.is_current(turn).await {
            info!(user_id = turn.user.id, "Session restarted during lookup, discarding result");
            return Ok(());
        }

        let record = match outcome {
            FetchOutcome::Success(record) => record,
            FetchOutcome::NotFound | FetchOutcome::TransientError(_) => {
                let (text, _) = Reply::NoDataFound.render(turn.language, &self.channel);
                self.transport
                    .edit_text(turn.chat_id, progress, &text, None)
                    .await?;
                return Ok(());
            }
        };

        self.progress(turn, progress, 25).await;
        let summary = render_summary(&record);
        self.progress(turn, progress, 50).await;

        let photo = match record.student.photo_ref() {
            Some(photo_ref) => self.fetcher.fetch_photo(photo_ref).await,
            None => None,
        };
        if !self.is_current(turn).await {
            info!(user_id = turn.user.id, "Session restarted during photo download, discarding result");
            return Ok(());
        }

        self.progress(turn, progress, 75).await;
        let stats = compute_stats(&record);
        self.progress(turn, progress, 100).await;

        if !self.emit_result(turn, &summary, photo).await? {
            return Ok(());
        }
        if !self.send_tracked(turn, &stats_text(&stats), None).await? {
            return Ok(());
        }

        let (completed, _) = Reply::RequestCompleted.render(turn.language, &self.channel);
        if let Err(e) = self
            .transport
            .edit_text(turn.chat_id, progress, &completed, None)
            .await
        {
            warn!(error = %e, "Completion notice failed");
        }

        self.emit_menu(turn, &record).await
    }

    /// Sends the result itself; returns whether the session is still current
    async fn emit_result(
        &self,
        turn: &Turn,
        summary: &str,
        photo: Option<Vec<u8>>,
    ) -> Result<bool, EngineError> {
        for message in result_messages(summary, photo) {
            let sent = match message {
                ResultMessage::Photo { bytes, caption } => {
                    match self
                        .transport
                        .send_photo(turn.chat_id, bytes, &caption, None)
                        .await
                    {
                        Ok(message) => message,
                        Err(e) => {
                            warn!(error = %e, "Photo message failed, sending text only");
                            return self.send_tracked(turn, &without_photo(summary), None).await;
                        }
                    }
                }
                ResultMessage::Text(text) => {
                    self.transport.send_text(turn.chat_id, &text, None).await?
                }
            };
            if !self.track(turn, sent).await {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn emit_menu(&self, turn: &Turn, record: &ResultRecord) -> Result<(), EngineError> {
        let (text, keyboard) = post_result_menu(turn.language, record);
        self.send_tracked(turn, &text, Some(keyboard)).await?;
        Ok(())
    }
}
