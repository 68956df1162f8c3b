//! Testing helpers and mock utilities.
//!
//! Provides a recording chat transport, a scripted proxy and sample upstream
//! payloads for engine and fetcher tests.

use crate::admin::AdminConsole;
use crate::cache::ResultCache;
use crate::engine::ConversationEngine;
use crate::fetcher::{RegionDirectory, ResultFetcher};
use crate::keyboard::Keyboard;
use crate::model::Region;
use crate::proxy::{ExtractEnvelope, ExtractRequest, ProxyError, ProxyTransport};
use crate::storage::StorageProvider;
use crate::transport::{MessageRef, Transport, TransportError};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Photo URL used by the sample records
pub const PHOTO_URL: &str = "https://amhara.example/photos/123456.jpg";

/// Gating channel used by test engines
pub const CHANNEL: &str = "@results_channel";

/// Admin id used by test engines
pub const ADMIN_ID: i64 = 900;

/// Upstream JSON body of a record with `courses` courses
#[must_use]
pub fn sample_record_body(courses: usize, with_photo: bool) -> String {
    let courses: Vec<serde_json::Value> = (0..courses)
        .map(|i| {
            serde_json::json!({
                "name": format!("Course {}", i + 1),
                "score": (70 + i * 5).to_string(),
                "status": if i == 0 { "fail" } else { "Pass" },
            })
        })
        .collect();

    serde_json::json!({
        "student": {
            "name": "Abel Kebede",
            "age": 17,
            "school": "Bahir Dar Secondary",
            "woreda": "Bahir Dar Zuria",
            "gender": "M",
            "photo": if with_photo { PHOTO_URL } else { "" },
        },
        "courses": courses,
    })
    .to_string()
}

/// Proxy envelope wrapping `body`
#[must_use]
pub fn envelope(status: Option<u16>, body: &[u8]) -> ExtractEnvelope {
    ExtractEnvelope {
        status_code: status,
        http_response_body: Some(STANDARD.encode(body)),
    }
}

/// One call recorded by [`RecordingTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    /// `send_text`
    Text {
        /// Target chat
        chat_id: i64,
        /// Assigned message id
        message: MessageRef,
        /// Content
        text: String,
        /// Attached keyboard
        keyboard: Option<Keyboard>,
    },
    /// `edit_text`
    Edit {
        /// Target chat
        chat_id: i64,
        /// Edited message
        message: MessageRef,
        /// New content
        text: String,
    },
    /// `delete_message`
    Delete {
        /// Target chat
        chat_id: i64,
        /// Deleted message
        message: MessageRef,
    },
    /// `send_photo`
    Photo {
        /// Target chat
        chat_id: i64,
        /// Assigned message id
        message: MessageRef,
        /// Caption
        caption: String,
    },
    /// `show_typing`
    Typing {
        /// Target chat
        chat_id: i64,
    },
}

/// Chat transport that records every call instead of talking to a server
pub struct RecordingTransport {
    log: Mutex<Vec<Sent>>,
    next_id: AtomicI32,
    members: bool,
    failing_deletes: bool,
    failing_photos: bool,
    failing_chats: HashSet<i64>,
    photo_gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    /// Transport where every user is a channel member
    #[must_use]
    pub fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            next_id: AtomicI32::new(1000),
            members: true,
            failing_deletes: false,
            failing_photos: false,
            failing_chats: HashSet::new(),
            photo_gate: None,
        }
    }

    /// Nobody is a channel member
    #[must_use]
    pub fn without_members(mut self) -> Self {
        self.members = false;
        self
    }

    /// Every delete fails
    #[must_use]
    pub fn failing_deletes(mut self) -> Self {
        self.failing_deletes = true;
        self
    }

    /// Every photo upload fails
    #[must_use]
    pub fn failing_photos(mut self) -> Self {
        self.failing_photos = true;
        self
    }

    /// Photo uploads are recorded, then wait for `release` after signalling `entered`
    #[must_use]
    pub fn gated_photos(mut self, entered: Arc<Notify>, release: Arc<Notify>) -> Self {
        self.photo_gate = Some((entered, release));
        self
    }

    /// Sends to `chat_id` fail
    #[must_use]
    pub fn failing_sends_to(mut self, chat_id: i64) -> Self {
        self.failing_chats.insert(chat_id);
        self
    }

    /// Recorded calls in order
    #[must_use]
    pub fn sent(&self) -> Vec<Sent> {
        self.log.lock().expect("transport log poisoned").clone()
    }

    /// Calls made to one chat, in order
    #[must_use]
    pub fn sent_to(&self, chat_id: i64) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|event| match event {
                Sent::Text { chat_id: c, .. }
                | Sent::Edit { chat_id: c, .. }
                | Sent::Delete { chat_id: c, .. }
                | Sent::Photo { chat_id: c, .. }
                | Sent::Typing { chat_id: c } => *c == chat_id,
            })
            .collect()
    }

    /// Texts sent to one chat
    #[must_use]
    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.sent_to(chat_id)
            .into_iter()
            .filter_map(|event| match event {
                Sent::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Forgets recorded calls
    pub fn clear(&self) {
        self.log.lock().expect("transport log poisoned").clear();
    }

    fn push(&self, event: Sent) {
        self.log.lock().expect("transport log poisoned").push(event);
    }

    fn allocate(&self) -> MessageRef {
        MessageRef(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, TransportError> {
        if self.failing_chats.contains(&chat_id) {
            return Err(TransportError::Api("Forbidden: bot was blocked by the user".into()));
        }
        let message = self.allocate();
        self.push(Sent::Text {
            chat_id,
            message,
            text: text.to_string(),
            keyboard,
        });
        Ok(message)
    }

    async fn edit_text(
        &self,
        chat_id: i64,
        message: MessageRef,
        text: &str,
        _keyboard: Option<Keyboard>,
    ) -> Result<(), TransportError> {
        self.push(Sent::Edit {
            chat_id,
            message,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete_message(
        &self,
        chat_id: i64,
        message: MessageRef,
    ) -> Result<(), TransportError> {
        if self.failing_deletes {
            return Err(TransportError::Api("message can't be deleted".into()));
        }
        self.push(Sent::Delete { chat_id, message });
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        _photo: Vec<u8>,
        caption: &str,
        _keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, TransportError> {
        if self.failing_photos {
            return Err(TransportError::Api("IMAGE_PROCESS_FAILED".into()));
        }
        let message = self.allocate();
        self.push(Sent::Photo {
            chat_id,
            message,
            caption: caption.to_string(),
        });
        if let Some((entered, release)) = &self.photo_gate {
            entered.notify_one();
            release.notified().await;
        }
        Ok(message)
    }

    async fn is_member(&self, _user_id: i64) -> bool {
        self.members
    }

    async fn show_typing(&self, chat_id: i64) {
        self.push(Sent::Typing { chat_id });
    }
}

/// Proxy answering record lookups with a fixed body and photo downloads with
/// fixed bytes (or an error)
pub struct ScriptedProxy {
    record: ExtractEnvelope,
    photo: Option<Vec<u8>>,
    calls: AtomicUsize,
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl ScriptedProxy {
    /// Proxy serving `record_body`; photo downloads fail when `photo` is `None`
    #[must_use]
    pub fn new(record_body: &str, photo: Option<Vec<u8>>) -> Self {
        Self {
            record: envelope(Some(200), record_body.as_bytes()),
            photo,
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Record lookups signal `entered` and then wait for `release`
    #[must_use]
    pub fn gated(mut self, entered: Arc<Notify>, release: Arc<Notify>) -> Self {
        self.gate = Some((entered, release));
        self
    }

    /// Number of round trips so far
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProxyTransport for ScriptedProxy {
    async fn extract(&self, request: ExtractRequest) -> Result<ExtractEnvelope, ProxyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if request.url == PHOTO_URL {
            return self
                .photo
                .as_deref()
                .map(|bytes| envelope(Some(200), bytes))
                .ok_or_else(|| ProxyError::Status("502 Bad Gateway".into()));
        }

        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }
        Ok(self.record.clone())
    }
}

/// Engine wired to the given fakes, with one configured region (Amhara)
#[must_use]
pub fn engine_with(
    transport: Arc<RecordingTransport>,
    proxy: Arc<dyn ProxyTransport>,
    storage: Arc<dyn StorageProvider>,
) -> ConversationEngine {
    let fetcher = ResultFetcher::new(
        ResultCache::new(Duration::from_secs(60), 10),
        proxy,
        RegionDirectory::new([(Region::Amhara, "https://amhara.example/student-result")]),
        "ET",
        Duration::from_secs(5),
    );
    let admin = AdminConsole::new(
        transport.clone(),
        Arc::clone(&storage),
        HashSet::from([ADMIN_ID]),
    );

    ConversationEngine::new(
        transport,
        storage,
        Arc::new(fetcher),
        Arc::new(admin),
        CHANNEL,
    )
}
