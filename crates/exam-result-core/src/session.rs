//! Conversation sessions and the per-user session registry
//!
//! A session holds the identity fields collected so far, the dialogue stage
//! and every message emitted during the exchange. Fields are only stored
//! after validation.

use crate::model::{Language, Region};
use crate::transport::MessageRef;
use lazy_regex::lazy_regex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

static RE_REGISTRATION: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"^[0-9]{6,10}$");
static RE_FIRST_NAME: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"^[A-Za-z\s-]+$");

/// Whether `input` is a valid registration number (6 to 10 ASCII digits)
#[must_use]
pub fn validate_registration(input: &str) -> bool {
    RE_REGISTRATION.is_match(input)
}

/// Whether `input` is a valid first name (latin letters, whitespace, hyphens)
#[must_use]
pub fn validate_first_name(input: &str) -> bool {
    RE_FIRST_NAME.is_match(input)
}

/// Rejected user input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Registration number failed validation
    #[error("invalid registration number")]
    Registration,
    /// First name failed validation
    #[error("invalid first name")]
    FirstName,
}

/// Dialogue stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    /// Waiting for a language choice
    Language,
    /// Waiting for a region choice
    Region,
    /// Waiting for the registration number
    Registration,
    /// Waiting for the first name
    FirstName,
    /// Waiting for feedback text
    Feedback,
    /// Exchange finished (result shown, gate refused or feedback stored)
    Done,
    /// Idle at the main menu
    #[default]
    Menu,
}

/// Identity of a complete lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    /// Region to query
    pub region: Region,
    /// Registration number
    pub registration: String,
    /// Lowercase first name
    pub first_name: String,
}

/// Per-user dialogue state
#[derive(Debug, Clone, Default)]
pub struct ConversationSession {
    language: Option<Language>,
    region: Option<Region>,
    registration: Option<String>,
    first_name: Option<String>,
    stage: Stage,
    rendered: Vec<MessageRef>,
    generation: u64,
    lookup_running: bool,
}

impl ConversationSession {
    /// Fresh session idling at the menu
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stage
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Moves to `stage`
    pub fn set_stage(&mut self, stage: Stage) {
        if self.stage != stage {
            debug!(from = ?self.stage, to = ?stage, "Session stage change");
        }
        self.stage = stage;
    }

    /// Interface language, English until one is chosen
    #[must_use]
    pub fn language(&self) -> Language {
        self.language.unwrap_or_default()
    }

    /// Language explicitly chosen, if any
    #[must_use]
    pub const fn chosen_language(&self) -> Option<Language> {
        self.language
    }

    /// Stores the interface language
    pub fn set_language(&mut self, language: Language) {
        self.language = Some(language);
    }

    /// Selected region
    #[must_use]
    pub const fn region(&self) -> Option<Region> {
        self.region
    }

    /// Stores the region
    pub fn set_region(&mut self, region: Region) {
        self.region = Some(region);
    }

    /// Stored registration number
    #[must_use]
    pub fn registration(&self) -> Option<&str> {
        self.registration.as_deref()
    }

    /// Validates and stores a registration number.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Registration` and leaves the session unchanged
    /// when the input is not 6 to 10 digits.
    pub fn set_registration(&mut self, input: &str) -> Result<(), ValidationError> {
        if !validate_registration(input) {
            return Err(ValidationError::Registration);
        }
        self.registration = Some(input.to_string());
        Ok(())
    }

    /// Stored (lowercase) first name
    #[must_use]
    pub fn first_name(&self) -> Option<&str> {
        self.first_name.as_deref()
    }

    /// Validates and stores a first name, lowercased and trimmed.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::FirstName` and leaves the session unchanged
    /// when the input contains anything but latin letters, whitespace or hyphens.
    pub fn set_first_name(&mut self, input: &str) -> Result<(), ValidationError> {
        if !validate_first_name(input) {
            return Err(ValidationError::FirstName);
        }
        self.first_name = Some(input.trim().to_lowercase());
        Ok(())
    }

    /// The complete lookup identity, `None` if any field is missing or blank
    #[must_use]
    pub fn lookup_request(&self) -> Option<LookupRequest> {
        let region = self.region?;
        let registration = self.registration.as_deref().filter(|r| !r.is_empty())?;
        let first_name = self.first_name.as_deref().filter(|n| !n.is_empty())?;

        Some(LookupRequest {
            region,
            registration: registration.to_string(),
            first_name: first_name.to_string(),
        })
    }

    /// Records a message for bulk cleanup; duplicates are ignored
    pub fn track(&mut self, message: MessageRef) {
        if !self.rendered.contains(&message) {
            self.rendered.push(message);
        }
    }

    /// Messages recorded so far, oldest first
    #[must_use]
    pub fn rendered(&self) -> &[MessageRef] {
        &self.rendered
    }

    /// Removes and returns every recorded message
    pub fn take_rendered(&mut self) -> Vec<MessageRef> {
        std::mem::take(&mut self.rendered)
    }

    /// Claims the lookup slot; `false` if a lookup of this generation is already running
    pub fn begin_lookup(&mut self) -> bool {
        if self.lookup_running {
            return false;
        }
        self.lookup_running = true;
        true
    }

    /// Releases the lookup slot
    pub fn finish_lookup(&mut self) {
        self.lookup_running = false;
    }

    /// Whether a lookup of this generation is running
    #[must_use]
    pub const fn lookup_running(&self) -> bool {
        self.lookup_running
    }

    /// Epoch of the session; changes on every reset
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Clears every field, returns to the menu stage and starts a new generation
    pub fn reset(&mut self) {
        let generation = self.generation.wrapping_add(1);
        *self = Self {
            generation,
            ..Self::default()
        };
    }
}

/// Map of user id to that user's session
///
/// Generic over the id type so any transport can key sessions its own way.
pub struct SessionRegistry<Id: Hash + Eq + Clone + Send + Sync + std::fmt::Debug + 'static> {
    sessions: RwLock<HashMap<Id, Arc<Mutex<ConversationSession>>>>,
}

impl<Id: Hash + Eq + Clone + Send + Sync + std::fmt::Debug + 'static> Default
    for SessionRegistry<Id>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: Hash + Eq + Clone + Send + Sync + std::fmt::Debug + 'static> SessionRegistry<Id> {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Get the user's session, creating an idle one on first contact
    pub async fn get_or_create(&self, id: Id) -> Arc<Mutex<ConversationSession>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(&id) {
                return Arc::clone(session);
            }
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(id).or_insert_with(|| {
            Arc::new(Mutex::new(ConversationSession::new()))
        }))
    }

    /// Get session if exists
    pub async fn get(&self, id: &Id) -> Option<Arc<Mutex<ConversationSession>>> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }

    /// Remove a session from the registry
    pub async fn remove(&self, id: &Id) {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id);
    }

    /// Get the number of known sessions
    pub async fn len(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    /// Check if registry is empty
    pub async fn is_empty(&self) -> bool {
        let sessions = self.sessions.read().await;
        sessions.is_empty()
    }
}
