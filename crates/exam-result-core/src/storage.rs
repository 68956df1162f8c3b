//! Storage layer for subscribers, feedback and usage counters
//!
//! Provides a persistent implementation on Cloudflare R2 / AWS S3 and an
//! in-memory one. Both keep the same three documents so their behaviour
//! matches exactly.

use crate::config::ResultSettings;
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Object key of the subscriber set
pub const SUBSCRIBERS_KEY: &str = "bot/subscribers.json";
/// Object key of the feedback log
pub const FEEDBACK_KEY: &str = "bot/feedback.json";
/// Object key of the usage ledger
pub const USAGE_KEY: &str = "bot/usage.json";

/// Window used for the "active users" count
pub const ACTIVE_WINDOW_HOURS: i64 = 24;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Error retrieving object from S3
    #[error("S3 Get error: {0}")]
    S3Get(Box<SdkError<GetObjectError>>),
    /// Error putting object into S3
    #[error("S3 put error: {0}")]
    S3Put(String),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration error (missing credentials, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Kind of usage event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageAction {
    /// Passed the membership gate
    Start,
    /// Started a result lookup
    ResultLookup,
    /// Submitted feedback
    Feedback,
    /// Subscribed to updates
    Subscribe,
}

/// One feedback message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    /// Sequential id used by `/reply`
    pub id: u64,
    /// Author
    pub user_id: i64,
    /// Author's username, if set
    pub username: Option<String>,
    /// Feedback text
    pub message: String,
    /// Submission time
    pub created_at: DateTime<Utc>,
    /// Whether an admin already answered
    #[serde(default)]
    pub replied: bool,
}

/// Append-only feedback document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackLog {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    entries: Vec<FeedbackEntry>,
}

impl FeedbackLog {
    /// Appends an entry and returns its id (ids start at 1)
    pub fn append(
        &mut self,
        user_id: i64,
        username: Option<String>,
        message: String,
        now: DateTime<Utc>,
    ) -> u64 {
        self.next_id = self.next_id.max(self.entries.len() as u64) + 1;
        let id = self.next_id;
        self.entries.push(FeedbackEntry {
            id,
            user_id,
            username,
            message,
            created_at: now,
            replied: false,
        });
        id
    }

    /// Unreplied entry with `id`
    #[must_use]
    pub fn pending(&self, id: u64) -> Option<&FeedbackEntry> {
        self.entries.iter().find(|entry| entry.id == id && !entry.replied)
    }

    /// Marks an unreplied entry as replied; `false` if there is none
    pub fn mark_replied(&mut self, id: u64) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.id == id && !entry.replied)
        {
            Some(entry) => {
                entry.replied = true;
                true
            }
            None => false,
        }
    }

    /// Number of entries ever stored
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no feedback was stored yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Aggregated usage counters; bounded by the number of distinct users
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageLedger {
    #[serde(default)]
    totals: BTreeMap<UsageAction, u64>,
    #[serde(default)]
    last_seen: BTreeMap<i64, DateTime<Utc>>,
}

impl UsageLedger {
    /// Counts one event
    pub fn record(&mut self, user_id: i64, action: UsageAction, now: DateTime<Utc>) {
        *self.totals.entry(action).or_default() += 1;
        let seen = self.last_seen.entry(user_id).or_insert(now);
        if *seen < now {
            *seen = now;
        }
    }

    /// Total events of one kind
    #[must_use]
    pub fn total(&self, action: UsageAction) -> u64 {
        self.totals.get(&action).copied().unwrap_or_default()
    }

    /// Distinct users with any event after `since`
    #[must_use]
    pub fn active_since(&self, since: DateTime<Utc>) -> usize {
        self.last_seen.values().filter(|seen| **seen > since).count()
    }
}

/// Numbers reported by `/stats`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsageSummary {
    /// Subscribed users
    pub subscribers: usize,
    /// Feedback messages received
    pub feedback: usize,
    /// Result lookups started
    pub lookups: u64,
    /// Distinct users active in the last 24 hours
    pub active_users_24h: usize,
}

impl UsageSummary {
    fn from_documents(
        subscribers: &BTreeSet<i64>,
        feedback: &FeedbackLog,
        usage: &UsageLedger,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            subscribers: subscribers.len(),
            feedback: feedback.len(),
            lookups: usage.total(UsageAction::ResultLookup),
            active_users_24h: usage.active_since(now - ChronoDuration::hours(ACTIVE_WINDOW_HOURS)),
        }
    }
}

/// Interface for storage providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Adds a subscriber; `false` if already subscribed
    async fn record_subscriber(&self, user_id: i64) -> Result<bool, StorageError>;
    /// All subscribers
    async fn list_subscribers(&self) -> Result<BTreeSet<i64>, StorageError>;
    /// Stores feedback and returns its id
    async fn save_feedback(
        &self,
        user_id: i64,
        username: Option<String>,
        message: String,
    ) -> Result<u64, StorageError>;
    /// Unreplied feedback entry
    async fn pending_feedback(&self, feedback_id: u64)
        -> Result<Option<FeedbackEntry>, StorageError>;
    /// Marks feedback as replied; `false` if it was not pending
    async fn mark_feedback_replied(&self, feedback_id: u64) -> Result<bool, StorageError>;
    /// Counts a usage event
    async fn record_usage_event(
        &self,
        user_id: i64,
        action: UsageAction,
    ) -> Result<(), StorageError>;
    /// Aggregated counters as of `now`
    async fn usage_summary(&self, now: DateTime<Utc>) -> Result<UsageSummary, StorageError>;
    /// Check connection to storage
    async fn check_connection(&self) -> Result<(), String>;
}

/// R2-backed storage implementation
pub struct R2Storage {
    client: Client,
    bucket: String,
    cache: Cache<String, Arc<Vec<u8>>>,
    write_lock: Mutex<()>,
}

impl R2Storage {
    /// Create a new R2 storage instance
    ///
    /// # Errors
    ///
    /// Returns an error if R2 configuration is missing.
    pub async fn new(settings: &ResultSettings) -> Result<Self, StorageError> {
        let endpoint_url = settings
            .r2_endpoint_url
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_ENDPOINT_URL is missing".into()))?;
        let access_key = settings
            .r2_access_key_id
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_ACCESS_KEY_ID is missing".into()))?;
        let secret_key = settings
            .r2_secret_access_key
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_SECRET_ACCESS_KEY is missing".into()))?;
        let bucket = settings
            .r2_bucket_name
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_BUCKET_NAME is missing".into()))?;

        let credentials = Credentials::new(access_key, secret_key, None, None, "r2-storage");

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new("auto"))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .endpoint_url(endpoint_url)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(s3_config);

        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(Duration::from_secs(60 * 60)) // 1 hour
            .build();

        Ok(Self {
            client,
            bucket: bucket.clone(),
            cache,
            write_lock: Mutex::new(()),
        })
    }

    /// Save data as JSON to R2
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization or S3 upload fails.
    pub async fn save_json<T: Serialize + Sync>(
        &self,
        key: &str,
        data: &T,
    ) -> Result<(), StorageError> {
        let body_bytes = serde_json::to_string_pretty(data)?.into_bytes();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body_bytes.clone()))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| StorageError::S3Put(e.to_string()))?;

        // Write-through once the object is stored
        self.cache
            .insert(key.to_string(), Arc::new(body_bytes))
            .await;

        Ok(())
    }

    /// Load data from JSON in R2
    ///
    /// # Errors
    ///
    /// Returns an error if S3 download or JSON deserialization fails.
    pub async fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        if let Some(cached_data) = self.cache.get(key).await {
            match serde_json::from_slice(&cached_data) {
                Ok(data) => return Ok(Some(data)),
                Err(e) => {
                    warn!("Cache deserialization failed for {}: {}", key, e);
                    self.cache.invalidate(key).await;
                }
            }
        }

        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let data = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
                    .into_bytes();

                self.cache
                    .insert(key.to_string(), Arc::new(data.to_vec()))
                    .await;

                let json_data = serde_json::from_slice(&data)?;
                Ok(Some(json_data))
            }
            Err(SdkError::ServiceError(err)) if err.err().is_no_such_key() => Ok(None),
            Err(e) => Err(StorageError::S3Get(Box::new(e))),
        }
    }

    /// Load a document, apply `modifier` and store it again.
    ///
    /// Writers are serialized so concurrent updates are not lost.
    ///
    /// # Errors
    ///
    /// Returns an error if loading or saving fails.
    pub async fn modify_json<T, F, R>(&self, key: &str, modifier: F) -> Result<R, StorageError>
    where
        T: Serialize + DeserializeOwned + Default + Sync,
        F: FnOnce(&mut T) -> R + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut document: T = self.load_json(key).await?.unwrap_or_default();
        let result = modifier(&mut document);
        self.save_json(key, &document).await?;
        Ok(result)
    }
}

#[async_trait]
impl StorageProvider for R2Storage {
    async fn record_subscriber(&self, user_id: i64) -> Result<bool, StorageError> {
        self.modify_json(SUBSCRIBERS_KEY, |subscribers: &mut BTreeSet<i64>| {
            subscribers.insert(user_id)
        })
        .await
    }

    async fn list_subscribers(&self) -> Result<BTreeSet<i64>, StorageError> {
        Ok(self.load_json(SUBSCRIBERS_KEY).await?.unwrap_or_default())
    }

    async fn save_feedback(
        &self,
        user_id: i64,
        username: Option<String>,
        message: String,
    ) -> Result<u64, StorageError> {
        let now = Utc::now();
        self.modify_json(FEEDBACK_KEY, |log: &mut FeedbackLog| {
            log.append(user_id, username, message, now)
        })
        .await
    }

    async fn pending_feedback(
        &self,
        feedback_id: u64,
    ) -> Result<Option<FeedbackEntry>, StorageError> {
        let log: FeedbackLog = self.load_json(FEEDBACK_KEY).await?.unwrap_or_default();
        Ok(log.pending(feedback_id).cloned())
    }

    async fn mark_feedback_replied(&self, feedback_id: u64) -> Result<bool, StorageError> {
        self.modify_json(FEEDBACK_KEY, |log: &mut FeedbackLog| {
            log.mark_replied(feedback_id)
        })
        .await
    }

    async fn record_usage_event(
        &self,
        user_id: i64,
        action: UsageAction,
    ) -> Result<(), StorageError> {
        let now = Utc::now();
        self.modify_json(USAGE_KEY, |ledger: &mut UsageLedger| {
            ledger.record(user_id, action, now);
        })
        .await
    }

    async fn usage_summary(&self, now: DateTime<Utc>) -> Result<UsageSummary, StorageError> {
        let subscribers: BTreeSet<i64> = self.load_json(SUBSCRIBERS_KEY).await?.unwrap_or_default();
        let feedback: FeedbackLog = self.load_json(FEEDBACK_KEY).await?.unwrap_or_default();
        let usage: UsageLedger = self.load_json(USAGE_KEY).await?.unwrap_or_default();
        Ok(UsageSummary::from_documents(
            &subscribers,
            &feedback,
            &usage,
            now,
        ))
    }

    async fn check_connection(&self) -> Result<(), String> {
        match self.client.list_buckets().send().await {
            Ok(_) => {
                info!("Successfully connected to R2 storage.");
                Ok(())
            }
            Err(e) => {
                let err_msg = format!("R2 connectivity test failed: {e:#?}");
                error!("{}", err_msg);
                Err(err_msg)
            }
        }
    }
}

#[derive(Debug, Default)]
struct MemoryDocuments {
    subscribers: BTreeSet<i64>,
    feedback: FeedbackLog,
    usage: UsageLedger,
}

/// Process-local storage, used when R2 is not configured and in tests
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    documents: Mutex<MemoryDocuments>,
}

impl InMemoryStorage {
    /// Empty storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageProvider for InMemoryStorage {
    async fn record_subscriber(&self, user_id: i64) -> Result<bool, StorageError> {
        Ok(self.documents.lock().await.subscribers.insert(user_id))
    }

    async fn list_subscribers(&self) -> Result<BTreeSet<i64>, StorageError> {
        Ok(self.documents.lock().await.subscribers.clone())
    }

    async fn save_feedback(
        &self,
        user_id: i64,
        username: Option<String>,
        message: String,
    ) -> Result<u64, StorageError> {
        let mut documents = self.documents.lock().await;
        Ok(documents
            .feedback
            .append(user_id, username, message, Utc::now()))
    }

    async fn pending_feedback(
        &self,
        feedback_id: u64,
    ) -> Result<Option<FeedbackEntry>, StorageError> {
        Ok(self
            .documents
            .lock()
            .await
            .feedback
            .pending(feedback_id)
            .cloned())
    }

    async fn mark_feedback_replied(&self, feedback_id: u64) -> Result<bool, StorageError> {
        Ok(self
            .documents
            .lock()
            .await
            .feedback
            .mark_replied(feedback_id))
    }

    async fn record_usage_event(
        &self,
        user_id: i64,
        action: UsageAction,
    ) -> Result<(), StorageError> {
        self.documents
            .lock()
            .await
            .usage
            .record(user_id, action, Utc::now());
        Ok(())
    }

    async fn usage_summary(&self, now: DateTime<Utc>) -> Result<UsageSummary, StorageError> {
        let documents = self.documents.lock().await;
        Ok(UsageSummary::from_documents(
            &documents.subscribers,
            &documents.feedback,
            &documents.usage,
            now,
        ))
    }

    async fn check_connection(&self) -> Result<(), String> {
        Ok(())
    }
}
