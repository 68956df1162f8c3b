//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! the cache, timeout and retry constants.

use crate::model::Region;
use crate::utils::parse_id_list;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Settings for result lookups, admin tooling and storage
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ResultSettings {
    /// API key of the extract proxy
    pub proxy_api_key: Option<String>,
    /// Extract proxy endpoint
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,
    /// Geolocation hint passed to the proxy
    #[serde(default = "default_proxy_geolocation")]
    pub proxy_geolocation: String,

    /// Base URL of the Addis Ababa results service
    #[serde(default = "default_region_aa_url")]
    pub region_aa_url: String,
    /// Base URL of the Amhara results service
    #[serde(default = "default_region_amhara_url")]
    pub region_amhara_url: String,
    /// Base URL of the Oromia results service
    #[serde(default = "default_region_oromia_url")]
    pub region_oromia_url: String,
    /// Base URL of the South West results service
    #[serde(default = "default_region_sw_url")]
    pub region_sw_url: String,

    /// Comma-separated list of admin user IDs
    #[serde(rename = "admin_ids")]
    pub admin_ids_str: Option<String>,

    /// R2 Storage access key ID
    pub r2_access_key_id: Option<String>,
    /// R2 Storage secret access key
    pub r2_secret_access_key: Option<String>,
    /// R2 Storage endpoint URL
    pub r2_endpoint_url: Option<String>,
    /// R2 Storage bucket name
    pub r2_bucket_name: Option<String>,
}

fn default_proxy_url() -> String {
    DEFAULT_PROXY_URL.to_string()
}

fn default_proxy_geolocation() -> String {
    DEFAULT_PROXY_GEOLOCATION.to_string()
}

fn default_region_aa_url() -> String {
    "https://aa.ministry.et/student-result".to_string()
}

fn default_region_amhara_url() -> String {
    "https://amhara.ministry.et/student-result".to_string()
}

fn default_region_oromia_url() -> String {
    "https://oromia.ministry.et/student-result".to_string()
}

fn default_region_sw_url() -> String {
    "https://sw.ministry.et/student-result".to_string()
}

/// Build the layered configuration shared by all crates.
///
/// Sources, lowest priority first: `config/default`, `config/{RUN_MODE}`,
/// `config/local`, `APP__*` environment variables, plain environment variables.
///
/// # Errors
///
/// Returns a `ConfigError` if a source cannot be read.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Environment::default() maps UPPER_SNAKE_CASE to snake_case keys
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl ResultSettings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Returns the set of Telegram IDs allowed to run admin commands
    #[must_use]
    pub fn admin_ids(&self) -> HashSet<i64> {
        self.admin_ids_str
            .as_deref()
            .map(parse_id_list)
            .unwrap_or_default()
    }

    /// Configured base URL for a region, `None` when left empty
    #[must_use]
    pub fn region_url(&self, region: Region) -> Option<&str> {
        let url = match region {
            Region::Aa => &self.region_aa_url,
            Region::Amhara => &self.region_amhara_url,
            Region::Oromia => &self.region_oromia_url,
            Region::Sw => &self.region_sw_url,
        };
        let url = url.trim();
        (!url.is_empty()).then_some(url)
    }

    /// Whether every R2 setting needed by the object storage backend is present
    #[must_use]
    pub fn has_r2(&self) -> bool {
        [
            &self.r2_access_key_id,
            &self.r2_secret_access_key,
            &self.r2_endpoint_url,
            &self.r2_bucket_name,
        ]
        .iter()
        .all(|value| value.as_deref().is_some_and(|v| !v.is_empty()))
    }
}

/// Default extract proxy endpoint
pub const DEFAULT_PROXY_URL: &str = "https://api.zyte.com/v1/extract";
/// Default geolocation hint for upstream requests
pub const DEFAULT_PROXY_GEOLOCATION: &str = "ET";

/// Timeout (seconds) for each proxy round trip.
pub const RESULT_HTTP_TIMEOUT_SECS: u64 = 30;
/// Lifetime (seconds) of a cached result record.
pub const RESULT_CACHE_TTL_SECS: u64 = 3600;
/// Maximum number of cached result records.
pub const RESULT_CACHE_MAX_SIZE: u64 = 100;

/// Maximum attempts for Telegram API operations
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Initial backoff for Telegram API retries
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound for Telegram API retry backoff
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;

/// Get the proxy round-trip timeout from env or default.
///
/// Environment variable: `RESULT_HTTP_TIMEOUT_SECS`.
#[must_use]
pub fn get_result_http_timeout_secs() -> u64 {
    env_u64("RESULT_HTTP_TIMEOUT_SECS").unwrap_or(RESULT_HTTP_TIMEOUT_SECS)
}

/// Get the cache TTL from env or default.
///
/// Environment variable: `RESULT_CACHE_TTL_SECS`.
#[must_use]
pub fn get_result_cache_ttl_secs() -> u64 {
    env_u64("RESULT_CACHE_TTL_SECS").unwrap_or(RESULT_CACHE_TTL_SECS)
}

/// Get the cache capacity from env or default.
///
/// Environment variable: `RESULT_CACHE_MAX_SIZE`.
#[must_use]
pub fn get_result_cache_max_size() -> u64 {
    env_u64("RESULT_CACHE_MAX_SIZE").unwrap_or(RESULT_CACHE_MAX_SIZE)
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}
