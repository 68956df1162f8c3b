//! Utility functions shared by the core and the transports.

use crate::config::{
    TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
};
use anyhow::Result;
use std::collections::HashSet;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// Safely truncates a string to a maximum character length (not bytes).
///
/// This is UTF-8 safe and will not panic on multi-byte characters.
///
/// # Examples
///
/// ```
/// use exam_result_core::utils::truncate_str;
/// let s = "ሰላም ለዓለም";
/// assert_eq!(truncate_str(s, 3), "ሰላም");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Parses a list of Telegram IDs separated by commas, semicolons or whitespace.
///
/// Tokens that are not valid integers are skipped.
///
/// # Examples
///
/// ```
/// use exam_result_core::utils::parse_id_list;
/// let ids = parse_id_list("1, 2;3 x");
/// assert_eq!(ids.len(), 3);
/// ```
#[must_use]
pub fn parse_id_list(s: &str) -> HashSet<i64> {
    s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .filter_map(|id| id.parse::<i64>().ok())
        .collect()
}

/// Retry a chat transport operation with exponential backoff.
///
/// Used for outbound Telegram calls that may fail on transient network errors.
/// Upstream result fetches are never routed through here.
///
/// - Initial delay: 500ms
/// - Max delay: 4s
/// - Max attempts: 3
///
/// # Errors
///
/// Returns the last error if all attempts fail.
pub async fn retry_transport_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Transport operation failed after {} attempts: {}",
            TELEGRAM_API_MAX_RETRIES, e
        );
        e
    })
}
