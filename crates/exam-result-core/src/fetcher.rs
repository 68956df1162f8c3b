//! Result fetching through the extract proxy
//!
//! Record lookups consult the [`ResultCache`] first and write successful
//! parses back. Photo downloads never fail the record lookup.

use crate::cache::{CacheKey, ResultCache};
use crate::config::{get_result_http_timeout_secs, ResultSettings};
use crate::model::{Region, ResultRecord};
use crate::proxy::{ExtractEnvelope, ExtractRequest, ProxyError, ProxyTransport};
use reqwest::Url;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Result of a record lookup
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Record found (possibly served from cache)
    Success(Arc<ResultRecord>),
    /// Upstream has no record for this identity
    NotFound,
    /// Lookup failed for a reason unrelated to the identity
    TransientError(String),
}

impl FetchOutcome {
    /// The fetched record, if any
    #[must_use]
    pub fn record(&self) -> Option<&Arc<ResultRecord>> {
        match self {
            Self::Success(record) => Some(record),
            Self::NotFound | Self::TransientError(_) => None,
        }
    }
}

/// Reasons a lookup can fail before being folded into a [`FetchOutcome`]
#[derive(Error, Debug)]
pub enum FetchError {
    /// No base URL configured for the region
    #[error("No results service configured for region {0}")]
    UnknownRegion(Region),
    /// Base URL could not be turned into a request URL
    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),
    /// Proxy round trip failed
    #[error(transparent)]
    Proxy(#[from] ProxyError),
    /// Round trip exceeded the lookup timeout
    #[error("Upstream request timed out after {0:?}")]
    Timeout(Duration),
    /// Upstream answered with a non-success status
    #[error("Upstream returned status {0}")]
    UpstreamStatus(u16),
    /// Upstream body is not a usable record
    #[error("Failed to parse upstream body: {0}")]
    Parse(String),
    /// Upstream has no such record
    #[error("Record not found")]
    NotFound,
}

impl From<FetchError> for FetchOutcome {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::NotFound => Self::NotFound,
            other => Self::TransientError(other.to_string()),
        }
    }
}

/// Maps regions to the base URL of their results service
#[derive(Debug, Clone, Default)]
pub struct RegionDirectory {
    urls: BTreeMap<Region, String>,
}

impl RegionDirectory {
    /// Builds the directory from configured region URLs, skipping blank ones
    #[must_use]
    pub fn from_settings(settings: &ResultSettings) -> Self {
        Self::new(
            Region::ALL
                .into_iter()
                .filter_map(|region| settings.region_url(region).map(|url| (region, url))),
        )
    }

    /// Builds a directory from explicit `(region, base_url)` pairs
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Region, S)>,
        S: Into<String>,
    {
        Self {
            urls: entries
                .into_iter()
                .map(|(region, url)| (region, url.into()))
                .collect(),
        }
    }

    /// Upstream URL for one identity: `{base}/{registration}?first_name={name}&qr=`
    ///
    /// # Errors
    ///
    /// Returns `FetchError::UnknownRegion` when the region has no base URL and
    /// `FetchError::InvalidUrl` when the base URL does not parse.
    pub fn record_url(
        &self,
        region: Region,
        registration: &str,
        first_name: &str,
    ) -> Result<String, FetchError> {
        let base = self
            .urls
            .get(&region)
            .ok_or(FetchError::UnknownRegion(region))?;

        let mut url = Url::parse(&format!("{}/{registration}", base.trim_end_matches('/')))
            .map_err(|e| FetchError::InvalidUrl(format!("{base}: {e}")))?;
        url.query_pairs_mut()
            .append_pair("first_name", first_name)
            .append_pair("qr", "");

        Ok(url.into())
    }
}

/// Performs record and photo lookups through the proxy
pub struct ResultFetcher {
    cache: ResultCache,
    proxy: Arc<dyn ProxyTransport>,
    directory: RegionDirectory,
    geolocation: String,
    timeout: Duration,
}

impl ResultFetcher {
    /// Creates a fetcher
    #[must_use]
    pub fn new(
        cache: ResultCache,
        proxy: Arc<dyn ProxyTransport>,
        directory: RegionDirectory,
        geolocation: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            cache,
            proxy,
            directory,
            geolocation: geolocation.into(),
            timeout,
        }
    }

    /// Creates a fetcher from settings, using `RESULT_HTTP_TIMEOUT_SECS` for the timeout
    #[must_use]
    pub fn from_settings(
        settings: &ResultSettings,
        cache: ResultCache,
        proxy: Arc<dyn ProxyTransport>,
    ) -> Self {
        Self::new(
            cache,
            proxy,
            RegionDirectory::from_settings(settings),
            settings.proxy_geolocation.clone(),
            Duration::from_secs(get_result_http_timeout_secs()),
        )
    }

    /// The shared record cache
    #[must_use]
    pub const fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Looks up a record, serving it from cache when possible.
    ///
    /// Never retries; every failure is folded into the outcome.
    pub async fn fetch_record(
        &self,
        region: Region,
        registration: &str,
        first_name: &str,
    ) -> FetchOutcome {
        let key = CacheKey::new(region, registration, first_name);

        if let Some(record) = self.cache.get(&key).await {
            debug!(region = %region, "Result cache hit");
            return FetchOutcome::Success(record);
        }

        match self.lookup(&key).await {
            Ok(record) => {
                let record = Arc::new(record);
                self.cache.put(key, Arc::clone(&record)).await;
                info!(region = %region, courses = record.courses.len(), "Result record fetched");
                FetchOutcome::Success(record)
            }
            Err(FetchError::NotFound) => {
                info!(region = %region, "No result record for identity");
                FetchOutcome::NotFound
            }
            Err(e) => {
                warn!(region = %region, error = %e, "Result lookup failed");
                e.into()
            }
        }
    }

    /// Downloads a student photo. Any failure yields `None`.
    pub async fn fetch_photo(&self, photo_ref: &str) -> Option<Vec<u8>> {
        let url = photo_ref.replace('\\', "");
        if url.trim().is_empty() {
            return None;
        }

        match self.download(url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(error = %e, "Photo download failed, continuing without photo");
                None
            }
        }
    }

    async fn lookup(&self, key: &CacheKey) -> Result<ResultRecord, FetchError> {
        let url = self
            .directory
            .record_url(key.region(), key.registration(), key.first_name())?;
        let envelope = self.round_trip(url).await?;

        match envelope.status_code {
            Some(404) => return Err(FetchError::NotFound),
            Some(code) if !(200..300).contains(&code) => {
                return Err(FetchError::UpstreamStatus(code))
            }
            _ => {}
        }

        parse_record(&envelope.decode_body()?)
    }

    async fn download(&self, url: String) -> Result<Vec<u8>, FetchError> {
        let envelope = self.round_trip(url).await?;
        if !envelope.upstream_ok() {
            return Err(FetchError::UpstreamStatus(
                envelope.status_code.unwrap_or_default(),
            ));
        }

        let bytes = envelope.decode_body()?;
        if bytes.is_empty() {
            return Err(FetchError::Parse("empty photo body".to_string()));
        }
        Ok(bytes)
    }

    async fn round_trip(&self, url: String) -> Result<ExtractEnvelope, FetchError> {
        let request = ExtractRequest::raw_body(url, self.geolocation.as_str());
        tokio::time::timeout(self.timeout, self.proxy.extract(request))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))?
            .map_err(FetchError::from)
    }
}

/// A body that is JSON but lacks a `student` object means "no such record".
fn parse_record(body: &[u8]) -> Result<ResultRecord, FetchError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    if !value.get("student").is_some_and(Value::is_object) {
        return Err(FetchError::NotFound);
    }

    serde_json::from_value(value).map_err(|e| FetchError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::MockProxyTransport;
    use crate::testing::{envelope, sample_record_body, PHOTO_URL};
    use async_trait::async_trait;

    fn directory() -> RegionDirectory {
        RegionDirectory::new([(Region::Amhara, "https://amhara.example/student-result/")])
    }

    fn fetcher(proxy: MockProxyTransport, cache: ResultCache) -> ResultFetcher {
        ResultFetcher::new(
            cache,
            Arc::new(proxy),
            directory(),
            "ET",
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_record_url_shape() -> Result<(), FetchError> {
        let url = directory().record_url(Region::Amhara, "123456", "abel tes")?;
        assert_eq!(
            url,
            "https://amhara.example/student-result/123456?first_name=abel+tes&qr="
        );
        assert!(matches!(
            directory().record_url(Region::Oromia, "123456", "abel"),
            Err(FetchError::UnknownRegion(Region::Oromia))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_second_fetch_is_served_from_cache() {
        let mut proxy = MockProxyTransport::new();
        proxy
            .expect_extract()
            .withf(|request| {
                request.geolocation == "ET"
                    && request.http_response_body
                    && request.url.contains("/123456?first_name=abel")
            })
            .times(1)
            .returning(|_| Ok(envelope(Some(200), sample_record_body(3, true).as_bytes())));

        let fetcher = fetcher(proxy, ResultCache::new(Duration::from_secs(60), 10));

        let first = fetcher.fetch_record(Region::Amhara, "123456", "Abel").await;
        let second = fetcher.fetch_record(Region::Amhara, "123456", "abel").await;

        match (first.record(), second.record()) {
            (Some(a), Some(b)) => {
                assert!(Arc::ptr_eq(a, b));
                assert_eq!(a.courses.len(), 3);
            }
            other => panic!("expected two successes, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_expired_entry_triggers_one_new_call() {
        let mut proxy = MockProxyTransport::new();
        proxy
            .expect_extract()
            .times(2)
            .returning(|_| Ok(envelope(Some(200), sample_record_body(1, false).as_bytes())));

        let fetcher = fetcher(proxy, ResultCache::new(Duration::from_millis(50), 10));

        assert!(fetcher
            .fetch_record(Region::Amhara, "123456", "abel")
            .await
            .record()
            .is_some());
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(fetcher
            .fetch_record(Region::Amhara, "123456", "abel")
            .await
            .record()
            .is_some());
    }

    #[tokio::test]
    async fn test_capacity_eviction_triggers_one_new_call() {
        let mut proxy = MockProxyTransport::new();
        proxy
            .expect_extract()
            .times(3)
            .returning(|_| Ok(envelope(Some(200), sample_record_body(1, false).as_bytes())));

        let fetcher = fetcher(proxy, ResultCache::new(Duration::from_secs(60), 1));

        for registration in ["123456", "654321", "123456"] {
            assert!(fetcher
                .fetch_record(Region::Amhara, registration, "abel")
                .await
                .record()
                .is_some());
        }
        assert_eq!(fetcher.cache().entry_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_student_and_404_map_to_not_found() {
        let mut proxy = MockProxyTransport::new();
        let mut calls = 0;
        proxy.expect_extract().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(envelope(Some(200), br#"{"message":"no result"}"#))
            } else {
                Ok(envelope(Some(404), b""))
            }
        });

        let fetcher = fetcher(proxy, ResultCache::new(Duration::from_secs(60), 10));

        assert!(matches!(
            fetcher.fetch_record(Region::Amhara, "123456", "abel").await,
            FetchOutcome::NotFound
        ));
        assert!(matches!(
            fetcher.fetch_record(Region::Amhara, "1234567", "abel").await,
            FetchOutcome::NotFound
        ));
        assert_eq!(fetcher.cache().entry_count(), 0);
    }

    #[tokio::test]
    async fn test_failures_are_transient_and_not_cached() {
        let mut proxy = MockProxyTransport::new();
        let mut calls = 0;
        proxy.expect_extract().times(3).returning(move |_| {
            calls += 1;
            match calls {
                1 => Err(ProxyError::Network("connection refused".to_string())),
                2 => Ok(envelope(Some(502), b"")),
                _ => Ok(ExtractEnvelope {
                    status_code: Some(200),
                    http_response_body: Some("%%%".to_string()),
                }),
            }
        });

        let fetcher = fetcher(proxy, ResultCache::new(Duration::from_secs(60), 10));

        for _ in 0..3 {
            let outcome = fetcher.fetch_record(Region::Amhara, "123456", "abel").await;
            assert!(matches!(outcome, FetchOutcome::TransientError(_)));
        }
        assert_eq!(fetcher.cache().entry_count(), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_region_makes_no_request() {
        let mut proxy = MockProxyTransport::new();
        proxy.expect_extract().times(0);

        let fetcher = fetcher(proxy, ResultCache::new(Duration::from_secs(60), 10));
        let outcome = fetcher.fetch_record(Region::Sw, "123456", "abel").await;

        assert!(matches!(outcome, FetchOutcome::TransientError(_)));
    }

    #[tokio::test]
    async fn test_photo_strips_escapes_and_tolerates_failure() {
        let mut proxy = MockProxyTransport::new();
        let mut calls = 0;
        proxy
            .expect_extract()
            .withf(|request| !request.url.contains('\\'))
            .times(2)
            .returning(move |_| {
                calls += 1;
                if calls == 1 {
                    Ok(envelope(Some(200), b"\x89PNG"))
                } else {
                    Err(ProxyError::Status("500 Internal Server Error".to_string()))
                }
            });

        let fetcher = fetcher(proxy, ResultCache::new(Duration::from_secs(60), 10));
        let escaped = PHOTO_URL.replace('/', "\\/");

        assert_eq!(
            fetcher.fetch_photo(&escaped).await.as_deref(),
            Some(&b"\x89PNG"[..])
        );
        assert_eq!(fetcher.fetch_photo(PHOTO_URL).await, None);
        assert_eq!(fetcher.fetch_photo("  ").await, None);
    }

    struct StalledProxy;

    #[async_trait]
    impl ProxyTransport for StalledProxy {
        async fn extract(&self, _request: ExtractRequest) -> Result<ExtractEnvelope, ProxyError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ExtractEnvelope::default())
        }
    }

    #[tokio::test]
    async fn test_lookup_is_bounded_by_timeout() {
        let fetcher = ResultFetcher::new(
            ResultCache::new(Duration::from_secs(60), 10),
            Arc::new(StalledProxy),
            directory(),
            "ET",
            Duration::from_millis(20),
        );

        let outcome = fetcher.fetch_record(Region::Amhara, "123456", "abel").await;
        assert!(
            matches!(outcome, FetchOutcome::TransientError(ref reason) if reason.contains("timed out"))
        );
        assert_eq!(fetcher.fetch_photo(PHOTO_URL).await, None);
    }
}
