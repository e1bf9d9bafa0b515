//! Archive API access with exponential backoff on rate limiting.
//!
//! # Architecture
//!
//! - [`FetchArchive`]: core trait, fetch one month of the archive
//! - [`ArchiveClient`]: issues exactly one HTTP request per call
//! - [`RetryFetch`]: decorator that retries any [`FetchArchive`] while it
//!   keeps answering HTTP 429
//!
//! # Retry Strategy
//!
//! Only HTTP 429 is retried. Every other failure is returned after a single
//! request so that persistent errors are not mistaken for transient ones.
//!
//! ```text
//! delay(attempt) = base_delay * 2^attempt      attempt = 0, 1, ..., max_retries - 1
//! ```
//!
//! With the defaults (10 retries, 1 second) the last wait is 512 seconds and
//! a unit gives up after 11 requests.

use crate::error::{Error, Result};
use crate::models::FetchUnit;
use crate::utils::truncate_for_log;
use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Default archive API host.
pub const DEFAULT_BASE_URL: &str = "https://api.nytimes.com";

/// Trait for fetching one month of archive metadata.
///
/// The response is returned as raw JSON; mapping it onto records is the job
/// of [`crate::extract`].
pub trait FetchArchive {
    /// Fetch the archive for `unit`, authenticating with `api_key`.
    async fn fetch(&self, unit: FetchUnit, api_key: &str) -> Result<Value>;
}

/// Bounded exponential backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first request.
    pub max_retries: usize,
    /// Delay before the first retry; doubles for each further retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the request numbered `attempt` (zero-based) was
    /// rate limited.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let factor = 2u32.saturating_pow(u32::try_from(attempt).unwrap_or(u32::MAX));
        self.base_delay.saturating_mul(factor)
    }
}

/// HTTP client for the archive endpoint. Performs a single attempt per call.
#[derive(Debug, Clone)]
pub struct ArchiveClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ArchiveClient {
    /// Create a client for the API rooted at `base_url`
    /// (e.g. [`DEFAULT_BASE_URL`]).
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        // Url::join replaces the last segment unless the base ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    /// `{base}/svc/archive/v1/{year}/{month}.json?api-key={key}`
    fn request_url(&self, unit: FetchUnit, api_key: &str) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("svc/archive/v1/{}/{}.json", unit.year, unit.month))?;
        url.query_pairs_mut().append_pair("api-key", api_key);
        Ok(url)
    }
}

impl FetchArchive for ArchiveClient {
    #[instrument(level = "info", skip_all, fields(%unit))]
    async fn fetch(&self, unit: FetchUnit, api_key: &str) -> Result<Value> {
        let url = self.request_url(unit, api_key)?;
        // The query string carries the key; only the path is logged.
        info!(path = url.path(), "Fetching archive");

        let t0 = Instant::now();
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network(e.without_url()))?;
        let status = resp.status();
        let elapsed_ms = t0.elapsed().as_millis();

        if status == StatusCode::TOO_MANY_REQUESTS {
            debug!(elapsed_ms, "Got HTTP 429");
            return Err(Error::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), elapsed_ms, "Archive request failed");
            return Err(Error::Http {
                status: status.as_u16(),
                message: truncate_for_log(body.trim(), 300),
            });
        }

        let body = resp
            .json::<Value>()
            .await
            .map_err(|e| Error::Network(e.without_url()))?;
        debug!(elapsed_ms, "Archive response received");
        Ok(body)
    }
}

/// Wrapper that retries rate-limited requests of any [`FetchArchive`].
pub struct RetryFetch<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T> RetryFetch<T>
where
    T: FetchArchive,
{
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.policy.max_retries)
            .field("base_delay", &self.policy.base_delay)
            .finish()
    }
}

impl<T> FetchArchive for RetryFetch<T>
where
    T: FetchArchive,
{
    #[instrument(level = "info", skip_all, fields(%unit))]
    async fn fetch(&self, unit: FetchUnit, api_key: &str) -> Result<Value> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch(unit, api_key).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() => {
                    if attempt >= self.policy.max_retries {
                        error!(
                            attempts = attempt + 1,
                            max_retries = self.policy.max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis(),
                            "Max retry limit reached; unable to fetch data"
                        );
                        return Err(Error::RateLimitExceeded {
                            year: unit.year,
                            month: unit.month,
                            attempts: attempt + 1,
                        });
                    }

                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        attempt,
                        max_retries = self.policy.max_retries,
                        ?delay,
                        "Got HTTP 429: Too many requests; backing off"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(error = %e, "Archive fetch failed");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const UNIT: FetchUnit = FetchUnit {
        year: 2021,
        month: 7,
    };

    /// Answers with queued results, then with 429 forever. Records the
    /// (paused) clock at every call.
    struct Scripted {
        results: RefCell<Vec<Result<Value>>>,
        calls: RefCell<Vec<tokio::time::Instant>>,
    }

    impl Scripted {
        fn new(mut results: Vec<Result<Value>>) -> Self {
            results.reverse();
            Self {
                results: RefCell::new(results),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl FetchArchive for Scripted {
        async fn fetch(&self, _unit: FetchUnit, _api_key: &str) -> Result<Value> {
            self.calls.borrow_mut().push(tokio::time::Instant::now());
            self.results
                .borrow_mut()
                .pop()
                .unwrap_or(Err(Error::RateLimited))
        }
    }

    #[test]
    fn test_retry_policy_delays_double() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(9), Duration::from_millis(51_200));
        assert_eq!(RetryPolicy::default().delay_for(3), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_schedule_until_exhausted() {
        let inner = Scripted::new(vec![]);
        let base = Duration::from_secs(1);
        let fetcher = RetryFetch::new(
            inner,
            RetryPolicy {
                max_retries: 10,
                base_delay: base,
            },
        );

        let result = fetcher.fetch(UNIT, "key").await;
        match result {
            Err(Error::RateLimitExceeded {
                year,
                month,
                attempts,
            }) => {
                assert_eq!((year, month), (2021, 7));
                assert_eq!(attempts, 11);
            }
            other => panic!("Expected RateLimitExceeded, got {other:?}"),
        }

        let calls = fetcher.inner.calls.borrow();
        assert_eq!(calls.len(), 11);
        for n in 1..calls.len() {
            assert_eq!(calls[n] - calls[n - 1], base * 2u32.pow(n as u32 - 1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_rate_limit() {
        let inner = Scripted::new(vec![
            Err(Error::RateLimited),
            Err(Error::RateLimited),
            Ok(json!({ "response": { "docs": [] } })),
        ]);
        let fetcher = RetryFetch::new(inner, RetryPolicy::default());

        let body = fetcher.fetch(UNIT, "key").await.unwrap();
        assert!(body["response"]["docs"].is_array());
        assert_eq!(fetcher.inner.calls.borrow().len(), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let inner = Scripted::new(vec![Err(Error::Http {
            status: 503,
            message: "unavailable".to_string(),
        })]);
        let fetcher = RetryFetch::new(inner, RetryPolicy::default());

        assert!(matches!(
            fetcher.fetch(UNIT, "key").await,
            Err(Error::Http { status: 503, .. })
        ));
        assert_eq!(fetcher.inner.calls.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_client_fetches_archive_path_with_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/svc/archive/v1/2021/7.json"))
            .and(query_param("api-key", "secret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "response": { "docs": [{ "web_url": "u" }] } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = ArchiveClient::new(&server.uri()).unwrap();
        let body = client.fetch(UNIT, "secret").await.unwrap();
        assert_eq!(body["response"]["docs"][0]["web_url"], "u");
    }

    #[tokio::test]
    async fn test_server_error_makes_one_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = RetryFetch::new(
            ArchiveClient::new(&server.uri()).unwrap(),
            RetryPolicy::default(),
        );
        match fetcher.fetch(UNIT, "key").await {
            Err(Error::Http { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "internal error");
            }
            other => panic!("Expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_not_found_makes_one_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = RetryFetch::new(
            ArchiveClient::new(&server.uri()).unwrap(),
            RetryPolicy::default(),
        );
        assert!(matches!(
            fetcher.fetch(UNIT, "key").await,
            Err(Error::Http { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_over_http_gives_up_after_bound() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(4)
            .mount(&server)
            .await;

        let fetcher = RetryFetch::new(
            ArchiveClient::new(&server.uri()).unwrap(),
            RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(1),
            },
        );
        assert!(matches!(
            fetcher.fetch(UNIT, "key").await,
            Err(Error::RateLimitExceeded { attempts: 4, .. })
        ));
    }

    #[tokio::test]
    async fn test_network_error_does_not_reveal_api_key() {
        let fetcher = RetryFetch::new(
            ArchiveClient::new("http://127.0.0.1:1").unwrap(),
            RetryPolicy::default(),
        );

        let err = fetcher.fetch(UNIT, "SUPERSECRET").await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        assert!(!err.to_string().contains("SUPERSECRET"));
        assert!(!format!("{err:?}").contains("SUPERSECRET"));
    }

    #[tokio::test]
    async fn test_undecodable_body_does_not_reveal_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .expect(1)
            .mount(&server)
            .await;

        let client = ArchiveClient::new(&server.uri()).unwrap();
        let err = client.fetch(UNIT, "SUPERSECRET").await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        assert!(!err.to_string().contains("SUPERSECRET"));
        assert!(!format!("{err:?}").contains("SUPERSECRET"));
    }

    #[test]
    fn test_base_url_with_path_prefix() {
        let client = ArchiveClient::new("http://localhost:8080/proxy").unwrap();
        let url = client.request_url(UNIT, "k").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/proxy/svc/archive/v1/2021/7.json?api-key=k"
        );
    }
}
