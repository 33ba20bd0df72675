//! Polite, resilient page fetching.
//!
//! The fetcher downloads raw HTML while staying a bad target for rate limiting: a global
//! concurrency bound, an independently throttled cooldown slot per origin, random jitter
//! before every attempt, and a fresh browser identity (plus optional proxy) per attempt.
//! Failures never escape as errors; each input URL yields exactly one [`FetchResult`]
//! with the failure encoded inside.

mod identity;
mod policy;

pub use policy::RetryPolicy;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use rand::Rng;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, REFERER, USER_AGENT};
use reqwest::{Client, Proxy, StatusCode};
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};

use identity::Identity;

/// Errors carried inside a failed [`FetchResult`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// Network-level failure persisted through the whole retry budget.
    #[error("network failure after {attempts} attempts: {message}")]
    Network {
        /// Attempts consumed before giving up.
        attempts: u32,
        /// Description of the last failure.
        message: String,
    },
    /// Anti-bot rejection (HTTP 403) persisted through the whole retry budget.
    #[error("rejected with HTTP 403 after {attempts} attempts")]
    Forbidden {
        /// Attempts consumed before giving up.
        attempts: u32,
    },
    /// Server answered with a non-success status that is not worth retrying.
    #[error("unexpected HTTP status {status}")]
    Status {
        /// Status code returned by the server.
        status: u16,
    },
    /// Response was not HTML; the page is skipped rather than retried.
    #[error("response content type is not HTML: {content_type:?}")]
    NotHtml {
        /// Content type reported by the server, when present.
        content_type: Option<String>,
    },
}

/// Outcome of fetching one URL; failures are encoded, never raised.
#[derive(Debug)]
pub struct FetchResult {
    /// URL as requested by the caller.
    pub requested_url: String,
    /// URL after following redirects, when a response was received.
    pub final_url: Option<String>,
    /// HTTP status of the last response, when one was received.
    pub http_status: Option<u16>,
    /// Content type reported by the server.
    pub content_type: Option<String>,
    /// Raw HTML body on success.
    pub html_body: Option<String>,
    /// Failure description when the fetch did not produce usable HTML.
    pub error: Option<FetchError>,
}

impl FetchResult {
    /// True when the fetch produced an HTML body to extract.
    pub fn is_html_success(&self) -> bool {
        self.error.is_none() && self.html_body.is_some()
    }

    fn failure(requested_url: String, error: FetchError) -> Self {
        Self {
            requested_url,
            final_url: None,
            http_status: None,
            content_type: None,
            html_body: None,
            error: Some(error),
        }
    }
}

/// Caller-supplied politeness and resiliency knobs.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Global bound on simultaneous in-flight requests.
    pub concurrency: usize,
    /// Maximum attempts per URL.
    pub max_retries: u32,
    /// Timeout applied to the first attempt.
    pub timeout_ceiling: Duration,
    /// Minimum timeout for later attempts.
    pub timeout_floor: Duration,
    /// Lower bound of the random pre-attempt jitter.
    pub jitter_min: Duration,
    /// Upper bound of the random pre-attempt jitter.
    pub jitter_max: Duration,
    /// Minimum spacing between two requests to the same origin.
    pub origin_cooldown: Duration,
    /// Optional proxy pool; one proxy is chosen at random per attempt.
    pub proxies: Vec<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            max_retries: 3,
            timeout_ceiling: Duration::from_secs(20),
            timeout_floor: Duration::from_secs(5),
            jitter_min: Duration::from_millis(150),
            jitter_max: Duration::from_millis(750),
            origin_cooldown: Duration::from_millis(1500),
            proxies: Vec::new(),
        }
    }
}

enum AttemptOutcome {
    Success(FetchResult),
    Terminal(FetchResult),
    Forbidden,
    Network(String),
}

/// Concurrent page fetcher with per-origin throttling.
pub struct Fetcher {
    client: Client,
    config: FetcherConfig,
    semaphore: Arc<Semaphore>,
    // Next admissible start per origin; reservation happens under the lock so two tasks
    // can never book the same cooldown slot.
    origin_slots: Arc<Mutex<HashMap<String, Instant>>>,
}

impl Fetcher {
    /// Build a fetcher for the supplied configuration.
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .build()
            .map_err(|err| FetchError::Network {
                attempts: 0,
                message: err.to_string(),
            })?;
        let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
        Ok(Self {
            client,
            config,
            semaphore,
            origin_slots: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Fetch every URL concurrently, returning one result per input in input order.
    pub async fn fetch(&self, urls: &[String]) -> Vec<FetchResult> {
        join_all(urls.iter().map(|url| self.fetch_one(url.clone()))).await
    }

    async fn fetch_one(&self, url: String) -> FetchResult {
        let origin = match url::Url::parse(&url) {
            Ok(parsed) => parsed.origin().ascii_serialization(),
            Err(err) => return FetchResult::failure(url, FetchError::InvalidUrl(err.to_string())),
        };

        let policy = RetryPolicy::new(
            self.config.max_retries,
            self.config.timeout_ceiling,
            self.config.timeout_floor,
        );

        let mut last_error = None;
        for attempt in 1..=policy.max_attempts() {
            self.pause_for_jitter().await;

            // The permit is held across the cooldown wait: a slot reserved while queued
            // for a permit could otherwise be overtaken by a later reservation.
            let permit = self
                .semaphore
                .acquire()
                .await
                .expect("fetcher semaphore never closes");
            self.await_origin_slot(&origin).await;
            let identity = Identity::random();
            let outcome = self
                .attempt(&url, &identity, policy.timeout_for(attempt))
                .await;
            drop(permit);

            match outcome {
                AttemptOutcome::Success(result) => return result,
                AttemptOutcome::Terminal(result) => return result,
                AttemptOutcome::Forbidden => {
                    // Next attempt rotates to a fresh identity automatically.
                    tracing::debug!(url = %url, attempt, "403 received; retrying with new identity");
                    last_error = Some(FetchError::Forbidden { attempts: attempt });
                }
                AttemptOutcome::Network(message) => {
                    tracing::debug!(url = %url, attempt, error = %message, "Attempt failed");
                    last_error = Some(FetchError::Network {
                        attempts: attempt,
                        message,
                    });
                }
            }
        }

        let error = last_error.unwrap_or(FetchError::Network {
            attempts: 0,
            message: "no attempts were made".to_string(),
        });
        tracing::warn!(url = %url, error = %error, "Fetch gave up");
        FetchResult::failure(url, error)
    }

    async fn attempt(&self, url: &str, identity: &Identity, timeout: Duration) -> AttemptOutcome {
        let client = match self.client_for_attempt() {
            Ok(client) => client,
            Err(message) => return AttemptOutcome::Network(message),
        };

        let request = client
            .get(url)
            .timeout(timeout)
            .header(USER_AGENT, identity.user_agent)
            .header(REFERER, identity.referer)
            .header("X-Forwarded-For", identity.forwarded_for.clone())
            .header(
                ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9");

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => return AttemptOutcome::Network(err.to_string()),
        };

        let status = response.status();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if status == StatusCode::FORBIDDEN {
            return AttemptOutcome::Forbidden;
        }
        if !status.is_success() {
            return AttemptOutcome::Terminal(FetchResult {
                requested_url: url.to_string(),
                final_url: Some(final_url),
                http_status: Some(status.as_u16()),
                content_type,
                html_body: None,
                error: Some(FetchError::Status {
                    status: status.as_u16(),
                }),
            });
        }
        if !is_html(content_type.as_deref()) {
            return AttemptOutcome::Terminal(FetchResult {
                requested_url: url.to_string(),
                final_url: Some(final_url),
                http_status: Some(status.as_u16()),
                content_type: content_type.clone(),
                html_body: None,
                error: Some(FetchError::NotHtml { content_type }),
            });
        }

        match response.text().await {
            Ok(body) => AttemptOutcome::Success(FetchResult {
                requested_url: url.to_string(),
                final_url: Some(final_url),
                http_status: Some(status.as_u16()),
                content_type,
                html_body: Some(body),
                error: None,
            }),
            Err(err) => AttemptOutcome::Network(err.to_string()),
        }
    }

    /// Shared client normally; a one-off proxied client when a proxy pool is supplied.
    fn client_for_attempt(&self) -> Result<Client, String> {
        if self.config.proxies.is_empty() {
            return Ok(self.client.clone());
        }
        let proxy_url = {
            let mut rng = rand::thread_rng();
            let index = rng.gen_range(0..self.config.proxies.len());
            self.config.proxies[index].clone()
        };
        let proxy = Proxy::all(&proxy_url).map_err(|err| err.to_string())?;
        Client::builder()
            .proxy(proxy)
            .build()
            .map_err(|err| err.to_string())
    }

    async fn pause_for_jitter(&self) {
        let min = self.config.jitter_min.as_millis() as u64;
        let max = self.config.jitter_max.as_millis() as u64;
        if max == 0 {
            return;
        }
        let millis = {
            let mut rng = rand::thread_rng();
            rng.gen_range(min.min(max)..=max)
        };
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }

    /// Reserve the next cooldown slot for `origin` and wait until it opens.
    async fn await_origin_slot(&self, origin: &str) {
        let slot = {
            let mut slots = self.origin_slots.lock().await;
            let now = Instant::now();
            let slot = match slots.get(origin) {
                Some(last) => (*last + self.config.origin_cooldown).max(now),
                None => now,
            };
            slots.insert(origin.to_string(), slot);
            slot
        };
        tokio::time::sleep_until(tokio::time::Instant::from_std(slot)).await;
    }
}

fn is_html(content_type: Option<&str>) -> bool {
    match content_type {
        // A missing header is tolerated; the extractor will reject non-documents anyway.
        None => true,
        Some(value) => {
            let value = value.to_ascii_lowercase();
            value.starts_with("text/html") || value.starts_with("application/xhtml+xml")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};

    fn quiet_config() -> FetcherConfig {
        FetcherConfig {
            concurrency: 4,
            max_retries: 2,
            timeout_ceiling: Duration::from_secs(5),
            timeout_floor: Duration::from_secs(1),
            jitter_min: Duration::ZERO,
            jitter_max: Duration::ZERO,
            origin_cooldown: Duration::ZERO,
            proxies: Vec::new(),
        }
    }

    #[tokio::test]
    async fn successful_fetch_returns_html_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/page");
                then.status(200)
                    .header("content-type", "text/html; charset=utf-8")
                    .body("<html><body><p>hello</p></body></html>");
            })
            .await;

        let fetcher = Fetcher::new(quiet_config()).expect("fetcher builds");
        let results = fetcher.fetch(&[server.url("/page")]).await;

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert!(result.is_html_success());
        assert_eq!(result.http_status, Some(200));
        assert!(result.html_body.as_deref().unwrap().contains("hello"));
    }

    #[tokio::test]
    async fn redirect_records_final_url() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/old");
                then.status(301).header("location", &server.url("/new"));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/new");
                then.status(200)
                    .header("content-type", "text/html")
                    .body("<html><body>moved</body></html>");
            })
            .await;

        let fetcher = Fetcher::new(quiet_config()).expect("fetcher builds");
        let results = fetcher.fetch(&[server.url("/old")]).await;

        let result = &results[0];
        assert!(result.is_html_success());
        assert_eq!(result.requested_url, server.url("/old"));
        assert!(result.final_url.as_deref().unwrap().ends_with("/new"));
    }

    #[tokio::test]
    async fn non_html_content_is_terminal() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/doc.pdf");
                then.status(200)
                    .header("content-type", "application/pdf")
                    .body("%PDF-1.4");
            })
            .await;

        let fetcher = Fetcher::new(quiet_config()).expect("fetcher builds");
        let results = fetcher.fetch(&[server.url("/doc.pdf")]).await;

        assert!(matches!(
            results[0].error,
            Some(FetchError::NotHtml { .. })
        ));
        assert_eq!(mock.hits_async().await, 1, "non-HTML must not be retried");
    }

    #[tokio::test]
    async fn forbidden_is_retried_until_budget_exhausted() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/guarded");
                then.status(403).body("denied");
            })
            .await;

        let mut config = quiet_config();
        config.max_retries = 3;
        let fetcher = Fetcher::new(config).expect("fetcher builds");
        let results = fetcher.fetch(&[server.url("/guarded")]).await;

        assert!(matches!(
            results[0].error,
            Some(FetchError::Forbidden { attempts: 3 })
        ));
        assert_eq!(mock.hits_async().await, 3);
    }

    #[tokio::test]
    async fn unreachable_host_exhausts_retries() {
        let fetcher = Fetcher::new(quiet_config()).expect("fetcher builds");
        let results = fetcher
            .fetch(&["http://127.0.0.1:1/nothing".to_string()])
            .await;

        let result = &results[0];
        assert!(result.html_body.is_none());
        assert_eq!(result.http_status, None);
        assert!(matches!(
            result.error,
            Some(FetchError::Network { attempts: 2, .. })
        ));
    }

    #[tokio::test]
    async fn invalid_url_fails_without_attempts() {
        let fetcher = Fetcher::new(quiet_config()).expect("fetcher builds");
        let results = fetcher.fetch(&["not a url".to_string()]).await;
        assert!(matches!(results[0].error, Some(FetchError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn same_origin_requests_respect_the_cooldown() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200)
                    .header("content-type", "text/html")
                    .body("<html><body>ok</body></html>");
            })
            .await;

        let mut config = quiet_config();
        config.origin_cooldown = Duration::from_millis(300);
        let fetcher = Fetcher::new(config).expect("fetcher builds");

        let started = Instant::now();
        let results = fetcher.fetch(&[server.url("/a"), server.url("/b")]).await;
        let elapsed = started.elapsed();

        assert!(results.iter().all(FetchResult::is_html_success));
        assert!(
            elapsed >= Duration::from_millis(300),
            "second same-origin request started after {elapsed:?}, expected >= 300ms"
        );
    }

    #[tokio::test]
    async fn cooldown_holds_while_queued_behind_the_concurrency_bound() {
        let slow_origin = MockServer::start_async().await;
        slow_origin
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200)
                    .header("content-type", "text/html")
                    .body("<html><body>slow</body></html>")
                    .delay(Duration::from_millis(400));
            })
            .await;
        let throttled_origin = MockServer::start_async().await;
        throttled_origin
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200)
                    .header("content-type", "text/html")
                    .body("<html><body>ok</body></html>");
            })
            .await;

        let mut config = quiet_config();
        config.concurrency = 1;
        config.origin_cooldown = Duration::from_millis(300);
        let fetcher = Fetcher::new(config).expect("fetcher builds");

        // Both throttled-origin requests queue behind the slow one for the single
        // permit; their spacing must still respect the cooldown once they run.
        let started = Instant::now();
        let results = fetcher
            .fetch(&[
                slow_origin.url("/slow"),
                throttled_origin.url("/a"),
                throttled_origin.url("/b"),
            ])
            .await;
        let elapsed = started.elapsed();

        assert!(results.iter().all(FetchResult::is_html_success));
        assert!(
            elapsed >= Duration::from_millis(600),
            "batch finished after {elapsed:?}, expected slow response plus a full cooldown"
        );
    }

    #[tokio::test]
    async fn results_pair_back_to_requested_urls() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200)
                    .header("content-type", "text/html")
                    .body("<html><body>ok</body></html>");
            })
            .await;

        let fetcher = Fetcher::new(quiet_config()).expect("fetcher builds");
        let urls = vec![server.url("/x"), server.url("/y"), server.url("/z")];
        let results = fetcher.fetch(&urls).await;

        let returned: Vec<&str> = results
            .iter()
            .map(|result| result.requested_url.as_str())
            .collect();
        assert_eq!(returned, urls.iter().map(String::as_str).collect::<Vec<_>>());
    }
}
