//! Resilient HTTP access shared by every pipeline stage.
//!
//! All outbound network traffic goes through [`FetchClient`]. It owns a
//! [`Transport`] (the real one wraps a pooled `reqwest::Client`) and a
//! [`RetryPolicy`] that retries transient failures with a randomized,
//! bounded backoff before giving up with [`ConfPapersError::FetchExhausted`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, ClientBuilder};
use scraper::Html;
use tracing::{debug, instrument, warn};

use crate::error::{ConfPapersError, Result};

/// Status and raw body of a single GET.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// One GET, no retries. Implementations must be safe to share across
/// concurrent requests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<TransportResponse>;
}

/// Production transport backed by a connection-pooling `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ConfPapersError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?.to_vec();
        Ok(TransportResponse { status, body })
    }
}

/// Attempt ceiling and backoff interval for transient failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff_min: Duration::from_secs(1),
            backoff_max: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    /// Same ceiling, zero delay between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff_min: Duration::ZERO,
            backoff_max: Duration::ZERO,
        }
    }

    /// Uniform sample from `[backoff_min, backoff_max]`.
    pub fn sample_backoff(&self) -> Duration {
        let lo = self.backoff_min.as_millis() as u64;
        let hi = self.backoff_max.as_millis() as u64;
        if hi <= lo {
            return self.backoff_min;
        }
        Duration::from_millis(rand::rng().random_range(lo..=hi))
    }

    fn ceiling(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Shared, cheaply cloneable fetch handle.
#[derive(Clone)]
pub struct FetchClient {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchClient").field("retry", &self.retry).finish_non_exhaustive()
    }
}

impl FetchClient {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    /// Client over a real `reqwest` transport.
    pub fn with_reqwest(user_agent: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let transport = ReqwestTransport::new(user_agent, timeout)?;
        Ok(Self::new(Arc::new(transport), retry))
    }

    /// Raw response body, retried per the policy.
    #[instrument(skip(self))]
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let ceiling = self.retry.ceiling();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.get_once(url).await {
                Ok(body) => {
                    debug!(url, attempt, bytes = body.len(), "fetched");
                    return Ok(body);
                }
                Err(e) if e.is_transient() && attempt < ceiling => {
                    let delay = self.retry.sample_backoff();
                    warn!(url, attempt, error = %e, delay_ms = delay.as_millis() as u64, "fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(ConfPapersError::FetchExhausted {
                        url: url.to_string(),
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
            }
        }
    }

    /// Response body decoded as UTF-8 regardless of what the server claims.
    ///
    /// Schedule snippets arrive without a charset; guessing turns en-dashes
    /// and accented names into mojibake.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let body = self.fetch_bytes(url).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Fetch and parse a full HTML document.
    pub async fn fetch_html(&self, url: &str) -> Result<Html> {
        let text = self.fetch_text(url).await?;
        Ok(Html::parse_document(&text))
    }

    async fn get_once(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.transport.get(url).await?;
        if !(200..300).contains(&resp.status) {
            return Err(ConfPapersError::Status {
                url: url.to_string(),
                status: resp.status,
            });
        }
        Ok(resp.body)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod testing {
    //! In-memory transport for tests.

    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{Transport, TransportResponse};
    use crate::error::{ConfPapersError, Result};

    #[derive(Debug, Clone)]
    enum Scripted {
        Respond(u16, Vec<u8>),
        Fail(String),
    }

    #[derive(Debug, Clone)]
    struct Route {
        script: VecDeque<Scripted>,
        steady: Scripted,
        delay: Duration,
    }

    impl Default for Route {
        fn default() -> Self {
            Self {
                script: VecDeque::new(),
                steady: Scripted::Respond(404, Vec::new()),
                delay: Duration::ZERO,
            }
        }
    }

    /// URL-keyed canned responses. Unknown URLs answer 404.
    #[derive(Debug, Default)]
    pub struct FakeTransport {
        routes: Mutex<HashMap<String, Route>>,
        calls: Mutex<HashMap<String, u32>>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        fn route(&mut self, url: &str) -> &mut Route {
            self.routes
                .get_mut()
                .unwrap()
                .entry(url.to_string())
                .or_default()
        }

        pub fn page(self, url: &str, html: impl Into<String>) -> Self {
            self.bytes(url, html.into().into_bytes())
        }

        pub fn bytes(mut self, url: &str, body: Vec<u8>) -> Self {
            self.route(url).steady = Scripted::Respond(200, body);
            self
        }

        pub fn status(mut self, url: &str, status: u16) -> Self {
            self.route(url).steady = Scripted::Respond(status, Vec::new());
            self
        }

        /// The next `times` requests to `url` fail at the transport level.
        pub fn failing(mut self, url: &str, times: u32) -> Self {
            let route = self.route(url);
            for _ in 0..times {
                route.script.push_back(Scripted::Fail(format!("connection reset ({url})")));
            }
            self
        }

        /// Every request to `url` sleeps this long before answering.
        pub fn delayed(mut self, url: &str, delay: Duration) -> Self {
            self.route(url).delay = delay;
            self
        }

        pub fn calls(&self, url: &str) -> u32 {
            self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn get(&self, url: &str) -> Result<TransportResponse> {
            *self.calls.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;

            let (next, delay) = {
                let mut routes = self.routes.lock().unwrap();
                let route = routes.entry(url.to_string()).or_default();
                let next = route.script.pop_front().unwrap_or_else(|| route.steady.clone());
                (next, route.delay)
            };

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match next {
                Scripted::Respond(status, body) => Ok(TransportResponse { status, body }),
                Scripted::Fail(msg) => Err(ConfPapersError::Transport(msg)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeTransport;
    use super::*;

    const URL: &str = "https://example.org/page";

    fn client(fake: FakeTransport, attempts: u32) -> (Arc<FakeTransport>, FetchClient) {
        let fake = Arc::new(fake);
        let client = FetchClient::new(fake.clone(), RetryPolicy::immediate(attempts));
        (fake, client)
    }

    #[tokio::test]
    async fn test_always_failing_fetch_stops_at_ceiling() {
        let (fake, client) = client(FakeTransport::new().failing(URL, 10), 4);
        let err = client.fetch_bytes(URL).await.unwrap_err();
        assert_eq!(fake.calls(URL), 4);
        match err {
            ConfPapersError::FetchExhausted { attempts, .. } => assert_eq!(attempts, 4),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_success_on_final_attempt() {
        let (fake, client) = client(FakeTransport::new().failing(URL, 3).page(URL, "ok"), 4);
        let body = client.fetch_text(URL).await.unwrap();
        assert_eq!(body, "ok");
        assert_eq!(fake.calls(URL), 4);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let (fake, client) = client(FakeTransport::new().status(URL, 503), 3);
        assert!(client.fetch_bytes(URL).await.is_err());
        assert_eq!(fake.calls(URL), 3);
    }

    #[tokio::test]
    async fn test_client_errors_retried_to_ceiling() {
        for code in [403, 404] {
            let (fake, client) = client(FakeTransport::new().status(URL, code), 4);
            let err = client.fetch_bytes(URL).await.unwrap_err();
            assert_eq!(fake.calls(URL), 4, "status {code}");
            match err {
                ConfPapersError::FetchExhausted { attempts, .. } => assert_eq!(attempts, 4),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[tokio::test]
    async fn test_malformed_url_fails_without_retry() {
        let transport = ReqwestTransport::new("confpapers-test", Duration::from_secs(1)).unwrap();
        let client = FetchClient::new(Arc::new(transport), RetryPolicy::default());
        let started = std::time::Instant::now();
        match client.fetch_bytes("not a url").await.unwrap_err() {
            ConfPapersError::FetchExhausted { attempts, .. } => assert_eq!(attempts, 1),
            other => panic!("unexpected error: {other}"),
        }
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_text_is_decoded_as_utf8() {
        let html = "Session 1 \u{2013} Jos\u{e9} Garc\u{ed}a";
        let (_, client) = client(FakeTransport::new().bytes(URL, html.as_bytes().to_vec()), 1);
        assert_eq!(client.fetch_text(URL).await.unwrap(), html);
    }

    #[tokio::test]
    async fn test_fetch_html_parses_document() {
        let (_, client) = client(FakeTransport::new().page(URL, "<p class=\"x\">hi</p>"), 1);
        let doc = client.fetch_html(URL).await.unwrap();
        let sel = scraper::Selector::parse("p.x").unwrap();
        assert_eq!(doc.select(&sel).count(), 1);
    }

    #[test]
    fn test_backoff_sample_within_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..200 {
            let d = policy.sample_backoff();
            assert!(d >= Duration::from_secs(1) && d <= Duration::from_secs(4), "{d:?}");
        }
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        assert_eq!(RetryPolicy::immediate(0).ceiling(), 1);
        assert_eq!(RetryPolicy::immediate(0).sample_backoff(), Duration::ZERO);
    }
}
