//! Network utilities: the shared HTTP session, retry policy and HTML helpers.
//!
//! This module provides the networking infrastructure for Renzoku:
//!
//! - **HTTP Client**: one configured `reqwest` client with connection pooling,
//!   default headers and a seeded cookie jar, constructed once per run and
//!   passed to every component that performs network I/O
//! - **Retry Logic**: bounded attempts with capped exponential backoff
//! - **Content Parsing**: HTML helpers in [`html`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use renzoku::net::{HttpClient, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> renzoku::Result<()> {
//! let client = HttpClient::builder()
//!     .timeout(Duration::from_secs(25))
//!     .retry(RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(8)))
//!     .header("User-Agent", "Mozilla/5.0")
//!     .build()?;
//!
//! let html = client.get_text("https://example.com/manga/foo", None).await?;
//! # Ok(())
//! # }
//! ```

use reqwest::{
    Client, Response,
    cookie::Jar,
    header::{HeaderMap, HeaderName, HeaderValue, REFERER},
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::{Config, CookieSeed};
use crate::error::{Error, Result};

pub mod html;

/// Default connect and per-read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(25);

/// Attempt budget and backoff schedule for a retried operation.
///
/// The first retry waits `base_delay`; each further retry doubles the wait,
/// capped at `max_delay`. No delay follows the last attempt.
///
/// # Examples
///
/// ```rust
/// use renzoku::net::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(4, Duration::from_secs(1), Duration::from_secs(8));
/// let delays: Vec<_> = policy.delays().collect();
/// assert_eq!(
///     delays,
///     vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy. An attempt budget of zero is raised to one.
    pub fn new(attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Policy used by the fetch client: 3 attempts, 1s doubling to 8s.
    pub fn fetch_default() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(8))
    }

    /// Policy used per page by the downloader: 4 attempts, 1s doubling to 8s.
    pub fn download_default() -> Self {
        Self::new(4, Duration::from_secs(1), Duration::from_secs(8))
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// The waits between consecutive attempts (`attempts - 1` values).
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let max = self.max_delay;
        std::iter::successors(Some(self.base_delay.min(max)), move |d| {
            Some(d.saturating_mul(2).min(max))
        })
        .take(self.attempts.saturating_sub(1) as usize)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. The last error is returned on exhaustion.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delays = self.delays();
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => match delays.next() {
                    Some(delay) => {
                        warn!(
                            op = label,
                            attempt,
                            attempts = self.attempts,
                            error = %e,
                            "attempt failed, retrying in {:?}",
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        warn!(op = label, attempts = self.attempts, error = %e, "giving up");
                        return Err(e);
                    }
                },
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fetch_default()
    }
}

/// Shared HTTP session with built-in retry logic.
///
/// `HttpClient` wraps one `reqwest::Client`, so clones share the connection
/// pool and cookie jar. It is the fetch client of the crawl loop and the
/// transport of the page downloader.
///
/// # Features
///
/// - **Retry Logic**: transport errors and non-success statuses are retried
///   according to the [`RetryPolicy`]
/// - **Referer**: every request can carry an optional `Referer` header
/// - **Typed failures**: exhaustion surfaces the last [`Error`], never a panic
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: Client,
    retry: RetryPolicy,
}

impl HttpClient {
    /// Creates a client with default timeout, retry policy and no extra headers.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Starts configuring a client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Builds the shared session from the run configuration.
    ///
    /// Applies the request timeout, the fetch retry policy, the configured
    /// headers and the cookie seed list (inline cookies plus the cookie file,
    /// whose read errors are logged and ignored).
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Self::builder()
            .timeout(config.app.request_timeout())
            .retry(config.app.retry.policy());

        for (name, value) in &config.network.headers {
            builder = builder.header(&normalize_header_name(name), value);
        }

        let default_domain = Url::parse(&config.app.site)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));

        for seed in config.network.load_cookies() {
            builder = builder.cookie(seed, default_domain.as_deref());
        }

        builder.build()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Sends one GET request without retrying.
    ///
    /// Non-success statuses are turned into [`Error::BadStatus`].
    pub async fn send(&self, url: &str, referer: Option<&str>) -> Result<Response> {
        let mut request = self.inner.get(url);
        if let Some(referer) = referer {
            request = request.header(REFERER, referer);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(%url, status = status.as_u16(), "GET");

        if !status.is_success() {
            return Err(Error::bad_status(url, status.as_u16()));
        }
        Ok(response)
    }

    /// Performs a GET request with retry and backoff.
    ///
    /// # Errors
    ///
    /// After the attempt budget is spent, the last failure is returned:
    /// [`Error::Network`] for transport errors or [`Error::BadStatus`] for
    /// non-success statuses.
    pub async fn fetch(&self, url: &str, referer: Option<&str>) -> Result<Response> {
        self.retry
            .run("fetch", move |_| self.send(url, referer))
            .await
    }

    /// Performs a GET request and returns the body as text.
    ///
    /// The body is read inside the retried operation, so a connection dropped
    /// mid-body is retried like any other transport failure.
    pub async fn get_text(&self, url: &str, referer: Option<&str>) -> Result<String> {
        self.retry
            .run("fetch", move |_| async move {
                let response = self.send(url, referer).await?;
                Ok(response.text().await?)
            })
            .await
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    retry: RetryPolicy,
    headers: HeaderMap,
    jar: Option<Arc<Jar>>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::fetch_default(),
            headers: HeaderMap::new(),
            jar: None,
        }
    }
}

impl HttpClientBuilder {
    /// Bounds connecting and each read of a response, not the whole
    /// transfer, so long streamed bodies are fine as long as data keeps
    /// arriving.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Adds a default header sent with every request.
    ///
    /// Invalid header names or values are logged and skipped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (name.parse::<HeaderName>(), value.parse::<HeaderValue>()) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => warn!(header = name, "skipping invalid header"),
        }
        self
    }

    /// Seeds the cookie jar.
    ///
    /// The cookie is scoped to its own domain, falling back to
    /// `default_domain`; seeds without any domain are skipped.
    pub fn cookie(mut self, seed: CookieSeed, default_domain: Option<&str>) -> Self {
        let Some(domain) = seed.domain.as_deref().or(default_domain) else {
            warn!(cookie = %seed.name, "skipping cookie without domain");
            return self;
        };
        let host = domain.trim_start_matches('.');
        match Url::parse(&format!("https://{}/", host)) {
            Ok(url) => {
                let jar = self.jar.get_or_insert_with(|| Arc::new(Jar::default()));
                jar.add_cookie_str(
                    &format!("{}={}; Domain={}; Path=/", seed.name, seed.value, domain),
                    &url,
                );
            }
            Err(e) => warn!(cookie = %seed.name, %domain, error = %e, "skipping cookie"),
        }
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        let mut builder = Client::builder()
            .connect_timeout(self.timeout)
            .read_timeout(self.timeout)
            .pool_max_idle_per_host(10)
            .gzip(true)
            .brotli(true)
            .default_headers(self.headers);

        if let Some(jar) = self.jar {
            builder = builder.cookie_provider(jar);
        }

        Ok(HttpClient {
            inner: builder.build()?,
            retry: self.retry,
        })
    }
}

/// Turns config-style header keys into HTTP header names.
///
/// `user_agent` becomes `User-Agent`, `accept-language` becomes
/// `Accept-Language`.
///
/// # Examples
///
/// ```rust
/// use renzoku::net::normalize_header_name;
///
/// assert_eq!(normalize_header_name("user_agent"), "User-Agent");
/// assert_eq!(normalize_header_name("ACCEPT"), "Accept");
/// ```
pub fn normalize_header_name(key: &str) -> String {
    key.replace('_', "-")
        .split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
