//! Rate-limited HTTP fetching.
//!
//! Every request to the blog goes through [`Fetcher`], one at a time. The
//! crawl is deliberately slow: a random 1–3 s pause precedes each request so
//! the traffic looks like a reader paging through the archive, and an HTTP 429
//! parks the crawl for a fixed cooldown before the *same* request is retried.
//!
//! ## Retry postures
//!
//! | Posture | Pacing | 429 | Transient (5xx, timeout) | 4xx |
//! |---------|--------|-----|--------------------------|-----|
//! | [`Posture::Listing`] | yes | cooldown, retry forever | give up | give up |
//! | [`Posture::Item`]    | yes | cooldown, retry forever | retry up to the attempt cap | give up |
//! | [`Posture::Direct`]  | no  | give up (transient) | give up | give up |
//!
//! 429 cooldowns never consume the item attempt budget. The only bound on an
//! endless 429 loop is the run deadline and the cancel handle, both checked
//! before every request and during every sleep.

use crate::config::ExportConfig;
use crate::error::{Blog2DocError, FetchError};
use rand::Rng;
use reqwest::cookie::Jar;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Which retry policy a request runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Posture {
    /// Listing pages: paced, unbounded 429 backoff, any other failure ends pagination.
    Listing,
    /// Individual post pages: paced, unbounded 429 backoff, bounded transient retries.
    Item,
    /// Image downloads: single unpaced attempt.
    Direct,
}

impl Posture {
    fn paced(self) -> bool {
        !matches!(self, Posture::Direct)
    }

    fn backs_off(self) -> bool {
        !matches!(self, Posture::Direct)
    }
}

/// A successful response.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// One try at a URL. Only ever logged.
#[derive(Debug, Clone)]
struct FetchAttempt<'a> {
    url: &'a str,
    attempt_number: u32,
    status: Option<u16>,
}

impl fmt::Display for FetchAttempt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(s) => write!(f, "{} attempt {} → HTTP {}", self.url, self.attempt_number, s),
            None => write!(f, "{} attempt {} → no response", self.url, self.attempt_number),
        }
    }
}

enum Outcome {
    Done(FetchResponse),
    RateLimited,
    Failed(FetchError),
}

// ── Cancellation ─────────────────────────────────────────────────────────

/// Shared cancellation flag, cheap to clone.
///
/// Triggering it makes every subsequent fetch (and any in-progress pacing or
/// cooldown sleep) return [`FetchError::Cancelled`].
#[derive(Clone, Default)]
pub struct CancelHandle {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// ── Statistics ───────────────────────────────────────────────────────────

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    rate_limited: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
}

/// Snapshot of the fetcher's request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStats {
    /// HTTP requests actually sent.
    pub requests: u64,
    /// 429 responses that triggered a cooldown.
    pub rate_limited: u64,
    /// Transient failures that were retried.
    pub retries: u64,
    /// Requests that ended in an error.
    pub failures: u64,
}

// ── Fetcher ──────────────────────────────────────────────────────────────

/// Sequential, paced HTTP client shared by adapters and the image rewriter.
///
/// Cloning shares the underlying connection pool, counters and deadline.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    jitter_min: Duration,
    jitter_max: Duration,
    cooldown: Duration,
    max_attempts: u32,
    cancel: CancelHandle,
    deadline: Option<(Instant, Duration)>,
    counters: Arc<Counters>,
}

impl Fetcher {
    /// Build an anonymous fetcher from the export configuration.
    pub fn new(config: &ExportConfig) -> Result<Self, Blog2DocError> {
        Self::build(config, None)
    }

    /// Build a fetcher that attaches `cookies` to requests for `scope`'s host.
    ///
    /// Host-only cookies: image CDNs and other hosts never see them.
    pub fn with_cookies(
        config: &ExportConfig,
        scope: &Url,
        cookies: &[(&str, &str)],
    ) -> Result<Self, Blog2DocError> {
        let jar = Jar::default();
        for (name, value) in cookies {
            jar.add_cookie_str(&format!("{name}={value}; Path=/"), scope);
        }
        Self::build(config, Some(Arc::new(jar)))
    }

    fn build(config: &ExportConfig, jar: Option<Arc<Jar>>) -> Result<Self, Blog2DocError> {
        let mut builder = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone());
        if let Some(jar) = jar {
            builder = builder.cookie_provider(jar);
        }
        let client = builder
            .build()
            .map_err(|e| Blog2DocError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            jitter_min: config.jitter_min,
            jitter_max: config.jitter_max,
            cooldown: config.rate_limit_cooldown,
            max_attempts: config.item_max_attempts,
            cancel: config.cancel.clone(),
            deadline: config.run_deadline.map(|d| (Instant::now() + d, d)),
            counters: Arc::new(Counters::default()),
        })
    }

    /// Current request counters.
    pub fn stats(&self) -> FetchStats {
        FetchStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            rate_limited: self.counters.rate_limited.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// GET `url` under the given retry posture.
    pub async fn fetch(&self, url: &str, posture: Posture) -> Result<FetchResponse, FetchError> {
        let max_attempts = match posture {
            Posture::Item => self.max_attempts,
            Posture::Listing | Posture::Direct => 1,
        };
        let mut failed_attempts = 0u32;
        let mut attempt_number = 0u32;

        loop {
            self.check_run(url)?;
            if posture.paced() {
                self.pace(url).await?;
            }
            attempt_number += 1;

            match self.send_once(url).await {
                Outcome::Done(response) => {
                    debug!(
                        "{}",
                        FetchAttempt {
                            url,
                            attempt_number,
                            status: Some(response.status),
                        }
                    );
                    return Ok(response);
                }
                Outcome::RateLimited if posture.backs_off() => {
                    self.counters.rate_limited.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        "Rate limited on {}; sleeping {}s before retrying",
                        url,
                        self.cooldown.as_secs()
                    );
                    self.sleep_checked(url, self.cooldown).await?;
                }
                Outcome::RateLimited => {
                    self.counters.failures.fetch_add(1, Ordering::Relaxed);
                    return Err(FetchError::Transient {
                        url: url.to_string(),
                        reason: "HTTP 429".into(),
                    });
                }
                Outcome::Failed(err) => {
                    failed_attempts += 1;
                    if err.is_retryable() && failed_attempts < max_attempts {
                        self.counters.retries.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            "{} failed (attempt {}/{}): {}",
                            url, failed_attempts, max_attempts, err
                        );
                        continue;
                    }
                    self.counters.failures.fetch_add(1, Ordering::Relaxed);
                    return Err(err);
                }
            }
        }
    }

    /// Issue exactly one request and classify the outcome.
    async fn send_once(&self, url: &str) -> Outcome {
        self.counters.requests.fetch_add(1, Ordering::Relaxed);

        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                return Outcome::Failed(FetchError::Transient {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Outcome::RateLimited;
        }
        if status.is_client_error() {
            return Outcome::Failed(FetchError::Permanent {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Outcome::Failed(FetchError::Transient {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        match response.bytes().await {
            Ok(body) => Outcome::Done(FetchResponse {
                status: status.as_u16(),
                body: body.to_vec(),
            }),
            Err(e) => Outcome::Failed(FetchError::Transient {
                url: url.to_string(),
                reason: format!("reading body: {e}"),
            }),
        }
    }

    /// Sleep a uniformly random duration in `[jitter_min, jitter_max]`.
    async fn pace(&self, url: &str) -> Result<(), FetchError> {
        let min = self.jitter_min.as_millis() as u64;
        let max = self.jitter_max.as_millis() as u64;
        let millis = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        if millis == 0 {
            return Ok(());
        }
        self.sleep_checked(url, Duration::from_millis(millis)).await
    }

    fn check_run(&self, url: &str) -> Result<(), FetchError> {
        if self.cancel.is_cancelled() {
            return Err(FetchError::Cancelled {
                url: url.to_string(),
            });
        }
        if let Some((deadline, _)) = self.deadline {
            if Instant::now() >= deadline {
                return Err(FetchError::DeadlineExceeded {
                    url: url.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Sleep that wakes early on cancellation and never outlives the deadline.
    async fn sleep_checked(&self, url: &str, duration: Duration) -> Result<(), FetchError> {
        let wake = Instant::now() + duration;
        let (until, hits_deadline) = match self.deadline {
            Some((deadline, _)) if deadline < wake => (deadline, true),
            _ => (wake, false),
        };

        tokio::select! {
            _ = tokio::time::sleep_until(until) => {}
            _ = self.cancel.cancelled() => {
                return Err(FetchError::Cancelled { url: url.to_string() });
            }
        }

        if hits_deadline {
            if let Some((_, total)) = self.deadline {
                info!("Run deadline of {}s reached while waiting on {}", total.as_secs(), url);
            }
            return Err(FetchError::DeadlineExceeded {
                url: url.to_string(),
            });
        }
        Ok(())
    }

    /// Configured run deadline, if any.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline.map(|(_, total)| total)
    }
}
