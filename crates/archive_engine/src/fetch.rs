use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use archive_logging::{harvest_info, harvest_trace, harvest_warn};
use futures_util::StreamExt;
use rand::seq::IndexedRandom;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, REFERER,
    RETRY_AFTER,
};
use reqwest::StatusCode;
use tokio::sync::Mutex;
use url::Url;

use crate::{FailureKind, FetchError, FetchRequest, FetchResponse, FetchResult};

const FALLBACK_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_page_bytes: u64,
    pub max_binary_bytes: u64,
    /// Accepted by `fetch`; `fetch_binary` takes any type.
    pub allowed_content_types: Vec<String>,
    /// Minimum gap between two requests issued by one client.
    pub min_delay: Duration,
    /// Attempts per call, counting the first one. 429 waits are not counted.
    pub max_retries: u32,
    /// Backoff before retry `n` (0-based) is `backoff_base * 2^n`.
    pub backoff_base: Duration,
    /// Used when a 429 carries no usable `Retry-After`.
    pub default_retry_after: Duration,
    pub max_rate_limit_waits: u32,
    pub session_duration: Duration,
    pub session_requests: u32,
    pub user_agents: Vec<String>,
    pub referer: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_page_bytes: 5 * 1024 * 1024,
            max_binary_bytes: 25 * 1024 * 1024,
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
            min_delay: Duration::from_millis(500),
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            default_retry_after: Duration::from_secs(30),
            max_rate_limit_waits: 10,
            session_duration: Duration::from_secs(300),
            session_requests: 100,
            user_agents: default_user_agents(),
            referer: None,
        }
    }
}

fn default_user_agents() -> Vec<String> {
    [
        FALLBACK_USER_AGENT,
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    ]
    .iter()
    .map(|ua| ua.to_string())
    .collect()
}

/// Suspension point used for throttling and backoff.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches an HTML page.
    async fn fetch(&self, url: &str) -> FetchResult;
    /// Fetches an arbitrary binary such as a scanned page image.
    async fn fetch_binary(&self, url: &str) -> FetchResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Page,
    Binary,
}

enum AttemptError {
    RateLimited { wait: Duration },
    Retryable(FetchError),
    Permanent(FetchError),
}

/// A reserved place in the current session's request budget.
struct Slot {
    client: reqwest::Client,
    generation: u32,
}

/// Connection identity plus throughput bookkeeping. Guarded by the client's
/// mutex: every field is read and written under the lock.
struct Session {
    client: reqwest::Client,
    user_agent: String,
    started: Instant,
    /// Successful requests plus the ones still in flight.
    request_count: u32,
    last_request: Option<Instant>,
    generation: u32,
}

impl Session {
    fn start(settings: &FetchSettings) -> Result<Self, FetchError> {
        let user_agent = pick_user_agent(&settings.user_agents);
        let client = build_client(settings, &user_agent)?;
        Ok(Self {
            client,
            user_agent,
            started: Instant::now(),
            request_count: 0,
            last_request: None,
            generation: 0,
        })
    }

    fn is_worn_out(&self, settings: &FetchSettings) -> bool {
        self.started.elapsed() >= settings.session_duration
            || self.request_count >= settings.session_requests
    }
}

/// Rate-limited, retrying HTTP client shared by all workers of a run.
///
/// Throttle clock, session age and request counter live behind one async
/// mutex; the lock is released before the request goes out.
pub struct FetchClient {
    settings: FetchSettings,
    sleeper: Arc<dyn Sleeper>,
    session: Mutex<Session>,
    rotations: AtomicU32,
}

impl FetchClient {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        Self::with_sleeper(settings, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(
        settings: FetchSettings,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, FetchError> {
        let session = Session::start(&settings)?;
        Ok(Self {
            settings,
            sleeper,
            session: Mutex::new(session),
            rotations: AtomicU32::new(0),
        })
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// How many times the session has been replaced so far.
    pub fn rotations(&self) -> u32 {
        self.rotations.load(Ordering::Relaxed)
    }

    /// Identity string of the current session.
    pub async fn current_user_agent(&self) -> String {
        self.session.lock().await.user_agent.clone()
    }

    /// Waits for the throttle, rotates a worn-out session and reserves a
    /// request in the session budget. The reservation is returned through
    /// `release_slot` unless the request succeeds.
    async fn dispatch_slot(&self) -> Slot {
        let mut session = self.session.lock().await;

        if let Some(last) = session.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.settings.min_delay {
                // Waiting while holding the lock keeps concurrent callers spaced too.
                self.sleeper.sleep(self.settings.min_delay - elapsed).await;
            }
        }

        if session.is_worn_out(&self.settings) {
            match Session::start(&self.settings) {
                Ok(fresh) => {
                    harvest_info!(
                        "Rotating HTTP session after {} requests / {:?}",
                        session.request_count,
                        session.started.elapsed()
                    );
                    let generation = session.generation.wrapping_add(1);
                    *session = Session { generation, ..fresh };
                    self.rotations.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    harvest_warn!("Session rotation failed, keeping current session: {}", err);
                }
            }
        }

        session.last_request = Some(Instant::now());
        session.request_count += 1;
        Slot {
            client: session.client.clone(),
            generation: session.generation,
        }
    }

    async fn record_success(&self) {
        self.session.lock().await.last_request = Some(Instant::now());
    }

    /// Gives back the budget reserved for a request that did not succeed.
    async fn release_slot(&self, slot: &Slot) {
        let mut session = self.session.lock().await;
        if session.generation == slot.generation {
            session.request_count = session.request_count.saturating_sub(1);
        }
    }

    async fn fetch_with_retries(&self, url: &str, kind: BodyKind) -> FetchResult {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(err) => {
                harvest_warn!("Refusing to fetch invalid url {}: {}", url, err);
                return FetchResult::Fatal(FetchError::new(FailureKind::InvalidUrl, err.to_string()));
            }
        };

        let max_retries = self.settings.max_retries.max(1);
        let mut attempt = 0;
        let mut rate_limit_waits = 0;
        let mut last_error = FetchError::new(FailureKind::Network, "no attempt made");

        while attempt < max_retries {
            let request = FetchRequest {
                url: parsed.to_string(),
                attempt,
            };
            let slot = self.dispatch_slot().await;
            let outcome = self.send(&slot.client, &request, kind).await;
            if outcome.is_ok() {
                self.record_success().await;
            } else {
                self.release_slot(&slot).await;
            }

            match outcome {
                Ok(response) => return FetchResult::Ok(response),
                Err(AttemptError::RateLimited { wait }) => {
                    if rate_limit_waits >= self.settings.max_rate_limit_waits {
                        harvest_warn!(
                            "Giving up on {} after {} rate-limit waits",
                            request.url,
                            rate_limit_waits
                        );
                        return FetchResult::Transient(FetchError::new(
                            FailureKind::RateLimited,
                            "rate-limit wait budget exhausted",
                        ));
                    }
                    rate_limit_waits += 1;
                    harvest_warn!("Rate limited on {}. Waiting {:?}", request.url, wait);
                    self.sleeper.sleep(wait).await;
                }
                Err(AttemptError::Permanent(err)) => {
                    harvest_warn!("Request for {} failed permanently: {}", request.url, err);
                    return FetchResult::Fatal(err);
                }
                Err(AttemptError::Retryable(err)) => {
                    harvest_warn!(
                        "Request for {} failed on attempt {}/{}: {}",
                        request.url,
                        attempt + 1,
                        max_retries,
                        err
                    );
                    last_error = err;
                    attempt += 1;
                    if attempt < max_retries {
                        self.sleeper.sleep(self.backoff_delay(attempt - 1)).await;
                    }
                }
            }
        }

        harvest_warn!("Exhausted {} attempts for {}", max_retries, url);
        FetchResult::Transient(last_error)
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.settings.backoff_base * 2u32.saturating_pow(attempt.min(16))
    }

    async fn send(
        &self,
        client: &reqwest::Client,
        request: &FetchRequest,
        kind: BodyKind,
    ) -> Result<FetchResponse, AttemptError> {
        harvest_trace!("GET {} (attempt {})", request.url, request.attempt + 1);
        let response = client
            .get(request.url.as_str())
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let wait = parse_retry_after(response.headers().get(RETRY_AFTER))
                .unwrap_or(self.settings.default_retry_after);
            return Err(AttemptError::RateLimited { wait });
        }
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(AttemptError::Permanent(FetchError::new(
                FailureKind::NotFound(status.as_u16()),
                status.to_string(),
            )));
        }
        if status != StatusCode::OK {
            return Err(AttemptError::Retryable(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            )));
        }

        let max_bytes = match kind {
            BodyKind::Page => self.settings.max_page_bytes,
            BodyKind::Binary => self.settings.max_binary_bytes,
        };
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(AttemptError::Permanent(too_large(max_bytes, content_len)));
            }
        }

        let final_url = response.url().to_string();
        let headers = response.headers().clone();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if kind == BodyKind::Page {
            if let Some(ct) = content_type.as_deref() {
                if !self.is_content_type_allowed(ct) {
                    return Err(AttemptError::Permanent(FetchError::new(
                        FailureKind::UnsupportedContentType {
                            content_type: ct.to_string(),
                        },
                        "unsupported content type",
                    )));
                }
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(classify_transport_error)?;
            let next_len = body.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(AttemptError::Permanent(too_large(max_bytes, next_len)));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchResponse {
            status: status.as_u16(),
            headers,
            final_url,
            content_type,
            body: body.into(),
        })
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }
}

#[async_trait::async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, url: &str) -> FetchResult {
        self.fetch_with_retries(url, BodyKind::Page).await
    }

    async fn fetch_binary(&self, url: &str) -> FetchResult {
        self.fetch_with_retries(url, BodyKind::Binary).await
    }
}

/// Parses a delta-seconds `Retry-After` value. HTTP-date values are treated
/// as unparsable so the caller falls back to its default.
pub fn parse_retry_after(value: Option<&HeaderValue>) -> Option<Duration> {
    value?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn pick_user_agent(pool: &[String]) -> String {
    pool.choose(&mut rand::rng())
        .cloned()
        .unwrap_or_else(|| FALLBACK_USER_AGENT.to_string())
}

fn build_client(settings: &FetchSettings, user_agent: &str) -> Result<reqwest::Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(HeaderName::from_static("dnt"), HeaderValue::from_static("1"));
    if let Some(referer) = settings.referer.as_deref() {
        match HeaderValue::from_str(referer) {
            Ok(value) => {
                headers.insert(REFERER, value);
            }
            Err(err) => harvest_warn!("Ignoring unusable referer {:?}: {}", referer, err),
        }
    }

    reqwest::Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .cookie_store(true)
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
        .build()
        .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
}

fn too_large(max_bytes: u64, actual: u64) -> FetchError {
    FetchError::new(
        FailureKind::TooLarge {
            max_bytes,
            actual: Some(actual),
        },
        "response too large",
    )
}

fn classify_transport_error(err: reqwest::Error) -> AttemptError {
    if err.is_timeout() {
        return AttemptError::Retryable(FetchError::new(FailureKind::Timeout, err.to_string()));
    }
    if err.is_redirect() {
        return AttemptError::Permanent(FetchError::new(
            FailureKind::RedirectLimitExceeded,
            err.to_string(),
        ));
    }
    AttemptError::Retryable(FetchError::new(FailureKind::Network, err.to_string()))
}
