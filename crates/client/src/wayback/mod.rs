//! Wayback Machine client.
//!
//! Resolves a URL to a permanent snapshot URL on archive.org, and reads the
//! per-URL capture history used for reply details.
//!
//! ### Protocol
//!
//! - **Availability**: `GET {api}/wayback/available?url=` reports the closest
//!   existing snapshot. Skipped when a fresh capture is wanted.
//! - **Save**: `POST {api}/save/?capture_all=1&url=` with the session cookie.
//!   A 301/302 answers immediately with the snapshot in `Location`, 520/523
//!   means archive.org declined the capture, otherwise the body carries a
//!   `job_id`.
//! - **Status**: `GET {api}/save/status/{job_id}` is polled with exponential
//!   backoff while the job is `pending`; `success` plus a timestamp yields
//!   `{archive_root}/{timestamp}/{url}`.
//! - **Sparkline**: `GET {api}/__wb/sparkline/?collection=web&output=json&url=`
//!   returns the capture histogram.
//!
//! The availability/save sequence is retried with a fixed delay, up to the
//! server's retry budget. Every call goes through a shared rate limiter.

pub mod error;
pub mod history;
pub mod response;

pub use error::WaybackError;
pub use history::{HistoryLookup, SnapshotHistory, parse_timestamp};

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use url::{Url, form_urlencoded};
use waybot_core::{AppConfig, RetryPolicy};

use crate::extract::domain_name;
use crate::retry::{Backoff, RetryError, retry};
use response::{AvailabilityResponse, JobState, JobStatusResponse, SaveResponse, SparklineResponse};

/// Default archive API base URL.
const DEFAULT_API_BASE_URL: &str = "https://wwwb-api.archive.org";

/// Default root for snapshot URLs.
const DEFAULT_ARCHIVE_ROOT: &str = "https://web.archive.org/web";

/// Save endpoint statuses meaning archive.org refused the capture.
const DECLINE_STATUSES: [u16; 2] = [520, 523];

/// Wayback client configuration.
#[derive(Debug, Clone)]
pub struct WaybackConfig {
    /// API base URL (default: https://wwwb-api.archive.org).
    pub api_base_url: String,
    /// Root snapshot URLs are built on (default: https://web.archive.org/web).
    pub archive_root: String,
    /// Session cookie sent with save requests.
    pub cookie: Option<String>,
    pub user_agent: String,
    /// Per-call timeout (default: 20s).
    pub timeout: Duration,
    /// Minimum spacing between calls (default: 1s).
    pub min_request_interval: Duration,
    /// Fixed delay between outer attempts (default: 1s).
    pub retry_delay: Duration,
    /// First delay between status polls (default: 1s).
    pub poll_base_delay: Duration,
    /// Cap on the delay between status polls (default: 30s).
    pub poll_max_delay: Duration,
    /// Status polls per job (default: 40).
    pub poll_max_attempts: u32,
}

impl Default for WaybackConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            archive_root: DEFAULT_ARCHIVE_ROOT.to_string(),
            cookie: None,
            user_agent: concat!("waybot/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(20),
            min_request_interval: Duration::from_secs(1),
            retry_delay: Duration::from_secs(1),
            poll_base_delay: Duration::from_secs(1),
            poll_max_delay: Duration::from_secs(30),
            poll_max_attempts: 40,
        }
    }
}

impl From<&AppConfig> for WaybackConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            api_base_url: config.api_base_url.clone(),
            archive_root: config.archive_root.clone(),
            cookie: config.cookie.clone().filter(|c| !c.is_empty()),
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            min_request_interval: config.min_request_interval(),
            retry_delay: config.retry_delay(),
            poll_base_delay: config.poll_base_delay(),
            poll_max_delay: config.poll_max_delay(),
            poll_max_attempts: config.poll_max_attempts,
        }
    }
}

/// Rate limiter to enforce request intervals.
#[derive(Debug)]
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self { last_request: Mutex::new(None), min_interval }
    }

    /// Wait until at least `min_interval` has passed since the previous call.
    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// How a snapshot URL was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSource {
    /// An existing capture reported by the availability check.
    Existing,
    /// The save endpoint redirected straight to a capture.
    Redirect,
    /// A capture job finished successfully.
    Job,
}

/// A URL resolved to its snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSnapshot {
    /// Snapshot URL, always `https://` on the archive host.
    pub url: String,
    /// Display domain of the snapshot URL.
    pub domain: String,
    pub source: SnapshotSource,
}

/// Result of a save request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// archive.org redirected to an existing or just-made capture.
    Snapshot(String),
    /// A capture job was queued.
    Job(String),
}

/// Wayback Machine client.
#[derive(Debug, Clone)]
pub struct WaybackClient {
    http: reqwest::Client,
    config: WaybackConfig,
    rate_limiter: Arc<RateLimiter>,
}

impl WaybackClient {
    /// Create a new client with the given configuration.
    pub fn new(config: WaybackConfig) -> Result<Self, WaybackError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WaybackError::Network(Arc::new(e)))?;

        let rate_limiter = Arc::new(RateLimiter::new(config.min_request_interval));
        Ok(Self { http, config, rate_limiter })
    }

    pub fn config(&self) -> &WaybackConfig {
        &self.config
    }

    /// Snapshot URL for a capture taken at `timestamp`.
    pub fn snapshot_url(&self, timestamp: &str, original_url: &str) -> String {
        format!("{}/{}/{}", self.config.archive_root, timestamp, original_url)
    }

    /// Resolve `url` to a snapshot, retrying per `policy`.
    ///
    /// With `fresh` (or `policy.always_snapshot_first`) the availability
    /// check is skipped and a new capture is always requested.
    pub async fn resolve(
        &self, url: &str, policy: &RetryPolicy, fresh: bool, cancel: &CancellationToken,
    ) -> Result<ResolvedSnapshot, WaybackError> {
        let skip_availability = fresh || policy.always_snapshot_first;
        let start = Instant::now();

        let snapshot = retry(policy.tries(), Backoff::Fixed(self.config.retry_delay), cancel, |attempt| {
            tracing::debug!(url, attempt, skip_availability, "resolving snapshot");
            self.resolve_once(url, skip_availability, cancel)
        })
        .await?;

        tracing::info!(
            url,
            snapshot = %snapshot.url,
            source = ?snapshot.source,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "resolved"
        );
        Ok(snapshot)
    }

    async fn resolve_once(
        &self, url: &str, skip_availability: bool, cancel: &CancellationToken,
    ) -> Result<ResolvedSnapshot, WaybackError> {
        let (raw, source) = self.find_snapshot(url, skip_availability, cancel).await?;
        let snapshot = self.archive_url(&raw)?;
        let domain = domain_name(&snapshot).map_err(|e| WaybackError::Parse(e.to_string()))?;
        Ok(ResolvedSnapshot { url: snapshot, domain, source })
    }

    async fn find_snapshot(
        &self, url: &str, skip_availability: bool, cancel: &CancellationToken,
    ) -> Result<(String, SnapshotSource), WaybackError> {
        if !skip_availability && let Some(existing) = self.check_availability(url).await? {
            return Ok((existing, SnapshotSource::Existing));
        }

        match self.request_save(url).await? {
            SaveOutcome::Snapshot(location) => Ok((location, SnapshotSource::Redirect)),
            SaveOutcome::Job(job_id) => {
                let snapshot = self.wait_for_job(&job_id, url, cancel).await?;
                Ok((snapshot, SnapshotSource::Job))
            }
        }
    }

    /// Absolute `https://` form of a snapshot link on the archive host.
    ///
    /// Path-absolute links (`/web/...`) are joined onto `archive_root`.
    /// Anything else that is not an absolute URL on the same host as
    /// `archive_root` is a [`WaybackError::Parse`].
    pub fn archive_url(&self, raw: &str) -> Result<String, WaybackError> {
        let root = Url::parse(&self.config.archive_root)
            .map_err(|e| WaybackError::Parse(format!("archive root {:?}: {e}", self.config.archive_root)))?;
        let raw = raw.trim();

        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) if raw.starts_with('/') && !raw.starts_with("//") => {
                root.join(raw).map_err(|e| WaybackError::Parse(format!("snapshot link {raw:?}: {e}")))?
            }
            Err(e) => return Err(WaybackError::Parse(format!("snapshot link {raw:?}: {e}"))),
        };

        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() || url.host_str() != root.host_str() {
            return Err(WaybackError::Parse(format!("snapshot link {raw:?} is not on {}", root.as_str())));
        }

        Ok(force_https(url.as_str()))
    }

    /// Closest existing snapshot of `url`, if any.
    pub async fn check_availability(&self, url: &str) -> Result<Option<String>, WaybackError> {
        let endpoint = format!("{}/wayback/available", self.config.api_base_url);
        let resp: AvailabilityResponse = self.get_json(&endpoint, &[("url", url)]).await?;
        Ok(resp.snapshot_url().map(str::to_string))
    }

    /// Ask archive.org to capture `url`.
    pub async fn request_save(&self, url: &str) -> Result<SaveOutcome, WaybackError> {
        self.rate_limiter.acquire().await;

        let encoded: String = form_urlencoded::byte_serialize(url.as_bytes()).collect();
        let endpoint = format!("{}/save/?capture_all=1&url={encoded}", self.config.api_base_url);

        let mut request = self
            .http
            .post(&endpoint)
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(format!("capture_all=1&url={encoded}"));
        if let Some(cookie) = &self.config.cookie {
            request = request.header(header::COOKIE, cookie);
        }

        let resp = request.send().await?;
        let status = resp.status();
        tracing::debug!(url, %status, "save response");

        if status == reqwest::StatusCode::MOVED_PERMANENTLY || status == reqwest::StatusCode::FOUND {
            let location = resp
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .ok_or(WaybackError::MissingLocation)?;
            return Ok(SaveOutcome::Snapshot(location.to_string()));
        }
        if DECLINE_STATUSES.contains(&status.as_u16()) {
            return Err(WaybackError::Declined { status: status.as_u16() });
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(WaybackError::RateLimited);
        }

        let bytes = resp.bytes().await?;
        match serde_json::from_slice::<SaveResponse>(&bytes) {
            Ok(SaveResponse { job_id: Some(job_id), .. }) if !job_id.is_empty() => Ok(SaveOutcome::Job(job_id)),
            Ok(SaveResponse { message, .. }) => Err(WaybackError::MissingJobId(
                message.unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned()),
            )),
            Err(_) if !status.is_success() => Err(WaybackError::HttpStatus { status: status.as_u16() }),
            Err(e) => Err(WaybackError::Parse(e.to_string())),
        }
    }

    /// Current status of a capture job.
    pub async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, WaybackError> {
        let endpoint = format!("{}/save/status/{job_id}", self.config.api_base_url);
        self.get_json(&endpoint, &[]).await
    }

    /// Poll a capture job until it finishes, backing off between polls.
    ///
    /// Transient poll failures count as polls and are retried. A job still
    /// pending after `poll_max_attempts` polls yields
    /// [`WaybackError::JobPending`].
    pub async fn wait_for_job(
        &self, job_id: &str, original_url: &str, cancel: &CancellationToken,
    ) -> Result<String, WaybackError> {
        let backoff = Backoff::Exponential { base: self.config.poll_base_delay, max: self.config.poll_max_delay };

        let result = retry(self.config.poll_max_attempts, backoff, cancel, |poll| async move {
            let status = self.job_status(job_id).await?;
            match status.state() {
                JobState::Pending => Err(WaybackError::JobPending { job_id: job_id.to_string(), polls: poll }),
                JobState::Success { timestamp: Some(ts) } => Ok(self.snapshot_url(&ts, original_url)),
                JobState::Success { timestamp: None } => {
                    Err(WaybackError::Parse(format!("job {job_id} succeeded without a timestamp")))
                }
                JobState::Other(state) => {
                    tracing::warn!(job_id, state = %state, ext = ?status.status_ext, "capture job failed");
                    Err(WaybackError::JobFailed { job_id: job_id.to_string(), status: state })
                }
            }
        })
        .await;

        match result {
            Ok(snapshot) => Ok(snapshot),
            Err(RetryError::Exhausted { attempts, last: WaybackError::JobPending { .. } }) => {
                Err(WaybackError::JobPending { job_id: job_id.to_string(), polls: attempts })
            }
            Err(RetryError::Exhausted { last, .. }) => Err(last),
            Err(other) => Err(other.into()),
        }
    }

    /// Capture history of `url`. Never fails; problems become
    /// [`HistoryLookup::Unavailable`].
    pub async fn history(&self, url: &str) -> HistoryLookup {
        let endpoint = format!("{}/__wb/sparkline/", self.config.api_base_url);
        let query = [("collection", "web"), ("output", "json"), ("url", url)];

        match self.get_json::<SparklineResponse>(&endpoint, &query).await {
            Ok(raw) => {
                let lookup = HistoryLookup::from(raw);
                if let HistoryLookup::Unavailable { reason } = &lookup {
                    tracing::debug!(url, reason = %reason, "history unavailable");
                }
                lookup
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "unable to fetch snapshot history");
                HistoryLookup::unavailable(e.to_string())
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T, WaybackError> {
        self.rate_limiter.acquire().await;

        let resp = self
            .http
            .get(endpoint)
            .header(header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(WaybackError::RateLimited);
        }
        if !status.is_success() {
            return Err(WaybackError::HttpStatus { status: status.as_u16() });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| WaybackError::Parse(e.to_string()))
    }
}

/// archive.org sometimes hands back `http://` snapshot links.
fn force_https(url: &str) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}
