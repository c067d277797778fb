//! Wayback Machine client error types.

use std::sync::Arc;

use crate::retry::{RetryError, Retryable};

/// Errors from the Wayback Machine client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WaybackError {
    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Rate limited by archive.org (HTTP 429).
    #[error("rate limited: too many requests")]
    RateLimited,

    /// Unexpected HTTP status.
    #[error("HTTP error: {status}")]
    HttpStatus { status: u16 },

    /// The save endpoint refused to capture the page.
    #[error("archive.org declined to capture the page (HTTP {status})")]
    Declined { status: u16 },

    /// A redirect from the save endpoint carried no Location header.
    #[error("redirect without a Location header")]
    MissingLocation,

    /// The save endpoint answered without a job id.
    #[error("no job id in save response: {0}")]
    MissingJobId(String),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),

    /// The capture job was still pending after every status poll.
    #[error("capture job {job_id} still pending after {polls} polls")]
    JobPending { job_id: String, polls: u32 },

    /// The capture job ended in a status other than success.
    #[error("capture job {job_id} ended with status {status:?}")]
    JobFailed { job_id: String, status: String },

    /// Every attempt failed; `last` is the final cause.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<WaybackError> },

    /// The caller cancelled the request.
    #[error("cancelled")]
    Cancelled,
}

impl Retryable for WaybackError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_)
            | Self::Timeout
            | Self::RateLimited
            | Self::HttpStatus { .. }
            | Self::MissingLocation
            | Self::MissingJobId(_)
            | Self::Parse(_)
            | Self::JobPending { .. } => true,

            Self::Declined { .. } | Self::JobFailed { .. } | Self::RetriesExhausted { .. } | Self::Cancelled => false,
        }
    }
}

impl WaybackError {
    /// The underlying cause, looking through [`WaybackError::RetriesExhausted`].
    pub fn root(&self) -> &WaybackError {
        match self {
            Self::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }
}

impl From<reqwest::Error> for WaybackError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { WaybackError::Timeout } else { WaybackError::Network(Arc::new(err)) }
    }
}

impl From<RetryError<WaybackError>> for WaybackError {
    fn from(err: RetryError<WaybackError>) -> Self {
        match err {
            RetryError::Exhausted { attempts, last } => WaybackError::RetriesExhausted { attempts, last: Box::new(last) },
            RetryError::Fatal { error, .. } => error,
            RetryError::Cancelled => WaybackError::Cancelled,
        }
    }
}
