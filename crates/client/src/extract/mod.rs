//! URL extraction from free-form message text.
//!
//! - [`extract_urls`] finds absolute http(s) URLs, in order, keeping repeats.
//! - [`domain_name`] derives the display domain of a URL.
//! - [`original_from_archive_link`] and [`with_trailing_slash`] are helpers
//!   for callers re-archiving text that came from a previous archive reply.

pub mod domain;
pub mod urls;

pub use domain::domain_name;
pub use urls::{extract_urls, original_from_archive_link, with_trailing_slash};

/// Errors from URL extraction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    /// The text held no usable URL.
    #[error("no URLs found")]
    NoUrlsFound,

    /// The input could not be parsed as an absolute URL with a host.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}
