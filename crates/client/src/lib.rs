//! Client code for waybot.
//!
//! This crate provides URL extraction, the Wayback Machine client with its
//! retry policy, snapshot history lookups, and the archive orchestrator used
//! by the server.

pub mod archive;
pub mod extract;
pub mod retry;
pub mod wayback;

pub use archive::{Archiver, BatchOutcome, BatchRequest, BatchStatus, Origin, RecordStore, SnapshotService};
pub use extract::{ExtractError, domain_name, extract_urls, original_from_archive_link, with_trailing_slash};
pub use retry::{Backoff, RetryError, Retryable, retry};
pub use wayback::{
    HistoryLookup, ResolvedSnapshot, SaveOutcome, SnapshotHistory, SnapshotSource, WaybackClient, WaybackConfig,
    WaybackError,
};
