//! Archive orchestrator.
//!
//! Turns a batch of URLs into ordered archive records:
//!
//! 1. Cache lookup per URL against previously resolved records (skipped
//!    for fresh requests).
//! 2. A [`SnapshotService`] resolve for every miss. A failure fills that
//!    URL's error slot and the rest of the batch carries on.
//! 3. A history lookup for every resolved URL.
//! 4. One batch insert of all records through the [`RecordStore`].
//!
//! The outcome holds plain data; rendering is the caller's job.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use waybot_core::{ArchiveDb, ArchiveRecord, RetryPolicy};

use crate::extract::domain_name;
use crate::wayback::{HistoryLookup, ResolvedSnapshot, WaybackClient, WaybackError};

/// Persistence used by the orchestrator.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Newest originally-resolved record for an exact request URL.
    async fn latest_resolved(&self, request_url: &str) -> Result<Option<ArchiveRecord>, waybot_core::Error>;

    /// Insert a whole batch, all or nothing. Returns the rows written.
    async fn insert_records(&self, records: &[ArchiveRecord]) -> Result<usize, waybot_core::Error>;
}

#[async_trait::async_trait]
impl RecordStore for ArchiveDb {
    async fn latest_resolved(&self, request_url: &str) -> Result<Option<ArchiveRecord>, waybot_core::Error> {
        ArchiveDb::latest_resolved(self, request_url).await
    }

    async fn insert_records(&self, records: &[ArchiveRecord]) -> Result<usize, waybot_core::Error> {
        ArchiveDb::insert_records(self, records).await
    }
}

/// Snapshot resolution and history, normally backed by the Wayback Machine.
#[async_trait::async_trait]
pub trait SnapshotService: Send + Sync {
    async fn resolve(
        &self, url: &str, policy: &RetryPolicy, fresh: bool, cancel: &CancellationToken,
    ) -> Result<ResolvedSnapshot, WaybackError>;

    async fn history(&self, url: &str) -> HistoryLookup;
}

#[async_trait::async_trait]
impl SnapshotService for WaybackClient {
    async fn resolve(
        &self, url: &str, policy: &RetryPolicy, fresh: bool, cancel: &CancellationToken,
    ) -> Result<ResolvedSnapshot, WaybackError> {
        WaybackClient::resolve(self, url, policy, fresh, cancel).await
    }

    async fn history(&self, url: &str) -> HistoryLookup {
        WaybackClient::history(self, url).await
    }
}

/// Where a batch came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    /// `None` for direct messages.
    pub server_id: Option<String>,
    pub server_name: String,
}

impl Origin {
    pub fn direct_message() -> Self {
        Self { server_id: None, server_name: "DM".to_string() }
    }
}

/// URLs to archive, in the order they should come back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchRequest {
    pub urls: Vec<String>,
    /// Ignore cached records and ask for a new capture.
    pub fresh: bool,
}

/// Overall shape of a batch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// The request held no URLs.
    NoUrls,
    /// Not a single URL resolved; usually rate limiting.
    NoneResolved,
    Partial,
    Complete,
}

/// Result of [`Archiver::archive`].
///
/// `records`, `errors` and `histories` are parallel to the request's URLs.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub group_id: String,
    pub records: Vec<ArchiveRecord>,
    pub errors: Vec<Option<WaybackError>>,
    pub histories: Vec<HistoryLookup>,
    /// Number of records with a snapshot URL.
    pub resolved: usize,
    /// Set when the batch insert failed; results are still valid.
    pub persist_error: Option<String>,
}

impl BatchOutcome {
    pub fn status(&self) -> BatchStatus {
        match (self.records.len(), self.resolved) {
            (0, _) => BatchStatus::NoUrls,
            (_, 0) => BatchStatus::NoneResolved,
            (total, resolved) if resolved < total => BatchStatus::Partial,
            _ => BatchStatus::Complete,
        }
    }

    /// Record, error slot and history of each URL, in request order.
    pub fn entries(&self) -> impl Iterator<Item = (&ArchiveRecord, Option<&WaybackError>, &HistoryLookup)> {
        self.records
            .iter()
            .zip(&self.errors)
            .zip(&self.histories)
            .map(|((record, error), history)| (record, error.as_ref(), history))
    }
}

/// Batch archiver over a snapshot service and a record store.
#[derive(Debug, Clone)]
pub struct Archiver<S, R> {
    service: S,
    store: R,
}

impl<S: SnapshotService, R: RecordStore> Archiver<S, R> {
    pub fn new(service: S, store: R) -> Self {
        Self { service, store }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    /// Archive every URL in `request`, sequentially and in order.
    pub async fn archive(
        &self, request: &BatchRequest, origin: &Origin, policy: &RetryPolicy, cancel: &CancellationToken,
    ) -> BatchOutcome {
        let group_id = uuid::Uuid::new_v4().to_string();
        let count = request.urls.len();

        let mut records = Vec::with_capacity(count);
        let mut errors = Vec::with_capacity(count);
        let mut histories = Vec::with_capacity(count);

        for url in &request.urls {
            let mut record = ArchiveRecord::pending(
                &group_id,
                origin.server_id.as_deref(),
                &origin.server_name,
                url,
                domain_name(url).ok(),
            );

            if !request.fresh {
                self.apply_cache(&mut record).await;
            }

            let mut error = None;
            if !record.is_resolved() {
                match self.service.resolve(url, policy, request.fresh, cancel).await {
                    Ok(snapshot) => {
                        record.response_url = Some(snapshot.url);
                        record.response_domain = Some(snapshot.domain);
                    }
                    Err(e) => {
                        tracing::warn!(url = %url, group_id = %group_id, error = %e, "unable to archive url");
                        error = Some(e);
                    }
                }
            }

            let history = if record.is_resolved() {
                self.service.history(url).await
            } else {
                HistoryLookup::unavailable("url was not archived")
            };

            records.push(record);
            errors.push(error);
            histories.push(history);
        }

        let resolved = records.iter().filter(|r| r.is_resolved()).count();
        let persist_error = self.persist(&records).await;

        tracing::info!(
            group_id = %group_id,
            urls = count,
            resolved,
            cached = records.iter().filter(|r| r.from_cache).count(),
            "archive batch finished"
        );

        BatchOutcome { group_id, records, errors, histories, resolved, persist_error }
    }

    async fn apply_cache(&self, record: &mut ArchiveRecord) {
        match self.store.latest_resolved(&record.request_url).await {
            Ok(Some(previous)) => {
                tracing::debug!(url = %record.request_url, from = %previous.id, "cache hit");
                record.satisfy_from(&previous);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(url = %record.request_url, error = %e, "cache lookup failed, treating as miss"),
        }
    }

    async fn persist(&self, records: &[ArchiveRecord]) -> Option<String> {
        if records.is_empty() {
            return None;
        }
        match self.store.insert_records(records).await {
            Ok(written) => {
                tracing::debug!(written, "archive records stored");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "unable to store archive records");
                Some(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wayback::{SnapshotHistory, SnapshotSource, parse_timestamp};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Scripted service: URLs containing "fail" error out, the rest resolve.
    #[derive(Default)]
    struct FakeService {
        resolved: Mutex<Vec<(String, bool)>>,
        histories: Mutex<Vec<String>>,
    }

    impl FakeService {
        fn resolve_calls(&self) -> Vec<(String, bool)> {
            self.resolved.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl SnapshotService for FakeService {
        async fn resolve(
            &self, url: &str, _policy: &RetryPolicy, fresh: bool, _cancel: &CancellationToken,
        ) -> Result<ResolvedSnapshot, WaybackError> {
            self.resolved.lock().unwrap().push((url.to_string(), fresh));
            if url.contains("fail") {
                return Err(WaybackError::RetriesExhausted { attempts: 1, last: Box::new(WaybackError::RateLimited) });
            }
            Ok(ResolvedSnapshot {
                url: format!("https://web.archive.org/web/20240101000000/{url}"),
                domain: "web.archive.org".to_string(),
                source: SnapshotSource::Job,
            })
        }

        async fn history(&self, url: &str) -> HistoryLookup {
            self.histories.lock().unwrap().push(url.to_string());
            let ts = parse_timestamp("20240101000000").unwrap();
            let mut years = BTreeMap::new();
            years.insert(2024, [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
            HistoryLookup::Available(SnapshotHistory {
                first_ts: "20240101000000".into(),
                last_ts: "20240101000000".into(),
                first: ts,
                last: ts,
                years,
            })
        }
    }

    struct BrokenStore;

    #[async_trait::async_trait]
    impl RecordStore for BrokenStore {
        async fn latest_resolved(&self, _request_url: &str) -> Result<Option<ArchiveRecord>, waybot_core::Error> {
            Err(waybot_core::Error::NotFound("store offline".into()))
        }

        async fn insert_records(&self, records: &[ArchiveRecord]) -> Result<usize, waybot_core::Error> {
            Err(waybot_core::Error::RowCountMismatch { expected: records.len(), actual: 0 })
        }
    }

    fn origin() -> Origin {
        Origin { server_id: Some("srv-1".into()), server_name: "Test Server".into() }
    }

    fn request(urls: &[&str], fresh: bool) -> BatchRequest {
        BatchRequest { urls: urls.iter().map(|u| u.to_string()).collect(), fresh }
    }

    async fn seeded_db(url: &str, response: &str) -> ArchiveDb {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let mut record = ArchiveRecord::pending("seed", Some("srv-1"), "Test Server", url, Some("example.com".into()));
        record.response_url = Some(response.to_string());
        record.response_domain = Some("web.archive.org".to_string());
        db.insert_records(&[record]).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_cache_hit_skips_service() {
        let url = "https://example.com/a";
        let cached = "https://web.archive.org/web/20200101000000/https://example.com/a";
        let archiver = Archiver::new(FakeService::default(), seeded_db(url, cached).await);

        let outcome = archiver
            .archive(&request(&[url], false), &origin(), &RetryPolicy::default(), &CancellationToken::new())
            .await;

        assert!(archiver.service().resolve_calls().is_empty());
        let record = &outcome.records[0];
        assert!(record.from_cache);
        assert_eq!(record.response_url.as_deref(), Some(cached));
        assert_eq!(record.response_domain.as_deref(), Some("web.archive.org"));
        assert!(outcome.errors[0].is_none());
        assert_eq!(outcome.status(), BatchStatus::Complete);
    }

    #[tokio::test]
    async fn test_fresh_request_bypasses_cache() {
        let url = "https://example.com/a";
        let cached = "https://web.archive.org/web/20200101000000/https://example.com/a";
        let archiver = Archiver::new(FakeService::default(), seeded_db(url, cached).await);

        let outcome = archiver
            .archive(&request(&[url], true), &origin(), &RetryPolicy::default(), &CancellationToken::new())
            .await;

        assert_eq!(archiver.service().resolve_calls(), vec![(url.to_string(), true)]);
        let record = &outcome.records[0];
        assert!(!record.from_cache);
        assert_eq!(
            record.response_url.as_deref(),
            Some("https://web.archive.org/web/20240101000000/https://example.com/a")
        );
    }

    #[tokio::test]
    async fn test_order_and_lengths_preserved() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let archiver = Archiver::new(FakeService::default(), db.clone());
        let urls = ["https://one.example/", "https://fail.example/", "https://www.three.example/x"];

        let outcome = archiver
            .archive(&request(&urls, false), &origin(), &RetryPolicy::default(), &CancellationToken::new())
            .await;

        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.errors.len(), 3);
        assert_eq!(outcome.histories.len(), 3);
        let requested: Vec<_> = outcome.records.iter().map(|r| r.request_url.as_str()).collect();
        assert_eq!(requested, urls);
        assert_eq!(outcome.records[2].request_domain.as_deref(), Some("three.example"));

        assert!(outcome.errors[0].is_none());
        assert!(matches!(outcome.errors[1].as_ref().map(WaybackError::root), Some(WaybackError::RateLimited)));
        assert!(outcome.records[1].response_url.is_none());
        assert!(outcome.histories[1].history().is_none());
        assert_eq!(*archiver.service().histories.lock().unwrap(), vec![urls[0], urls[2]]);

        assert_eq!(outcome.resolved, 2);
        assert_eq!(outcome.status(), BatchStatus::Partial);
        assert!(outcome.persist_error.is_none());

        let stored = db.group_records(&outcome.group_id).await.unwrap();
        assert_eq!(stored.len(), 3);
        assert!(outcome.records.iter().all(|r| r.group_id == outcome.group_id));
    }

    #[tokio::test]
    async fn test_none_resolved() {
        let archiver = Archiver::new(FakeService::default(), ArchiveDb::open_in_memory().await.unwrap());
        let outcome = archiver
            .archive(
                &request(&["https://fail.example/1", "https://fail.example/2"], false),
                &origin(),
                &RetryPolicy::default(),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.resolved, 0);
        assert_eq!(outcome.status(), BatchStatus::NoneResolved);
        assert!(outcome.errors.iter().all(Option::is_some));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let archiver = Archiver::new(FakeService::default(), db);
        let outcome = archiver
            .archive(&BatchRequest::default(), &origin(), &RetryPolicy::default(), &CancellationToken::new())
            .await;

        assert_eq!(outcome.status(), BatchStatus::NoUrls);
        assert!(outcome.persist_error.is_none());
    }

    #[tokio::test]
    async fn test_store_failures_keep_results() {
        let archiver = Archiver::new(FakeService::default(), BrokenStore);
        let outcome = archiver
            .archive(
                &request(&["https://example.com/"], false),
                &Origin::direct_message(),
                &RetryPolicy::default(),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(archiver.service().resolve_calls().len(), 1);
        assert_eq!(outcome.status(), BatchStatus::Complete);
        assert!(outcome.records[0].server_id.is_none());
        assert!(outcome.persist_error.unwrap().contains("DB_ERROR"));
    }
}
