//! Archive record persistence.
//!
//! One [`ArchiveRecord`] is written per URL per request batch. Records are
//! append-only; the cache lookup reads back the newest originally-resolved
//! record for an exact request URL.

use super::connection::ArchiveDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

const RECORD_COLUMNS: &str = "id, group_id, server_id, server_name, request_url, request_domain,
     response_url, response_domain, from_cache, created_at";

/// A single URL-to-snapshot mapping produced by one archive request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ArchiveRecord {
    pub id: String,
    /// Shared by every record produced from the same user action.
    pub group_id: String,
    pub server_id: Option<String>,
    pub server_name: String,
    pub request_url: String,
    pub request_domain: Option<String>,
    /// Snapshot URL on the archive host; `None` until resolution succeeds.
    pub response_url: Option<String>,
    pub response_domain: Option<String>,
    /// True when the response was copied from an earlier record instead of
    /// a fresh call to the archive service.
    pub from_cache: bool,
    pub created_at: String,
}

impl ArchiveRecord {
    /// Create an unresolved record for `request_url`.
    pub fn pending(
        group_id: &str, server_id: Option<&str>, server_name: &str, request_url: &str, request_domain: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            server_id: server_id.map(str::to_string),
            server_name: server_name.to_string(),
            request_url: request_url.to_string(),
            request_domain,
            response_url: None,
            response_domain: None,
            from_cache: false,
            created_at: super::timestamp_now(),
        }
    }

    /// Whether a snapshot URL has been filled in.
    pub fn is_resolved(&self) -> bool {
        self.response_url.as_deref().is_some_and(|url| !url.is_empty())
    }

    /// Mark this record as satisfied by `source`, copying its response verbatim.
    pub fn satisfy_from(&mut self, source: &ArchiveRecord) {
        self.response_url = source.response_url.clone();
        self.response_domain = source.response_domain.clone();
        self.from_cache = true;
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            group_id: row.get(1)?,
            server_id: row.get(2)?,
            server_name: row.get(3)?,
            request_url: row.get(4)?,
            request_domain: row.get(5)?,
            response_url: row.get(6)?,
            response_domain: row.get(7)?,
            from_cache: row.get::<_, i32>(8)? == 1,
            created_at: row.get(9)?,
        })
    }
}

impl ArchiveDb {
    /// Find the most recent record for `request_url` that was resolved by the
    /// archive service itself (never one that was already a cache hit).
    /// Records missing either response field are never reused.
    pub async fn latest_resolved(&self, request_url: &str) -> Result<Option<ArchiveRecord>, Error> {
        let request_url = request_url.to_string();
        self.conn
            .call(move |conn| -> Result<Option<ArchiveRecord>, Error> {
                let sql = format!(
                    "SELECT {RECORD_COLUMNS} FROM archive_records
                     WHERE request_url = ?1
                       AND from_cache = 0
                       AND response_url IS NOT NULL AND response_url != ''
                       AND response_domain IS NOT NULL AND response_domain != ''
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT 1"
                );
                let result = conn.query_row(&sql, params![request_url], ArchiveRecord::from_row);

                match result {
                    Ok(record) => Ok(Some(record)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Insert a whole batch in one transaction.
    ///
    /// Returns the number of rows written. Fails with
    /// [`Error::RowCountMismatch`] (and rolls back) when fewer rows land than
    /// records were given.
    pub async fn insert_records(&self, records: &[ArchiveRecord]) -> Result<usize, Error> {
        if records.is_empty() {
            return Ok(0);
        }
        let records = records.to_vec();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                let mut affected = 0;
                {
                    let mut stmt = tx.prepare(&format!(
                        "INSERT OR IGNORE INTO archive_records ({RECORD_COLUMNS})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                    ))?;
                    for r in &records {
                        affected += stmt.execute(params![
                            &r.id,
                            &r.group_id,
                            &r.server_id,
                            &r.server_name,
                            &r.request_url,
                            &r.request_domain,
                            &r.response_url,
                            &r.response_domain,
                            r.from_cache as i32,
                            &r.created_at,
                        ])?;
                    }
                }

                if affected != records.len() {
                    return Err(Error::RowCountMismatch { expected: records.len(), actual: affected });
                }
                tx.commit()?;
                Ok(affected)
            })
            .await
            .map_err(Error::from)
    }

    /// All records of one batch, in insertion order.
    pub async fn group_records(&self, group_id: &str) -> Result<Vec<ArchiveRecord>, Error> {
        let group_id = group_id.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<ArchiveRecord>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {RECORD_COLUMNS} FROM archive_records WHERE group_id = ?1 ORDER BY rowid"
                ))?;
                let rows = stmt.query_map(params![group_id], ArchiveRecord::from_row)?;
                let records = rows.collect::<Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(url: &str, snapshot: &str) -> ArchiveRecord {
        let mut record = ArchiveRecord::pending("g1", Some("s1"), "Test Server", url, Some("example.com".into()));
        record.response_url = Some(snapshot.to_string());
        record.response_domain = Some("web.archive.org".into());
        record
    }

    #[tokio::test]
    async fn test_latest_resolved_missing() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let found = db.latest_resolved("https://example.com/").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_latest_resolved_prefers_newest() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let older = resolved("https://example.com/", "https://web.archive.org/web/2020/https://example.com/");
        let newer = resolved("https://example.com/", "https://web.archive.org/web/2023/https://example.com/");
        db.insert_records(&[older]).await.unwrap();
        db.insert_records(&[newer.clone()]).await.unwrap();

        let found = db.latest_resolved("https://example.com/").await.unwrap().unwrap();
        assert_eq!(found.response_url, newer.response_url);
    }

    #[tokio::test]
    async fn test_latest_resolved_skips_cached_and_unresolved() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let original = resolved("https://example.com/", "https://web.archive.org/web/2020/https://example.com/");

        let mut cached = resolved("https://example.com/", "https://web.archive.org/web/2099/https://example.com/");
        cached.from_cache = true;
        let unresolved = ArchiveRecord::pending("g2", None, "", "https://example.com/", None);

        db.insert_records(&[original.clone()]).await.unwrap();
        db.insert_records(&[cached, unresolved]).await.unwrap();

        let found = db.latest_resolved("https://example.com/").await.unwrap().unwrap();
        assert_eq!(found.id, original.id);
        assert!(!found.from_cache);
    }

    #[tokio::test]
    async fn test_latest_resolved_skips_missing_domain() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let complete = resolved("https://example.com/", "https://web.archive.org/web/2020/https://example.com/");

        let mut no_domain = resolved("https://example.com/", "https://web.archive.org/web/2023/https://example.com/");
        no_domain.response_domain = None;
        let mut empty_domain = resolved("https://example.com/", "https://web.archive.org/web/2024/https://example.com/");
        empty_domain.response_domain = Some(String::new());

        db.insert_records(&[complete.clone()]).await.unwrap();
        db.insert_records(&[no_domain, empty_domain]).await.unwrap();

        let found = db.latest_resolved("https://example.com/").await.unwrap().unwrap();
        assert_eq!(found.id, complete.id);
        assert_eq!(found.response_domain.as_deref(), Some("web.archive.org"));
    }

    #[tokio::test]
    async fn test_latest_resolved_exact_match_only() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        db.insert_records(&[resolved("https://example.com/a", "https://web.archive.org/web/1/https://example.com/a")])
            .await
            .unwrap();

        assert!(db.latest_resolved("https://example.com/a/").await.unwrap().is_none());
        assert!(db.latest_resolved("https://example.com/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_records_roundtrip_group() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let first = resolved("https://a.example/", "https://web.archive.org/web/1/https://a.example/");
        let second = ArchiveRecord::pending("g1", Some("s1"), "Test Server", "https://b.example/", None);

        let written = db.insert_records(&[first.clone(), second.clone()]).await.unwrap();
        assert_eq!(written, 2);

        let group = db.group_records("g1").await.unwrap();
        assert_eq!(group, vec![first, second]);
    }

    #[tokio::test]
    async fn test_insert_records_duplicate_id_rolls_back() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let record = resolved("https://a.example/", "https://web.archive.org/web/1/https://a.example/");
        db.insert_records(&[record.clone()]).await.unwrap();

        let fresh = ArchiveRecord::pending("g1", None, "", "https://c.example/", None);
        let result = db.insert_records(&[fresh, record]).await;
        assert!(matches!(result, Err(Error::RowCountMismatch { expected: 2, actual: 1 })));

        assert_eq!(db.group_records("g1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_records_empty() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        assert_eq!(db.insert_records(&[]).await.unwrap(), 0);
    }

    #[test]
    fn test_satisfy_from_copies_response() {
        let source = resolved("https://a.example/", "https://web.archive.org/web/1/https://a.example/");
        let mut record = ArchiveRecord::pending("g9", None, "", "https://a.example/", None);
        assert!(!record.is_resolved());

        record.satisfy_from(&source);
        assert!(record.from_cache);
        assert!(record.is_resolved());
        assert_eq!(record.response_url, source.response_url);
        assert_eq!(record.response_domain, source.response_domain);
    }
}
