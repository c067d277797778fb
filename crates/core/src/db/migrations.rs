//! Embedded schema migrations.
//!
//! Applied versions are tracked in `_migrations`; every pending entry of
//! [`MIGRATIONS`] runs in order on open.

use std::num::ParseIntError;

use super::Error;
use tokio_rusqlite::{Connection, params};

/// (version, SQL) pairs, applied in ascending order.
const MIGRATIONS: &[(&str, &str)] = &[
    ("1", include_str!("../../migrations/001_archive_records.sql")),
    ("2", include_str!("../../migrations/002_servers.sql")),
    ("3", include_str!("../../migrations/003_interaction_events.sql")),
];

/// Run any pending migrations.
///
/// # Errors
///
/// Returns an error if a migration SQL fails to execute or a version label
/// is not an integer.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current: i64 =
            conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        for (version, sql) in MIGRATIONS {
            let version_num: i64 = version
                .parse()
                .map_err(|e: ParseIntError| Error::MigrationFailed(e.to_string()))?;
            if version_num <= current {
                continue;
            }
            conn.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("version {version_num}: {e}")))?;
            conn.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version_num, chrono::Utc::now().to_rfc3339()],
            )?;
            tracing::info!(version = version_num, "applied migration");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
