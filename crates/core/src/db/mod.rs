//! SQLite-backed store for archive records, server settings and
//! interaction events.
//!
//! All access goes through [`ArchiveDb`], which wraps a tokio-rusqlite
//! connection. Timestamps are stored as fixed-width RFC 3339 UTC text so
//! they sort lexicographically.

pub mod archives;
pub mod connection;
pub mod migrations;
pub mod servers;
pub mod stats;

pub use crate::Error;

pub use archives::ArchiveRecord;
pub use connection::ArchiveDb;
pub use servers::{ServerConfig, ServerSettings, Setting, SettingKey};
pub use stats::{BotStats, StatField, StatsScope};

/// Current time as RFC 3339 UTC with microsecond precision.
pub(crate) fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
