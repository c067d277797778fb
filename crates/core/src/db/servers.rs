//! Server registrations and per-server settings.
//!
//! Setting columns are nullable: a server that never touched a setting keeps
//! `NULL` there, and [`ServerConfig::resolve`] applies the documented default
//! when the value is read. Direct messages and unknown servers resolve to
//! [`ServerSettings::default`].

use std::fmt;
use std::str::FromStr;

use chrono::Offset;

use super::connection::ArchiveDb;
use crate::{Error, RetryPolicy};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, types::Value};

/// Allowed range for the retry budget.
pub const RETRY_ATTEMPTS_RANGE: std::ops::RangeInclusive<u8> = 0..=5;

/// Allowed delays, in seconds, before the retry affordance is removed.
pub const REMOVE_RETRY_DELAYS: &[u32] = &[0, 10, 30, 90, 120, 300];

/// Largest UTC offset magnitude, in hours.
pub const MAX_UTC_OFFSET: u8 = 14;

/// Direction of a server's display offset from UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub enum UtcSign {
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "-")]
    Minus,
}

impl UtcSign {
    pub fn as_str(self) -> &'static str {
        match self {
            UtcSign::Plus => "+",
            UtcSign::Minus => "-",
        }
    }

    fn factor(self) -> i32 {
        match self {
            UtcSign::Plus => 1,
            UtcSign::Minus => -1,
        }
    }
}

impl FromStr for UtcSign {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "+" => Ok(UtcSign::Plus),
            "-" => Ok(UtcSign::Minus),
            other => Err(Error::InvalidSetting {
                setting: SettingKey::UtcSign.id().into(),
                reason: format!("expected \"+\" or \"-\", got {other:?}"),
            }),
        }
    }
}

impl fmt::Display for UtcSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A server row as stored, with unset settings left as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ServerConfig {
    pub server_id: String,
    pub name: String,
    pub active: bool,
    pub archive_enabled: Option<bool>,
    pub always_snapshot_first: Option<bool>,
    pub show_details: Option<bool>,
    pub remove_retry: Option<bool>,
    pub retry_attempts: Option<u8>,
    pub remove_retry_delay: Option<u32>,
    pub utc_offset: Option<u8>,
    pub utc_sign: Option<String>,
    pub joined_at: String,
    pub updated_at: String,
}

/// Effective settings for a server after defaults are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ServerSettings {
    pub archive_enabled: bool,
    pub always_snapshot_first: bool,
    pub show_details: bool,
    pub remove_retry: bool,
    pub retry_attempts: u8,
    pub remove_retry_delay: u32,
    pub utc_offset: u8,
    pub utc_sign: UtcSign,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            archive_enabled: true,
            always_snapshot_first: false,
            show_details: true,
            remove_retry: true,
            retry_attempts: 1,
            remove_retry_delay: 30,
            utc_offset: 4,
            utc_sign: UtcSign::Minus,
        }
    }
}

impl ServerSettings {
    /// The retry policy handed to the archive pipeline.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy { attempts: self.retry_attempts, always_snapshot_first: self.always_snapshot_first }
    }

    /// Display offset in seconds east of UTC.
    pub fn utc_offset_seconds(&self) -> i32 {
        self.utc_sign.factor() * i32::from(self.utc_offset) * 3600
    }

    /// Display offset as a chrono zone.
    pub fn fixed_offset(&self) -> chrono::FixedOffset {
        chrono::FixedOffset::east_opt(self.utc_offset_seconds()).unwrap_or_else(|| chrono::Utc.fix())
    }
}

impl ServerConfig {
    /// Apply defaults to every unset setting.
    ///
    /// Stored values outside their allowed range (written by an older
    /// release, or by hand) also fall back to the default.
    pub fn resolve(&self) -> ServerSettings {
        let defaults = ServerSettings::default();
        let utc_sign = match self.utc_sign.as_deref().map(UtcSign::from_str) {
            Some(Ok(sign)) => sign,
            Some(Err(_)) => {
                tracing::warn!(server_id = %self.server_id, "stored utc_sign is invalid, using default");
                defaults.utc_sign
            }
            None => defaults.utc_sign,
        };

        ServerSettings {
            archive_enabled: self.archive_enabled.unwrap_or(defaults.archive_enabled),
            always_snapshot_first: self.always_snapshot_first.unwrap_or(defaults.always_snapshot_first),
            show_details: self.show_details.unwrap_or(defaults.show_details),
            remove_retry: self.remove_retry.unwrap_or(defaults.remove_retry),
            retry_attempts: self
                .retry_attempts
                .filter(|n| RETRY_ATTEMPTS_RANGE.contains(n))
                .unwrap_or(defaults.retry_attempts),
            remove_retry_delay: self
                .remove_retry_delay
                .filter(|d| REMOVE_RETRY_DELAYS.contains(d))
                .unwrap_or(defaults.remove_retry_delay),
            utc_offset: self.utc_offset.filter(|o| *o <= MAX_UTC_OFFSET).unwrap_or(defaults.utc_offset),
            utc_sign,
        }
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            server_id: row.get(0)?,
            name: row.get(1)?,
            active: row.get::<_, i32>(2)? == 1,
            archive_enabled: row.get(3)?,
            always_snapshot_first: row.get(4)?,
            show_details: row.get(5)?,
            remove_retry: row.get(6)?,
            retry_attempts: row.get(7)?,
            remove_retry_delay: row.get(8)?,
            utc_offset: row.get(9)?,
            utc_sign: row.get(10)?,
            joined_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }
}

/// Stable identifiers for each adjustable setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    ArchiveEnabled,
    AlwaysSnapshotFirst,
    ShowDetails,
    RemoveRetry,
    RetryAttempts,
    RemoveRetryDelay,
    UtcOffset,
    UtcSign,
}

impl SettingKey {
    pub const ALL: [SettingKey; 8] = [
        SettingKey::ArchiveEnabled,
        SettingKey::AlwaysSnapshotFirst,
        SettingKey::ShowDetails,
        SettingKey::RemoveRetry,
        SettingKey::RetryAttempts,
        SettingKey::RemoveRetryDelay,
        SettingKey::UtcOffset,
        SettingKey::UtcSign,
    ];

    /// Interaction id used by settings affordances.
    pub fn id(self) -> &'static str {
        match self {
            SettingKey::ArchiveEnabled => "enabled",
            SettingKey::AlwaysSnapshotFirst => "alwayssnapshotfirst",
            SettingKey::ShowDetails => "showdetails",
            SettingKey::RemoveRetry => "removeretry",
            SettingKey::RetryAttempts => "retries",
            SettingKey::RemoveRetryDelay => "removeretryafter",
            SettingKey::UtcOffset => "utcoffset",
            SettingKey::UtcSign => "utcsign",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SettingKey::ArchiveEnabled => "Bot enabled",
            SettingKey::AlwaysSnapshotFirst => "Archive the page first (slower)",
            SettingKey::ShowDetails => "Show extra details",
            SettingKey::RemoveRetry => "Remove retry button",
            SettingKey::RetryAttempts => "Number of times to retry calling archive.org",
            SettingKey::RemoveRetryDelay => "Seconds to wait to remove retry button",
            SettingKey::UtcOffset => "UTC Offset",
            SettingKey::UtcSign => "UTC Sign (negative if west of Greenwich)",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.id() == id)
    }

    fn column(self) -> &'static str {
        match self {
            SettingKey::ArchiveEnabled => "archive_enabled",
            SettingKey::AlwaysSnapshotFirst => "always_snapshot_first",
            SettingKey::ShowDetails => "show_details",
            SettingKey::RemoveRetry => "remove_retry",
            SettingKey::RetryAttempts => "retry_attempts",
            SettingKey::RemoveRetryDelay => "remove_retry_delay",
            SettingKey::UtcOffset => "utc_offset",
            SettingKey::UtcSign => "utc_sign",
        }
    }

    /// Parse a raw interaction value into a validated [`Setting`].
    pub fn parse(self, raw: &str) -> Result<Setting, Error> {
        let invalid = |reason: String| Error::InvalidSetting { setting: self.id().into(), reason };
        let raw = raw.trim();
        let as_bool = || match raw.to_ascii_lowercase().as_str() {
            "true" | "on" | "enabled" | "yes" => Ok(true),
            "false" | "off" | "disabled" | "no" => Ok(false),
            _ => Err(invalid(format!("expected a boolean, got {raw:?}"))),
        };

        let setting = match self {
            SettingKey::ArchiveEnabled => Setting::ArchiveEnabled(as_bool()?),
            SettingKey::AlwaysSnapshotFirst => Setting::AlwaysSnapshotFirst(as_bool()?),
            SettingKey::ShowDetails => Setting::ShowDetails(as_bool()?),
            SettingKey::RemoveRetry => Setting::RemoveRetry(as_bool()?),
            SettingKey::RetryAttempts => {
                Setting::RetryAttempts(raw.parse().map_err(|_| invalid(format!("expected a number, got {raw:?}")))?)
            }
            SettingKey::RemoveRetryDelay => {
                Setting::RemoveRetryDelay(raw.parse().map_err(|_| invalid(format!("expected a number, got {raw:?}")))?)
            }
            SettingKey::UtcOffset => {
                Setting::UtcOffset(raw.parse().map_err(|_| invalid(format!("expected a number, got {raw:?}")))?)
            }
            SettingKey::UtcSign => Setting::UtcSign(raw.parse()?),
        };
        setting.validate()?;
        Ok(setting)
    }
}

/// A typed new value for one setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    ArchiveEnabled(bool),
    AlwaysSnapshotFirst(bool),
    ShowDetails(bool),
    RemoveRetry(bool),
    RetryAttempts(u8),
    RemoveRetryDelay(u32),
    UtcOffset(u8),
    UtcSign(UtcSign),
}

impl Setting {
    pub fn key(&self) -> SettingKey {
        match self {
            Setting::ArchiveEnabled(_) => SettingKey::ArchiveEnabled,
            Setting::AlwaysSnapshotFirst(_) => SettingKey::AlwaysSnapshotFirst,
            Setting::ShowDetails(_) => SettingKey::ShowDetails,
            Setting::RemoveRetry(_) => SettingKey::RemoveRetry,
            Setting::RetryAttempts(_) => SettingKey::RetryAttempts,
            Setting::RemoveRetryDelay(_) => SettingKey::RemoveRetryDelay,
            Setting::UtcOffset(_) => SettingKey::UtcOffset,
            Setting::UtcSign(_) => SettingKey::UtcSign,
        }
    }

    /// Check the value against its allowed range.
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |reason: String| Error::InvalidSetting { setting: self.key().id().into(), reason };
        match *self {
            Setting::RetryAttempts(n) if !RETRY_ATTEMPTS_RANGE.contains(&n) => Err(invalid(format!(
                "must be between {} and {}",
                RETRY_ATTEMPTS_RANGE.start(),
                RETRY_ATTEMPTS_RANGE.end()
            ))),
            Setting::RemoveRetryDelay(d) if !REMOVE_RETRY_DELAYS.contains(&d) => {
                Err(invalid(format!("must be one of {REMOVE_RETRY_DELAYS:?}")))
            }
            Setting::UtcOffset(o) if o > MAX_UTC_OFFSET => Err(invalid(format!("must not exceed {MAX_UTC_OFFSET}"))),
            _ => Ok(()),
        }
    }

    fn sql_value(&self) -> Value {
        match *self {
            Setting::ArchiveEnabled(b)
            | Setting::AlwaysSnapshotFirst(b)
            | Setting::ShowDetails(b)
            | Setting::RemoveRetry(b) => Value::Integer(i64::from(b)),
            Setting::RetryAttempts(n) | Setting::UtcOffset(n) => Value::Integer(i64::from(n)),
            Setting::RemoveRetryDelay(d) => Value::Integer(i64::from(d)),
            Setting::UtcSign(sign) => Value::Text(sign.as_str().to_string()),
        }
    }
}

impl ArchiveDb {
    /// Record that the bot is (or is no longer) a member of a server.
    ///
    /// New servers start with every setting unset; known servers only have
    /// their name and active flag refreshed.
    pub async fn register_server(&self, server_id: &str, name: &str, active: bool) -> Result<(), Error> {
        let server_id = server_id.to_string();
        let name = name.to_string();
        let now = super::timestamp_now();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO servers (server_id, name, active, joined_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)
                     ON CONFLICT(server_id) DO UPDATE SET
                        name = excluded.name,
                        active = excluded.active,
                        updated_at = excluded.updated_at",
                    params![server_id, name, active as i32, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Flag every active server not in `active_ids` as inactive.
    ///
    /// Returns how many registrations changed.
    pub async fn mark_inactive_except(&self, active_ids: &[String]) -> Result<usize, Error> {
        let active_ids = active_ids.to_vec();
        let now = super::timestamp_now();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let placeholders = (0..active_ids.len())
                    .map(|i| format!("?{}", i + 2))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = if active_ids.is_empty() {
                    "UPDATE servers SET active = 0, updated_at = ?1 WHERE active = 1".to_string()
                } else {
                    format!(
                        "UPDATE servers SET active = 0, updated_at = ?1
                         WHERE active = 1 AND server_id NOT IN ({placeholders})"
                    )
                };
                let mut values = vec![Value::Text(now)];
                values.extend(active_ids.into_iter().map(Value::Text));
                let changed = conn.execute(&sql, rusqlite::params_from_iter(values))?;
                Ok(changed)
            })
            .await
            .map_err(Error::from)
    }

    /// The stored row for a server, if it was ever registered.
    pub async fn server_config(&self, server_id: &str) -> Result<Option<ServerConfig>, Error> {
        let server_id = server_id.to_string();
        self.conn
            .call(move |conn| -> Result<Option<ServerConfig>, Error> {
                let result = conn.query_row(
                    "SELECT server_id, name, active, archive_enabled, always_snapshot_first, show_details,
                            remove_retry, retry_attempts, remove_retry_delay, utc_offset, utc_sign,
                            joined_at, updated_at
                     FROM servers WHERE server_id = ?1",
                    params![server_id],
                    ServerConfig::from_row,
                );

                match result {
                    Ok(config) => Ok(Some(config)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Effective settings for a server; defaults when it is unknown.
    pub async fn settings(&self, server_id: Option<&str>) -> Result<ServerSettings, Error> {
        let Some(server_id) = server_id else {
            return Ok(ServerSettings::default());
        };
        Ok(self
            .server_config(server_id)
            .await?
            .map(|config| config.resolve())
            .unwrap_or_default())
    }

    /// Change one setting and return the server's effective settings.
    ///
    /// The server must already be registered; exactly one row has to change.
    pub async fn update_setting(&self, server_id: &str, setting: Setting) -> Result<ServerSettings, Error> {
        setting.validate()?;
        let id = server_id.to_string();
        let now = super::timestamp_now();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let sql = format!(
                    "UPDATE servers SET {} = ?1, updated_at = ?2 WHERE server_id = ?3",
                    setting.key().column()
                );
                let changed = conn.execute(&sql, params![setting.sql_value(), now, id])?;
                if changed != 1 {
                    return Err(Error::RowCountMismatch { expected: 1, actual: changed });
                }
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        tracing::info!(server_id, setting = setting.key().id(), "updated server setting");
        self.settings(Some(server_id)).await
    }

    /// Number of servers the bot is currently in.
    pub async fn active_server_count(&self) -> Result<i64, Error> {
        self.conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM servers WHERE active = 1", [], |row| row.get(0)))
            .await
            .map_err(Error::from)
    }
}
