//! Usage statistics and interaction events.
//!
//! Stats are computed on demand from `archive_records`, `servers` and
//! `interaction_events`. How each stat is shown (label, inline layout,
//! whether it is only meaningful globally) lives in [`STAT_FIELDS`].

use super::connection::ArchiveDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, types::Value};

/// How many domains the "top domains" stat lists.
const TOP_DOMAIN_LIMIT: i64 = 5;

/// Which slice of the data to aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsScope {
    Global,
    Server(String),
}

impl StatsScope {
    pub fn is_global(&self) -> bool {
        matches!(self, StatsScope::Global)
    }

    /// SQL fragment restricting `server_id`, plus its bound value.
    fn filter(&self, first_clause: bool) -> (String, Vec<Value>) {
        match self {
            StatsScope::Global => (String::new(), Vec::new()),
            StatsScope::Server(id) => {
                let keyword = if first_clause { "WHERE" } else { "AND" };
                (format!(" {keyword} server_id = ?1"), vec![Value::Text(id.clone())])
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DomainCount {
    pub domain: String,
    pub count: i64,
}

/// Aggregated usage numbers for one [`StatsScope`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct BotStats {
    pub archive_requests: i64,
    pub calls_to_archive: i64,
    pub urls_archived: i64,
    pub interactions: i64,
    pub top_domains: Vec<DomainCount>,
    pub servers_active: i64,
    pub servers_configured: i64,
}

/// Display metadata for one stat.
pub struct StatField {
    pub label: &'static str,
    /// Whether the field can share a row with its neighbours.
    pub inline: bool,
    /// Hidden from per-server views.
    pub global_only: bool,
    value: fn(&BotStats) -> String,
}

/// One rendered stat, ready for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DisplayField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

pub const STAT_FIELDS: &[StatField] = &[
    StatField {
        label: "Times the bot has been called",
        inline: true,
        global_only: false,
        value: |s| s.archive_requests.to_string(),
    },
    StatField { label: "Calls to Archive.org", inline: true, global_only: false, value: |s| s.calls_to_archive.to_string() },
    StatField { label: "URLs Archived", inline: true, global_only: false, value: |s| s.urls_archived.to_string() },
    StatField { label: "Interactions with the bot", inline: true, global_only: false, value: |s| s.interactions.to_string() },
    StatField { label: "Top 5 Domains", inline: false, global_only: false, value: format_top_domains },
    StatField { label: "Active servers", inline: true, global_only: false, value: |s| s.servers_active.to_string() },
    StatField {
        label: "Configured servers",
        inline: true,
        global_only: true,
        value: |s| s.servers_configured.to_string(),
    },
];

fn format_top_domains(stats: &BotStats) -> String {
    if stats.top_domains.is_empty() {
        return "none".to_string();
    }
    stats
        .top_domains
        .iter()
        .map(|d| format!("{}: {}\n", d.domain, d.count))
        .collect()
}

impl BotStats {
    /// Render every field visible in the given scope, in table order.
    pub fn display_fields(&self, scope: &StatsScope) -> Vec<DisplayField> {
        STAT_FIELDS
            .iter()
            .filter(|field| scope.is_global() || !field.global_only)
            .map(|field| DisplayField { name: field.label.to_string(), value: (field.value)(self), inline: field.inline })
            .collect()
    }
}

fn count(conn: &rusqlite::Connection, sql: &str, values: &[Value]) -> rusqlite::Result<i64> {
    conn.query_row(sql, rusqlite::params_from_iter(values), |row| row.get(0))
}

impl ArchiveDb {
    /// Log one command invocation.
    pub async fn record_interaction(
        &self, server_id: Option<&str>, user_id: Option<&str>, command: &str,
    ) -> Result<(), Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let server_id = server_id.map(str::to_string);
        let user_id = user_id.map(str::to_string);
        let command = command.to_string();
        let now = super::timestamp_now();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let inserted = conn.execute(
                    "INSERT INTO interaction_events (id, server_id, user_id, command, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![id, server_id, user_id, command, now],
                )?;
                if inserted != 1 {
                    return Err(Error::RowCountMismatch { expected: 1, actual: inserted });
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Compute stats for `scope`.
    pub async fn stats(&self, scope: StatsScope) -> Result<BotStats, Error> {
        self.conn
            .call(move |conn| -> Result<BotStats, Error> {
                let (where_scope, values) = scope.filter(true);
                let (and_scope, _) = scope.filter(false);

                let archive_requests = count(
                    conn,
                    &format!("SELECT COUNT(DISTINCT group_id) FROM archive_records{where_scope}"),
                    &values,
                )?;
                let calls_to_archive = count(
                    conn,
                    &format!("SELECT COUNT(*) FROM archive_records WHERE from_cache = 0{and_scope}"),
                    &values,
                )?;
                let urls_archived = count(
                    conn,
                    &format!(
                        "SELECT COUNT(*) FROM archive_records
                         WHERE response_url IS NOT NULL AND response_url != ''{and_scope}"
                    ),
                    &values,
                )?;
                let interactions =
                    count(conn, &format!("SELECT COUNT(*) FROM interaction_events{where_scope}"), &values)?;

                let mut stmt = conn.prepare(&format!(
                    "SELECT request_domain, COUNT(*) AS n FROM archive_records
                     WHERE request_domain IS NOT NULL AND request_domain != ''{and_scope}
                     GROUP BY request_domain
                     ORDER BY n DESC, request_domain ASC
                     LIMIT {TOP_DOMAIN_LIMIT}"
                ))?;
                let top_domains = stmt
                    .query_map(rusqlite::params_from_iter(&values), |row| {
                        Ok(DomainCount { domain: row.get(0)?, count: row.get(1)? })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                let servers_active = count(conn, "SELECT COUNT(*) FROM servers WHERE active = 1", &[])?;
                let servers_configured = match scope {
                    StatsScope::Global => count(conn, "SELECT COUNT(*) FROM servers", &[])?,
                    StatsScope::Server(_) => 0,
                };

                Ok(BotStats {
                    archive_requests,
                    calls_to_archive,
                    urls_archived,
                    interactions,
                    top_domains,
                    servers_active,
                    servers_configured,
                })
            })
            .await
            .map_err(Error::from)
    }
}
