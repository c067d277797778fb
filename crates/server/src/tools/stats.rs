//! stats tool implementation.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use waybot_core::db::stats::DisplayField;
use waybot_core::{ArchiveDb, BotStats, Error, StatsScope};

use crate::commands::Command;
use crate::error::BotError;
use crate::reply::render_fields;

pub const STATS_TITLE: &str = "🏛️ Archive.org Bot Stats";

/// Parameters for the stats tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatsParams {
    /// Server to report on; omit for global stats.
    #[serde(default)]
    pub server_id: Option<String>,

    #[serde(default)]
    pub user_id: Option<String>,

    /// Whether the caller is a bot administrator. Global stats require it.
    #[serde(default)]
    pub is_administrator: bool,
}

/// Output from the stats tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatsOutput {
    /// "global" or "server".
    pub scope: String,
    pub stats: BotStats,
    pub fields: Vec<DisplayField>,
    /// Markdown rendering of `fields`.
    pub text: String,
}

/// Implementation of the stats tool.
pub async fn stats_impl(db: &ArchiveDb, params: StatsParams) -> Result<CallToolResult, McpError> {
    if let Err(e) = db
        .record_interaction(params.server_id.as_deref(), params.user_id.as_deref(), Command::Stats.name())
        .await
    {
        tracing::warn!(error = %e, "unable to record interaction");
    }

    let scope = match params.server_id {
        Some(id) => StatsScope::Server(id),
        None if params.is_administrator => StatsScope::Global,
        None => return Err(BotError::NotAdministrator.into()),
    };

    let stats = db.stats(scope.clone()).await?;
    let fields = stats.display_fields(&scope);
    let output = StatsOutput {
        scope: if scope.is_global() { "global" } else { "server" }.to_string(),
        text: render_fields(STATS_TITLE, &fields),
        stats,
        fields,
    };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize stats: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::ErrorCode;

    #[tokio::test]
    async fn test_server_stats() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        db.register_server("srv", "Server", true).await.unwrap();

        let params = StatsParams { server_id: Some("srv".into()), user_id: None, is_administrator: false };
        let result = stats_impl(&db, params).await;
        assert!(result.is_ok());

        let stats = db.stats(StatsScope::Server("srv".into())).await.unwrap();
        assert_eq!(stats.interactions, 1);
    }

    #[tokio::test]
    async fn test_global_stats_require_administrator() {
        let db = ArchiveDb::open_in_memory().await.unwrap();

        let params = StatsParams { server_id: None, user_id: Some("u".into()), is_administrator: false };
        let err = stats_impl(&db, params).await.unwrap_err();
        assert_eq!(err.code, ErrorCode(-32003));

        let params = StatsParams { server_id: None, user_id: Some("u".into()), is_administrator: true };
        assert!(stats_impl(&db, params).await.is_ok());
    }

    #[tokio::test]
    async fn test_global_fields_include_configured_servers() {
        let db = ArchiveDb::open_in_memory().await.unwrap();
        let stats = db.stats(StatsScope::Global).await.unwrap();

        let global = stats.display_fields(&StatsScope::Global);
        let server = stats.display_fields(&StatsScope::Server("srv".into()));
        assert_eq!(global.len(), server.len() + 1);
        assert!(render_fields(STATS_TITLE, &global).contains("**Configured servers**: 0"));
    }
}
