//! register_server tool implementation.
//!
//! Chat adapters call this when the bot joins or leaves a server, and on
//! startup with the full list of servers the bot is still in.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use waybot_core::{ArchiveDb, Error, ServerConfig};

/// Parameters for the register_server tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RegisterServerParams {
    pub server_id: String,

    pub name: String,

    /// False when the bot was removed from the server.
    #[serde(default = "default_true")]
    pub active: bool,

    /// Every server the bot is currently in. Registrations missing from
    /// this list are flagged inactive.
    #[serde(default)]
    pub present_server_ids: Option<Vec<String>>,
}

fn default_true() -> bool {
    true
}

/// Output from the register_server tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RegisterServerOutput {
    pub server: ServerConfig,
    /// Registrations flagged inactive by `present_server_ids`.
    pub deactivated: usize,
    pub active_servers: i64,
}

/// Implementation of the register_server tool.
pub async fn register_impl(db: &ArchiveDb, params: RegisterServerParams) -> Result<CallToolResult, McpError> {
    if params.server_id.trim().is_empty() {
        return Err(Error::InvalidInput("server_id cannot be empty".into()).into());
    }

    db.register_server(&params.server_id, &params.name, params.active).await?;

    let deactivated = match &params.present_server_ids {
        Some(present) => db.mark_inactive_except(present).await?,
        None => 0,
    };

    let server = db
        .server_config(&params.server_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("server {}", params.server_id)))?;

    tracing::info!(
        server_id = %server.server_id,
        name = %server.name,
        active = server.active,
        deactivated,
        "server registration updated"
    );

    let output = RegisterServerOutput { server, deactivated, active_servers: db.active_server_count().await? };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize server: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
