//! MCP server handler implementation.
//!
//! This module defines the main server handler that routes bot commands to
//! the tool implementations.

use std::sync::Arc;
use std::time::Duration;

use crate::tools::{
    ArchiveParams, HelpParams, RegisterServerParams, SettingsParams, StatsParams, UpdateSettingParams,
    archive::archive_impl, help::help_impl, register::register_impl, settings::settings_impl,
    settings::update_setting_impl, stats::stats_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use waybot_client::{Archiver, WaybackClient};
use waybot_core::{AppConfig, ArchiveDb};

/// The main MCP server handler for waybot.
#[derive(Clone)]
pub struct WaybotServer {
    tool_router: ToolRouter<Self>,
    archiver: Arc<Archiver<WaybackClient, ArchiveDb>>,
    archive_root: String,
    request_deadline: Duration,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl WaybotServer {
    /// Create a new server handler.
    pub fn new(config: &AppConfig, db: ArchiveDb, client: WaybackClient) -> Self {
        Self {
            tool_router: Self::tool_router(),
            archiver: Arc::new(Archiver::new(client, db)),
            archive_root: config.archive_root.clone(),
            request_deadline: config.request_deadline(),
        }
    }

    fn db(&self) -> &ArchiveDb {
        self.archiver.store()
    }

    /// Archive the URLs in a message.
    ///
    /// Resolves each URL to a Wayback Machine snapshot, reusing earlier
    /// snapshots unless a new one is requested, and returns the reply to post.
    #[tool(
        description = "Archive the URLs in a message with the Wayback Machine. Returns snapshot links, per-URL errors and a markdown reply."
    )]
    async fn archive(&self, params: Parameters<ArchiveParams>) -> Result<CallToolResult, McpError> {
        archive_impl(&self.archiver, &self.archive_root, self.request_deadline, params.0).await
    }

    #[tool(description = "Show bot stats for a server, or global stats for administrators.")]
    async fn stats(&self, params: Parameters<StatsParams>) -> Result<CallToolResult, McpError> {
        stats_impl(self.db(), params.0).await
    }

    #[tool(description = "Show a server's settings and the controls for changing them.")]
    async fn settings(&self, params: Parameters<SettingsParams>) -> Result<CallToolResult, McpError> {
        settings_impl(self.db(), params.0).await
    }

    /// Change one server setting. Administrators only.
    #[tool(description = "Change one server setting by control id. Requires a server administrator.")]
    async fn update_setting(&self, params: Parameters<UpdateSettingParams>) -> Result<CallToolResult, McpError> {
        update_setting_impl(self.db(), params.0).await
    }

    #[tool(description = "Record that the bot joined or left a server.")]
    async fn register_server(&self, params: Parameters<RegisterServerParams>) -> Result<CallToolResult, McpError> {
        register_impl(self.db(), params.0).await
    }

    #[tool(description = "How to use this bot.")]
    async fn help(&self, params: Parameters<HelpParams>) -> Result<CallToolResult, McpError> {
        help_impl(self.db(), params.0).await
    }
}

impl ServerHandler for WaybotServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "waybot".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
