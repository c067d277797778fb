//! waybot server entry point.
//!
//! Boots the bot's MCP server on stdio transport. The chat adapter talks to
//! it over stdin/stdout, so logging goes to stderr.

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;
use waybot_client::{WaybackClient, WaybackConfig};
use waybot_core::{AppConfig, ArchiveDb};

mod commands;
mod error;
mod handler;
mod reply;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("loading configuration")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .init();

    tracing::info!(db_path = %config.db_path.display(), "Starting waybot server on stdio transport");
    if let Err(e) = config.require_cookie() {
        tracing::warn!(error = %e, "save requests will likely be declined");
    }

    let db = ArchiveDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening database at {}", config.db_path.display()))?;
    let client = WaybackClient::new(WaybackConfig::from(&config)).context("building wayback client")?;

    let handler = handler::WaybotServer::new(&config, db, client);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
