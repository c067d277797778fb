//! archive tool implementation.
//!
//! Covers all three archive triggers: the 🏛️ reaction, the `/archive`
//! command and the "Get snapshots" message action.

use std::time::Duration;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use waybot_client::{
    Archiver, BatchRequest, BatchStatus, HistoryLookup, Origin, SnapshotService, extract_urls,
    original_from_archive_link, with_trailing_slash,
};
use waybot_core::{ArchiveDb, ArchiveRecord, Error};

use crate::commands::Command;
use crate::reply::{DM_REACTION_HINT, NO_URLS_FOUND, render_batch};

/// What caused the archive request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Someone reacted to a message with 🏛️; the reply is public.
    Reaction,
    /// `/archive` with a URL; the reply is private.
    #[default]
    Command,
    /// The "Get snapshots" message action; the reply is private.
    Message,
}

impl Trigger {
    fn interaction_name(self) -> &'static str {
        match self {
            Trigger::Reaction => "reaction",
            Trigger::Command => Command::Archive.name(),
            Trigger::Message => Command::ArchiveMessage.name(),
        }
    }
}

/// Parameters for the archive tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ArchiveParams {
    /// Message text (or the single URL given to `/archive`).
    pub text: String,

    #[serde(default)]
    pub trigger: Trigger,

    /// Server the request came from; omit for direct messages.
    #[serde(default)]
    pub server_id: Option<String>,

    #[serde(default)]
    pub server_name: Option<String>,

    #[serde(default)]
    pub user_id: Option<String>,

    /// Skip cached snapshots and ask archive.org for a new capture.
    #[serde(default)]
    pub new_snapshot: bool,
}

/// Output from the archive tool.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveOutput {
    /// `None` when no batch ran.
    pub status: Option<BatchStatus>,
    pub group_id: Option<String>,
    /// Markdown to post; `None` means stay silent.
    pub reply: Option<String>,
    /// Whether only the requesting user should see the reply.
    pub ephemeral: bool,
    pub records: Vec<ArchiveRecord>,
    pub errors: Vec<Option<String>>,
    pub histories: Vec<HistoryLookup>,
    pub persist_error: Option<String>,
}

impl ArchiveOutput {
    fn without_batch(reply: Option<&str>, ephemeral: bool) -> Self {
        Self {
            status: None,
            group_id: None,
            reply: reply.map(str::to_string),
            ephemeral,
            records: Vec::new(),
            errors: Vec::new(),
            histories: Vec::new(),
            persist_error: None,
        }
    }
}

/// URLs a request should archive, or `None` when the text is a previous
/// archive link whose original could not be recovered.
fn request_urls(text: &str, trigger: Trigger) -> Option<Vec<String>> {
    if trigger != Trigger::Reaction {
        return Some(extract_urls(text).unwrap_or_default());
    }

    if let Some(original) = original_from_archive_link(text) {
        return Some(vec![original]);
    }
    if text.contains("web.archive.org") {
        tracing::warn!("failed to get original URL from previous archive.org link");
        return None;
    }

    Some(
        extract_urls(text)
            .unwrap_or_default()
            .iter()
            .map(|url| with_trailing_slash(url))
            .collect(),
    )
}

/// Implementation of the archive tool.
pub async fn archive_impl<S: SnapshotService>(
    archiver: &Archiver<S, ArchiveDb>, archive_root: &str, deadline: Duration, params: ArchiveParams,
) -> Result<CallToolResult, McpError> {
    let output = run_archive(archiver, archive_root, deadline, params).await?;
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize archive output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

async fn run_archive<S: SnapshotService>(
    archiver: &Archiver<S, ArchiveDb>, archive_root: &str, deadline: Duration, params: ArchiveParams,
) -> Result<ArchiveOutput, Error> {
    let db = archiver.store();
    let server_id = params.server_id.as_deref();
    let ephemeral = params.trigger != Trigger::Reaction;

    if let Err(e) = db
        .record_interaction(server_id, params.user_id.as_deref(), params.trigger.interaction_name())
        .await
    {
        tracing::warn!(error = %e, "unable to record interaction");
    }

    if params.trigger == Trigger::Reaction && server_id.is_none() {
        return Ok(ArchiveOutput::without_batch(Some(DM_REACTION_HINT), true));
    }

    let settings = db.settings(server_id).await?;
    if params.trigger == Trigger::Reaction && !settings.archive_enabled {
        tracing::info!(server_id, "urls were not archived because archiving is disabled");
        return Ok(ArchiveOutput::without_batch(None, false));
    }

    let Some(urls) = request_urls(&params.text, params.trigger) else {
        return Ok(ArchiveOutput::without_batch(None, ephemeral));
    };
    if urls.is_empty() {
        let reply = ephemeral.then_some(NO_URLS_FOUND);
        return Ok(ArchiveOutput::without_batch(reply, ephemeral));
    }

    let origin = match server_id {
        Some(id) => Origin {
            server_id: Some(id.to_string()),
            server_name: params.server_name.clone().unwrap_or_else(|| id.to_string()),
        },
        None => Origin::direct_message(),
    };
    let request = BatchRequest { urls, fresh: params.new_snapshot };

    let cancel = CancellationToken::new();
    let timer = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            tracing::warn!(deadline_ms = deadline.as_millis() as u64, "archive request deadline reached");
            cancel.cancel();
        })
    };
    let outcome = archiver
        .archive(&request, &origin, &settings.retry_policy(), &cancel)
        .await;
    timer.abort();

    let reply = render_batch(&outcome, &settings, archive_root);

    Ok(ArchiveOutput {
        status: Some(outcome.status()),
        group_id: Some(outcome.group_id.clone()),
        reply: Some(reply),
        ephemeral,
        errors: outcome.errors.iter().map(|e| e.as_ref().map(ToString::to_string)).collect(),
        records: outcome.records,
        histories: outcome.histories,
        persist_error: outcome.persist_error,
    })
}
