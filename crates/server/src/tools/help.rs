//! help tool implementation.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use waybot_core::{ArchiveDb, Error};

use crate::commands::{COMMANDS, Command, HELP_TEXT, PATIENCE_FOOTER};

pub const HELP_TITLE: &str = "🏛️ Archive.org Bot Help";

/// Parameters for the help tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct HelpParams {
    /// Describe a single command instead of the whole bot.
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub server_id: Option<String>,

    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CommandInfo {
    pub name: String,
    pub description: String,
}

/// Output from the help tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HelpOutput {
    pub title: String,
    pub text: String,
    pub footer: String,
    pub commands: Vec<CommandInfo>,
}

/// Implementation of the help tool.
pub async fn help_impl(db: &ArchiveDb, params: HelpParams) -> Result<CallToolResult, McpError> {
    if let Err(e) = db
        .record_interaction(params.server_id.as_deref(), params.user_id.as_deref(), Command::Help.name())
        .await
    {
        tracing::warn!(error = %e, "unable to record interaction");
    }

    let output = match params.command.as_deref() {
        Some(name) => {
            let command = Command::from_name(name)?;
            HelpOutput {
                title: format!("{HELP_TITLE}: {}", command.name()),
                text: command.description().to_string(),
                footer: PATIENCE_FOOTER.to_string(),
                commands: vec![CommandInfo { name: command.name().into(), description: command.description().into() }],
            }
        }
        None => HelpOutput {
            title: HELP_TITLE.to_string(),
            text: HELP_TEXT.to_string(),
            footer: PATIENCE_FOOTER.to_string(),
            commands: COMMANDS
                .iter()
                .map(|entry| CommandInfo { name: entry.name.into(), description: entry.description.into() })
                .collect(),
        },
    };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize help: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
