//! settings and update_setting tool implementations.
//!
//! `settings` shows a server's effective settings together with the
//! controls a chat adapter should render for them; `update_setting` applies
//! the value picked in one of those controls.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use waybot_core::db::servers::{MAX_UTC_OFFSET, REMOVE_RETRY_DELAYS, RETRY_ATTEMPTS_RANGE, UtcSign};
use waybot_core::{ArchiveDb, Error, ServerSettings, SettingKey};

use crate::commands::Command;
use crate::error::BotError;

pub const SETTINGS_TITLE: &str = "🏛️ Archive.org Bot Settings";

/// Parameters for the settings tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SettingsParams {
    /// Server whose settings to show; direct messages have none.
    #[serde(default)]
    pub server_id: Option<String>,

    #[serde(default)]
    pub user_id: Option<String>,
}

/// Parameters for the update_setting tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpdateSettingParams {
    #[serde(default)]
    pub server_id: Option<String>,

    #[serde(default)]
    pub user_id: Option<String>,

    /// Whether the caller administers the server.
    #[serde(default)]
    pub is_administrator: bool,

    /// Control id: enabled, alwayssnapshotfirst, showdetails, removeretry,
    /// retries, removeretryafter, utcoffset or utcsign.
    pub setting: String,

    /// New value: "true"/"false" for toggles, the option value otherwise.
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    Toggle,
    Select,
}

/// One choice in a select control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SettingOption {
    pub label: String,
    pub value: String,
    /// Shown as "Current value".
    pub current: bool,
}

/// An interactive control for one setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SettingControl {
    pub id: String,
    pub label: String,
    pub kind: ControlKind,
    pub value: String,
    /// Empty for toggles.
    pub options: Vec<SettingOption>,
}

/// Output from the settings tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SettingsOutput {
    pub server_id: String,
    pub settings: ServerSettings,
    pub controls: Vec<SettingControl>,
    pub text: String,
}

fn enabled(on: bool) -> &'static str {
    if on { "enabled" } else { "disabled" }
}

fn select<T: ToString + PartialEq>(
    values: impl IntoIterator<Item = T>, current: &T, label: impl Fn(&T) -> String,
) -> Vec<SettingOption> {
    values
        .into_iter()
        .map(|v| SettingOption { label: label(&v), value: v.to_string(), current: &v == current })
        .collect()
}

/// Current value of a setting, as the control shows it.
fn current_value(key: SettingKey, settings: &ServerSettings) -> String {
    match key {
        SettingKey::ArchiveEnabled => settings.archive_enabled.to_string(),
        SettingKey::AlwaysSnapshotFirst => settings.always_snapshot_first.to_string(),
        SettingKey::ShowDetails => settings.show_details.to_string(),
        SettingKey::RemoveRetry => settings.remove_retry.to_string(),
        SettingKey::RetryAttempts => settings.retry_attempts.to_string(),
        SettingKey::RemoveRetryDelay => settings.remove_retry_delay.to_string(),
        SettingKey::UtcOffset => settings.utc_offset.to_string(),
        SettingKey::UtcSign => settings.utc_sign.to_string(),
    }
}

/// Controls for every setting, in display order.
pub fn controls(settings: &ServerSettings) -> Vec<SettingControl> {
    SettingKey::ALL
        .into_iter()
        .map(|key| {
            let options = match key {
                SettingKey::RetryAttempts => {
                    select(RETRY_ATTEMPTS_RANGE, &settings.retry_attempts, |n| n.to_string())
                }
                SettingKey::RemoveRetryDelay => {
                    select(REMOVE_RETRY_DELAYS.iter().copied(), &settings.remove_retry_delay, |d| match d {
                        0 => "Don't remove the retry button".to_string(),
                        d => d.to_string(),
                    })
                }
                SettingKey::UtcOffset => select(0..=MAX_UTC_OFFSET, &settings.utc_offset, |o| o.to_string()),
                SettingKey::UtcSign => select([UtcSign::Plus, UtcSign::Minus], &settings.utc_sign, |s| s.to_string()),
                _ => Vec::new(),
            };
            let kind = if options.is_empty() { ControlKind::Toggle } else { ControlKind::Select };
            SettingControl {
                id: key.id().to_string(),
                label: key.label().to_string(),
                kind,
                value: current_value(key, settings),
                options,
            }
        })
        .collect()
}

/// Markdown summary of a server's settings.
pub fn render_settings(settings: &ServerSettings) -> String {
    let mut out = format!("### {SETTINGS_TITLE}\n");
    for key in SettingKey::ALL {
        let value = match key {
            SettingKey::ArchiveEnabled => enabled(settings.archive_enabled).to_string(),
            SettingKey::AlwaysSnapshotFirst => enabled(settings.always_snapshot_first).to_string(),
            SettingKey::ShowDetails => enabled(settings.show_details).to_string(),
            SettingKey::RemoveRetry => enabled(settings.remove_retry).to_string(),
            other => current_value(other, settings),
        };
        out.push_str(&format!("**{}**: {value}\n", key.label()));
    }
    out.trim_end().to_string()
}

fn output(server_id: String, settings: ServerSettings) -> Result<CallToolResult, McpError> {
    let output = SettingsOutput { server_id, controls: controls(&settings), text: render_settings(&settings), settings };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize settings: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

async fn record(db: &ArchiveDb, server_id: Option<&str>, user_id: Option<&str>) {
    if let Err(e) = db.record_interaction(server_id, user_id, Command::Settings.name()).await {
        tracing::warn!(error = %e, "unable to record interaction");
    }
}

/// Implementation of the settings tool.
pub async fn settings_impl(db: &ArchiveDb, params: SettingsParams) -> Result<CallToolResult, McpError> {
    record(db, params.server_id.as_deref(), params.user_id.as_deref()).await;

    let server_id = params.server_id.ok_or(BotError::NoServer)?;
    let settings = db.settings(Some(&server_id)).await?;
    output(server_id, settings)
}

/// Implementation of the update_setting tool.
pub async fn update_setting_impl(db: &ArchiveDb, params: UpdateSettingParams) -> Result<CallToolResult, McpError> {
    record(db, params.server_id.as_deref(), params.user_id.as_deref()).await;

    let server_id = params.server_id.ok_or(BotError::NoServer)?;
    if !params.is_administrator {
        tracing::warn!(server_id = %server_id, user_id = ?params.user_id, "settings change refused");
        return Err(BotError::NotAdministrator.into());
    }

    let key = SettingKey::from_id(&params.setting).ok_or_else(|| BotError::UnknownSetting(params.setting.clone()))?;
    let setting = key.parse(&params.value)?;

    if db.server_config(&server_id).await?.is_none() {
        return Err(Error::NotFound(format!("server {server_id} is not registered")).into());
    }

    let settings = db.update_setting(&server_id, setting).await?;
    output(server_id, settings)
}
