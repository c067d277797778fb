//! Markdown rendering of archive replies.

use chrono::Datelike;
use serde::Serialize;
use waybot_client::{BatchOutcome, BatchStatus, SnapshotHistory};
use waybot_core::ServerSettings;
use waybot_core::db::stats::DisplayField;

use crate::commands::PATIENCE_FOOTER;

pub const SNAPSHOT_TITLE: &str = "🏛️ Archive.org Snapshot";
pub const SETTINGS_FOOTER: &str = "⚙️ Customize this message with /settings";
pub const DETAILS_UNAVAILABLE: &str =
    "Snapshot details are not currently available, most of the time this is because the link was just archived.";
pub const RATE_LIMIT_HINT: &str = "I was unable to get any Wayback Machine URLs. Most of the time, this is due to rate-limiting by Archive.org. Please try again";
pub const DM_REACTION_HINT: &str =
    "Use `/archive` or the `Get snapshots` menu item on the message instead of adding a reaction.";
pub const NO_URLS_FOUND: &str = "I couldn't find any URLs to archive in that message.";

/// RFC 1123 with a numeric zone, as shown in snapshot details.
const DETAIL_TIME_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// One rendered snapshot in a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotEntry {
    pub title: String,
    pub request_url: String,
    /// Snapshot link; `None` when the URL could not be archived.
    pub link: Option<String>,
    pub fields: Vec<DisplayField>,
}

/// Build one entry per URL in the batch.
pub fn snapshot_entries(
    outcome: &BatchOutcome, settings: &ServerSettings, archive_root: &str, now_year: i32,
) -> Vec<SnapshotEntry> {
    outcome
        .entries()
        .map(|(record, _, history)| {
            let link = record.response_url.clone().filter(|url| !url.is_empty());
            let fields = match (&link, settings.show_details, history.history()) {
                (None, _, _) | (Some(_), false, _) => Vec::new(),
                (Some(_), true, Some(history)) => {
                    detail_fields(history, settings, archive_root, &record.request_url, now_year)
                }
                (Some(_), true, None) => {
                    vec![DisplayField { name: "Details".into(), value: DETAILS_UNAVAILABLE.into(), inline: false }]
                }
            };
            SnapshotEntry { title: SNAPSHOT_TITLE.to_string(), request_url: record.request_url.clone(), link, fields }
        })
        .collect()
}

/// Oldest, newest and total snapshot fields, shown in the server's offset.
pub fn detail_fields(
    history: &SnapshotHistory, settings: &ServerSettings, archive_root: &str, original_url: &str, now_year: i32,
) -> Vec<DisplayField> {
    let offset = settings.fixed_offset();
    let oldest = history.first_in(offset).format(DETAIL_TIME_FORMAT);
    let newest = history.last_in(offset).format(DETAIL_TIME_FORMAT);

    vec![
        DisplayField {
            name: "Oldest Archived Copy".into(),
            value: format!("[{oldest}]({archive_root}/{}/{original_url})", history.first_ts),
            inline: true,
        },
        DisplayField {
            name: "Newest Archived Copy".into(),
            value: format!("[{newest}]({archive_root}/{}/{original_url})", history.last_ts),
            inline: true,
        },
        DisplayField {
            name: "Total Number of Snapshots".into(),
            value: format!("[{}]({archive_root}/{now_year}0000000000*/{original_url})", history.total()),
            inline: false,
        },
    ]
}

/// Render a whole batch as markdown.
pub fn render_batch(outcome: &BatchOutcome, settings: &ServerSettings, archive_root: &str) -> String {
    match outcome.status() {
        BatchStatus::NoUrls => NO_URLS_FOUND.to_string(),
        BatchStatus::NoneResolved => format!("{RATE_LIMIT_HINT}\n\n_{PATIENCE_FOOTER}_"),
        BatchStatus::Partial | BatchStatus::Complete => {
            let year = chrono::Utc::now().year();
            render_entries(&snapshot_entries(outcome, settings, archive_root, year))
        }
    }
}

pub fn render_entries(entries: &[SnapshotEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format!("### {}\n", entry.title));
        match &entry.link {
            Some(link) => out.push_str(&format!("{link}\n")),
            None => out.push_str(&format!("Unable to get a snapshot of {}\n", entry.request_url)),
        }
        for field in &entry.fields {
            out.push_str(&format!("**{}**: {}\n", field.name, field.value));
        }
        out.push_str(&format!("_{SETTINGS_FOOTER}_\n\n"));
    }
    out.trim_end().to_string()
}

/// Render stat fields as a markdown list.
pub fn render_fields(title: &str, fields: &[DisplayField]) -> String {
    let mut out = format!("### {title}\n");
    for field in fields {
        if field.value.contains('\n') {
            out.push_str(&format!("**{}**:\n{}\n", field.name, field.value.trim_end()));
        } else {
            out.push_str(&format!("**{}**: {}\n", field.name, field.value));
        }
    }
    out.trim_end().to_string()
}
