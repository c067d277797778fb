//! Bot command table.
//!
//! Chat adapters register these commands with their platform; the MCP tool
//! router exposes the matching handlers.

use crate::error::BotError;

/// Commands the bot registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Archive,
    /// Message context-menu action.
    ArchiveMessage,
    Stats,
    Settings,
}

/// Registration data for one command.
#[derive(Debug)]
pub struct CommandEntry {
    pub command: Command,
    pub name: &'static str,
    /// Empty for context-menu actions, which platforms show without one.
    pub description: &'static str,
}

pub const COMMANDS: &[CommandEntry] = &[
    CommandEntry { command: Command::Help, name: "help", description: "How to use this bot" },
    CommandEntry {
        command: Command::Archive,
        name: "archive",
        description: "Archive a URL directly and privately, react with 🏛️ on a message instead for others to see it",
    },
    CommandEntry { command: Command::ArchiveMessage, name: "Get snapshots", description: "" },
    CommandEntry { command: Command::Stats, name: "stats", description: "Show bot stats" },
    CommandEntry { command: Command::Settings, name: "settings", description: "Change settings" },
];

impl Command {
    fn entry(self) -> &'static CommandEntry {
        COMMANDS
            .iter()
            .find(|entry| entry.command == self)
            .unwrap_or(&COMMANDS[0])
    }

    pub fn name(self) -> &'static str {
        self.entry().name
    }

    pub fn description(self) -> &'static str {
        self.entry().description
    }

    pub fn from_name(name: &str) -> Result<Self, BotError> {
        let wanted = name.trim().trim_start_matches('/');
        COMMANDS
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(wanted))
            .map(|entry| entry.command)
            .ok_or_else(|| BotError::UnknownCommand(name.to_string()))
    }
}

/// Shown by `/help`.
pub const HELP_TEXT: &str = "**Usage**
React to a message that has links with 🏛 (the \"classical building\" emoji) and the bot will respond in the channel with an archive.org link for the link(s). It saves the page to archive.org if needed.
You can also use \"Get snapshots\" on a message to get a reply with snapshots for any link that only you can see.

**This is a pretty good way to get around paywalls to read articles for free.**

Configure the bot:
`/settings`

Get a snapshot for one URL, visible only to you:
`/archive`

Get stats for the bot:
`/stats`

Get this help message:
`/help`";

/// Footer shown under help and archive replies.
pub const PATIENCE_FOOTER: &str = "It can take up to a few minutes for archive.org to save a page, so if you don't get a link immediately, please be patient.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_command_has_an_entry() {
        for command in [Command::Help, Command::Archive, Command::ArchiveMessage, Command::Stats, Command::Settings] {
            assert_eq!(command.entry().command, command);
        }
        assert_eq!(COMMANDS.len(), 5);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Command::from_name("/archive").unwrap(), Command::Archive);
        assert_eq!(Command::from_name("Get snapshots").unwrap(), Command::ArchiveMessage);
        assert_eq!(Command::from_name("STATS").unwrap(), Command::Stats);
        assert!(matches!(Command::from_name("purge"), Err(BotError::UnknownCommand(_))));
    }

    #[test]
    fn test_help_text_mentions_commands() {
        for entry in COMMANDS.iter().filter(|s| !s.description.is_empty()) {
            assert!(HELP_TEXT.contains(&format!("`/{}`", entry.name)), "missing {}", entry.name);
        }
    }
}
