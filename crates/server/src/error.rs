//! Structured errors for the waybot server.
//!
//! Storage and validation failures come from [`waybot_core::Error`]; these
//! cover the bot surface itself.

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Errors raised by bot commands.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Settings can only be changed by server administrators.
    #[error("NOT_ADMINISTRATOR: changing settings requires a server administrator")]
    NotAdministrator,

    /// The setting id is not one the bot knows.
    #[error("UNKNOWN_SETTING: {0}")]
    UnknownSetting(String),

    /// The command name is not one the bot registers.
    #[error("UNKNOWN_COMMAND: {0}")]
    UnknownCommand(String),

    /// Settings only exist per server, not for direct messages.
    #[error("NO_SERVER: the bot does not have any per-user settings")]
    NoServer,
}

impl From<BotError> for McpError {
    fn from(err: BotError) -> Self {
        let code = match &err {
            BotError::NotAdministrator => -32003,
            BotError::UnknownSetting(_) | BotError::UnknownCommand(_) | BotError::NoServer => -32602,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err: McpError = BotError::NotAdministrator.into();
        assert_eq!(err.code, ErrorCode(-32003));
        assert!(err.message.starts_with("NOT_ADMINISTRATOR"));

        let err: McpError = BotError::UnknownSetting("colour".into()).into();
        assert_eq!(err.code, ErrorCode(-32602));
        assert!(err.message.contains("colour"));
    }
}
