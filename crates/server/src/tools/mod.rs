//! MCP tool implementations.
//!
//! One module per bot command, plus server registration.

pub mod archive;
pub mod help;
pub mod register;
pub mod settings;
pub mod stats;

pub use archive::ArchiveParams;
pub use help::HelpParams;
pub use register::RegisterServerParams;
pub use settings::{SettingsParams, UpdateSettingParams};
pub use stats::StatsParams;
