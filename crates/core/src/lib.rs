//! Core types and shared functionality for waybot.
//!
//! This crate provides:
//! - The SQLite store for archive records, server settings and stats
//! - Unified error types
//! - Layered application configuration
//! - The retry policy handed to the archive pipeline

pub mod config;
pub mod db;
pub mod error;
pub mod policy;

pub use config::{AppConfig, ConfigError};
pub use db::{ArchiveDb, ArchiveRecord, BotStats, ServerConfig, ServerSettings, Setting, SettingKey, StatsScope};
pub use error::Error;
pub use policy::RetryPolicy;
