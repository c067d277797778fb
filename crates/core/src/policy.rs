//! Per-server retry policy consumed by the archive pipeline.

use serde::{Deserialize, Serialize};

/// How hard to try when resolving a URL.
///
/// Derived from a server's settings and treated as read-only by the
/// pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RetryPolicy {
    /// Attempt budget for the availability/save sequence. `0` and `1` both
    /// mean a single try.
    pub attempts: u8,
    /// Skip the availability check and always request a new capture.
    pub always_snapshot_first: bool,
}

impl RetryPolicy {
    /// Number of tries the budget allows; never less than one.
    pub fn tries(&self) -> u32 {
        u32::from(self.attempts.max(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 1, always_snapshot_first: false }
    }
}
