//! Dispatcher configuration and its TOML loader.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// What the dispatcher does when a write fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyPolicy {
    /// Keep the optimistic UI state and only log the failure.
    #[default]
    OptimisticNoRollback,
    /// Re-read the durable document and publish it in place of the failed revision.
    ReconcileOnFailure,
}

/// What happens to outstanding writes when the dispatcher stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownPolicy {
    /// Wait for every outstanding write.
    #[default]
    AwaitOutstanding,
    /// Abort outstanding writes, logging what was dropped.
    Abandon,
}

/// Dispatcher tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Capacity of the intent queue between handles and the dispatcher task.
    pub command_queue_bound: usize,
    /// Capacity of the broadcast event ring.
    pub event_capacity: usize,
    /// Write-failure policy.
    pub consistency: ConsistencyPolicy,
    /// Outstanding-write policy on shutdown.
    pub teardown: TeardownPolicy,
    /// Also write after text-highlight revisions.
    pub persist_text_highlight_edits: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_queue_bound: 256,
            event_capacity: 1024,
            consistency: ConsistencyPolicy::default(),
            teardown: TeardownPolicy::default(),
            persist_text_highlight_edits: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),
}

impl RuntimeConfig {
    /// Parses a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads config from `path`.
    ///
    /// A missing file yields the defaults; a file that exists but does not
    /// parse is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path.as_ref()) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        Self::from_toml_str(&content)
    }
}
