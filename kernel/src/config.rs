// Repository Configuration
//
// Knobs for one repository instance. Deserializable so hosts can load
// it from JSON/YAML; every field has a default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Stream used when none is configured.
pub const DEFAULT_STREAM: &str = "config";
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_INDEX_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Logical configuration stream inside the log.
    pub stream: String,
    /// Budget for each storage round trip, and for a whole update.
    /// Zero selects the default.
    pub operation_timeout_ms: u64,
    /// Budget for index creation during start. Zero selects the default.
    pub index_timeout_ms: u64,
    /// Skip index creation, e.g. when the index is managed elsewhere.
    pub skip_index_operations: bool,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            stream: DEFAULT_STREAM.to_string(),
            operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
            index_timeout_ms: DEFAULT_INDEX_TIMEOUT_MS,
            skip_index_operations: false,
        }
    }
}

impl RepoConfig {
    pub fn with_stream(mut self, stream: impl Into<String>) -> Self {
        self.stream = stream.into();
        self
    }

    pub fn skip_index_operations(mut self) -> Self {
        self.skip_index_operations = true;
        self
    }

    pub fn operation_timeout(&self) -> Duration {
        millis_or(self.operation_timeout_ms, DEFAULT_OPERATION_TIMEOUT_MS)
    }

    pub fn index_timeout(&self) -> Duration {
        millis_or(self.index_timeout_ms, DEFAULT_INDEX_TIMEOUT_MS)
    }
}

fn millis_or(ms: u64, default_ms: u64) -> Duration {
    match ms {
        0 => Duration::from_millis(default_ms),
        ms => Duration::from_millis(ms),
    }
}
