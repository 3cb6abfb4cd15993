// Configuration Log Records
//
// Storage-facing shape of committed configuration versions and the
// change notifications emitted by the append-only log.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod memory;
pub mod store;

pub use memory::InMemoryLogStore;
pub use store::{
    ChangeSubscription, RecordFilter, RecordQuery, SortField, SortOrder, VersionLogStore,
};

/// Logical version of a configuration stream.
pub type Version = u64;

/// A committed configuration version as the log stores it.
///
/// `version` doubles as the record's unique key: the log rejects a second
/// record with the same version, which is what makes optimistic writes safe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub version: Version,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "config")]
    pub value: serde_json::Value,
}

/// Kind of mutation reported by the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
    Replace,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Replace => "replace",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One notification from the change feed.
///
/// Only inserts carry the full record; the other kinds identify the
/// affected key when the log knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub operation: OperationKind,
    pub version: Option<Version>,
    pub record: Option<StoredRecord>,
}

impl ChangeEvent {
    pub fn insert(record: StoredRecord) -> Self {
        Self {
            operation: OperationKind::Insert,
            version: Some(record.version),
            record: Some(record),
        }
    }

    pub fn without_record(operation: OperationKind, version: Option<Version>) -> Self {
        Self {
            operation,
            version,
            record: None,
        }
    }
}

/// Errors surfaced by a log backend.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("duplicate key: version {version} already exists")]
    DuplicateKey { version: Version },

    #[error("log unavailable: {0}")]
    Unavailable(String),

    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    #[error("change feed lagged, {0} notifications dropped")]
    Lagged(u64),

    #[error("change feed closed")]
    Closed,

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
