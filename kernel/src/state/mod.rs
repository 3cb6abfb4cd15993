// Configuration Values
//
// The caller-defined configuration type and its versioned envelope.
// This module is pure: no I/O, no shared state.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::log::{StoredRecord, Version};

pub mod cache;
pub mod defaults;

/// Rejection produced by [`ConfigValue::merge_and_validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct ValidationError {
    reason: String,
}

impl ValidationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Application configuration stored by a repository.
///
/// `Default` is the zero value observed before the first write.
pub trait ConfigValue:
    Serialize + DeserializeOwned + Clone + Default + PartialEq + Debug + Send + Sync + 'static
{
    /// Produce the next committed value from `self` (the current head) and
    /// a candidate submitted by a writer.
    ///
    /// Neither argument has defaults applied. For the very first write the
    /// candidate is merged into itself.
    fn merge_and_validate(&self, candidate: &Self) -> Result<Self, ValidationError>;

    /// Read-time defaults, as a JSON object keyed by serialized field name.
    ///
    /// A hint applies when the field is missing or holds its zero value.
    /// Nested objects recurse into nested structs.
    fn default_hints() -> serde_json::Value {
        serde_json::Value::Object(serde_json::Map::new())
    }
}

/// A configuration value plus its audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedRecord<T> {
    pub version: Version,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "config")]
    pub value: T,
}

impl<T: ConfigValue> VersionedRecord<T> {
    /// Placeholder observed while the stream has no committed version.
    pub fn empty() -> Self {
        Self {
            version: 0,
            updated_by: String::new(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            value: T::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.version == 0
    }

    pub fn to_stored(&self) -> Result<StoredRecord, serde_json::Error> {
        Ok(StoredRecord {
            version: self.version,
            updated_by: self.updated_by.clone(),
            created_at: self.created_at,
            value: serde_json::to_value(&self.value)?,
        })
    }

    pub fn from_stored(record: StoredRecord) -> Result<Self, serde_json::Error> {
        Ok(Self {
            version: record.version,
            updated_by: record.updated_by,
            created_at: record.created_at,
            value: serde_json::from_value(record.value)?,
        })
    }
}
