// Configuration Log Storage Abstraction
//
// Defines the contract consumed from the replicated append-only log.
// Replication, consensus and durability live behind this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ChangeEvent, LogError, StoredRecord, Version};

/// Which records a query selects. Ranges are `[from, to)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFilter {
    All,
    VersionRange { from: Version, to: Version },
    TimeRange { from: DateTime<Utc>, to: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Version,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub filter: RecordFilter,
    pub sort: SortField,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl RecordQuery {
    /// The single record with the highest version.
    pub fn latest() -> Self {
        Self {
            filter: RecordFilter::All,
            sort: SortField::Version,
            order: SortOrder::Descending,
            limit: Some(1),
        }
    }

    pub fn versions(from: Version, to: Version) -> Self {
        Self {
            filter: RecordFilter::VersionRange { from, to },
            sort: SortField::Version,
            order: SortOrder::Ascending,
            limit: None,
        }
    }

    pub fn created_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            filter: RecordFilter::TimeRange { from, to },
            sort: SortField::CreatedAt,
            order: SortOrder::Ascending,
            limit: None,
        }
    }
}

/// Live notification stream for one configuration stream.
///
/// Notifications arrive in commit order. Delivery is at-least-once, so
/// consumers must tolerate seeing a version they already hold.
#[async_trait]
pub trait ChangeSubscription: Send {
    /// Wait for the next notification. `None` means the feed ended.
    ///
    /// Must be cancel-safe: dropping the future loses no notification.
    async fn next_event(&mut self) -> Option<Result<ChangeEvent, LogError>>;

    /// Release the subscription on the log side.
    async fn close(&mut self);
}

/// Storage backend holding versioned configuration records.
///
/// Properties required from implementations:
/// - Append-only
/// - Ordered
/// - Unique on `version` within a stream
///
/// Implementations MUST NOT:
/// - Mutate committed records
/// - Accept two records with the same version in one stream
#[async_trait]
pub trait VersionLogStore: Send + Sync {
    /// Append a record.
    ///
    /// Fails with [`LogError::DuplicateKey`] when the version is taken.
    async fn insert(&self, stream: &str, record: StoredRecord) -> Result<(), LogError>;

    /// Run a query. An empty result is not an error.
    async fn find(&self, stream: &str, query: &RecordQuery)
        -> Result<Vec<StoredRecord>, LogError>;

    /// Open a change subscription filtered to `stream`.
    async fn watch(&self, stream: &str) -> Result<Box<dyn ChangeSubscription>, LogError>;

    /// Make sure time-range queries are indexed. Idempotent.
    async fn ensure_time_index(&self, stream: &str) -> Result<(), LogError>;
}
