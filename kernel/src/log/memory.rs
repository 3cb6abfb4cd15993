// In-Memory Configuration Log
//
// Process-local implementation of `VersionLogStore`. Every repository
// sharing one instance behaves as if it were a peer process attached to
// the same replicated log. Not durable.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use super::store::{ChangeSubscription, RecordFilter, RecordQuery, SortField, SortOrder};
use super::{ChangeEvent, LogError, OperationKind, StoredRecord, Version, VersionLogStore};

/// Notifications buffered per subscriber before it starts lagging.
pub const DEFAULT_FEED_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct StreamLog {
    records: BTreeMap<Version, StoredRecord>,
    time_indexed: bool,
}

/// In-memory append-only log with a broadcast change feed.
///
/// Inserts and their notifications are sequenced under the same write
/// lock, so subscribers observe commits in commit order.
#[derive(Debug)]
pub struct InMemoryLogStore {
    streams: RwLock<HashMap<String, StreamLog>>,
    changes: broadcast::Sender<(String, ChangeEvent)>,
    unavailable: AtomicBool,
}

impl Default for InMemoryLogStore {
    fn default() -> Self {
        Self::with_feed_capacity(DEFAULT_FEED_CAPACITY)
    }
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed_capacity(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            streams: RwLock::new(HashMap::new()),
            changes,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulate an outage: every operation fails with `Unavailable`
    /// until cleared. Open subscriptions keep running.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Publish a raw notification without touching stored records.
    pub fn inject(&self, stream: &str, event: ChangeEvent) {
        let _ = self.changes.send((stream.to_string(), event));
    }

    /// Remove a record and announce the delete, as an operator editing
    /// the log by hand would.
    pub async fn delete(&self, stream: &str, version: Version) -> Option<StoredRecord> {
        let mut streams = self.streams.write().await;
        let removed = streams.get_mut(stream)?.records.remove(&version)?;
        let event = ChangeEvent::without_record(OperationKind::Delete, Some(version));
        let _ = self.changes.send((stream.to_string(), event));
        Some(removed)
    }

    pub async fn record_count(&self, stream: &str) -> usize {
        self.streams
            .read()
            .await
            .get(stream)
            .map(|log| log.records.len())
            .unwrap_or(0)
    }

    pub async fn has_time_index(&self, stream: &str) -> bool {
        self.streams
            .read()
            .await
            .get(stream)
            .map(|log| log.time_indexed)
            .unwrap_or(false)
    }

    /// Number of subscriptions currently attached to the feed.
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    fn check_available(&self) -> Result<(), LogError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LogError::Unavailable("in-memory log marked unavailable".into()));
        }
        Ok(())
    }
}

fn selects(filter: &RecordFilter, record: &StoredRecord) -> bool {
    match filter {
        RecordFilter::All => true,
        RecordFilter::VersionRange { from, to } => record.version >= *from && record.version < *to,
        RecordFilter::TimeRange { from, to } => {
            record.created_at >= *from && record.created_at < *to
        }
    }
}

#[async_trait]
impl VersionLogStore for InMemoryLogStore {
    async fn insert(&self, stream: &str, record: StoredRecord) -> Result<(), LogError> {
        self.check_available()?;
        let mut streams = self.streams.write().await;
        let log = streams.entry(stream.to_string()).or_default();
        if log.records.contains_key(&record.version) {
            return Err(LogError::DuplicateKey {
                version: record.version,
            });
        }
        log.records.insert(record.version, record.clone());
        // Notify while still holding the lock to keep feed order == commit order.
        let _ = self
            .changes
            .send((stream.to_string(), ChangeEvent::insert(record)));
        Ok(())
    }

    async fn find(
        &self,
        stream: &str,
        query: &RecordQuery,
    ) -> Result<Vec<StoredRecord>, LogError> {
        self.check_available()?;
        let streams = self.streams.read().await;
        let Some(log) = streams.get(stream) else {
            return Ok(Vec::new());
        };

        let mut found: Vec<StoredRecord> = log
            .records
            .values()
            .filter(|record| selects(&query.filter, record))
            .cloned()
            .collect();

        // BTreeMap iteration is already ascending by version.
        if query.sort == SortField::CreatedAt {
            found.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then(a.version.cmp(&b.version))
            });
        }
        if query.order == SortOrder::Descending {
            found.reverse();
        }
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn watch(&self, stream: &str) -> Result<Box<dyn ChangeSubscription>, LogError> {
        self.check_available()?;
        Ok(Box::new(MemorySubscription {
            stream: stream.to_string(),
            receiver: Some(self.changes.subscribe()),
        }))
    }

    async fn ensure_time_index(&self, stream: &str) -> Result<(), LogError> {
        self.check_available()?;
        let mut streams = self.streams.write().await;
        streams.entry(stream.to_string()).or_default().time_indexed = true;
        Ok(())
    }
}

struct MemorySubscription {
    stream: String,
    receiver: Option<broadcast::Receiver<(String, ChangeEvent)>>,
}

#[async_trait]
impl ChangeSubscription for MemorySubscription {
    async fn next_event(&mut self) -> Option<Result<ChangeEvent, LogError>> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok((stream, event)) if stream == self.stream => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    return Some(Err(LogError::Lagged(skipped)))
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    async fn close(&mut self) {
        self.receiver.take();
    }
}
