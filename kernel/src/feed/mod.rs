// Change Feed Subscriber
//
// Background task that follows the log's change feed and republishes
// every newly committed version into the repository's cache slot.
// Individual bad notifications are logged and skipped; only
// cancellation or the end of the feed stops the task.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::client::VersionStoreClient;
use crate::error::RepoError;
use crate::log::{
    ChangeEvent, ChangeSubscription, LogError, OperationKind, StoredRecord, VersionLogStore,
};
use crate::state::cache::{CacheSlot, CacheSnapshot};
use crate::state::{ConfigValue, VersionedRecord};

/// Callback invoked with the overlaid record each time the cache moves.
pub type UpdateHook<T> = Arc<dyn Fn(&VersionedRecord<T>) + Send + Sync>;

/// Completion handle of a running change feed.
#[derive(Debug)]
pub struct FeedHandle {
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Wait until the feed task has exited and closed its subscription.
    pub async fn stopped(self) {
        if let Err(err) = self.task.await {
            tracing::error!(error = %err, "config feed task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// How a freshly built snapshot is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Publish {
    /// Only if newer than what the slot holds.
    Advance,
    /// Unconditionally; used after a resync from storage.
    Replace,
}

/// Single writer path into a cache slot.
///
/// The slot swap and the hook call happen under one lock, so the hook
/// observes versions in the order the slot took them. Readers of the slot
/// never take the lock.
pub(crate) struct Publisher<T> {
    cache: Arc<CacheSlot<T>>,
    on_update: Option<UpdateHook<T>>,
    order: Mutex<()>,
}

impl<T: ConfigValue> Publisher<T> {
    pub(crate) fn new(cache: Arc<CacheSlot<T>>, on_update: Option<UpdateHook<T>>) -> Self {
        Self {
            cache,
            on_update,
            order: Mutex::new(()),
        }
    }

    pub(crate) fn cache(&self) -> &CacheSlot<T> {
        &self.cache
    }

    /// Returns whether the slot took `snapshot`.
    pub(crate) fn publish(&self, snapshot: Arc<CacheSnapshot<T>>, mode: Publish) -> bool {
        let _order = self.order.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let published = match mode {
            Publish::Advance => self.cache.advance(Arc::clone(&snapshot)),
            Publish::Replace => {
                self.cache.replace(Arc::clone(&snapshot));
                true
            }
        };
        if published {
            if let Some(hook) = &self.on_update {
                hook(&snapshot.display);
            }
        }
        published
    }
}

pub(crate) struct ChangeFeed<T, S: ?Sized> {
    client: VersionStoreClient<T, S>,
    publisher: Arc<Publisher<T>>,
}

impl<T, S> ChangeFeed<T, S>
where
    T: ConfigValue,
    S: VersionLogStore + ?Sized + 'static,
{
    pub(crate) fn new(client: VersionStoreClient<T, S>, publisher: Arc<Publisher<T>>) -> Self {
        Self { client, publisher }
    }

    pub(crate) fn spawn(
        self,
        subscription: Box<dyn ChangeSubscription>,
        cancel: CancellationToken,
        span: tracing::Span,
    ) -> FeedHandle {
        let task = tokio::spawn(self.run(subscription, cancel).instrument(span));
        FeedHandle { task }
    }

    async fn run(self, mut subscription: Box<dyn ChangeSubscription>, cancel: CancellationToken) {
        tracing::debug!("config feed started");
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("config feed cancelled");
                    break;
                }
                next = subscription.next_event() => next,
            };

            match next {
                Some(Ok(event)) => self.handle(event).await,
                Some(Err(LogError::Lagged(skipped))) => {
                    tracing::warn!(skipped, "config feed lagged, resyncing from storage");
                    self.resync().await;
                }
                Some(Err(err)) => {
                    tracing::error!(error = %err, "error reading change stream element");
                }
                None => {
                    tracing::warn!("config change stream ended");
                    break;
                }
            }
        }
        subscription.close().await;
        tracing::debug!("config feed stopped");
    }

    async fn handle(&self, event: ChangeEvent) {
        match (event.operation, event.record) {
            (OperationKind::Insert, Some(record)) => self.apply_insert(record),
            (OperationKind::Insert, None) => {
                tracing::error!(version = ?event.version, "insert notification without record");
            }
            (operation, _) => {
                // Committed versions are immutable; anything else means the
                // log was edited behind our back, so re-read the head.
                tracing::error!(
                    operation = %operation,
                    version = ?event.version,
                    "invalid or unexpected operation on config stream"
                );
                self.resync().await;
            }
        }
    }

    fn apply_insert(&self, stored: StoredRecord) {
        let version = stored.version;
        match VersionedRecord::<T>::from_stored(stored) {
            Ok(record) => self.publish(record, Publish::Advance),
            Err(err) => {
                tracing::error!(error = %err, version, "error decoding change stream element");
            }
        }
    }

    async fn resync(&self) {
        let record = match self.client.latest().await {
            Ok(record) => record,
            Err(RepoError::NotFound) => VersionedRecord::empty(),
            Err(err) => {
                tracing::error!(error = %err, "config resync failed, keeping cached version");
                return;
            }
        };
        self.publish(record, Publish::Replace);
    }

    fn publish(&self, record: VersionedRecord<T>, mode: Publish) {
        let version = record.version;
        let snapshot = match CacheSnapshot::from_record(record) {
            Ok(snapshot) => Arc::new(snapshot),
            Err(err) => {
                tracing::error!(error = %err, version, "could not set defaults");
                return;
            }
        };

        if self.publisher.publish(snapshot, mode) {
            tracing::debug!(version, "config cache refreshed");
        } else {
            tracing::trace!(version, "stale notification ignored");
        }
    }
}
