// Versioned Configuration Repository
//
// Public read/write surface of one configuration stream. Reads come from
// the local cache slot; writes go straight to the log using optimistic
// versioning; the change feed keeps the cache converging on the head.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::client::VersionStoreClient;
use crate::clock::{Clock, SystemClock};
use crate::config::RepoConfig;
use crate::error::{RepoError, RepoResult};
use crate::feed::{ChangeFeed, FeedHandle, Publish, Publisher, UpdateHook};
use crate::log::{LogError, Version, VersionLogStore};
use crate::state::cache::{CacheSlot, CacheSnapshot};
use crate::state::defaults::overlay_record;
use crate::state::{ConfigValue, VersionedRecord};

pub struct Repository<T, S: ?Sized> {
    client: VersionStoreClient<T, S>,
    config: RepoConfig,
    publisher: Arc<Publisher<T>>,
    clock: Arc<dyn Clock>,
    instance_id: Uuid,
    starting: AtomicBool,
    started: AtomicBool,
}

impl<T, S> Repository<T, S>
where
    T: ConfigValue,
    S: VersionLogStore + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, config: RepoConfig) -> Self {
        Self {
            client: VersionStoreClient::new(store, &config),
            config,
            publisher: Arc::new(Publisher::new(Arc::new(CacheSlot::new()), None)),
            clock: Arc::new(SystemClock),
            instance_id: Uuid::new_v4(),
            starting: AtomicBool::new(false),
            started: AtomicBool::new(false),
        }
    }

    /// Source of `created_at` for versions written by this instance.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Called with the overlaid record after seeding and on every cache move.
    pub fn with_on_update<F>(mut self, hook: F) -> Self
    where
        F: Fn(&VersionedRecord<T>) + Send + Sync + 'static,
    {
        let hook: UpdateHook<T> = Arc::new(hook);
        self.publisher = Arc::new(Publisher::new(Arc::new(CacheSlot::new()), Some(hook)));
        self
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    /// Prepare the log, subscribe to its change feed and seed the cache.
    ///
    /// Returns once the cache holds the head of the stream. The feed keeps
    /// running until `cancel` fires; the returned handle resolves after it
    /// has closed its subscription. If this future fails or is dropped
    /// early, the feed it spawned is cancelled and `start` may be retried.
    pub async fn start(&self, cancel: CancellationToken) -> RepoResult<FeedHandle> {
        if self
            .starting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RepoError::AlreadyStarted);
        }
        let mut guard = StartGuard {
            starting: &self.starting,
            feed_cancel: None,
            completed: false,
        };

        match self.bootstrap(cancel, &mut guard).await {
            Ok(handle) => {
                self.started.store(true, Ordering::Release);
                guard.complete();
                Ok(handle)
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    stream = %self.config.stream,
                    instance = %self.instance_id,
                    "config repository failed to start"
                );
                Err(err)
            }
        }
    }

    async fn bootstrap(
        &self,
        cancel: CancellationToken,
        guard: &mut StartGuard<'_>,
    ) -> RepoResult<FeedHandle> {
        if self.config.skip_index_operations {
            tracing::debug!(stream = %self.config.stream, "skipping index creation");
        } else {
            self.client.ensure_time_index().await?;
        }

        let subscription = self.client.watch().await?;
        let feed_cancel = cancel.child_token();
        guard.feed_cancel = Some(feed_cancel.clone());
        let span = tracing::info_span!(
            "config_feed",
            stream = %self.config.stream,
            instance = %self.instance_id
        );
        let handle = ChangeFeed::new(self.client.clone(), Arc::clone(&self.publisher)).spawn(
            subscription,
            feed_cancel.clone(),
            span,
        );

        let seeded = match self.client.latest().await {
            Ok(record) => CacheSnapshot::from_record(record).map_err(RepoError::from),
            Err(RepoError::NotFound) => {
                CacheSnapshot::from_record(VersionedRecord::empty()).map_err(RepoError::from)
            }
            Err(err) => Err(err),
        };
        let snapshot = match seeded {
            Ok(snapshot) => Arc::new(snapshot),
            Err(err) => {
                feed_cancel.cancel();
                handle.stopped().await;
                return Err(err);
            }
        };

        let version = snapshot.version();
        if !self.publisher.publish(snapshot, Publish::Advance) {
            tracing::debug!(version, "change feed already delivered a newer version");
        }
        tracing::info!(
            stream = %self.config.stream,
            instance = %self.instance_id,
            version = self.cache().version().unwrap_or(version),
            "config repository started"
        );
        Ok(handle)
    }

    fn cache(&self) -> &CacheSlot<T> {
        self.publisher.cache()
    }

    fn ensure_started(&self) -> RepoResult<()> {
        if self.started.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(RepoError::NotStarted)
        }
    }

    /// Current cached snapshot. Never touches the log.
    pub fn snapshot(&self) -> RepoResult<Arc<CacheSnapshot<T>>> {
        self.ensure_started()?;
        self.cache().load().ok_or(RepoError::NotStarted)
    }

    /// Latest known configuration with defaults applied.
    pub fn get_latest(&self) -> RepoResult<T> {
        Ok(self.snapshot()?.display.value.clone())
    }

    /// Latest known configuration with defaults applied, plus audit data.
    pub fn get_latest_versioned(&self) -> RepoResult<VersionedRecord<T>> {
        Ok(self.snapshot()?.display.clone())
    }

    /// Committed versions in `[from, to)`, ascending, defaults applied.
    pub async fn list_by_version_range(
        &self,
        from: Version,
        to: Version,
    ) -> RepoResult<Vec<VersionedRecord<T>>> {
        self.ensure_started()?;
        let records = self.client.list_versions(from, to).await?;
        overlay_all(records)
    }

    /// Versions created in `[from, to)`, oldest first, defaults applied.
    pub async fn list_by_time_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepoResult<Vec<VersionedRecord<T>>> {
        self.ensure_started()?;
        let records = self.client.list_created_between(from, to).await?;
        overlay_all(records)
    }

    /// Merge `candidate` into the head of the stream and commit the result
    /// as the next version.
    ///
    /// Losing a race with another writer yields
    /// [`RepoError::ConcurrentUpdate`]; callers decide whether to retry.
    pub async fn update(&self, actor: &str, candidate: T) -> RepoResult<VersionedRecord<T>> {
        self.ensure_started()?;
        let limit = self.config.operation_timeout();
        match tokio::time::timeout(limit, self.commit(actor, candidate)).await {
            Ok(result) => result,
            Err(_) => Err(RepoError::Storage {
                context: "update config",
                source: LogError::Timeout {
                    operation: "update config",
                    elapsed: limit,
                },
            }),
        }
    }

    /// Like [`Repository::update`] for a loosely typed candidate.
    pub async fn update_json(
        &self,
        actor: &str,
        candidate: serde_json::Value,
    ) -> RepoResult<VersionedRecord<T>> {
        let candidate: T = serde_json::from_value(candidate).map_err(RepoError::TypeMismatch)?;
        self.update(actor, candidate).await
    }

    async fn commit(&self, actor: &str, candidate: T) -> RepoResult<VersionedRecord<T>> {
        let (version, value) = match self.client.latest().await {
            Ok(current) => (
                current.version + 1,
                current.value.merge_and_validate(&candidate)?,
            ),
            Err(RepoError::NotFound) => (1, candidate.merge_and_validate(&candidate)?),
            Err(err) => return Err(err),
        };

        let record = VersionedRecord {
            version,
            updated_by: actor.to_string(),
            created_at: self.clock.now(),
            value,
        };
        self.client.insert(&record).await?;
        tracing::info!(
            stream = %self.config.stream,
            version,
            updated_by = actor,
            "config version created"
        );
        Ok(overlay_record(&record)?)
    }
}

/// Undoes a `start` attempt that did not complete, whether it returned an
/// error or its future was dropped.
struct StartGuard<'a> {
    starting: &'a AtomicBool,
    feed_cancel: Option<CancellationToken>,
    completed: bool,
}

impl StartGuard<'_> {
    fn complete(mut self) {
        self.completed = true;
    }
}

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        if let Some(feed_cancel) = self.feed_cancel.take() {
            feed_cancel.cancel();
        }
        self.starting.store(false, Ordering::Release);
    }
}

fn overlay_all<T: ConfigValue>(
    records: Vec<VersionedRecord<T>>,
) -> RepoResult<Vec<VersionedRecord<T>>> {
    records
        .iter()
        .map(|record| overlay_record(record).map_err(RepoError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::log::{ChangeSubscription, InMemoryLogStore, RecordQuery, StoredRecord};
    use crate::state::ValidationError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Settings {
        name: String,
        limit: i64,
        tags: Vec<String>,
    }

    impl ConfigValue for Settings {
        fn merge_and_validate(&self, candidate: &Self) -> Result<Self, ValidationError> {
            if candidate.limit < 0 {
                return Err(ValidationError::new("limit must not be negative"));
            }
            let mut next = self.clone();
            next.name = candidate.name.clone();
            next.limit = candidate.limit;
            if !candidate.tags.is_empty() {
                next.tags = candidate.tags.clone();
            }
            Ok(next)
        }

        fn default_hints() -> serde_json::Value {
            json!({ "name": "john", "tags": ["a", "b"] })
        }
    }

    fn settings(name: &str, limit: i64) -> Settings {
        Settings {
            name: name.into(),
            limit,
            tags: Vec::new(),
        }
    }

    fn repo(store: &Arc<InMemoryLogStore>) -> Repository<Settings, InMemoryLogStore> {
        Repository::new(Arc::clone(store), RepoConfig::default())
    }

    #[tokio::test]
    async fn reads_and_writes_fail_before_start() {
        let store = Arc::new(InMemoryLogStore::new());
        let repo = repo(&store);

        assert!(matches!(repo.get_latest(), Err(RepoError::NotStarted)));
        assert!(matches!(repo.get_latest_versioned(), Err(RepoError::NotStarted)));
        assert!(matches!(
            repo.list_by_version_range(1, 10).await,
            Err(RepoError::NotStarted)
        ));
        assert!(matches!(
            repo.update("u", settings("x", 1)).await,
            Err(RepoError::NotStarted)
        ));
        assert_eq!(store.record_count("config").await, 0);
    }

    #[tokio::test]
    async fn empty_stream_reads_as_version_zero_with_defaults() {
        let store = Arc::new(InMemoryLogStore::new());
        let repo = repo(&store);
        let cancel = CancellationToken::new();
        let handle = repo.start(cancel.clone()).await.unwrap();

        let latest = repo.get_latest_versioned().unwrap();
        assert_eq!(latest.version, 0);
        assert_eq!(latest.updated_by, "");
        assert_eq!(latest.value.name, "john");
        assert_eq!(latest.value.tags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(repo.get_latest().unwrap().limit, 0);

        cancel.cancel();
        handle.stopped().await;
    }

    #[tokio::test]
    async fn sequential_writes_get_consecutive_versions() {
        let store = Arc::new(InMemoryLogStore::new());
        let repo = repo(&store);
        let cancel = CancellationToken::new();
        let handle = repo.start(cancel.clone()).await.unwrap();

        for n in 1..=4 {
            let written = repo.update("writer", settings("n", n)).await.unwrap();
            assert_eq!(written.version, n as u64);
            assert_eq!(written.updated_by, "writer");
        }
        assert_eq!(store.record_count("config").await, 4);

        cancel.cancel();
        handle.stopped().await;
    }

    #[tokio::test]
    async fn rejected_candidate_is_not_persisted() {
        let store = Arc::new(InMemoryLogStore::new());
        let repo = repo(&store);
        let cancel = CancellationToken::new();
        let handle = repo.start(cancel.clone()).await.unwrap();

        repo.update("u1", settings("ok", 3)).await.unwrap();
        let err = repo.update("u2", settings("bad", -1)).await.unwrap_err();

        assert!(matches!(
            err,
            RepoError::Validation(ref e) if e.reason() == "limit must not be negative"
        ));
        assert_eq!(store.record_count("config").await, 1);

        cancel.cancel();
        handle.stopped().await;
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Audited {
        value: i64,
    }

    static MERGE_CALLS: Mutex<Vec<(i64, i64)>> = Mutex::new(Vec::new());

    impl ConfigValue for Audited {
        fn merge_and_validate(&self, candidate: &Self) -> Result<Self, ValidationError> {
            MERGE_CALLS.lock().unwrap().push((self.value, candidate.value));
            Ok(candidate.clone())
        }
    }

    #[tokio::test]
    async fn first_write_validates_candidate_against_itself() {
        let store = Arc::new(InMemoryLogStore::new());
        let repo: Repository<Audited, InMemoryLogStore> =
            Repository::new(Arc::clone(&store), RepoConfig::default());
        let cancel = CancellationToken::new();
        let handle = repo.start(cancel.clone()).await.unwrap();

        repo.update("u", Audited { value: 7 }).await.unwrap();
        repo.update("u", Audited { value: 9 }).await.unwrap();

        assert_eq!(*MERGE_CALLS.lock().unwrap(), vec![(7, 7), (7, 9)]);

        cancel.cancel();
        handle.stopped().await;
    }

    #[tokio::test]
    async fn version_range_is_half_open_and_overlaid() {
        let store = Arc::new(InMemoryLogStore::new());
        let repo = repo(&store);
        let cancel = CancellationToken::new();
        let handle = repo.start(cancel.clone()).await.unwrap();

        for n in 1..=5 {
            repo.update("u", settings("", n)).await.unwrap();
        }

        let listed = repo.list_by_version_range(1, 3).await.unwrap();
        let versions: Vec<_> = listed.iter().map(|r| r.version).collect();
        assert_eq!(versions, vec![1, 2]);
        assert!(listed.iter().all(|r| r.value.name == "john"));

        assert!(repo.list_by_version_range(6, 10).await.unwrap().is_empty());

        cancel.cancel();
        handle.stopped().await;
    }

    #[tokio::test]
    async fn time_range_uses_created_at() {
        let store = Arc::new(InMemoryLogStore::new());
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let repo = repo(&store).with_clock(clock.clone());
        let cancel = CancellationToken::new();
        let handle = repo.start(cancel.clone()).await.unwrap();

        for n in 1..=4 {
            repo.update("u", settings("t", n)).await.unwrap();
            clock.advance(chrono::Duration::minutes(10));
        }

        let from = start + chrono::Duration::minutes(10);
        let to = start + chrono::Duration::minutes(30);
        let listed = repo.list_by_time_range(from, to).await.unwrap();
        let versions: Vec<_> = listed.iter().map(|r| r.version).collect();
        assert_eq!(versions, vec![2, 3]);
        assert_eq!(listed[0].created_at, from);

        cancel.cancel();
        handle.stopped().await;
    }

    #[tokio::test]
    async fn defaults_are_never_persisted() {
        let store = Arc::new(InMemoryLogStore::new());
        let repo = repo(&store);
        let cancel = CancellationToken::new();
        let handle = repo.start(cancel.clone()).await.unwrap();

        let written = repo.update("u", settings("", 1)).await.unwrap();
        assert_eq!(written.value.name, "john");

        let raw = repo.client.latest().await.unwrap();
        assert_eq!(raw.value.name, "");
        assert!(raw.value.tags.is_empty());

        cancel.cancel();
        handle.stopped().await;
    }

    #[tokio::test]
    async fn cache_follows_own_writes() {
        let store = Arc::new(InMemoryLogStore::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hook_seen = Arc::clone(&seen);
        let repo = repo(&store).with_on_update(move |record| {
            hook_seen.lock().unwrap().push(record.version);
        });
        let cancel = CancellationToken::new();
        let handle = repo.start(cancel.clone()).await.unwrap();

        repo.update("u", settings("fresh", 2)).await.unwrap();
        for _ in 0..200 {
            if repo.get_latest_versioned().unwrap().version == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        assert_eq!(repo.get_latest().unwrap().name, "fresh");
        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);

        cancel.cancel();
        handle.stopped().await;
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let store = Arc::new(InMemoryLogStore::new());
        let repo = repo(&store);
        let cancel = CancellationToken::new();
        let handle = repo.start(cancel.clone()).await.unwrap();

        assert!(matches!(
            repo.start(cancel.clone()).await,
            Err(RepoError::AlreadyStarted)
        ));

        cancel.cancel();
        handle.stopped().await;
    }

    #[tokio::test]
    async fn start_fails_when_log_is_unavailable() {
        let store = Arc::new(InMemoryLogStore::new());
        store.set_unavailable(true);
        let repo = repo(&store);

        let err = repo.start(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err,
            RepoError::Storage { context: "create created_at index", .. }
        ));
        assert!(matches!(repo.get_latest(), Err(RepoError::NotStarted)));
        assert_eq!(store.subscriber_count(), 0);

        store.set_unavailable(false);
        let cancel = CancellationToken::new();
        let handle = repo.start(cancel.clone()).await.unwrap();
        assert_eq!(repo.get_latest_versioned().unwrap().version, 0);
        cancel.cancel();
        handle.stopped().await;
    }

    #[tokio::test]
    async fn skip_index_leaves_log_untouched() {
        let store = Arc::new(InMemoryLogStore::new());
        let skipping: Repository<Settings, InMemoryLogStore> = Repository::new(
            Arc::clone(&store),
            RepoConfig::default().skip_index_operations(),
        );
        let cancel = CancellationToken::new();
        let handle = skipping.start(cancel.clone()).await.unwrap();

        assert!(!store.has_time_index("config").await);

        cancel.cancel();
        handle.stopped().await;
        let indexed = repo(&store);
        let cancel = CancellationToken::new();
        let handle = indexed.start(cancel.clone()).await.unwrap();
        assert!(store.has_time_index("config").await);
        cancel.cancel();
        handle.stopped().await;
    }

    #[tokio::test]
    async fn mistyped_json_candidate_writes_nothing() {
        let store = Arc::new(InMemoryLogStore::new());
        let repo = repo(&store);
        let cancel = CancellationToken::new();
        let handle = repo.start(cancel.clone()).await.unwrap();

        let err = repo
            .update_json("u", json!({ "limit": "plenty" }))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::TypeMismatch(_)));
        assert_eq!(store.record_count("config").await, 0);

        let written = repo
            .update_json("u", json!({ "name": "json", "limit": 4 }))
            .await
            .unwrap();
        assert_eq!(written.version, 1);
        assert_eq!(written.value.limit, 4);

        cancel.cancel();
        handle.stopped().await;
    }

    #[tokio::test]
    async fn streams_are_independent() {
        let store = Arc::new(InMemoryLogStore::new());
        let flags: Repository<Settings, InMemoryLogStore> =
            Repository::new(Arc::clone(&store), RepoConfig::default().with_stream("flags"));
        let main = repo(&store);
        let cancel = CancellationToken::new();
        let flags_handle = flags.start(cancel.clone()).await.unwrap();
        let main_handle = main.start(cancel.clone()).await.unwrap();

        flags.update("u", settings("f", 1)).await.unwrap();
        let written = main.update("u", settings("m", 1)).await.unwrap();

        assert_eq!(written.version, 1);
        assert_eq!(store.record_count("flags").await, 1);
        assert_eq!(store.record_count("config").await, 1);

        cancel.cancel();
        flags_handle.stopped().await;
        main_handle.stopped().await;
    }

    /// In-memory log whose point reads can be slowed down or failed while
    /// the change feed keeps working.
    #[derive(Default)]
    struct FlakyReads {
        inner: InMemoryLogStore,
        slow_reads: AtomicBool,
        failing_reads: AtomicBool,
    }

    #[async_trait]
    impl VersionLogStore for FlakyReads {
        async fn insert(&self, stream: &str, record: StoredRecord) -> Result<(), LogError> {
            self.inner.insert(stream, record).await
        }

        async fn find(
            &self,
            stream: &str,
            query: &RecordQuery,
        ) -> Result<Vec<StoredRecord>, LogError> {
            if self.slow_reads.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            if self.failing_reads.load(Ordering::SeqCst) {
                return Err(LogError::Unavailable("find down".into()));
            }
            self.inner.find(stream, query).await
        }

        async fn watch(&self, stream: &str) -> Result<Box<dyn ChangeSubscription>, LogError> {
            self.inner.watch(stream).await
        }

        async fn ensure_time_index(&self, stream: &str) -> Result<(), LogError> {
            self.inner.ensure_time_index(stream).await
        }
    }

    async fn wait_for_no_subscribers(store: &InMemoryLogStore) {
        for _ in 0..100 {
            if store.subscriber_count() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("{} subscriptions still open", store.subscriber_count());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_start_can_be_retried() {
        let store = Arc::new(FlakyReads::default());
        store.slow_reads.store(true, Ordering::SeqCst);
        let repo: Repository<Settings, FlakyReads> =
            Repository::new(Arc::clone(&store), RepoConfig::default());
        let cancel = CancellationToken::new();

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), repo.start(cancel.clone())).await;
        assert!(abandoned.is_err());
        assert!(matches!(repo.get_latest(), Err(RepoError::NotStarted)));
        wait_for_no_subscribers(&store.inner).await;

        store.slow_reads.store(false, Ordering::SeqCst);
        let handle = repo.start(cancel.clone()).await.unwrap();
        assert_eq!(repo.get_latest_versioned().unwrap().version, 0);
        assert_eq!(store.inner.subscriber_count(), 1);

        cancel.cancel();
        handle.stopped().await;
    }

    #[tokio::test]
    async fn failed_seed_read_stops_the_spawned_feed() {
        let store = Arc::new(FlakyReads::default());
        store.failing_reads.store(true, Ordering::SeqCst);
        let repo: Repository<Settings, FlakyReads> =
            Repository::new(Arc::clone(&store), RepoConfig::default());
        let cancel = CancellationToken::new();

        let err = repo.start(cancel.clone()).await.unwrap_err();
        assert!(matches!(
            err,
            RepoError::Storage { context: "read latest config", source: LogError::Unavailable(_) }
        ));
        assert_eq!(store.inner.subscriber_count(), 0);
        assert!(!cancel.is_cancelled());

        store.failing_reads.store(false, Ordering::SeqCst);
        let handle = repo.start(cancel.clone()).await.unwrap();
        assert_eq!(repo.get_latest_versioned().unwrap().version, 0);

        cancel.cancel();
        handle.stopped().await;
    }

    #[tokio::test]
    async fn failed_watch_is_a_subscription_error() {
        let store = Arc::new(InMemoryLogStore::new());
        store.set_unavailable(true);
        let repo: Repository<Settings, InMemoryLogStore> = Repository::new(
            Arc::clone(&store),
            RepoConfig::default().skip_index_operations(),
        );

        let err = repo.start(CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, RepoError::Subscription(LogError::Unavailable(_))));
        assert!(matches!(repo.get_latest(), Err(RepoError::NotStarted)));
    }
}
