// Version Store Client
//
// Typed adapter between the repository and a `VersionLogStore`. Encodes
// and decodes records, bounds every call with a timeout, and translates
// "duplicate key" into `ConcurrentUpdate`.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::RepoConfig;
use crate::error::{RepoError, RepoResult};
use crate::log::{
    ChangeSubscription, LogError, RecordQuery, StoredRecord, Version, VersionLogStore,
};
use crate::state::{ConfigValue, VersionedRecord};

pub struct VersionStoreClient<T, S: ?Sized> {
    store: Arc<S>,
    stream: String,
    operation_timeout: Duration,
    index_timeout: Duration,
    _value: PhantomData<fn() -> T>,
}

impl<T, S: ?Sized> Clone for VersionStoreClient<T, S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            stream: self.stream.clone(),
            operation_timeout: self.operation_timeout,
            index_timeout: self.index_timeout,
            _value: PhantomData,
        }
    }
}

async fn bounded<R>(
    operation: &'static str,
    limit: Duration,
    call: impl Future<Output = Result<R, LogError>>,
) -> Result<R, LogError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(LogError::Timeout {
            operation,
            elapsed: limit,
        }),
    }
}

impl<T, S> VersionStoreClient<T, S>
where
    T: ConfigValue,
    S: VersionLogStore + ?Sized,
{
    pub fn new(store: Arc<S>, config: &RepoConfig) -> Self {
        Self {
            store,
            stream: config.stream.clone(),
            operation_timeout: config.operation_timeout(),
            index_timeout: config.index_timeout(),
            _value: PhantomData,
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Strongly consistent read of the head of the stream.
    ///
    /// Fails with [`RepoError::NotFound`] when nothing was committed yet.
    pub async fn latest(&self) -> RepoResult<VersionedRecord<T>> {
        let query = RecordQuery::latest();
        let found = bounded(
            "read latest config",
            self.operation_timeout,
            self.store.find(&self.stream, &query),
        )
        .await
        .map_err(RepoError::storage("read latest config"))?;

        match found.into_iter().next() {
            Some(record) => decode(record),
            None => Err(RepoError::NotFound),
        }
    }

    /// Append `record`. Losing the race for its version yields
    /// [`RepoError::ConcurrentUpdate`].
    pub async fn insert(&self, record: &VersionedRecord<T>) -> RepoResult<()> {
        let stored = record.to_stored().map_err(RepoError::Codec)?;
        let inserted = bounded(
            "create config",
            self.operation_timeout,
            self.store.insert(&self.stream, stored),
        )
        .await;
        match inserted {
            Ok(()) => Ok(()),
            Err(LogError::DuplicateKey { version }) => {
                Err(RepoError::ConcurrentUpdate { version })
            }
            Err(err) => Err(RepoError::storage("create config")(err)),
        }
    }

    /// Records with `from <= version < to`, ascending.
    pub async fn list_versions(
        &self,
        from: Version,
        to: Version,
    ) -> RepoResult<Vec<VersionedRecord<T>>> {
        self.list("list configs by version", RecordQuery::versions(from, to))
            .await
    }

    /// Records with `from <= created_at < to`, oldest first.
    pub async fn list_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepoResult<Vec<VersionedRecord<T>>> {
        self.list("list configs by date", RecordQuery::created_between(from, to))
            .await
    }

    pub async fn watch(&self) -> RepoResult<Box<dyn ChangeSubscription>> {
        bounded(
            "watch configs",
            self.operation_timeout,
            self.store.watch(&self.stream),
        )
        .await
        .map_err(RepoError::Subscription)
    }

    pub async fn ensure_time_index(&self) -> RepoResult<()> {
        bounded(
            "create created_at index",
            self.index_timeout,
            self.store.ensure_time_index(&self.stream),
        )
        .await
        .map_err(RepoError::storage("create created_at index"))
    }

    async fn list(
        &self,
        context: &'static str,
        query: RecordQuery,
    ) -> RepoResult<Vec<VersionedRecord<T>>> {
        let found = bounded(
            context,
            self.operation_timeout,
            self.store.find(&self.stream, &query),
        )
        .await
        .map_err(RepoError::storage(context))?;
        found.into_iter().map(decode).collect()
    }
}

/// Decode a stored record into the typed form.
pub fn decode<T: ConfigValue>(record: StoredRecord) -> RepoResult<VersionedRecord<T>> {
    VersionedRecord::from_stored(record).map_err(RepoError::Codec)
}
