// Repository Errors
//
// Outcomes callers of the repository can observe. Store-native failures
// arrive as `LogError` and are wrapped with the operation that hit them.

use crate::log::{LogError, Version};
use crate::state::defaults::OverlayError;
use crate::state::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("config repository not started - call start() before using it")]
    NotStarted,

    #[error("config repository already started")]
    AlreadyStarted,

    #[error("configuration not found")]
    NotFound,

    #[error("configuration concurrently updated by someone else: version {version} already exists")]
    ConcurrentUpdate { version: Version },

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("{context}: {source}")]
    Storage {
        context: &'static str,
        source: LogError,
    },

    #[error("error watching configs: {0}")]
    Subscription(#[source] LogError),

    #[error("candidate does not match the configuration type: {0}")]
    TypeMismatch(#[source] serde_json::Error),

    #[error("failed to set defaults: {0}")]
    Overlay(#[from] OverlayError),

    #[error("failed to decode config: {0}")]
    Codec(#[source] serde_json::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

impl RepoError {
    pub(crate) fn storage(context: &'static str) -> impl FnOnce(LogError) -> Self {
        move |source| RepoError::Storage { context, source }
    }

    /// Whether re-running the whole read-merge-insert cycle may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RepoError::ConcurrentUpdate { .. })
    }
}
