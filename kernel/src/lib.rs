// Confstream Kernel
//
// Versioned configuration repository over an append-only log: optimistic
// writes, a change-fed local cache, and read-time defaults.

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod feed;
pub mod log;
pub mod repo;
pub mod state;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::RepoConfig;
pub use error::{RepoError, RepoResult};
pub use feed::FeedHandle;
pub use log::{InMemoryLogStore, LogError, Version, VersionLogStore};
pub use repo::Repository;
pub use state::{ConfigValue, ValidationError, VersionedRecord};
