// Configuration Cache Slot
//
// Process-local copy of the latest committed version, paired with its
// display overlay. The pair is published as one immutable snapshot so
// readers can never see a record with another version's overlay.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use super::defaults::{overlay_record, OverlayError};
use super::{ConfigValue, VersionedRecord};
use crate::log::Version;

/// A committed record and its defaults-overlaid display copy.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSnapshot<T> {
    pub record: VersionedRecord<T>,
    pub display: VersionedRecord<T>,
}

impl<T: ConfigValue> CacheSnapshot<T> {
    pub fn from_record(record: VersionedRecord<T>) -> Result<Self, OverlayError> {
        let display = overlay_record(&record)?;
        Ok(Self { record, display })
    }

    pub fn version(&self) -> Version {
        self.record.version
    }
}

/// Lock-free holder of the current snapshot.
///
/// Empty until the repository seeds it.
#[derive(Debug)]
pub struct CacheSlot<T> {
    current: ArcSwapOption<CacheSnapshot<T>>,
}

impl<T> Default for CacheSlot<T> {
    fn default() -> Self {
        Self {
            current: ArcSwapOption::new(None),
        }
    }
}

impl<T> CacheSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self) -> Option<Arc<CacheSnapshot<T>>> {
        self.current.load_full()
    }

    pub fn version(&self) -> Option<Version> {
        (*self.current.load())
            .as_ref()
            .map(|snapshot| snapshot.record.version)
    }

    /// Publish `next` unless the slot already holds the same or a newer
    /// version. Returns whether `next` was published.
    pub fn advance(&self, next: Arc<CacheSnapshot<T>>) -> bool {
        let mut published = false;
        self.current.rcu(|current| match current {
            Some(held) if held.record.version >= next.record.version => {
                published = false;
                Some(Arc::clone(held))
            }
            _ => {
                published = true;
                Some(Arc::clone(&next))
            }
        });
        published
    }

    /// Publish `next` unconditionally.
    pub fn replace(&self, next: Arc<CacheSnapshot<T>>) {
        self.current.store(Some(next));
    }
}
