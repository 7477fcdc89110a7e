//! Per-path freshness records.

use serde::{Deserialize, Serialize};

/// The freshness token for a single synchronized path.
///
/// Conflict resolution across the whole system is last-writer-wins on
/// `modified`; `deleted` marks a tombstone so that deletions propagate the
/// same way modifications do. The pair is compared, never the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileData {
    /// Modification time in whole seconds since the Unix epoch. Monotone
    /// for events produced on a single machine.
    pub modified: i64,
    /// Tombstone flag. A deleted record with a newer `modified` wins over
    /// a live one, and vice versa.
    pub deleted: bool,
}

impl FileData {
    /// A live record at the given modification time.
    #[must_use]
    pub fn new(modified: i64) -> Self {
        Self {
            modified,
            deleted: false,
        }
    }

    /// A tombstone at the given modification time.
    #[must_use]
    pub fn tombstone(modified: i64) -> Self {
        Self {
            modified,
            deleted: true,
        }
    }

    /// The record reported for paths the metadata has never seen: deleted
    /// at time zero, so any real event is strictly newer.
    #[must_use]
    pub fn absent() -> Self {
        Self {
            modified: 0,
            deleted: true,
        }
    }
}

impl Default for FileData {
    fn default() -> Self {
        Self::absent()
    }
}
