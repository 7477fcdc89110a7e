//! The path → freshness mapping exchanged between replicas.

use crate::FileData;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A snapshot of per-path sync state.
///
/// Keys are relative paths under the sync directory, slash-separated on
/// every platform. Lookups for unknown paths return [`FileData::absent`]
/// rather than an option, so freshness comparisons never special-case
/// missing entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    files: HashMap<String, FileData>,
}

impl Metadata {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record for `path`, or the absent record if unknown.
    #[must_use]
    pub fn get_file(&self, path: &str) -> FileData {
        self.files.get(path).copied().unwrap_or_else(FileData::absent)
    }

    /// Inserts or replaces the record for `path`.
    pub fn set_file(&mut self, path: impl Into<String>, data: FileData) {
        self.files.insert(path.into(), data);
    }

    /// Whether a record (live or tombstone) exists for `path`.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Iterates over all recorded paths.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FileData)> {
        self.files.iter()
    }

    /// Number of recorded paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the snapshot records no paths at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FromIterator<(String, FileData)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (String, FileData)>>(iter: T) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Metadata {
    type Item = (&'a String, &'a FileData);
    type IntoIter = std::collections::hash_map::Iter<'a, String, FileData>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}
