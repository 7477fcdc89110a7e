//! Local metadata persistence.
//!
//! The snapshot lives beside the sync directory rather than inside it,
//! so it is never observed by the watcher and never shipped to the
//! server. Local metadata is rebuilt on load as the union of a
//! directory scan and the tombstones the previous run left behind.

use crate::error::ClientResult;
use driftsync_types::{unix_now, FileData, Metadata};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::debug;

/// Loads and saves the local metadata snapshot for one sync directory.
pub struct MetaStore {
    sync_dir: PathBuf,
    snapshot: PathBuf,
}

impl MetaStore {
    /// Creates a store for `sync_dir`. For a directory `path/to/notes`
    /// the snapshot is `path/to/.notes.driftsync-meta.json`.
    #[must_use]
    pub fn new(sync_dir: &Path) -> Self {
        let name = sync_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("sync");
        let file = format!(".{name}.driftsync-meta.json");
        let snapshot = match sync_dir.parent() {
            Some(parent) => parent.join(&file),
            None => PathBuf::from(&file),
        };
        Self {
            sync_dir: sync_dir.to_path_buf(),
            snapshot,
        }
    }

    /// Where the snapshot is written.
    #[must_use]
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot
    }

    /// Rebuilds local metadata: every file on disk at its current mtime,
    /// plus a tombstone for every snapshot entry whose file is gone.
    ///
    /// A fresh tombstone is stamped with the scan time — the latest
    /// bound on when the offline deletion can have happened — so it
    /// still wins the merge against the server's stale record.
    pub async fn load(&self) -> ClientResult<Metadata> {
        let previous = self.read_snapshot().await?;
        let mut meta = self.scan().await?;

        for (path, data) in &previous {
            if meta.contains(path) {
                continue;
            }
            let tombstone = if data.deleted {
                *data
            } else {
                debug!("file deleted while offline: {path}");
                FileData::tombstone(unix_now())
            };
            meta.set_file(path.clone(), tombstone);
        }
        Ok(meta)
    }

    /// Persists the snapshot.
    pub async fn save(&self, meta: &Metadata) -> ClientResult<()> {
        let body = serde_json::to_string_pretty(meta)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.snapshot, body).await?;
        Ok(())
    }

    async fn read_snapshot(&self) -> ClientResult<Metadata> {
        match fs::read_to_string(&self.snapshot).await {
            Ok(body) => {
                let meta = serde_json::from_str(&body)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                Ok(meta)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Metadata::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn scan(&self) -> ClientResult<Metadata> {
        let mut meta = Metadata::new();
        let mut dirs = vec![self.sync_dir.clone()];
        while let Some(dir) = dirs.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    dirs.push(entry.path());
                } else if file_type.is_file() {
                    let Some(rel) = rel_path(&self.sync_dir, &entry.path()) else {
                        continue;
                    };
                    let stat = entry.metadata().await?;
                    let mtime = stat.modified().map_or_else(|_| unix_now(), unix_secs);
                    meta.set_file(rel, FileData::new(mtime));
                }
            }
        }
        Ok(meta)
    }
}

/// Slash-separated path of `abs` relative to `root`, or `None` when
/// `abs` is not under `root`.
pub(crate) fn rel_path(root: &Path, abs: &Path) -> Option<String> {
    let rel = abs.strip_prefix(root).ok()?;
    let parts: Vec<&str> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Whole seconds since the Unix epoch, clamped to zero for pre-epoch
/// times.
pub(crate) fn unix_secs(t: SystemTime) -> i64 {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}
