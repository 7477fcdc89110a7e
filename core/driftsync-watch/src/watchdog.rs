//! The watchdog: platform file events in, per-file sync events out.

use crate::error::{WatchError, WatchResult};
use driftsync_types::unix_now;
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// How long a lifted suppression keeps matching. Platform watchers
/// deliver events asynchronously, so an event generated inside a
/// disregard bracket can reach the callback shortly after the bracket
/// ends; without the linger it would leak through as a phantom local
/// event.
const REGARD_LINGER: Duration = Duration::from_millis(250);

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Created,
    Modified,
    Deleted,
}

/// A single observed change under the watch root.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    /// Absolute path of the affected file.
    pub path: PathBuf,
    /// The file's mtime at event time, or the observation time for
    /// deletions.
    pub modified: i64,
    pub status: FileStatus,
}

#[derive(Default)]
struct Suppression {
    active: HashSet<PathBuf>,
    lingering: HashMap<PathBuf, Instant>,
}

impl Suppression {
    fn matches(&mut self, path: &Path) -> bool {
        if self.active.contains(path) {
            return true;
        }
        match self.lingering.get(path) {
            Some(expiry) if Instant::now() < *expiry => true,
            Some(_) => {
                self.lingering.remove(path);
                false
            }
            None => false,
        }
    }
}

/// Recursive directory watcher with a suppression set.
///
/// Events whose path is currently disregarded are dropped inside the
/// platform callback, so suppression is effective the moment
/// [`disregard`](Watchdog::disregard) returns, and keeps matching for a
/// short linger after [`regard`](Watchdog::regard).
pub struct Watchdog {
    suppressed: Arc<Mutex<Suppression>>,
    events: tokio::sync::Mutex<mpsc::Receiver<WatchEvent>>,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl Watchdog {
    /// Creates a watchdog with no watches registered yet.
    pub fn new() -> WatchResult<Self> {
        let suppressed = Arc::new(Mutex::new(Suppression::default()));
        let (tx, rx) = mpsc::channel::<WatchEvent>(1024);

        let filter = Arc::clone(&suppressed);
        let watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("watcher error: {e}");
                        return;
                    }
                };
                for out in translate(&event) {
                    if filter
                        .lock()
                        .expect("suppression set poisoned")
                        .matches(&out.path)
                    {
                        debug!("suppressed event for {}", out.path.display());
                        continue;
                    }
                    // The receiver dropping just means the client shut down.
                    let _ = tx.blocking_send(out);
                }
            },
            Config::default(),
        )?;

        Ok(Self {
            suppressed,
            events: tokio::sync::Mutex::new(rx),
            watcher: Mutex::new(Some(watcher)),
        })
    }

    /// Starts watching `root`.
    pub fn add_watch(&self, root: &Path, recursive: bool) -> WatchResult<()> {
        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        let mut guard = self.watcher.lock().expect("watcher lock poisoned");
        match guard.as_mut() {
            Some(watcher) => {
                watcher.watch(root, mode)?;
                Ok(())
            }
            None => Err(WatchError::Closed),
        }
    }

    /// Blocks until the next event, or fails once the watchdog is closed
    /// and the queue has drained.
    pub async fn wait(&self) -> WatchResult<WatchEvent> {
        let mut rx = self.events.lock().await;
        rx.recv().await.ok_or(WatchError::Closed)
    }

    /// Suppresses events for `path` until the matching
    /// [`regard`](Watchdog::regard). Distinct paths may be disregarded
    /// concurrently.
    pub fn disregard(&self, path: &Path) {
        let mut suppressed = self.suppressed.lock().expect("suppression set poisoned");
        suppressed.lingering.remove(path);
        suppressed.active.insert(path.to_path_buf());
    }

    /// Lifts the suppression installed by [`disregard`](Watchdog::disregard).
    /// Late-arriving events for the path stay suppressed for a short
    /// linger window.
    pub fn regard(&self, path: &Path) {
        let mut suppressed = self.suppressed.lock().expect("suppression set poisoned");
        if suppressed.active.remove(path) {
            suppressed
                .lingering
                .insert(path.to_path_buf(), Instant::now() + REGARD_LINGER);
        }
    }

    /// Stops watching and fails in-flight waits. Idempotent.
    pub fn close(&self) {
        // Dropping the platform watcher drops the event sender, which in
        // turn wakes any pending wait with a closed channel.
        self.watcher.lock().expect("watcher lock poisoned").take();
    }
}

/// Maps a platform event to per-file sync events. Renames become
/// deletions of the source and creations of the destination, matching
/// how whole-file sync treats a move.
fn translate(event: &Event) -> Vec<WatchEvent> {
    let mut out = Vec::new();
    for path in &event.paths {
        let status = match event.kind {
            EventKind::Create(_) => FileStatus::Created,
            EventKind::Remove(_) => FileStatus::Deleted,
            EventKind::Modify(ModifyKind::Name(mode)) => match mode {
                RenameMode::From => FileStatus::Deleted,
                RenameMode::To => FileStatus::Created,
                _ if path.exists() => FileStatus::Created,
                _ => FileStatus::Deleted,
            },
            EventKind::Modify(_) => FileStatus::Modified,
            _ => continue,
        };
        // Directory creations and modifications carry no content to sync;
        // removals cannot be stat'ed and pass through.
        if status != FileStatus::Deleted && !path.is_file() {
            continue;
        }
        out.push(WatchEvent {
            path: path.clone(),
            modified: mtime_of(path),
            status,
        });
    }
    out
}

fn mtime_of(path: &Path) -> i64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or_else(unix_now, |d| d.as_secs() as i64)
}
