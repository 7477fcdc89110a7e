//! The sync engine.
//!
//! Construction merges local and remote metadata into the event queue;
//! `start` then spawns the three roles. The apply role is the only
//! code that touches the filesystem under the sync directory or the
//! local metadata, which is what makes its staleness check sound.

use crate::config::ClientConfig;
use crate::connector::{Connector, SockConnector};
use crate::error::ClientResult;
use crate::queue::{Msg, MsgQueue};
use crate::store::{rel_path, unix_secs, MetaStore};
use driftsync_types::{FileData, Metadata};
use driftsync_watch::{FileStatus, Watchdog};
use filetime::FileTime;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A running (or startable) sync client.
pub struct Client {
    shared: Arc<Shared>,
    tasks: Vec<JoinHandle<()>>,
}

/// State the three roles share.
struct Shared {
    sync_dir: PathBuf,
    conn: Arc<dyn Connector>,
    wd: Watchdog,
    queue: MsgQueue,
    meta: StdMutex<Metadata>,
    store: MetaStore,
}

impl Client {
    /// Builds a client from configuration: validates it, connects the
    /// socket connector, loads local metadata, fetches the remote
    /// snapshot, and seeds the queue with the startup merge.
    ///
    /// Construction failures release everything acquired so far; a
    /// failed `get_metadata` is fatal.
    pub async fn new(config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let params = config.sock_params()?;
        let conn = SockConnector::connect(
            params.host,
            params.port,
            params.user,
            params.pass,
            config.key.as_deref(),
        )
        .await?;
        Self::with_connector(config.sync_dir, Arc::new(conn)).await
    }

    /// Builds a client over an already-constructed connector. Tests use
    /// this with the mock connector.
    pub async fn with_connector(
        sync_dir: PathBuf,
        conn: Arc<dyn Connector>,
    ) -> ClientResult<Self> {
        fs::create_dir_all(&sync_dir).await?;
        let sync_dir = fs::canonicalize(&sync_dir).await?;

        let store = MetaStore::new(&sync_dir);
        let local = store.load().await?;
        // Persist at once so a deletion while the agent is down is
        // detectable on the next run even if nothing syncs this run.
        store.save(&local).await?;

        info!("fetching remote metadata");
        let remote = conn.get_metadata().await?;

        let queue = MsgQueue::new();
        for msg in merge_metadata(&local, &remote) {
            queue.push(msg);
        }

        let shared = Shared {
            sync_dir,
            conn,
            wd: Watchdog::new()?,
            queue,
            meta: StdMutex::new(local),
            store,
        };
        info!("client ready, {} merge events queued", shared.queue.len());
        Ok(Self {
            shared: Arc::new(shared),
            tasks: Vec::new(),
        })
    }

    /// Registers the watch and spawns the apply, remote-listen, and
    /// local-watch roles.
    pub fn start(&mut self) -> ClientResult<()> {
        info!("spawning client roles");
        self.shared.wd.add_watch(&self.shared.sync_dir, true)?;
        self.tasks
            .push(tokio::spawn(Arc::clone(&self.shared).apply_role()));
        self.tasks
            .push(tokio::spawn(Arc::clone(&self.shared).remote_listen_role()));
        self.tasks
            .push(tokio::spawn(Arc::clone(&self.shared).local_watch_role()));
        Ok(())
    }

    /// Read-only view of the local metadata, for inspection.
    #[must_use]
    pub fn metadata(&self) -> Metadata {
        self.shared
            .meta
            .lock()
            .expect("metadata lock poisoned")
            .clone()
    }

    /// Stops the client: closes the watcher and connector so the
    /// producer roles fail out, raises the queue's done flag so the
    /// apply role exits without applying pending events, then joins
    /// all three roles.
    pub async fn shutdown(mut self) {
        info!("shutting down client");
        self.shared.wd.close();
        self.shared.conn.close().await;
        self.shared.queue.close();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        info!("client stopped");
    }
}

impl Shared {
    /// The sole consumer: applies queued events one at a time. An error
    /// on one event never prevents processing the next.
    async fn apply_role(self: Arc<Self>) {
        while let Some(msg) = self.queue.pop_blocking().await {
            self.apply(&msg).await;
        }
        debug!("apply role exiting");
    }

    async fn apply(&self, msg: &Msg) {
        // An event is stale when local state has already advanced to a
        // newer record of the same kind. Equal timestamps are applied:
        // only the merge treats ties as a no-op.
        let current = self
            .meta
            .lock()
            .expect("metadata lock poisoned")
            .get_file(&msg.filename);
        if msg.file_data.deleted == current.deleted && msg.file_data.modified < current.modified {
            info!("skipped stale event: {}", msg.filename);
            return;
        }

        let full = self.sync_dir.join(&msg.filename);
        let applied = if msg.remote {
            self.apply_remote(msg, &full).await
        } else {
            self.apply_local(msg, &full).await
        };

        match applied {
            Ok(Some(record)) => {
                let snapshot = {
                    let mut meta = self.meta.lock().expect("metadata lock poisoned");
                    meta.set_file(msg.filename.clone(), record);
                    meta.clone()
                };
                if let Err(e) = self.store.save(&snapshot).await {
                    warn!("failed to persist metadata: {e}");
                }
                debug!("finished processing: {}", msg.filename);
            }
            Ok(None) => {}
            Err(e) => {
                // Metadata is not advanced, so the next merge can retry.
                warn!("failed to process event for {}: {e}", msg.filename);
            }
        }
    }

    /// Applies a remote-origin event to the local filesystem. The
    /// watcher suppression brackets the entire mutation, mtime fix-up
    /// included, and is lifted on every exit path.
    async fn apply_remote(&self, msg: &Msg, full: &Path) -> ClientResult<Option<FileData>> {
        let _guard = DisregardGuard::new(&self.wd, full.to_path_buf());
        if msg.file_data.deleted {
            info!("remote delete: {}", full.display());
            remove_recursive(full).await?;
        } else {
            info!("remote modify: {}", full.display());
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).await?;
            }
            let mut file = fs::File::create(full).await?;
            self.conn
                .get_file(&msg.filename, msg.file_data.modified, &mut file)
                .await?;
            file.flush().await?;
            drop(file);
            filetime::set_file_mtime(full, FileTime::from_unix_time(msg.file_data.modified, 0))?;
        }
        Ok(Some(msg.file_data))
    }

    /// Pushes a local-origin event to the server. Transport failures
    /// are best-effort: logged and dropped without advancing metadata.
    async fn apply_local(&self, msg: &Msg, full: &Path) -> ClientResult<Option<FileData>> {
        if msg.file_data.deleted {
            info!("local delete: {}", msg.filename);
            match self
                .conn
                .delete_file(&msg.filename, msg.file_data.modified)
                .await
            {
                Ok(()) => Ok(Some(msg.file_data)),
                Err(e) => {
                    warn!("delete push failed for {}: {e}", msg.filename);
                    Ok(None)
                }
            }
        } else {
            info!("local modify: {}", msg.filename);
            let mut file = fs::File::open(full).await?;
            let stat = file.metadata().await?;
            let size = stat.len();
            let mtime = stat.modified().map(unix_secs)?;
            match self
                .conn
                .push_file(&msg.filename, mtime, &mut file, size)
                .await
            {
                Ok(()) => Ok(Some(FileData::new(mtime))),
                Err(e) => {
                    warn!("upload failed for {}: {e}", msg.filename);
                    Ok(None)
                }
            }
        }
    }

    /// Producer: forwards server pushes into the queue. Exits quietly
    /// when the connector closes.
    async fn remote_listen_role(self: Arc<Self>) {
        loop {
            match self.conn.wait().await {
                Ok((path, file_data)) => {
                    debug!("remote push: {path}");
                    self.queue.push(Msg {
                        filename: path,
                        remote: true,
                        file_data,
                    });
                }
                Err(_) => break,
            }
        }
        debug!("remote listen role exiting");
    }

    /// Producer: forwards watcher events into the queue. Exits quietly
    /// when the watcher closes.
    async fn local_watch_role(self: Arc<Self>) {
        loop {
            match self.wd.wait().await {
                Ok(event) => {
                    let Some(rel) = rel_path(&self.sync_dir, &event.path) else {
                        continue;
                    };
                    debug!("local event: {rel}");
                    self.queue.push(Msg {
                        filename: rel,
                        remote: false,
                        file_data: FileData {
                            modified: event.modified,
                            deleted: event.status == FileStatus::Deleted,
                        },
                    });
                }
                Err(_) => break,
            }
        }
        debug!("local watch role exiting");
    }
}

/// Computes the startup merge of local metadata against the remote
/// snapshot. Both passes use strict `>`: an equal timestamp means the
/// replicas already agree and nothing is enqueued. Tombstones
/// participate like any other record.
pub fn merge_metadata(local: &Metadata, remote: &Metadata) -> Vec<Msg> {
    let mut msgs = Vec::new();
    for (path, record) in local {
        if record.modified > remote.get_file(path).modified {
            debug!("merge, local push: {path}");
            msgs.push(Msg {
                filename: path.clone(),
                remote: false,
                file_data: *record,
            });
        }
    }
    for (path, record) in remote {
        if record.modified > local.get_file(path).modified {
            debug!("merge, remote pull: {path}");
            msgs.push(Msg {
                filename: path.clone(),
                remote: true,
                file_data: *record,
            });
        }
    }
    msgs
}

/// Scoped watcher suppression: `disregard` on construction, `regard`
/// on drop, so the bracket holds on error paths too.
struct DisregardGuard<'a> {
    wd: &'a Watchdog,
    path: PathBuf,
}

impl<'a> DisregardGuard<'a> {
    fn new(wd: &'a Watchdog, path: PathBuf) -> Self {
        wd.disregard(&path);
        Self { wd, path }
    }
}

impl Drop for DisregardGuard<'_> {
    fn drop(&mut self) {
        self.wd.regard(&self.path);
    }
}

/// Removes a path of either kind, treating "already gone" as success.
async fn remove_recursive(path: &Path) -> io::Result<()> {
    match fs::metadata(path).await {
        Ok(stat) if stat.is_dir() => fs::remove_dir_all(path).await,
        Ok(_) => fs::remove_file(path).await,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
