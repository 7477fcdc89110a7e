//! An in-memory connector double for tests.

use crate::connector::{Connector, ConnectorError, ConnectorResult};
use async_trait::async_trait;
use driftsync_types::{FileData, Metadata};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};

/// One recorded connector invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    GetFile {
        path: String,
        modified: i64,
    },
    PushFile {
        path: String,
        modified: i64,
        size: u64,
    },
    DeleteFile {
        path: String,
        modified: i64,
    },
}

/// A scriptable connector: serves canned metadata and file contents,
/// records every call, and lets tests inject server pushes.
pub struct MockConnector {
    metadata: StdMutex<Metadata>,
    files: StdMutex<HashMap<String, Vec<u8>>>,
    calls: StdMutex<Vec<MockCall>>,
    push_tx: StdMutex<Option<mpsc::UnboundedSender<(String, FileData)>>>,
    push_rx: Mutex<mpsc::UnboundedReceiver<(String, FileData)>>,
    closed: AtomicBool,
}

impl MockConnector {
    #[must_use]
    pub fn new() -> Self {
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        Self {
            metadata: StdMutex::new(Metadata::new()),
            files: StdMutex::new(HashMap::new()),
            calls: StdMutex::new(Vec::new()),
            push_tx: StdMutex::new(Some(push_tx)),
            push_rx: Mutex::new(push_rx),
            closed: AtomicBool::new(false),
        }
    }

    /// Sets the snapshot `get_metadata` will return.
    pub fn set_metadata(&self, metadata: Metadata) {
        *self.metadata.lock().expect("metadata lock poisoned") = metadata;
    }

    /// Provides content for a path so `get_file` can serve it.
    pub fn put_file(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files
            .lock()
            .expect("files lock poisoned")
            .insert(path.into(), bytes.into());
    }

    /// Bytes most recently uploaded for `path`, if any.
    #[must_use]
    pub fn stored_file(&self, path: &str) -> Option<Vec<u8>> {
        self.files
            .lock()
            .expect("files lock poisoned")
            .get(path)
            .cloned()
    }

    /// Injects a server push that `wait()` will deliver.
    pub fn queue_push(&self, path: impl Into<String>, file_data: FileData) {
        if let Some(tx) = self
            .push_tx
            .lock()
            .expect("push sender lock poisoned")
            .as_ref()
        {
            let _ = tx.send((path.into(), file_data));
        }
    }

    /// Every call recorded so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().expect("calls lock poisoned").push(call);
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn get_metadata(&self) -> ConnectorResult<Metadata> {
        Ok(self.metadata.lock().expect("metadata lock poisoned").clone())
    }

    async fn get_file(
        &self,
        path: &str,
        modified: i64,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> ConnectorResult<()> {
        self.record(MockCall::GetFile {
            path: path.to_string(),
            modified,
        });
        let bytes = self
            .files
            .lock()
            .expect("files lock poisoned")
            .get(path)
            .cloned()
            .ok_or_else(|| ConnectorError::Server(format!("no such file: {path}")))?;
        sink.write_all(&bytes).await?;
        sink.flush().await?;
        Ok(())
    }

    async fn push_file(
        &self,
        path: &str,
        modified: i64,
        source: &mut (dyn AsyncRead + Send + Unpin),
        size: u64,
    ) -> ConnectorResult<()> {
        self.record(MockCall::PushFile {
            path: path.to_string(),
            modified,
            size,
        });
        let mut bytes = Vec::with_capacity(size as usize);
        source.take(size).read_to_end(&mut bytes).await?;
        self.files
            .lock()
            .expect("files lock poisoned")
            .insert(path.to_string(), bytes);
        Ok(())
    }

    async fn delete_file(&self, path: &str, modified: i64) -> ConnectorResult<()> {
        self.record(MockCall::DeleteFile {
            path: path.to_string(),
            modified,
        });
        self.files
            .lock()
            .expect("files lock poisoned")
            .remove(path);
        Ok(())
    }

    async fn wait(&self) -> ConnectorResult<(String, FileData)> {
        let mut rx = self.push_rx.lock().await;
        rx.recv().await.ok_or(ConnectorError::Closed)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        // Dropping the sender fails any in-flight wait.
        self.push_tx
            .lock()
            .expect("push sender lock poisoned")
            .take();
    }
}
