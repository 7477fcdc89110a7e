//! The connector: the client's view of the remote replica.
//!
//! The sync engine consumes a small capability interface — metadata
//! snapshot, whole-file transfer in both directions, tombstone delete,
//! and a blocking wait for server pushes. One production implementation
//! exists today ([`SockConnector`]); [`mock`] provides an in-memory
//! double for tests.

pub mod mock;
mod sock;
pub mod wire;

pub use sock::SockConnector;

use async_trait::async_trait;
use driftsync_crypto::CryptoError;
use driftsync_types::{FileData, Metadata};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Errors that can occur in connector operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The connector has been closed; in-flight and future calls fail.
    #[error("connector closed")]
    Closed,

    /// The server rejected the credentials.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The peer violated the wire protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server reported an error for a request.
    #[error("server error: {0}")]
    Server(String),

    /// Payload encryption or verification failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Socket-level failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame encode/decode failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Capabilities the sync engine consumes from the remote peer.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Fetches a full metadata snapshot.
    async fn get_metadata(&self) -> ConnectorResult<Metadata>;

    /// Streams the remote file's bytes into `sink`. `modified` is
    /// advisory for the server.
    async fn get_file(
        &self,
        path: &str,
        modified: i64,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> ConnectorResult<()>;

    /// Uploads `size` bytes read from `source`.
    async fn push_file(
        &self,
        path: &str,
        modified: i64,
        source: &mut (dyn AsyncRead + Send + Unpin),
        size: u64,
    ) -> ConnectorResult<()>;

    /// Records a tombstone for `path` on the server.
    async fn delete_file(&self, path: &str, modified: i64) -> ConnectorResult<()>;

    /// Blocks until the server pushes an update. Fails once the
    /// connector is closed.
    async fn wait(&self) -> ConnectorResult<(String, FileData)>;

    /// Shuts the connector down, failing in-flight waits. Idempotent.
    async fn close(&self);
}
