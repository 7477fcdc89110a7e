//! Error types for the client engine.

use crate::config::ConfigError;
use crate::connector::ConnectorError;
use driftsync_watch::WatchError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while constructing or running the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid or incomplete configuration. Fatal during construction.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Connector failure. Fatal during construction (metadata fetch);
    /// downgraded to logging inside the running roles.
    #[error("transport error: {0}")]
    Connector(#[from] ConnectorError),

    /// Watcher failure.
    #[error("watch error: {0}")]
    Watch(#[from] WatchError),

    /// Local filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
