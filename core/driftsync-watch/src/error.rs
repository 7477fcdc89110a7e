//! Error types for the watch layer.

use thiserror::Error;

/// Result type for watch operations.
pub type WatchResult<T> = Result<T, WatchError>;

/// Errors that can occur in watch operations.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The watcher has been closed; no further events will arrive.
    #[error("watcher closed")]
    Closed,

    /// Underlying platform watcher failure.
    #[error("watch error: {0}")]
    Notify(#[from] notify::Error),
}
