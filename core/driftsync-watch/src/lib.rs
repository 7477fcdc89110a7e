//! Recursive directory watching for DriftSync.
//!
//! Wraps the platform watcher from the `notify` crate behind a small
//! blocking-wait interface, and adds the suppression set the sync engine
//! uses to keep its own writes from looping back as local events.

mod error;
mod watchdog;

pub use error::{WatchError, WatchResult};
pub use watchdog::{FileStatus, WatchEvent, Watchdog};
