//! Core type definitions for DriftSync.
//!
//! This crate defines the fundamental types shared by the sync engine and
//! its collaborators:
//! - Per-path freshness records ([`FileData`])
//! - The path → record mapping exchanged with the remote replica
//!   ([`Metadata`])
//!
//! Everything transport- or filesystem-specific belongs in the higher
//! crates, not here.

mod file_data;
mod metadata;

pub use file_data::FileData;
pub use metadata::Metadata;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as whole seconds since the Unix epoch.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before Unix epoch")
        .as_secs() as i64
}
