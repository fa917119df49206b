//! Concurrent Storage Module
//!
//! Implements the in-memory key-value store every subsystem is built on.
//!
//! ## Core Concepts
//! - **Many readers, one writer**: each `ConcurrentMap` owns its data behind a single
//!   reader/writer lock. Reads never see a half-applied write.
//! - **Copy-out reads**: `read_all` hands back a private copy; later writes never touch it.
//! - **Snapshots**: `load`/`store` dump and restore the whole map as one JSON object.
//!   There is no log and no incremental durability; the last successful snapshot wins.

pub mod memory;

use std::path::PathBuf;
use thiserror::Error;

/// Failure while loading or storing a snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("malformed key {key:?} in snapshot {path}: {reason}")]
    Key {
        path: PathBuf,
        key: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests;
