//! Error types for lineage core operations

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building or emitting a process forest
#[derive(Debug, Error)]
pub enum LineageError {
    /// The root service manager is absent from the snapshot
    #[error("Root process (PID {pid}) not found in snapshot")]
    RootMissing { pid: u32 },

    /// Snapshot file could not be read or written
    #[error("Snapshot I/O failed for {}: {source}", path.display())]
    SnapshotIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot file is not valid snapshot JSON
    #[error("Invalid snapshot {}: {source}", path.display())]
    SnapshotFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Snapshot was written by an incompatible version
    #[error("Unsupported snapshot version {found} (expected {expected})")]
    SnapshotVersion { found: u32, expected: u32 },

    /// Rendered output could not be written to its destination
    #[error("Could not write output to {}: {source}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LineageError {
    /// Check if this error aborts the run before any output is produced
    pub fn is_root_missing(&self) -> bool {
        matches!(self, LineageError::RootMissing { .. })
    }
}

/// Result type for lineage core operations
pub type LineageResult<T> = Result<T, LineageError>;
