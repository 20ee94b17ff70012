//! lineage-platform-macos: macOS record collection for lineage
//!
//! This crate reads the live process table through libproc, asks launchd
//! which job each process belongs to, and handles the root privilege
//! lineage needs to see every process. On other platforms it compiles to
//! stubs so the rest of the workspace still builds and runs against saved
//! snapshots.

pub mod error;
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub mod launchd;
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub mod net;

#[cfg(target_os = "macos")]
pub mod collector;
#[cfg(target_os = "macos")]
pub mod process_query;
#[cfg(target_os = "macos")]
pub mod process_snapshot;
#[cfg(unix)]
pub mod privilege;

pub use error::*;
pub use launchd::parse_process_dump;

#[cfg(target_os = "macos")]
pub use collector::*;
#[cfg(target_os = "macos")]
pub use launchd::LaunchdQuery;
#[cfg(target_os = "macos")]
pub use net::list_connections;
#[cfg(target_os = "macos")]
pub use process_query::*;
#[cfg(target_os = "macos")]
pub use process_snapshot::*;
#[cfg(unix)]
pub use privilege::*;

/// Whether this build can read the live process table
pub const LIVE_COLLECTION_SUPPORTED: bool = cfg!(target_os = "macos");

/// The live record source for this platform
#[cfg(target_os = "macos")]
pub type LiveSource = collector::LibprocSource;

/// The live record source for this platform
#[cfg(not(target_os = "macos"))]
pub type LiveSource = unsupported::UnsupportedSource;

#[cfg(not(target_os = "macos"))]
mod unsupported {
    use crate::error::{PlatformError, PlatformResult};
    use lineage_core::{Collection, ProcessRecordSource};

    /// Stub for non-macOS platforms (for cross-compilation/testing)
    #[derive(Debug, Default)]
    pub struct UnsupportedSource;

    impl UnsupportedSource {
        pub fn new() -> Self {
            Self
        }
    }

    impl ProcessRecordSource for UnsupportedSource {
        type Error = PlatformError;

        fn collect(&mut self) -> PlatformResult<Collection> {
            Err(PlatformError::Unsupported)
        }
    }
}

#[cfg(not(unix))]
pub fn is_elevated() -> bool {
    false
}

#[cfg(not(unix))]
pub fn escalation_attempted() -> bool {
    false
}

#[cfg(not(unix))]
pub fn escalate() -> PlatformResult<std::process::ExitStatus> {
    Err(PlatformError::Unsupported)
}
