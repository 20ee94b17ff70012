//! Error types for macOS platform operations

use thiserror::Error;

/// Errors that can occur while collecting process records
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Process not found (it may have exited since the PID list was taken)
    #[error("Process {pid} not found")]
    ProcessNotFound { pid: u32 },

    /// Access denied to process
    #[error("Access denied to process {pid}")]
    AccessDenied { pid: u32 },

    /// libproc or libc call failed
    #[error("{api} failed: {message}")]
    ApiError { api: &'static str, message: String },

    /// Failed to list running processes
    #[error("Failed to list processes: {0}")]
    ListFailed(String),

    /// Not running with the privilege needed to read other users' processes
    #[error("This tool must be run as root in order to view all process information")]
    NotElevated,

    /// Re-running with elevated privilege failed
    #[error("Privilege escalation failed: {0}")]
    EscalationFailed(String),

    /// Live collection is not available on this platform
    #[error("Live process collection is only supported on macOS")]
    Unsupported,
}

impl PlatformError {
    /// Create an API error from the last OS error, classifying common errnos
    pub fn from_errno(api: &'static str, pid: u32) -> Self {
        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::ESRCH) => PlatformError::ProcessNotFound { pid },
            Some(libc::EPERM) | Some(libc::EACCES) => PlatformError::AccessDenied { pid },
            _ => PlatformError::ApiError {
                api,
                message: err.to_string(),
            },
        }
    }

    /// Check if this is an access denied error
    pub fn is_access_denied(&self) -> bool {
        matches!(self, PlatformError::AccessDenied { .. })
    }
}

/// Result type for platform operations
pub type PlatformResult<T> = Result<T, PlatformError>;
