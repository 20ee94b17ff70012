//! Where process records come from

use crate::models::ProcessRecord;

/// Supplies the records of one point-in-time snapshot.
///
/// Implementations exclude the kernel entity (PID 0) and report processes
/// they could not read as failures instead of aborting.
pub trait ProcessRecordSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn collect(&mut self) -> Result<Collection, Self::Error>;
}

/// Records collected from a source, in collection order
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub records: Vec<ProcessRecord>,
    /// Processes that were skipped
    pub failures: Vec<CollectFailure>,
}

/// A process that could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectFailure {
    pub pid: u32,
    pub reason: String,
}

impl Collection {
    pub fn new(records: Vec<ProcessRecord>) -> Self {
        Self {
            records,
            failures: Vec::new(),
        }
    }

    /// Record a skipped process and log it
    pub fn skip(&mut self, pid: u32, reason: impl Into<String>) {
        let reason = reason.into();
        log::debug!("Issue collecting information for PID {}: {}. Skipping", pid, reason);
        self.failures.push(CollectFailure { pid, reason });
    }
}
