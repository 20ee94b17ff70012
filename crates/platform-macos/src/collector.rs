//! Live record source built on libproc and launchd

use crate::error::{PlatformError, PlatformResult};
use crate::launchd::LaunchdQuery;
use crate::net::list_connections;
use crate::process_query::{get_image_path, get_responsible_pid};
use crate::process_snapshot::{get_bsd_info, list_pids};
use lineage_core::{Collection, ProcessRecord, ProcessRecordSource, KERNEL_PID};

/// Collects one record per running process from the live system
///
/// Kernel fields come from libproc. launchd's job description fills the
/// submitted-by, plist and program fields, and every TCP/UDP socket the
/// process holds becomes a connection. When launchd cannot be queried the
/// launchd fields stay empty and collection carries on.
#[derive(Debug)]
pub struct LibprocSource {
    launchd: Option<LaunchdQuery>,
}

impl LibprocSource {
    pub fn new() -> Self {
        let launchd = LaunchdQuery::new()
            .map_err(|e| log::warn!("launchd job information unavailable: {}", e))
            .ok();
        Self { launchd }
    }

    /// Read a single process. Only a failed BSD info read skips the process.
    fn read_record(&self, pid: u32) -> PlatformResult<ProcessRecord> {
        let info = get_bsd_info(pid)?;

        let path = get_image_path(pid).unwrap_or_else(|e| {
            log::debug!("No executable path for PID {}: {}", pid, e);
            "Unknown".to_string()
        });

        let responsible_pid = get_responsible_pid(pid).unwrap_or_else(|e| {
            log::debug!("No responsible PID for PID {}: {}", pid, e);
            pid
        });

        let mut record = ProcessRecord::new(pid, info.ppid, responsible_pid, path, info.start_time);

        if let Some(query) = &self.launchd {
            match query.process_info(pid) {
                Ok(descriptor) => descriptor.parse().apply_to(&mut record),
                Err(e) => log::trace!("No launchd job for PID {}: {}", pid, e),
            }
        }

        record.connections = list_connections(pid).unwrap_or_else(|e| {
            log::debug!("No sockets for PID {}: {}", pid, e);
            Vec::new()
        });

        Ok(record)
    }
}

impl Default for LibprocSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRecordSource for LibprocSource {
    type Error = PlatformError;

    fn collect(&mut self) -> PlatformResult<Collection> {
        let pids = list_pids()?;
        log::debug!("Enumerated {} PIDs", pids.len());

        let mut collection = Collection::default();
        let mut denied = 0usize;
        for pid in pids {
            if pid == KERNEL_PID {
                continue;
            }
            match self.read_record(pid) {
                Ok(record) => collection.records.push(record),
                Err(e) => {
                    if e.is_access_denied() {
                        denied += 1;
                    }
                    collection.skip(pid, e.to_string());
                }
            }
        }

        if denied > 0 {
            log::warn!("Access denied to {} processes", denied);
        }
        log::info!(
            "Collected {} processes ({} skipped)",
            collection.records.len(),
            collection.failures.len()
        );
        Ok(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_read_record_for_self() {
        let pid = std::process::id();
        let record = LibprocSource::new().read_record(pid).unwrap();
        assert_eq!(record.pid, pid);
        assert!(!record.path.is_empty());
    }

    #[test]
    fn test_read_record_includes_own_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let record = LibprocSource::new()
            .read_record(std::process::id())
            .unwrap();
        assert!(record.connections.iter().any(|c| c.local_port == port));
    }

    #[test]
    #[ignore] // May require root to read every process
    fn test_collect_includes_launchd_and_excludes_kernel() {
        let collection = LibprocSource::new().collect().unwrap();
        assert!(collection.records.iter().any(|r| r.pid == 1));
        assert!(collection.records.iter().all(|r| r.pid != KERNEL_PID));
    }

    #[test]
    #[ignore] // Requires root so launchd answers for every job
    fn test_collect_fills_launchd_fields() {
        let collection = LibprocSource::new().collect().unwrap();
        assert!(collection
            .records
            .iter()
            .any(|r| r.program_path.is_some() || r.plist_path.is_some()));
    }
}
