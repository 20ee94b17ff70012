//! Process listing using libproc
//!
//! Provides a point-in-time list of PIDs and the BSD task info (parent PID
//! and start time) for each of them.

use crate::error::{PlatformError, PlatformResult};
use std::mem;
use time::OffsetDateTime;

/// Headroom for processes spawned between sizing the buffer and filling it
const PID_LIST_SLACK: usize = 64;

/// BSD info for a single process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BsdInfo {
    pub pid: u32,
    pub ppid: u32,
    pub start_time: OffsetDateTime,
}

/// List the PIDs of all running processes
///
/// The kernel entity (PID 0) is included when the kernel reports it;
/// callers decide whether to keep it.
pub fn list_pids() -> PlatformResult<Vec<u32>> {
    // A null buffer asks for the number of PIDs currently running
    let needed = unsafe { libc::proc_listallpids(std::ptr::null_mut(), 0) };
    if needed <= 0 {
        return Err(PlatformError::ListFailed(
            std::io::Error::last_os_error().to_string(),
        ));
    }

    let capacity = needed as usize + PID_LIST_SLACK;
    let mut pids: Vec<libc::c_int> = vec![0; capacity];
    let buffer_size = (capacity * mem::size_of::<libc::c_int>()) as libc::c_int;
    let filled = unsafe { libc::proc_listallpids(pids.as_mut_ptr().cast(), buffer_size) };
    if filled <= 0 {
        return Err(PlatformError::ListFailed(
            std::io::Error::last_os_error().to_string(),
        ));
    }

    pids.truncate((filled as usize).min(capacity));
    Ok(pids
        .into_iter()
        .filter(|pid| *pid >= 0)
        .map(|pid| pid as u32)
        .collect())
}

/// Get the parent PID and start time of a process
pub fn get_bsd_info(pid: u32) -> PlatformResult<BsdInfo> {
    let mut info: libc::proc_bsdinfo = unsafe { mem::zeroed() };
    let size = mem::size_of::<libc::proc_bsdinfo>() as libc::c_int;

    let written = unsafe {
        libc::proc_pidinfo(
            pid as libc::c_int,
            libc::PROC_PIDTBSDINFO,
            0,
            (&mut info as *mut libc::proc_bsdinfo).cast(),
            size,
        )
    };
    if written <= 0 {
        return Err(PlatformError::from_errno("proc_pidinfo", pid));
    }
    if written != size {
        return Err(PlatformError::ApiError {
            api: "proc_pidinfo",
            message: format!("short read ({} of {} bytes)", written, size),
        });
    }

    Ok(BsdInfo {
        pid,
        ppid: info.pbi_ppid,
        start_time: start_time_from(info.pbi_start_tvsec, info.pbi_start_tvusec)?,
    })
}

/// Convert a kernel start timeval to a UTC timestamp
fn start_time_from(secs: u64, usecs: u64) -> PlatformResult<OffsetDateTime> {
    let nanos = i128::from(secs) * 1_000_000_000 + i128::from(usecs) * 1_000;
    OffsetDateTime::from_unix_timestamp_nanos(nanos).map_err(|e| PlatformError::ApiError {
        api: "proc_pidinfo",
        message: format!("start time out of range: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_time_conversion() {
        let ts = start_time_from(1_700_000_000, 250_000).unwrap();
        assert_eq!(ts.unix_timestamp(), 1_700_000_000);
        assert_eq!(ts.millisecond(), 250);
    }

    #[test]
    fn test_list_pids_contains_self() {
        let pids = list_pids().unwrap();
        assert!(pids.contains(&std::process::id()));
    }

    #[test]
    fn test_bsd_info_for_self() {
        let info = get_bsd_info(std::process::id()).unwrap();
        assert_eq!(info.pid, std::process::id());
        assert!(info.start_time <= OffsetDateTime::now_utc());
    }

    #[test]
    fn test_bsd_info_for_missing_process() {
        // PIDs are capped well below this on macOS
        let result = get_bsd_info(999_999_999);
        assert!(result.is_err());
    }
}
