//! Per-process queries: executable path and responsible process

use crate::error::{PlatformError, PlatformResult};
use std::sync::OnceLock;

/// Size of the buffer proc_pidpath fills (PROC_PIDPATHINFO_MAXSIZE)
const PATH_BUFFER_SIZE: usize = 4 * 1024;

/// Private libquarantine entry point, resolved at runtime
const RESPONSIBLE_SYMBOL: &[u8] = b"responsibility_get_pid_responsible_for_pid\0";

type ResponsibleFn = unsafe extern "C" fn(libc::pid_t) -> libc::pid_t;

/// Get the full executable path of a process
pub fn get_image_path(pid: u32) -> PlatformResult<String> {
    let mut buffer = vec![0u8; PATH_BUFFER_SIZE];
    let len = unsafe {
        libc::proc_pidpath(
            pid as libc::c_int,
            buffer.as_mut_ptr().cast(),
            PATH_BUFFER_SIZE as u32,
        )
    };
    if len <= 0 {
        return Err(PlatformError::from_errno("proc_pidpath", pid));
    }

    buffer.truncate(len as usize);
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn responsible_fn() -> Option<ResponsibleFn> {
    static RESOLVED: OnceLock<Option<ResponsibleFn>> = OnceLock::new();
    *RESOLVED.get_or_init(|| {
        let symbol =
            unsafe { libc::dlsym(libc::RTLD_DEFAULT, RESPONSIBLE_SYMBOL.as_ptr().cast()) };
        if symbol.is_null() {
            log::warn!("responsibility_get_pid_responsible_for_pid is unavailable");
            None
        } else {
            Some(unsafe { std::mem::transmute::<*mut libc::c_void, ResponsibleFn>(symbol) })
        }
    })
}

/// Get the process the system holds responsible for `pid`
///
/// For processes launched on behalf of an application this is the
/// application; for everything else it is the process itself.
pub fn get_responsible_pid(pid: u32) -> PlatformResult<u32> {
    let lookup = responsible_fn().ok_or(PlatformError::ApiError {
        api: "dlsym",
        message: "responsibility_get_pid_responsible_for_pid not found".to_string(),
    })?;

    let responsible = unsafe { lookup(pid as libc::pid_t) };
    if responsible < 0 {
        return Err(PlatformError::from_errno(
            "responsibility_get_pid_responsible_for_pid",
            pid,
        ));
    }
    Ok(responsible as u32)
}
