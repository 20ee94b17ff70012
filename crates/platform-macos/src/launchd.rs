//! launchd's record of a process
//!
//! launchd answers a private XPC routine with a text dump of the job that
//! owns a PID. Only the `path` and `program` entries are kept; they are
//! handed to [`LaunchdDescriptor::parse`] unchanged.

use lineage_core::submitted_by::LaunchdDescriptor;

/// Pull the `path` and `program` entries out of a launchd process dump.
///
/// Each line is `key = value`; the value runs to the end of the line and may
/// itself contain ` = `. The first occurrence of a key wins, so entries of
/// nested blocks further down never override the job's own.
pub fn parse_process_dump(text: &str) -> LaunchdDescriptor {
    let mut descriptor = LaunchdDescriptor::default();

    for line in text.lines() {
        let Some((key, value)) = line.split_once(" = ") else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        let slot = match key.trim() {
            "path" => &mut descriptor.path,
            "program" => &mut descriptor.program,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value.to_string());
        }

        if descriptor.path.is_some() && descriptor.program.is_some() {
            break;
        }
    }

    descriptor
}

#[cfg(target_os = "macos")]
pub use live::LaunchdQuery;

#[cfg(target_os = "macos")]
mod live {
    use super::parse_process_dump;
    use crate::error::{PlatformError, PlatformResult};
    use lineage_core::submitted_by::LaunchdDescriptor;
    use std::ffi::{c_char, c_int, c_void};
    use std::ptr;

    type XpcObject = *mut c_void;
    type PipeRoutineFn = unsafe extern "C" fn(XpcObject, XpcObject, *mut XpcObject) -> c_int;

    const PIPE_ROUTINE_SYMBOL: &[u8] = b"xpc_pipe_routine\0";
    const ALLOC_ONCE_SYMBOL: &[u8] = b"_os_alloc_once_table\0";

    /// Slot of libxpc's global data in the alloc-once table
    const XPC_ALLOC_ONCE_SLOT: usize = 1;
    const SUBSYSTEM_PROCESS_INFO: u64 = 2;
    const ROUTINE_DUMP_PROCESS: u64 = 0x2c4;
    /// Size of the region launchd writes the dump into
    const DUMP_REGION_SIZE: usize = 0x140_0000;

    extern "C" {
        fn xpc_dictionary_create(
            keys: *const *const c_char,
            values: *const XpcObject,
            count: usize,
        ) -> XpcObject;
        fn xpc_dictionary_set_uint64(xdict: XpcObject, key: *const c_char, value: u64);
        fn xpc_dictionary_set_int64(xdict: XpcObject, key: *const c_char, value: i64);
        fn xpc_dictionary_set_value(xdict: XpcObject, key: *const c_char, value: XpcObject);
        fn xpc_dictionary_get_int64(xdict: XpcObject, key: *const c_char) -> i64;
        fn xpc_dictionary_get_uint64(xdict: XpcObject, key: *const c_char) -> u64;
        fn xpc_shmem_create(region: *mut c_void, length: usize) -> XpcObject;
        fn xpc_release(object: XpcObject);
    }

    #[repr(C)]
    #[allow(dead_code)]
    struct OsAllocOnce {
        once: libc::c_long,
        ptr: *mut c_void,
    }

    #[repr(C)]
    #[allow(dead_code)]
    struct XpcGlobalData {
        a: u64,
        xpc_flags: u64,
        task_bootstrap_port: libc::mach_port_t,
        xpc_bootstrap_pipe: XpcObject,
    }

    fn key(name: &'static [u8]) -> *const c_char {
        name.as_ptr().cast()
    }

    /// Releases an XPC object when dropped
    struct Released(XpcObject);

    impl Drop for Released {
        fn drop(&mut self) {
            if !self.0.is_null() {
                unsafe { xpc_release(self.0) };
            }
        }
    }

    /// Connection to launchd's bootstrap pipe plus the shared region its
    /// answers are written into. The region is unmapped on drop.
    #[derive(Debug)]
    pub struct LaunchdQuery {
        routine: PipeRoutineFn,
        pipe: XpcObject,
        region: *mut c_void,
    }

    impl LaunchdQuery {
        /// Resolve the private entry points and map the dump region
        pub fn new() -> PlatformResult<Self> {
            let routine = unsafe { libc::dlsym(libc::RTLD_DEFAULT, key(PIPE_ROUTINE_SYMBOL)) };
            if routine.is_null() {
                return Err(unavailable("xpc_pipe_routine not found"));
            }
            let routine = unsafe { std::mem::transmute::<*mut c_void, PipeRoutineFn>(routine) };

            let table = unsafe { libc::dlsym(libc::RTLD_DEFAULT, key(ALLOC_ONCE_SYMBOL)) }
                as *const OsAllocOnce;
            if table.is_null() {
                return Err(unavailable("_os_alloc_once_table not found"));
            }
            let globals = unsafe { (*table.add(XPC_ALLOC_ONCE_SLOT)).ptr } as *const XpcGlobalData;
            if globals.is_null() {
                return Err(unavailable("libxpc global data is not initialized"));
            }
            let pipe = unsafe { (*globals).xpc_bootstrap_pipe };
            if pipe.is_null() {
                return Err(unavailable("no bootstrap pipe"));
            }

            let region = unsafe {
                libc::mmap(
                    ptr::null_mut(),
                    DUMP_REGION_SIZE,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_ANON | libc::MAP_SHARED,
                    -1,
                    0,
                )
            };
            if region == libc::MAP_FAILED {
                return Err(PlatformError::ApiError {
                    api: "mmap",
                    message: std::io::Error::last_os_error().to_string(),
                });
            }

            Ok(Self {
                routine,
                pipe,
                region,
            })
        }

        /// Ask launchd for the job behind `pid`
        pub fn process_info(&self, pid: u32) -> PlatformResult<LaunchdDescriptor> {
            let request = Released(unsafe { xpc_dictionary_create(ptr::null(), ptr::null(), 0) });
            if request.0.is_null() {
                return Err(unavailable("xpc_dictionary_create returned null"));
            }
            let shmem = Released(unsafe { xpc_shmem_create(self.region, DUMP_REGION_SIZE) });
            if shmem.0.is_null() {
                return Err(unavailable("xpc_shmem_create returned null"));
            }

            unsafe {
                xpc_dictionary_set_uint64(request.0, key(b"subsystem\0"), SUBSYSTEM_PROCESS_INFO);
                xpc_dictionary_set_uint64(request.0, key(b"handle\0"), 0);
                xpc_dictionary_set_uint64(request.0, key(b"routine\0"), ROUTINE_DUMP_PROCESS);
                xpc_dictionary_set_int64(request.0, key(b"pid\0"), i64::from(pid));
                xpc_dictionary_set_value(request.0, key(b"shmem\0"), shmem.0);
            }

            let mut reply: XpcObject = ptr::null_mut();
            let status = unsafe { (self.routine)(self.pipe, request.0, &mut reply) };
            let reply = Released(reply);
            if status != 0 || reply.0.is_null() {
                return Err(PlatformError::ApiError {
                    api: "xpc_pipe_routine",
                    message: format!("status {}", status),
                });
            }

            let error = unsafe { xpc_dictionary_get_int64(reply.0, key(b"error\0")) };
            if error != 0 {
                return Err(PlatformError::ApiError {
                    api: "launchd",
                    message: format!("no job for PID {} (error {})", pid, error),
                });
            }

            let written = unsafe { xpc_dictionary_get_uint64(reply.0, key(b"bytes-written\0")) };
            let len = (written as usize).min(DUMP_REGION_SIZE);
            let bytes = unsafe { std::slice::from_raw_parts(self.region as *const u8, len) };
            Ok(parse_process_dump(&String::from_utf8_lossy(bytes)))
        }
    }

    impl Drop for LaunchdQuery {
        fn drop(&mut self) {
            unsafe {
                libc::munmap(self.region, DUMP_REGION_SIZE);
            }
        }
    }

    fn unavailable(message: &str) -> PlatformError {
        PlatformError::ApiError {
            api: "launchd XPC",
            message: message.to_string(),
        }
    }

}
