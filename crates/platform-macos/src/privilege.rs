//! Root privilege check and one-shot re-execution through sudo

use crate::error::{PlatformError, PlatformResult};
use std::env;
use std::process::{Command, ExitStatus};

/// Set in the environment of the re-executed child so it never escalates again
pub const ESCALATION_GUARD_ENV: &str = "LINEAGE_ESCALATED";

/// Check whether the current process runs with effective uid 0
pub fn is_elevated() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Whether this process is already the product of an escalation
pub fn escalation_attempted() -> bool {
    env::var_os(ESCALATION_GUARD_ENV).is_some()
}

/// Re-run the current executable under sudo with the same arguments
///
/// Blocks until the child exits and returns its status. Fails without
/// spawning anything if an escalation was already attempted.
pub fn escalate() -> PlatformResult<ExitStatus> {
    if escalation_attempted() {
        return Err(PlatformError::EscalationFailed(
            "still not running as root after sudo".to_string(),
        ));
    }

    let exe = env::current_exe()
        .map_err(|e| PlatformError::EscalationFailed(format!("cannot locate executable: {}", e)))?;
    let command = escalation_command(&exe, env::args_os().skip(1));
    log::info!("Re-running {} with sudo", exe.display());

    run(command)
}

/// sudo scrubs the environment, so the guard is set through env(1)
fn escalation_command<I>(exe: &std::path::Path, args: I) -> Command
where
    I: IntoIterator<Item = std::ffi::OsString>,
{
    let mut command = Command::new("sudo");
    command
        .arg("env")
        .arg(format!("{}=1", ESCALATION_GUARD_ENV))
        .arg(exe)
        .args(args);
    command
}

fn run(mut command: Command) -> PlatformResult<ExitStatus> {
    command
        .status()
        .map_err(|e| PlatformError::EscalationFailed(format!("cannot run sudo: {}", e)))
}
