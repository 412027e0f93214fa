//! Process identity and liveness probing.

use std::fmt;
use std::process::Command;
use tracing::warn;

/// Answers "who am I" and "is that process still running".
///
/// [`crate::LocationLock`] goes through this trait so that tests can
/// simulate other processes.
pub trait ProcessProbe: Send + Sync + fmt::Debug {
    /// Returns the id of the current process, if it can be determined.
    fn current_pid(&self) -> Option<u32>;

    /// Returns true if process `pid` is alive.
    ///
    /// Implementations must answer `true` when they cannot tell.
    fn is_alive(&self, pid: u32) -> bool;
}

/// Probes the real operating system.
///
/// Liveness is checked by running `ps -p <pid>` (Unix) or
/// `tasklist /FI "PID eq <pid>"` (Windows) and looking for the pid in the
/// output.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl ProcessProbe for SystemProbe {
    fn current_pid(&self) -> Option<u32> {
        Some(std::process::id())
    }

    fn is_alive(&self, pid: u32) -> bool {
        if pid == std::process::id() {
            return true;
        }
        match probe_command(pid).output() {
            Ok(output) => output_lists_pid(&String::from_utf8_lossy(&output.stdout), pid),
            Err(e) => {
                warn!(pid, error = %e, "process liveness probe failed, assuming alive");
                true
            }
        }
    }
}

#[cfg(windows)]
fn probe_command(pid: u32) -> Command {
    let mut cmd = Command::new("tasklist");
    cmd.args(["/FI", &format!("PID eq {pid}")]);
    cmd
}

#[cfg(not(windows))]
fn probe_command(pid: u32) -> Command {
    let mut cmd = Command::new("ps");
    cmd.args(["-p", &pid.to_string()]);
    cmd
}

/// Returns true if some line of the listing has `pid` as a whole token.
fn output_lists_pid(output: &str, pid: u32) -> bool {
    let pid = pid.to_string();
    output
        .lines()
        .any(|line| line.split_whitespace().any(|token| token == pid))
}
