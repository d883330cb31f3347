//! OS-level liveness checks and termination signals for registered pids.
//!
//! The registry never consults these on its own: listing is registry truth.
//! They back the liveness-augmented views and `stop`.

use crate::error::{Error, Result};

/// Liveness of a registered process as seen by the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessHealth {
    /// A process with the recorded pid exists and is not a zombie
    Alive,
    /// No such process (exited, killed externally, or reaped)
    Dead,
    /// Liveness cannot be determined on this platform
    Unknown,
}

impl ProcessHealth {
    /// Whether the record should be kept when pruning stale entries.
    pub fn is_live(self) -> bool {
        !matches!(self, ProcessHealth::Dead)
    }
}

impl std::fmt::Display for ProcessHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ProcessHealth::Alive => "alive",
            ProcessHealth::Dead => "dead",
            ProcessHealth::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Result of a best-effort termination request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// The signal was delivered
    Delivered,
    /// The process was already gone; nothing to signal
    AlreadyGone,
}

/// Check whether `pid` refers to a live process.
#[cfg(unix)]
pub fn check_health(pid: u32) -> ProcessHealth {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return ProcessHealth::Dead;
    };
    // 0 and negative values address process groups, never a single process
    if raw <= 0 {
        return ProcessHealth::Dead;
    }

    match kill(Pid::from_raw(raw), None) {
        Ok(()) if is_zombie(raw) => ProcessHealth::Dead,
        Ok(()) => ProcessHealth::Alive,
        // Exists but owned by someone else
        Err(Errno::EPERM) => ProcessHealth::Alive,
        Err(Errno::ESRCH) => ProcessHealth::Dead,
        Err(e) => {
            tracing::warn!(pid, error = %e, "Unexpected error probing process");
            ProcessHealth::Unknown
        }
    }
}

#[cfg(not(unix))]
pub fn check_health(_pid: u32) -> ProcessHealth {
    ProcessHealth::Unknown
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: i32) -> bool {
    // The state field follows the parenthesised command name, which may itself
    // contain spaces or parentheses
    std::fs::read_to_string(format!("/proc/{}/stat", pid))
        .ok()
        .and_then(|stat| {
            stat.rfind(')')
                .and_then(|end| stat[end + 1..].split_whitespace().next().map(str::to_owned))
        })
        .is_some_and(|state| state == "Z")
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_zombie(_pid: i32) -> bool {
    false
}

/// Ask the member led by `pid` to terminate (SIGTERM on Unix).
///
/// Members are spawned as leaders of their own process group, so the whole
/// group is signalled: a launcher script that forks the server instead of
/// exec'ing it takes the server down with it. If the group cannot be
/// signalled, the pid alone is tried.
///
/// A process that no longer exists is reported as
/// [`SignalOutcome::AlreadyGone`] rather than an error.
///
/// # Errors
///
/// Returns [`Error::Other`] when the signal could not be sent for any other
/// reason, such as missing permissions.
#[cfg(unix)]
pub fn terminate(pid: u32) -> Result<SignalOutcome> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .ok_or_else(|| Error::Other(format!("Refusing to signal invalid pid {}", pid)))?;

    match kill(Pid::from_raw(-raw), Signal::SIGTERM) {
        Ok(()) => return Ok(SignalOutcome::Delivered),
        Err(e @ (Errno::ESRCH | Errno::EPERM)) => {
            tracing::debug!(pid, error = %e, "Process group not signalled, falling back to pid");
        }
        Err(e) => {
            return Err(Error::Other(format!(
                "Failed to send SIGTERM to process group {}: {}",
                pid, e
            )));
        }
    }

    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => Ok(SignalOutcome::Delivered),
        Err(Errno::ESRCH) => Ok(SignalOutcome::AlreadyGone),
        Err(e) => Err(Error::Other(format!(
            "Failed to send SIGTERM to pid {}: {}",
            pid, e
        ))),
    }
}

#[cfg(not(unix))]
pub fn terminate(pid: u32) -> Result<SignalOutcome> {
    let status = std::process::Command::new("taskkill")
        .args(["/pid", &pid.to_string(), "/f", "/t"])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map_err(|e| Error::Other(format!("Failed to run taskkill for pid {}: {}", pid, e)))?;

    // taskkill does not distinguish "no such process" from other failures
    if status.success() {
        Ok(SignalOutcome::Delivered)
    } else {
        Ok(SignalOutcome::AlreadyGone)
    }
}
