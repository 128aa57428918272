//! Platform signal delivery
//!
//! - Unix: the child is spawned as a process group leader and signals go to
//!   the whole group, so helpers spawned by the tool die with it.
//! - Windows: the child gets `CREATE_NEW_PROCESS_GROUP` and signals are
//!   delivered through `taskkill` to the pid.

use std::io;
use std::process::Command;

use crate::capture::{ShutdownSignal, SpawnMode};
use crate::process::SupervisorError;

#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// What happened when a signal was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The target no longer exists
    NoSuchProcess,
}

/// Apply the spawn attributes the signal strategy depends on
pub(crate) fn configure_spawn(command: &mut Command, mode: SpawnMode) {
    match mode {
        SpawnMode::ProcessGroup => {
            #[cfg(unix)]
            {
                use std::os::unix::process::CommandExt;
                command.process_group(0);
            }
        }
        SpawnMode::NewProcessGroupFlag => {
            #[cfg(windows)]
            {
                use std::os::windows::process::CommandExt;
                command.creation_flags(CREATE_NEW_PROCESS_GROUP);
            }
        }
    }
    #[cfg(not(any(unix, windows)))]
    let _ = command;
}

/// Whether an OS error means the process is already gone
pub(crate) fn is_no_such_process(error: &io::Error) -> bool {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        matches!(error.raw_os_error(), Some(code) if code == Errno::ECHILD as i32 || code == Errno::ESRCH as i32)
    }

    #[cfg(not(unix))]
    {
        let _ = error;
        false
    }
}

/// Send `signal` to `pid`, or to its process group when `group` is set
#[cfg(unix)]
pub fn send(pid: u32, signal: ShutdownSignal, group: bool) -> Result<Delivery, SupervisorError> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, killpg, Signal};
    use nix::unistd::Pid;

    let target = Pid::from_raw(pid as i32);
    let native = match signal {
        ShutdownSignal::Interrupt => Signal::SIGINT,
        ShutdownSignal::Terminate => Signal::SIGTERM,
        ShutdownSignal::Kill => Signal::SIGKILL,
    };

    let result = if group {
        match killpg(target, native) {
            Err(Errno::ESRCH) => Err(Errno::ESRCH),
            Err(e) => {
                tracing::warn!(pid, error = %e, "Failed to signal process group, trying process only");
                kill(target, native)
            }
            ok => ok,
        }
    } else {
        kill(target, native)
    };

    match result {
        Ok(()) => Ok(Delivery::Sent),
        Err(Errno::ESRCH) => Ok(Delivery::NoSuchProcess),
        Err(e) => Err(SupervisorError::Signal {
            pid,
            signal,
            reason: e.to_string(),
        }),
    }
}

/// Send `signal` to `pid` through `taskkill`
#[cfg(windows)]
pub fn send(pid: u32, signal: ShutdownSignal, _group: bool) -> Result<Delivery, SupervisorError> {
    use std::process::Stdio;

    // taskkill exits with 128 when the pid does not exist
    const TASKKILL_NOT_FOUND: i32 = 128;

    let pid_arg = pid.to_string();
    let mut args: Vec<&str> = match signal {
        ShutdownSignal::Interrupt => vec![],
        ShutdownSignal::Terminate => vec!["/F"],
        ShutdownSignal::Kill => vec!["/F", "/T"],
    };
    args.extend(["/PID", pid_arg.as_str()]);

    let status = Command::new("taskkill")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| SupervisorError::Signal {
            pid,
            signal,
            reason: format!("failed to run taskkill: {}", e),
        })?;

    match status.code() {
        Some(0) => Ok(Delivery::Sent),
        Some(TASKKILL_NOT_FOUND) => Ok(Delivery::NoSuchProcess),
        code => Err(SupervisorError::Signal {
            pid,
            signal,
            reason: format!("taskkill exited with {:?}", code),
        }),
    }
}

#[cfg(not(any(unix, windows)))]
pub fn send(pid: u32, signal: ShutdownSignal, _group: bool) -> Result<Delivery, SupervisorError> {
    Err(SupervisorError::Signal {
        pid,
        signal,
        reason: "signals are not supported on this platform".to_string(),
    })
}
