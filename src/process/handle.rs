//! Handles and outcomes for supervised processes

use std::fmt;
use std::io::{self, Write};
use std::process::{Child, ChildStdin, ExitStatus};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::capture::StopTier;
use crate::process::signal;
use crate::process::SupervisorError;

/// How a process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum ProcessExit {
    /// Exited with a status code
    Exited(i32),
    /// Terminated by a signal
    Signaled(i32),
    /// Reaped elsewhere; no status is available
    Unknown,
}

impl ProcessExit {
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ProcessExit::Exited(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ProcessExit::Signaled(signal);
            }
        }

        ProcessExit::Unknown
    }

    pub fn success(&self) -> bool {
        matches!(self, ProcessExit::Exited(0))
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessExit::Exited(code) => write!(f, "exit code {}", code),
            ProcessExit::Signaled(signal) => write!(f, "signal {}", signal),
            ProcessExit::Unknown => f.write_str("unknown status"),
        }
    }
}

/// A supervised process.
///
/// Owned by exactly one session. The exit status is cached on the first
/// successful reap.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: u32,
    program: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    exit: Option<ProcessExit>,
    started: Instant,
}

impl ProcessHandle {
    pub(crate) fn attached(mut child: Child, program: String) -> Self {
        let stdin = child.stdin.take();
        Self {
            pid: child.id(),
            program,
            child: Some(child),
            stdin,
            exit: None,
            started: Instant::now(),
        }
    }

    pub(crate) fn detached(pid: u32, program: String) -> Self {
        Self {
            pid,
            program,
            child: None,
            stdin: None,
            exit: None,
            started: Instant::now(),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn is_detached(&self) -> bool {
        self.child.is_none()
    }

    /// Cached exit, `None` until the process has been reaped
    pub fn exit(&self) -> Option<ProcessExit> {
        self.exit
    }

    /// Time since spawn
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Non-blocking reap. "No such process" counts as exited.
    pub(crate) fn try_reap(&mut self) -> Result<Option<ProcessExit>, SupervisorError> {
        if let Some(exit) = self.exit {
            return Ok(Some(exit));
        }

        let child = match self.child.as_mut() {
            Some(child) => child,
            None => return Err(SupervisorError::Detached { pid: self.pid }),
        };

        let exit = match child.try_wait() {
            Ok(Some(status)) => ProcessExit::from_status(status),
            Ok(None) => return Ok(None),
            Err(e) if signal::is_no_such_process(&e) => {
                tracing::debug!(pid = self.pid, "Process already reaped");
                ProcessExit::Unknown
            }
            Err(e) => return Err(e.into()),
        };

        self.stdin = None;
        self.exit = Some(exit);
        Ok(Some(exit))
    }

    /// Write the quit command to stdin. `Ok(false)` when there is no stdin.
    pub(crate) fn send_quit(&mut self, command: &str) -> io::Result<bool> {
        let mut stdin = match self.stdin.take() {
            Some(stdin) => stdin,
            None => return Ok(false),
        };
        stdin.write_all(command.as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()?;
        Ok(true)
    }

    /// Kill the direct child through the std handle
    pub(crate) fn kill_direct(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if let Err(e) = child.kill() {
                tracing::debug!(pid = self.pid, "Direct kill failed: {}", e);
            }
        }
    }
}

/// One escalation from a tier that did not end the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopEscalation {
    pub from: StopTier,
    pub to: StopTier,
    pub waited: Duration,
}

impl fmt::Display for StopEscalation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "process did not exit within {:?} of the {} tier, escalating to {}",
            self.waited, self.from, self.to
        )
    }
}

/// Result of a completed shutdown
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitOutcome {
    pub pid: u32,
    pub exit: ProcessExit,
    /// Tier that ended the process; `None` if it had exited before `stop`
    pub confirmed_at: Option<StopTier>,
    pub escalations: Vec<StopEscalation>,
    pub elapsed: Duration,
}

impl ExitOutcome {
    /// The process was gone before shutdown began
    pub fn exited_early(&self) -> bool {
        self.confirmed_at.is_none()
    }

    pub fn escalated(&self) -> bool {
        !self.escalations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_display() {
        assert_eq!(ProcessExit::Exited(1).to_string(), "exit code 1");
        assert_eq!(ProcessExit::Signaled(9).to_string(), "signal 9");
        assert!(ProcessExit::Exited(0).success());
        assert!(!ProcessExit::Unknown.success());
    }

    #[test]
    fn test_escalation_display() {
        let escalation = StopEscalation {
            from: StopTier::Graceful,
            to: StopTier::Terminate,
            waited: Duration::from_secs(5),
        };
        assert_eq!(
            escalation.to_string(),
            "process did not exit within 5s of the graceful tier, escalating to terminate"
        );
    }

    #[test]
    fn test_detached_handle_cannot_reap() {
        let mut handle = ProcessHandle::detached(42, "ffmpeg".to_string());
        assert!(handle.is_detached());
        assert!(matches!(handle.try_reap(), Err(SupervisorError::Detached { pid: 42 })));
    }
}
