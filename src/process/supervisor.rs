//! Process supervisor
//!
//! Spawns the capture tool with its output attached to a [`LogSink`],
//! answers liveness questions without blocking, and runs the bounded
//! three-tier shutdown: graceful (quit command or interrupt), terminate,
//! kill. Each tier waits up to the stop timeout, polling at a fixed
//! interval, before escalating.

use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::capture::{Platform, StopTier};
use crate::config::RuntimeConfig;
use crate::process::handle::{ExitOutcome, ProcessExit, ProcessHandle, StopEscalation};
use crate::process::invocation::{resolve_binary, Invocation};
use crate::process::log_sink::LogSink;
use crate::process::signal::{self, Delivery};
use crate::process::SupervisorError;

/// Default interval between exit polls
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Spawns and stops capture processes for one platform
#[derive(Debug, Clone)]
pub struct Supervisor {
    platform: Platform,
    poll_interval: Duration,
    quit_command: Option<String>,
}

impl Supervisor {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            poll_interval: POLL_INTERVAL,
            quit_command: Some("q".to_string()),
        }
    }

    /// Supervisor using the platform, polling and quit command of `config`
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let platform = config.platform.or_else(Platform::detect).unwrap_or(host_fallback());
        Self {
            platform,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            quit_command: config.quit_command.clone(),
        }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Command written to stdin for a graceful stop; `None` sends an interrupt
    pub fn quit_command(mut self, command: Option<String>) -> Self {
        self.quit_command = command;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Spawn `invocation` with stdout and stderr going to `sink`.
    ///
    /// Returns as soon as the process exists; readiness is not awaited.
    pub fn start(&self, invocation: &Invocation, sink: &LogSink) -> Result<ProcessHandle, SupervisorError> {
        let program = resolve_binary(invocation.program())?;
        let program_name = program.display().to_string();
        let (stdout, stderr) = sink.stdio_pair()?;

        let mut command = Command::new(&program);
        command.args(invocation.args()).stdout(stdout).stderr(stderr);
        if invocation.is_detached() || self.quit_command.is_none() {
            command.stdin(Stdio::null());
        } else {
            command.stdin(Stdio::piped());
        }
        signal::configure_spawn(&mut command, self.platform.spawn_mode());

        let mut child = command.spawn().map_err(|source| SupervisorError::Spawn {
            program: program_name.clone(),
            source,
        })?;
        let pid = child.id();
        tracing::debug!(pid, "Spawned {} (log: {})", invocation, sink.path().display());

        if invocation.is_detached() {
            thread::Builder::new()
                .name(format!("reaper-{}", pid))
                .spawn(move || match child.wait() {
                    Ok(status) => tracing::debug!(pid, "Detached process exited with {}", ProcessExit::from_status(status)),
                    Err(e) => tracing::debug!(pid, "Failed to wait for detached process: {}", e),
                })?;
            return Ok(ProcessHandle::detached(pid, program_name));
        }

        Ok(ProcessHandle::attached(child, program_name))
    }

    /// Whether the process is still running. Safe to call repeatedly.
    pub fn alive(&self, handle: &mut ProcessHandle) -> Result<bool, SupervisorError> {
        Ok(handle.try_reap()?.is_none())
    }

    /// Poll until the process exits or `timeout` elapses
    pub fn poll_for_exit(
        &self,
        handle: &mut ProcessHandle,
        timeout: Duration,
    ) -> Result<Option<ProcessExit>, SupervisorError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(exit) = handle.try_reap()? {
                return Ok(Some(exit));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    /// Run the graceful, terminate, kill escalation, bounding each tier by `timeout`.
    ///
    /// Escalations are logged and reported in the outcome. A process that
    /// survives the kill tier is a `StillAlive` error.
    pub fn stop(&self, handle: &mut ProcessHandle, timeout: Duration) -> Result<ExitOutcome, SupervisorError> {
        let pid = handle.pid();
        let started = Instant::now();

        if let Some(exit) = handle.try_reap()? {
            tracing::debug!(pid, "Process had already exited with {}", exit);
            return Ok(ExitOutcome {
                pid,
                exit,
                confirmed_at: None,
                escalations: Vec::new(),
                elapsed: started.elapsed(),
            });
        }

        let mut escalations = Vec::new();
        let mut tier = StopTier::Graceful;
        loop {
            self.deliver(handle, tier);

            if let Some(exit) = self.poll_for_exit(handle, timeout)? {
                tracing::info!(pid, "Process exited with {} at the {} tier", exit, tier);
                return Ok(ExitOutcome {
                    pid,
                    exit,
                    confirmed_at: Some(tier),
                    escalations,
                    elapsed: started.elapsed(),
                });
            }

            let Some(next) = tier.next() else {
                tracing::error!(
                    pid,
                    "Process is still running after the kill tier; it must be stopped manually"
                );
                return Err(SupervisorError::StillAlive { pid });
            };

            let escalation = StopEscalation {
                from: tier,
                to: next,
                waited: timeout,
            };
            if next == StopTier::Kill {
                tracing::error!(pid, "{}", escalation);
            } else {
                tracing::warn!(pid, "{}", escalation);
            }
            escalations.push(escalation);
            tier = next;
        }
    }

    /// Send the kill tier straight away, for a handle about to be abandoned.
    ///
    /// Never fails; waits at most a few poll intervals for the exit.
    pub fn kill(&self, handle: &mut ProcessHandle) -> Option<ProcessExit> {
        let pid = handle.pid();
        if let Ok(Some(exit)) = handle.try_reap() {
            return Some(exit);
        }

        tracing::warn!(pid, "Killing abandoned process");
        self.deliver(handle, StopTier::Kill);
        match self.poll_for_exit(handle, self.poll_interval * 10) {
            Ok(exit) => exit,
            Err(e) => {
                tracing::warn!(pid, "Could not confirm exit of abandoned process: {}", e);
                None
            }
        }
    }

    fn deliver(&self, handle: &mut ProcessHandle, tier: StopTier) {
        let pid = handle.pid();

        if tier == StopTier::Graceful {
            if let Some(command) = &self.quit_command {
                match handle.send_quit(command) {
                    Ok(true) => {
                        tracing::debug!(pid, "Sent quit command {:?}", command);
                        return;
                    }
                    Ok(false) => {}
                    Err(e) => tracing::debug!(pid, "Quit command not delivered ({}), sending interrupt", e),
                }
            }
        }

        let signal = self.platform.signal_for(tier);
        match signal::send(pid, signal, self.platform.signals_process_group()) {
            Ok(Delivery::Sent) => tracing::debug!(pid, "Sent {}", signal),
            Ok(Delivery::NoSuchProcess) => tracing::debug!(pid, "No process to receive {}", signal),
            Err(e) => tracing::warn!(pid, "{}", e),
        }

        if tier == StopTier::Kill {
            handle.kill_direct();
        }
    }
}

/// Platform assumed when the host OS is not one we record on
fn host_fallback() -> Platform {
    if cfg!(windows) {
        Platform::Windows
    } else {
        Platform::Linux
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }
}
