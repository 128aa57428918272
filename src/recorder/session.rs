//! Recording session
//!
//! Drives one recording attempt through
//! `Idle -> Starting -> Recording -> Stopping -> Ready | Failed`.
//! A session owns at most one capture process and its log sink. `Ready` and
//! `Failed` are final; record again with a new session.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::capture::{Desktop, InputSource, WindowTitle};
use crate::config::{ExitPolicy, RuntimeConfig};
use crate::options::{AdvancedOptions, Composer, RecordingConfig, ResolvedOptions};
use crate::process::{ExitOutcome, Invocation, LogSink, ProcessHandle, Supervisor, SupervisorError};
use crate::recorder::artifact::{resolve_artifact, Artifact, ArtifactProbe, FfprobeProbe, Resolution};
use crate::recorder::screenshot::capture_screenshot;
use crate::recorder::state::{SessionState, SessionStateHandle};
use crate::utils::error::{RecorderError, RecorderResult};
use crate::utils::log_tail::{lines_from_log, LogPosition};

/// One recording attempt
pub struct RecordingSession {
    /// Session id used in log events
    id: Uuid,

    /// Process-wide settings, shared read-only with other sessions
    runtime: Arc<RuntimeConfig>,

    /// What to record and where
    config: RecordingConfig,

    composer: Composer,

    supervisor: Supervisor,

    /// Reads metadata from the finished output
    probe: Box<dyn ArtifactProbe>,

    state: Arc<RwLock<SessionState>>,

    /// The running capture process
    process: Option<ProcessHandle>,

    /// Log file of the running capture process
    log_sink: Option<LogSink>,

    /// Probed output after a successful stop
    artifact: Option<Artifact>,

    started_at: Option<DateTime<Utc>>,

    stopped_at: Option<DateTime<Utc>>,

    /// How the last capture process ended
    last_outcome: Option<ExitOutcome>,
}

impl RecordingSession {
    /// Create a session for `config`
    pub fn new(runtime: Arc<RuntimeConfig>, config: RecordingConfig) -> Self {
        let probe = FfprobeProbe::new(runtime.ffprobe_binary.clone());
        Self {
            id: Uuid::new_v4(),
            composer: Composer::new(runtime.platform),
            supervisor: Supervisor::from_config(&runtime),
            runtime,
            config,
            probe: Box::new(probe),
            state: Arc::new(RwLock::new(SessionState::Idle)),
            process: None,
            log_sink: None,
            artifact: None,
            started_at: None,
            stopped_at: None,
            last_outcome: None,
        }
    }

    /// Session recording whatever `source` resolves to
    pub fn with_source(
        runtime: Arc<RuntimeConfig>,
        source: &dyn InputSource,
        output: impl Into<PathBuf>,
        advanced: AdvancedOptions,
    ) -> RecorderResult<Self> {
        let config = RecordingConfig::new(source, Some(output.into()), advanced, runtime.platform)?;
        Ok(Self::new(runtime, config))
    }

    /// Session recording the default display
    pub fn desktop(runtime: Arc<RuntimeConfig>, output: impl Into<PathBuf>) -> RecorderResult<Self> {
        Self::with_source(runtime, &Desktop::os_default(), output, AdvancedOptions::default())
    }

    /// Session recording a single window, by its already resolved title
    pub fn window(
        runtime: Arc<RuntimeConfig>,
        title: &str,
        output: impl Into<PathBuf>,
        advanced: AdvancedOptions,
    ) -> RecorderResult<Self> {
        Self::with_source(runtime, &WindowTitle::new(title), output, advanced)
    }

    /// Replace the artifact probe
    pub fn with_probe(mut self, probe: impl ArtifactProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Read-only state view for other threads
    pub fn state_handle(&self) -> SessionStateHandle {
        SessionStateHandle::new(Arc::clone(&self.state))
    }

    pub fn config(&self) -> &RecordingConfig {
        &self.config
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn stopped_at(&self) -> Option<DateTime<Utc>> {
        self.stopped_at
    }

    pub fn last_outcome(&self) -> Option<&ExitOutcome> {
        self.last_outcome.as_ref()
    }

    /// Pid of the capture process while one is held
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(ProcessHandle::pid)
    }

    pub fn log_path(&self) -> PathBuf {
        self.config.log_path()
    }

    /// Launch the capture tool and confirm it survived the settle delay
    pub fn start(&mut self) -> RecorderResult<()> {
        self.require("start", &[SessionState::Idle])?;

        let resolved = self.composer.resolve(&self.config)?;
        self.runtime.locate_ffmpeg()?;

        self.transition(SessionState::Starting);
        if let Err(e) = self.launch(&resolved) {
            self.transition(SessionState::Failed);
            return Err(e);
        }

        self.started_at = Some(Utc::now());
        self.transition(SessionState::Recording);
        tracing::info!(
            session = %self.id,
            "Recording {} to {}",
            self.config.input(),
            self.config.output().display()
        );
        Ok(())
    }

    fn launch(&mut self, resolved: &ResolvedOptions) -> RecorderResult<()> {
        let mut sink = LogSink::create(&resolved.log)?;
        let invocation = Invocation::new(self.runtime.ffmpeg_binary.clone(), resolved.tokens())
            .overwrite(self.runtime.overwrite_output);
        tracing::debug!(session = %self.id, "Launching: {}", invocation);

        let mut handle = self.supervisor.start(&invocation, &sink)?;
        thread::sleep(self.runtime.settle_delay());

        let alive = match self.supervisor.alive(&mut handle) {
            Ok(alive) => alive,
            Err(e) => {
                self.supervisor.kill(&mut handle);
                return Err(e.into());
            }
        };
        if alive {
            self.process = Some(handle);
            self.log_sink = Some(sink);
            return Ok(());
        }

        sink.close();
        let reason = lines_from_log(sink.path(), LogPosition::Last, self.runtime.launch_log_lines)
            .unwrap_or_else(|e| format!("log unavailable ({})", e));
        tracing::error!(
            session = %self.id,
            pid = handle.pid(),
            "ffmpeg exited during startup: {}",
            reason
        );
        Err(RecorderError::LaunchFailure {
            reason,
            log: sink.path().to_path_buf(),
        })
    }

    /// Stop the capture tool and probe the output.
    ///
    /// The session only reaches `Ready` after exit is confirmed and the
    /// output was probed. On failure the output file is left in place.
    pub fn stop(&mut self) -> RecorderResult<Artifact> {
        self.require("stop", &[SessionState::Recording])?;
        let Some(mut handle) = self.process.take() else {
            return Err(RecorderError::InvalidTransition {
                operation: "stop",
                state: self.state(),
            });
        };

        self.transition(SessionState::Stopping);
        tracing::info!(session = %self.id, pid = handle.pid(), "Stopping recording");

        let result = self.supervisor.stop(&mut handle, self.runtime.stop_timeout());
        self.stopped_at = Some(Utc::now());
        if let Some(mut sink) = self.log_sink.take() {
            sink.close();
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(SupervisorError::StillAlive { pid }) => {
                self.process = Some(handle);
                self.transition(SessionState::Failed);
                return Err(RecorderError::StopFailure {
                    pid,
                    reason: "process survived the kill tier; stop it manually, the output was left in place"
                        .to_string(),
                });
            }
            Err(e) => {
                self.supervisor.kill(&mut handle);
                self.transition(SessionState::Failed);
                return Err(e.into());
            }
        };
        self.last_outcome = Some(outcome.clone());

        if outcome.exited_early() && !outcome.exit.success() {
            match self.runtime.exit_policy {
                ExitPolicy::Strict => {
                    tracing::error!(
                        session = %self.id,
                        pid = outcome.pid,
                        "ffmpeg had already exited with {}; see {}",
                        outcome.exit,
                        self.config.log_path().display()
                    );
                    self.transition(SessionState::Failed);
                    return Err(RecorderError::StopFailure {
                        pid: outcome.pid,
                        reason: format!("ffmpeg exited with {} before stop was requested", outcome.exit),
                    });
                }
                ExitPolicy::Lenient => tracing::warn!(
                    session = %self.id,
                    pid = outcome.pid,
                    "ffmpeg had already exited with {}, probing output anyway",
                    outcome.exit
                ),
            }
        }

        match resolve_artifact(&*self.probe, self.config.output(), self.runtime.probe_retry()) {
            Ok(artifact) => {
                self.transition(SessionState::Ready);
                tracing::info!(session = %self.id, "Recording saved to {}", artifact.path.display());
                self.artifact = Some(artifact.clone());
                Ok(artifact)
            }
            Err(e) => {
                tracing::error!(session = %self.id, "Could not probe {}: {}", self.config.output().display(), e);
                self.transition(SessionState::Failed);
                Err(e.into())
            }
        }
    }

    /// Remove the output file. A missing file is not an error.
    pub fn discard(&mut self) -> RecorderResult<()> {
        self.require(
            "discard",
            &[SessionState::Idle, SessionState::Ready, SessionState::Failed],
        )?;

        let output = self.config.output();
        match fs::remove_file(output) {
            Ok(()) => tracing::info!(session = %self.id, "Discarded {}", output.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(session = %self.id, "Nothing to discard at {}", output.display())
            }
            Err(e) => return Err(e.into()),
        }
        self.artifact = None;
        Ok(())
    }

    /// Same as [`discard`](Self::discard)
    pub fn delete(&mut self) -> RecorderResult<()> {
        self.discard()
    }

    /// Capture one frame of this session's source. Does not change state.
    pub fn screenshot(&self, path: impl AsRef<Path>, resolution: Option<Resolution>) -> RecorderResult<PathBuf> {
        self.require("take a screenshot", &[SessionState::Idle, SessionState::Recording])?;
        let resolved = self.composer.resolve(&self.config)?;
        capture_screenshot(&self.runtime, &self.supervisor, &resolved, path.as_ref(), resolution)
    }

    fn require(&self, operation: &'static str, allowed: &[SessionState]) -> RecorderResult<()> {
        let state = self.state();
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(RecorderError::InvalidTransition { operation, state })
        }
    }

    fn transition(&self, next: SessionState) {
        let mut state = self.state.write();
        debug_assert!(state.can_transition_to(next), "{} -> {}", *state, next);
        tracing::debug!(session = %self.id, "State {} -> {}", *state, next);
        *state = next;
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if let Some(mut handle) = self.process.take() {
            if matches!(self.supervisor.alive(&mut handle), Ok(true)) {
                tracing::warn!(
                    session = %self.id,
                    pid = handle.pid(),
                    "Session dropped while ffmpeg is still running"
                );
                self.supervisor.kill(&mut handle);
            }
        }
    }
}
