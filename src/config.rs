//! Process-wide runtime configuration
//!
//! Built once at startup, wrapped in an `Arc` and handed to every
//! [`RecordingSession`](crate::recorder::RecordingSession). Nothing here is
//! mutated after a session has started.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capture::Platform;
use crate::options::{ConfigError, ConfigProblem};
use crate::process::resolve_binary;
use crate::recorder::RetryPolicy;
use crate::utils::error::RecorderResult;

/// How an exit that happened before `stop()` was requested is treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitPolicy {
    /// Non-success early exit fails the session
    #[default]
    Strict,
    /// Warn and probe the output anyway
    Lenient,
}

/// Tool locations, platform and timing used by every session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeConfig {
    /// Capture tool; bare names are looked up on PATH
    pub ffmpeg_binary: PathBuf,

    /// Probing tool used on finished recordings
    pub ffprobe_binary: PathBuf,

    /// Prepend `-y` when spawning the capture tool
    pub overwrite_output: bool,

    /// OS family; `None` when the host OS is not supported
    pub platform: Option<Platform>,

    /// Wait after spawn before the launch liveness check
    pub settle_delay_ms: u64,

    /// Interval between exit polls
    pub poll_interval_ms: u64,

    /// Bound for each shutdown tier
    pub stop_timeout_ms: u64,

    /// Artifact probe attempts before giving up
    pub probe_attempts: u32,

    /// Delay between artifact probe attempts
    pub probe_retry_delay_ms: u64,

    /// Log lines attached to a launch failure
    pub launch_log_lines: usize,

    /// Quit command written to the tool's stdin; `None` sends an interrupt
    pub quit_command: Option<String>,

    pub exit_policy: ExitPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_binary: PathBuf::from("ffmpeg"),
            ffprobe_binary: PathBuf::from("ffprobe"),
            overwrite_output: true,
            platform: Platform::detect(),
            settle_delay_ms: 1500,
            poll_interval_ms: 100,
            stop_timeout_ms: 5000,
            probe_attempts: 3,
            probe_retry_delay_ms: 1000,
            launch_log_lines: 2,
            quit_command: Some("q".to_string()),
            exit_policy: ExitPolicy::Strict,
        }
    }
}

impl RuntimeConfig {
    /// Read a configuration from a JSON file; absent keys keep their defaults
    pub fn load(path: &Path) -> RecorderResult<Self> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content).map_err(|e| {
            ConfigError::single(ConfigProblem::Malformed(format!("{}: {}", path.display(), e)))
        })?;
        Ok(config)
    }

    /// Full path of the capture tool, or `DependencyMissing`
    pub fn locate_ffmpeg(&self) -> RecorderResult<PathBuf> {
        Ok(resolve_binary(&self.ffmpeg_binary)?)
    }

    /// Full path of the probing tool, or `DependencyMissing`
    pub fn locate_ffprobe(&self) -> RecorderResult<PathBuf> {
        Ok(resolve_binary(&self.ffprobe_binary)?)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Retry budget for artifact probing
    pub fn probe_retry(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.probe_attempts,
            delay: Duration::from_millis(self.probe_retry_delay_ms),
        }
    }
}
