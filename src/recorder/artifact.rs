//! Artifact resolution
//!
//! After the capture tool exits, the output file is probed for metadata.
//! The file may still be locked or mid-flush right after exit, so transient
//! access errors are retried a fixed number of times.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Frame size of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A finished recording and its probed metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Output file
    pub path: PathBuf,

    /// Container duration in seconds
    pub duration_secs: Option<f64>,

    /// Video frame rate
    pub frame_rate: Option<f64>,

    pub resolution: Option<Resolution>,

    /// Video codec name as reported by the prober
    pub codec: Option<String>,

    /// A video stream with non-zero dimensions was found
    pub valid: bool,

    pub probed_at: DateTime<Utc>,
}

/// Probe errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Output temporarily unavailable: {0}")]
    Transient(String),

    #[error("Output could not be probed: {0}")]
    Terminal(String),

    #[error("Output still unavailable after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl ProbeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProbeError::Transient(_))
    }
}

/// Reads metadata from a finished recording
pub trait ArtifactProbe: Send + Sync {
    fn probe(&self, path: &Path) -> Result<Artifact, ProbeError>;
}

/// Retry budget for artifact probing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total probe calls allowed, including the first
    pub attempts: u32,
    /// Wait between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Probe `path`, retrying transient failures within `policy`.
///
/// Never calls the probe more than `policy.attempts` times.
pub fn resolve_artifact<P>(probe: &P, path: &Path, policy: RetryPolicy) -> Result<Artifact, ProbeError>
where
    P: ArtifactProbe + ?Sized,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match probe.probe(path) {
            Ok(artifact) => {
                tracing::debug!("Probed {} on attempt {}", path.display(), attempt);
                return Ok(artifact);
            }
            Err(ProbeError::Transient(reason)) if attempt < attempts => {
                tracing::warn!(
                    "Probe of {} failed ({}), retrying in {:?} ({}/{})",
                    path.display(),
                    reason,
                    policy.delay,
                    attempt,
                    attempts
                );
                thread::sleep(policy.delay);
            }
            Err(ProbeError::Transient(reason)) => {
                return Err(ProbeError::Exhausted {
                    attempts,
                    last: reason,
                })
            }
            Err(e) => return Err(e),
        }
    }
}

/// Probe backed by `ffprobe`
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: PathBuf,
}

impl FfprobeProbe {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl ArtifactProbe for FfprobeProbe {
    fn probe(&self, path: &Path) -> Result<Artifact, ProbeError> {
        // Opening first surfaces sharing violations before ffprobe hides them
        File::open(path).map_err(|e| classify_io(path, &e))?;

        let output = Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                "v:0",
            ])
            .arg(path)
            .output()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    ProbeError::Terminal(format!("{} not found", self.binary.display()))
                } else {
                    classify_io(path, &e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = format!("ffprobe failed: {}", stderr.trim());
            return if stderr.contains("Resource temporarily unavailable") {
                Err(ProbeError::Transient(reason))
            } else {
                Err(ProbeError::Terminal(reason))
            };
        }

        parse_ffprobe_output(path, &String::from_utf8_lossy(&output.stdout))
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeReport {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Build an [`Artifact`] from ffprobe's JSON report
pub fn parse_ffprobe_output(path: &Path, json: &str) -> Result<Artifact, ProbeError> {
    let report: FfprobeReport = serde_json::from_str(json)
        .map_err(|e| ProbeError::Terminal(format!("Unexpected ffprobe output: {}", e)))?;

    let video = report
        .streams
        .iter()
        .find(|stream| stream.codec_type.as_deref().map_or(true, |kind| kind == "video"));

    let resolution = video.and_then(|stream| match (stream.width, stream.height) {
        (Some(width), Some(height)) => Some(Resolution::new(width, height)),
        _ => None,
    });

    let frame_rate = video.and_then(|stream| {
        stream
            .r_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .or_else(|| stream.avg_frame_rate.as_deref().and_then(parse_frame_rate))
    });

    let duration_secs = report
        .format
        .as_ref()
        .and_then(|format| format.duration.as_deref())
        .and_then(|duration| duration.parse::<f64>().ok());

    Ok(Artifact {
        path: path.to_path_buf(),
        duration_secs,
        frame_rate,
        resolution,
        codec: video.and_then(|stream| stream.codec_name.clone()),
        valid: resolution.map_or(false, |r| r.width > 0 && r.height > 0),
        probed_at: Utc::now(),
    })
}

/// Parse "30/1", "30000/1001" or "29.97"; zero or undefined rates are `None`
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value > 0.0).then_some(value)
}

fn classify_io(path: &Path, error: &io::Error) -> ProbeError {
    let reason = format!("{}: {}", path.display(), error);
    if is_transient_io(error) {
        ProbeError::Transient(reason)
    } else {
        ProbeError::Terminal(reason)
    }
}

fn is_transient_io(error: &io::Error) -> bool {
    if matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    ) {
        return true;
    }

    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
    cfg!(windows) && matches!(error.raw_os_error(), Some(32) | Some(33))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tempfile::tempdir;

    const REPORT: &str = r#"{
        "streams": [{
            "index": 0,
            "codec_name": "h264",
            "codec_type": "video",
            "width": 1920,
            "height": 1080,
            "r_frame_rate": "15/1",
            "avg_frame_rate": "15/1"
        }],
        "format": {"filename": "out.mkv", "duration": "12.400000"}
    }"#;

    /// Fails with the queued errors, then succeeds
    struct ScriptedProbe {
        failures: Mutex<Vec<ProbeError>>,
        calls: Mutex<u32>,
    }

    impl ScriptedProbe {
        fn new(mut failures: Vec<ProbeError>) -> Self {
            failures.reverse();
            Self {
                failures: Mutex::new(failures),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock()
        }
    }

    impl ArtifactProbe for ScriptedProbe {
        fn probe(&self, path: &Path) -> Result<Artifact, ProbeError> {
            *self.calls.lock() += 1;
            match self.failures.lock().pop() {
                Some(error) => Err(error),
                None => parse_ffprobe_output(path, REPORT),
            }
        }
    }

    fn quick() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_parse_report() {
        let artifact = parse_ffprobe_output(Path::new("out.mkv"), REPORT).unwrap();
        assert_eq!(artifact.resolution, Some(Resolution::new(1920, 1080)));
        assert_eq!(artifact.frame_rate, Some(15.0));
        assert_eq!(artifact.duration_secs, Some(12.4));
        assert_eq!(artifact.codec.as_deref(), Some("h264"));
        assert!(artifact.valid);
    }

    #[test]
    fn test_parse_report_without_video() {
        let artifact = parse_ffprobe_output(Path::new("out.mkv"), r#"{"streams": [], "format": {}}"#).unwrap();
        assert!(!artifact.valid);
        assert_eq!(artifact.resolution, None);

        assert!(matches!(
            parse_ffprobe_output(Path::new("out.mkv"), "not json"),
            Err(ProbeError::Terminal(_))
        ));
    }

    #[test]
    fn test_frame_rates() {
        assert_eq!(parse_frame_rate("30000/1001").map(|r| (r * 100.0).round()), Some(2997.0));
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("0/0"), None);
    }

    #[test]
    fn test_two_transient_failures_then_success() {
        let probe = ScriptedProbe::new(vec![
            ProbeError::Transient("locked".to_string()),
            ProbeError::Transient("locked".to_string()),
        ]);
        let artifact = resolve_artifact(&probe, Path::new("out.mkv"), quick()).unwrap();
        assert!(artifact.valid);
        assert_eq!(probe.calls(), 3);
    }

    #[test]
    fn test_retry_budget_exhausted() {
        let probe = ScriptedProbe::new(vec![ProbeError::Transient("locked".to_string()); 5]);
        let error = resolve_artifact(&probe, Path::new("out.mkv"), quick()).unwrap_err();
        assert_eq!(
            error,
            ProbeError::Exhausted {
                attempts: 3,
                last: "locked".to_string()
            }
        );
        assert_eq!(probe.calls(), 3);
    }

    #[test]
    fn test_terminal_error_not_retried() {
        let probe = ScriptedProbe::new(vec![ProbeError::Terminal("corrupt".to_string())]);
        let error = resolve_artifact(&probe, Path::new("out.mkv"), quick()).unwrap_err();
        assert_eq!(error, ProbeError::Terminal("corrupt".to_string()));
        assert_eq!(probe.calls(), 1);
    }

    #[test]
    fn test_missing_file_is_terminal() {
        let dir = tempdir().unwrap();
        let probe = FfprobeProbe::default();
        let error = probe.probe(&dir.path().join("missing.mkv")).unwrap_err();
        assert!(matches!(error, ProbeError::Terminal(_)));
    }

    #[test]
    fn test_resolution_display() {
        assert_eq!(Resolution::new(1280, 720).to_string(), "1280x720");
    }
}
