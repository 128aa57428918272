//! Error types and handling
//!
//! Common error types used across the crate. Module-level errors
//! (`ConfigError`, `SupervisorError`, `ProbeError`, `TitleError`) convert
//! into [`RecorderError`] so callers only match on one type.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::TitleError;
use crate::options::ConfigError;
use crate::process::SupervisorError;
use crate::recorder::{ProbeError, SessionState};

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Dependency not found: {0}")]
    DependencyMissing(String),

    #[error("Failed to start ffmpeg. Reason: {reason}")]
    LaunchFailure { reason: String, log: PathBuf },

    #[error("Failed to stop process {pid}: {reason}")]
    StopFailure { pid: u32, reason: String },

    #[error("Artifact probe failed: {0}")]
    ArtifactProbe(#[from] ProbeError),

    #[error(transparent)]
    Title(#[from] TitleError),

    #[error("Cannot {operation} while session is {state}")]
    InvalidTransition {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Process error: {0}")]
    Supervisor(SupervisorError),

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SupervisorError> for RecorderError {
    fn from(error: SupervisorError) -> Self {
        match error {
            SupervisorError::BinaryNotFound(program) => {
                RecorderError::DependencyMissing(format!("{} binary not found", program))
            }
            other => RecorderError::Supervisor(other),
        }
    }
}

/// Serializable error report for callers that forward failures
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<RecorderError> for ErrorResponse {
    fn from(error: RecorderError) -> Self {
        let code = match &error {
            RecorderError::Configuration(_) => "CONFIGURATION_ERROR",
            RecorderError::DependencyMissing(_) => "DEPENDENCY_MISSING",
            RecorderError::LaunchFailure { .. } => "LAUNCH_FAILURE",
            RecorderError::StopFailure { .. } => "STOP_FAILURE",
            RecorderError::ArtifactProbe(_) => "ARTIFACT_PROBE_ERROR",
            RecorderError::Title(TitleError::ApplicationNotFound(_)) => "APPLICATION_NOT_FOUND",
            RecorderError::Title(TitleError::DependencyMissing(_)) => "DEPENDENCY_MISSING",
            RecorderError::InvalidTransition { .. } => "INVALID_TRANSITION",
            RecorderError::Supervisor(_) => "PROCESS_ERROR",
            RecorderError::Screenshot(_) => "SCREENSHOT_ERROR",
            RecorderError::Io(_) => "IO_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using RecorderError
pub type RecorderResult<T> = Result<T, RecorderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_becomes_dependency_missing() {
        let error: RecorderError = SupervisorError::BinaryNotFound("ffmpeg".to_string()).into();
        assert!(matches!(error, RecorderError::DependencyMissing(_)));
        assert_eq!(error.to_string(), "Dependency not found: ffmpeg binary not found");
    }

    #[test]
    fn test_error_response_codes() {
        let response = ErrorResponse::from(RecorderError::InvalidTransition {
            operation: "stop",
            state: SessionState::Idle,
        });
        assert_eq!(response.code, "INVALID_TRANSITION");
        assert_eq!(response.message, "Cannot stop while session is idle");

        let response = ErrorResponse::from(RecorderError::LaunchFailure {
            reason: "Unknown input format".to_string(),
            log: PathBuf::from("ffmpeg.log"),
        });
        assert_eq!(response.code, "LAUNCH_FAILURE");
        assert!(response.message.contains("Unknown input format"));
    }
}
