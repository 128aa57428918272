//! Shared utilities
//!
//! Error types and log file helpers used across the crate.

pub mod error;
pub mod log_tail;

pub use error::{ErrorResponse, RecorderError, RecorderResult};
pub use log_tail::{lines_from_log, LogPosition};
