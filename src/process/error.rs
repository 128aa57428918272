//! Process supervision errors

use std::io;

use thiserror::Error;

use crate::capture::ShutdownSignal;

/// Errors raised while spawning or controlling the capture process
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Binary not found: {0}")]
    BinaryNotFound(String),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Process {pid} is detached and not tracked")]
    Detached { pid: u32 },

    #[error("Failed to send {signal} to process {pid}: {reason}")]
    Signal {
        pid: u32,
        signal: ShutdownSignal,
        reason: String,
    },

    #[error("Process {pid} is still alive after the kill tier")]
    StillAlive { pid: u32 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
