//! Screen Recorder - record the desktop or a window with ffmpeg.
//!
//! This crate supervises an external ffmpeg process: it composes the
//! command line from a structured configuration, launches and watches the
//! process, shuts it down gracefully (escalating when it does not
//! cooperate) and probes the recording it produced.
//!
//! ```no_run
//! use std::sync::Arc;
//! use screen_recorder::{RecordingSession, RuntimeConfig};
//!
//! # fn main() -> Result<(), screen_recorder::RecorderError> {
//! let runtime = Arc::new(RuntimeConfig::default());
//! let mut session = RecordingSession::desktop(runtime, "recording.mkv")?;
//! session.start()?;
//! // ...
//! let artifact = session.stop()?;
//! println!("{} seconds", artifact.duration_secs.unwrap_or_default());
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod config;
pub mod logging;
pub mod options;
pub mod process;
pub mod recorder;
pub mod utils;

pub use capture::{Desktop, InputSource, Platform, TitleError, TitleResolver, WindowTitle};
pub use config::{ExitPolicy, RuntimeConfig};
pub use logging::init_logging;
pub use options::{AdvancedOptions, CommandTokens, Composer, ConfigError, OptionValue, RecordingConfig};
pub use process::{ExitOutcome, Invocation, LogSink, ProcessHandle, Supervisor, SupervisorError};
pub use recorder::{Artifact, ArtifactProbe, FfprobeProbe, RecordingSession, Resolution, SessionState};
pub use utils::error::{ErrorResponse, RecorderError, RecorderResult};
