//! Recording sessions
//!
//! - `RecordingSession`: the start/stop/discard state machine a caller drives
//! - `SessionState`: lifecycle states and allowed transitions
//! - `artifact`: probing the finished output, with retry
//! - `screenshot`: single-frame capture of a session's source

pub mod artifact;
pub mod screenshot;
pub mod session;
pub mod state;

pub use artifact::{resolve_artifact, Artifact, ArtifactProbe, FfprobeProbe, ProbeError, Resolution, RetryPolicy};
pub use session::RecordingSession;
pub use state::{SessionState, SessionStateHandle};
