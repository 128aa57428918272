//! Recording session state machine

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a recording session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Created, nothing launched yet
    #[default]
    Idle,
    /// Process spawned, waiting out the settle delay
    Starting,
    /// Capture process running
    Recording,
    /// Shutdown and artifact resolution in progress
    Stopping,
    /// Process exited and the output was probed
    Ready,
    /// Launch, shutdown or probing failed
    Failed,
}

impl SessionState {
    /// `Ready` and `Failed` are final; a new session is needed afterwards
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Failed)
    }

    /// A capture process may be running in this state
    pub fn has_live_process(self) -> bool {
        matches!(
            self,
            SessionState::Starting | SessionState::Recording | SessionState::Stopping
        )
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Starting, Recording)
                | (Starting, Failed)
                | (Recording, Stopping)
                | (Recording, Failed)
                | (Stopping, Ready)
                | (Stopping, Failed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Recording => "recording",
            SessionState::Stopping => "stopping",
            SessionState::Ready => "ready",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Read-only view of a session's state that can be moved to another thread
#[derive(Debug, Clone)]
pub struct SessionStateHandle(Arc<RwLock<SessionState>>);

impl SessionStateHandle {
    pub(crate) fn new(state: Arc<RwLock<SessionState>>) -> Self {
        Self(state)
    }

    pub fn get(&self) -> SessionState {
        *self.0.read()
    }
}
