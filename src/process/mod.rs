//! External process supervision
//!
//! - `Invocation`: program and ordered arguments for one launch
//! - `LogSink`: the log file receiving the tool's output
//! - `Supervisor`: start, liveness and the escalating shutdown
//! - `signal`: platform signal delivery

pub mod error;
pub mod handle;
pub mod invocation;
pub mod log_sink;
pub mod signal;
pub mod supervisor;

pub use error::SupervisorError;
pub use handle::{ExitOutcome, ProcessExit, ProcessHandle, StopEscalation};
pub use invocation::{resolve_binary, Invocation};
pub use log_sink::LogSink;
pub use supervisor::Supervisor;
