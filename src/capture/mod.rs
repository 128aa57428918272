//! Platform capabilities and capture sources
//!
//! This module answers the OS-specific questions (capture device, default
//! input, signals) and defines how a recording's input source is chosen.

pub mod input;
pub mod platform;
pub mod titles;

pub use input::{Desktop, InputSource, WindowTitle};
pub use platform::{Platform, ShutdownSignal, SpawnMode, StopTier};
pub use titles::{clean_titles, TitleError, TitleResolver};
