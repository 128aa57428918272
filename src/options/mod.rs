//! Recording options and command composition

pub mod composer;
pub mod types;

pub use composer::{compose, CommandTokens, Composer, ResolvedOptions, DEFAULT_FPS, DEFAULT_LOG_FILE};
pub use types::{AdvancedOptions, ConfigError, ConfigProblem, OptionMap, OptionValue, RecordingConfig};
