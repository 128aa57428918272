//! Capture source strategies
//!
//! A recording is parameterized by how its input source is found: the
//! platform's default display, an explicit device string, or a window title
//! resolved ahead of time.

use std::fmt;

use crate::capture::Platform;
use crate::options::ConfigProblem;

/// Resolves the input source token handed to the capture tool
pub trait InputSource: fmt::Debug {
    fn resolve(&self, platform: Option<Platform>) -> Result<String, ConfigProblem>;
}

/// Desktop capture: an explicit display/device or the OS default
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Desktop {
    input: Option<String>,
}

impl Desktop {
    /// Use the platform's default display
    pub fn os_default() -> Self {
        Self { input: None }
    }

    /// Use a caller-provided input such as `:1.0` or `desktop`
    pub fn explicit(input: impl Into<String>) -> Self {
        Self {
            input: Some(input.into()),
        }
    }
}

impl InputSource for Desktop {
    fn resolve(&self, platform: Option<Platform>) -> Result<String, ConfigProblem> {
        match &self.input {
            Some(input) if !input.is_empty() => Ok(input.clone()),
            _ => platform
                .map(|platform| platform.default_input().to_string())
                .ok_or_else(|| ConfigProblem::missing("input")),
        }
    }
}

/// Capture of a single window, identified by an already resolved title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowTitle {
    title: String,
}

impl WindowTitle {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into() }
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

impl InputSource for WindowTitle {
    fn resolve(&self, platform: Option<Platform>) -> Result<String, ConfigProblem> {
        if self.title.is_empty() {
            return Err(ConfigProblem::missing("title"));
        }

        match platform {
            Some(platform) if platform.supports_window_capture() => Ok(format!("title={}", self.title)),
            _ => Err(ConfigProblem::Unsupported(
                "Window recording is only supported on Microsoft Windows".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desktop_defaults_per_platform() {
        let desktop = Desktop::os_default();
        assert_eq!(desktop.resolve(Some(Platform::Windows)).unwrap(), "desktop");
        assert_eq!(desktop.resolve(Some(Platform::Linux)).unwrap(), ":0.0");
        assert_eq!(desktop.resolve(Some(Platform::MacOs)).unwrap(), "1");
        assert_eq!(desktop.resolve(None).unwrap_err(), ConfigProblem::missing("input"));
    }

    #[test]
    fn test_explicit_input_wins() {
        let desktop = Desktop::explicit(":1.0+10,20");
        assert_eq!(desktop.resolve(Some(Platform::Linux)).unwrap(), ":1.0+10,20");
        assert_eq!(desktop.resolve(None).unwrap(), ":1.0+10,20");
    }

    #[test]
    fn test_window_title() {
        let window = WindowTitle::new("Watir Project - Google Chrome");
        assert_eq!(
            window.resolve(Some(Platform::Windows)).unwrap(),
            "title=Watir Project - Google Chrome"
        );
        assert!(matches!(
            window.resolve(Some(Platform::MacOs)),
            Err(ConfigProblem::Unsupported(_))
        ));
        assert_eq!(
            WindowTitle::new("").resolve(Some(Platform::Windows)).unwrap_err(),
            ConfigProblem::missing("title")
        );
    }
}
