//! OS capability lookup
//!
//! Everything that differs between operating systems (capture device,
//! default input, input-stage defaults, shutdown signals, process group
//! semantics) is answered here, once per platform family, instead of being
//! re-checked at every call site.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::options::{OptionMap, OptionValue};

/// Input pixel format avfoundation needs on macOS
pub const DEFAULT_MAC_INPUT_PIX_FMT: &str = "uyvy422";

/// Supported operating system families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Linux,
    #[serde(rename = "macos")]
    MacOs,
}

/// Escalation tiers used when shutting the capture tool down
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopTier {
    Graceful,
    Terminate,
    Kill,
}

impl StopTier {
    /// The next harsher tier, if any
    pub fn next(self) -> Option<StopTier> {
        match self {
            StopTier::Graceful => Some(StopTier::Terminate),
            StopTier::Terminate => Some(StopTier::Kill),
            StopTier::Kill => None,
        }
    }
}

impl fmt::Display for StopTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StopTier::Graceful => "graceful",
            StopTier::Terminate => "terminate",
            StopTier::Kill => "kill",
        };
        f.write_str(name)
    }
}

/// Signal delivered for a shutdown tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT on POSIX, a polite `taskkill` on Windows
    Interrupt,
    /// SIGTERM on POSIX, `taskkill /F` on Windows
    Terminate,
    /// SIGKILL on POSIX, `taskkill /F /T` on Windows
    Kill,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShutdownSignal::Interrupt => "INT",
            ShutdownSignal::Terminate => "TERM",
            ShutdownSignal::Kill => "KILL",
        };
        f.write_str(name)
    }
}

/// How the child is placed so that signals reach its helpers too
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnMode {
    /// POSIX: own process group, signals target `-pid`
    ProcessGroup,
    /// Windows: `CREATE_NEW_PROCESS_GROUP`, signals target the pid
    NewProcessGroupFlag,
}

impl Platform {
    /// Platform of the running process, `None` when unsupported
    pub fn detect() -> Option<Self> {
        Self::from_os_name(std::env::consts::OS)
    }

    /// Map an OS name (as in `std::env::consts::OS`) onto a platform
    pub fn from_os_name(name: &str) -> Option<Self> {
        match name {
            "windows" => Some(Platform::Windows),
            "linux" => Some(Platform::Linux),
            "macos" => Some(Platform::MacOs),
            _ => None,
        }
    }

    /// ffmpeg input device (`-f`) used for screen capture
    pub fn capture_device(self) -> &'static str {
        match self {
            Platform::Windows => "gdigrab",
            Platform::Linux => "x11grab",
            Platform::MacOs => "avfoundation",
        }
    }

    /// Input source used when the caller does not name one
    pub fn default_input(self) -> &'static str {
        match self {
            Platform::Windows => "desktop",
            Platform::Linux => ":0.0",
            Platform::MacOs => "1",
        }
    }

    /// Input-stage options every recording starts from
    pub fn default_input_options(self) -> OptionMap {
        let pix_fmt = match self {
            Platform::MacOs => OptionValue::from(DEFAULT_MAC_INPUT_PIX_FMT),
            Platform::Windows | Platform::Linux => OptionValue::Null,
        };

        let mut options = OptionMap::new();
        options.insert("pix_fmt", pix_fmt);
        options
    }

    /// Signal sent for a shutdown tier
    pub fn signal_for(self, tier: StopTier) -> ShutdownSignal {
        match tier {
            StopTier::Graceful => ShutdownSignal::Interrupt,
            StopTier::Terminate => ShutdownSignal::Terminate,
            StopTier::Kill => ShutdownSignal::Kill,
        }
    }

    /// How the capture process must be spawned
    pub fn spawn_mode(self) -> SpawnMode {
        match self {
            Platform::Windows => SpawnMode::NewProcessGroupFlag,
            Platform::Linux | Platform::MacOs => SpawnMode::ProcessGroup,
        }
    }

    /// Whether signals target the whole process group
    pub fn signals_process_group(self) -> bool {
        self.spawn_mode() == SpawnMode::ProcessGroup
    }

    /// Only gdigrab can capture a single window by title
    pub fn supports_window_capture(self) -> bool {
        self == Platform::Windows
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Windows => "windows",
            Platform::Linux => "linux",
            Platform::MacOs => "macos",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_devices() {
        assert_eq!(Platform::Windows.capture_device(), "gdigrab");
        assert_eq!(Platform::Linux.capture_device(), "x11grab");
        assert_eq!(Platform::MacOs.capture_device(), "avfoundation");
    }

    #[test]
    fn test_from_os_name() {
        assert_eq!(Platform::from_os_name("linux"), Some(Platform::Linux));
        assert_eq!(Platform::from_os_name("macos"), Some(Platform::MacOs));
        assert_eq!(Platform::from_os_name("freebsd"), None);
    }

    #[test]
    fn test_mac_defaults_input_pixel_format() {
        let mac = Platform::MacOs.default_input_options();
        assert_eq!(mac.get("pix_fmt"), Some(&OptionValue::from("uyvy422")));

        let linux = Platform::Linux.default_input_options();
        assert_eq!(linux.get("pix_fmt"), Some(&OptionValue::Null));
    }

    #[test]
    fn test_signals_and_spawn_mode() {
        assert!(Platform::Linux.signals_process_group());
        assert!(!Platform::Windows.signals_process_group());
        assert_eq!(Platform::MacOs.signal_for(StopTier::Kill), ShutdownSignal::Kill);
        assert_eq!(StopTier::Graceful.next(), Some(StopTier::Terminate));
        assert_eq!(StopTier::Kill.next(), None);
    }

    #[test]
    fn test_serde_names() {
        let platform: Platform = serde_json::from_str("\"macos\"").unwrap();
        assert_eq!(platform, Platform::MacOs);
        assert_eq!(serde_json::to_string(&StopTier::Terminate).unwrap(), "\"terminate\"");
    }
}
