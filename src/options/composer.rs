//! Command composition for the capture tool
//!
//! Merges a [`RecordingConfig`] with platform defaults and correction rules
//! into an ordered token list:
//!
//! ```text
//! -f <device> [input-stage flags] -i <input> [output-stage flags] [-loglevel <level>] [top-level flags] <output>
//! ```
//!
//! Log redirection is not part of the tokens; the supervisor attaches the
//! log file when it spawns the process.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::capture::Platform;
use crate::options::types::{ConfigError, ConfigProblem, OptionMap, OptionValue, RecordingConfig};

/// Log file used when the caller does not name one
pub const DEFAULT_LOG_FILE: &str = "ffmpeg.log";

/// Output frame rate when neither stage nor legacy option sets one
pub const DEFAULT_FPS: i64 = 15;

/// Output pixel format
pub const DEFAULT_PIX_FMT: &str = "yuv420p";

/// yuv420p needs even dimensions, so odd sizes are truncated
pub const YUV420P_SCALING: &str = "scale=trunc(iw/2)*2:trunc(ih/2)*2";

/// Keys that override the capture device inside `advanced.input`
const INPUT_DEVICE_KEYS: [&str; 4] = ["f", "fmt", "format", "device"];

/// Keys that override the capture device at the top level of `advanced`
const TOP_LEVEL_DEVICE_KEYS: [&str; 3] = ["f", "fmt", "format"];

/// Top-level `advanced.framerate`, consumed as the output frame rate default
const LEGACY_FRAMERATE_KEY: &str = "framerate";

/// Ordered, immutable argument list for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTokens(Vec<String>);

impl CommandTokens {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of the first token equal to `token`
    pub fn position(&self, token: &str) -> Option<usize> {
        self.0.iter().position(|existing| existing == token)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for CommandTokens {
    fn from(tokens: Vec<String>) -> Self {
        Self(tokens)
    }
}

impl IntoIterator for CommandTokens {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Space-joined rendering for logs; tokens with spaces or quotes are quoted
impl fmt::Display for CommandTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, token) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            if token.is_empty() || token.contains(|c: char| c.is_whitespace() || c == '"') {
                write!(f, "\"{}\"", token.replace('"', "\\\""))?;
            } else {
                f.write_str(token)?;
            }
        }
        Ok(())
    }
}

/// Options after defaults, overrides and fixups have been applied
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
    pub capture_device: String,
    pub input_options: OptionMap,
    pub input: String,
    pub output_options: OptionMap,
    pub loglevel: Option<String>,
    pub extra: OptionMap,
    pub output: PathBuf,
    pub log: PathBuf,
}

impl ResolvedOptions {
    /// Serialize into the recording invocation
    pub fn tokens(&self) -> CommandTokens {
        let mut tokens = vec!["-f".to_string(), self.capture_device.clone()];
        self.input_options.push_flags(&mut tokens);
        tokens.push("-i".to_string());
        tokens.push(self.input.clone());
        self.output_options.push_flags(&mut tokens);
        if let Some(level) = &self.loglevel {
            tokens.push("-loglevel".to_string());
            tokens.push(level.clone());
        }
        self.extra.push_flags(&mut tokens);
        tokens.push(self.output.to_string_lossy().into_owned());
        CommandTokens(tokens)
    }

    /// Serialize a single-frame capture of the same source into `path`
    pub fn screenshot_tokens(&self, path: &Path, resolution: Option<&str>) -> CommandTokens {
        let mut tokens = vec!["-f".to_string(), self.capture_device.clone()];
        self.input_options.push_flags(&mut tokens);
        tokens.extend([
            "-i".to_string(),
            self.input.clone(),
            "-framerate".to_string(),
            "1".to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
        ]);
        if let Some(size) = resolution {
            tokens.push("-s".to_string());
            tokens.push(size.to_string());
        }
        tokens.push(path.to_string_lossy().into_owned());
        CommandTokens(tokens)
    }
}

/// Builds command tokens for one platform
#[derive(Debug, Clone, Copy)]
pub struct Composer {
    platform: Option<Platform>,
}

impl Composer {
    pub fn new(platform: Option<Platform>) -> Self {
        Self { platform }
    }

    /// Apply defaults, overrides and fixups
    pub fn resolve(&self, config: &RecordingConfig) -> Result<ResolvedOptions, ConfigError> {
        let advanced = config.advanced();
        let mut user_input = advanced.input.clone();
        let mut extra = advanced.extra.clone();

        // Both sets are consumed even when the input-stage key wins.
        let from_input = take_device(&mut user_input, &INPUT_DEVICE_KEYS);
        let from_top_level = take_device(&mut extra, &TOP_LEVEL_DEVICE_KEYS);
        let device_override = from_input.or(from_top_level);

        let capture_device = match (device_override, self.platform) {
            (Some(device), _) => device,
            (None, Some(platform)) => platform.capture_device().to_string(),
            (None, None) => {
                return Err(ConfigError::single(ConfigProblem::Unsupported(
                    "Your OS is not supported: no default capture device".to_string(),
                )))
            }
        };

        let mut input_options = self
            .platform
            .map(Platform::default_input_options)
            .unwrap_or_default();
        input_options.merge(&user_input);

        let framerate = extra
            .remove(LEGACY_FRAMERATE_KEY)
            .filter(OptionValue::is_emitted)
            .unwrap_or(OptionValue::Integer(DEFAULT_FPS));

        let mut output_options = OptionMap::new();
        output_options.insert("pix_fmt", DEFAULT_PIX_FMT);
        output_options.insert("framerate", framerate);
        output_options.merge(&advanced.output);

        if output_options.get("pix_fmt").and_then(OptionValue::as_text) == Some(DEFAULT_PIX_FMT) {
            output_options.insert("vf", YUV420P_SCALING);
        }

        Ok(ResolvedOptions {
            capture_device,
            input_options,
            input: config.input().to_string(),
            output_options,
            loglevel: advanced.loglevel.clone(),
            extra,
            output: config.output().to_path_buf(),
            log: config.log_path(),
        })
    }

    /// Build the recording invocation tokens
    pub fn compose(&self, config: &RecordingConfig) -> Result<CommandTokens, ConfigError> {
        Ok(self.resolve(config)?.tokens())
    }
}

/// Shorthand for `Composer::new(platform).compose(config)`
pub fn compose(config: &RecordingConfig, platform: Option<Platform>) -> Result<CommandTokens, ConfigError> {
    Composer::new(platform).compose(config)
}

/// Remove every device key from `options`, returning the first set one
fn take_device(options: &mut OptionMap, keys: &[&str]) -> Option<String> {
    let mut device = None;
    for key in keys {
        if let Some(value) = options.remove(key) {
            if device.is_none() {
                device = value.to_token();
            }
        }
    }
    device
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AdvancedOptions;
    use crate::capture::Desktop;
    use proptest::prelude::*;

    fn config(input: &str, output: &str, advanced: AdvancedOptions, platform: Platform) -> RecordingConfig {
        RecordingConfig::new(
            &Desktop::explicit(input),
            Some(PathBuf::from(output)),
            advanced,
            Some(platform),
        )
        .unwrap()
    }

    #[test]
    fn test_desktop_on_each_platform() {
        for (platform, device) in [
            (Platform::Windows, "gdigrab"),
            (Platform::Linux, "x11grab"),
            (Platform::MacOs, "avfoundation"),
        ] {
            let tokens = compose(&config("desktop", "out.mkv", AdvancedOptions::new(), platform), Some(platform)).unwrap();
            assert_eq!(&tokens.as_slice()[..2], &["-f".to_string(), device.to_string()]);
            assert_eq!(tokens.as_slice().last().map(String::as_str), Some("out.mkv"));
        }
    }

    #[test]
    fn test_full_token_order_on_linux() {
        let tokens = compose(&config(":0.0", "out.mkv", AdvancedOptions::new(), Platform::Linux), Some(Platform::Linux)).unwrap();
        assert_eq!(
            tokens.into_vec(),
            vec![
                "-f", "x11grab", "-i", ":0.0", "-pix_fmt", "yuv420p", "-framerate", "15", "-vf",
                YUV420P_SCALING, "out.mkv",
            ]
        );
    }

    #[test]
    fn test_mac_input_pixel_format() {
        let tokens = compose(&config("1", "out.mov", AdvancedOptions::new(), Platform::MacOs), Some(Platform::MacOs)).unwrap();
        let input_at = tokens.position("-i").unwrap();
        assert_eq!(&tokens.as_slice()[2..input_at], &["-pix_fmt".to_string(), "uyvy422".to_string()]);
    }

    #[test]
    fn test_user_overrides_merge_per_key() {
        let advanced = AdvancedOptions::new()
            .input_option("video_size", "1920x1080")
            .input_option("framerate", 30)
            .output_option("framerate", 30)
            .output_option("preset", "ultrafast");

        let resolved = Composer::new(Some(Platform::Linux))
            .resolve(&config(":0.0", "out.mp4", advanced, Platform::Linux))
            .unwrap();

        let output_keys: Vec<&str> = resolved.output_options.iter().map(|(key, _)| key).collect();
        assert_eq!(output_keys, vec!["pix_fmt", "framerate", "preset", "vf"]);
        assert_eq!(resolved.output_options.get("framerate"), Some(&OptionValue::Integer(30)));
        assert_eq!(resolved.input_options.get("video_size"), Some(&OptionValue::from("1920x1080")));
    }

    #[test]
    fn test_device_override_consumed() {
        let advanced = AdvancedOptions::new().input_option("f", "kmsgrab").option("fmt", "fbdev");
        let tokens = compose(&config("-", "out.mkv", advanced, Platform::Linux), Some(Platform::Linux)).unwrap();
        assert_eq!(tokens.as_slice()[1], "kmsgrab");
        assert!(!tokens.iter().any(|token| token == "-fmt" || token == "fbdev"));
        assert_eq!(tokens.iter().filter(|token| *token == "-f").count(), 1);
    }

    #[test]
    fn test_top_level_device_override() {
        let advanced = AdvancedOptions::new().option("f", "dshow");
        let tokens = compose(&config("video=Camera", "out.mkv", advanced, Platform::Windows), None).unwrap();
        assert_eq!(tokens.as_slice()[1], "dshow");
    }

    #[test]
    fn test_unsupported_os_without_override() {
        let config = config(":0.0", "out.mkv", AdvancedOptions::new(), Platform::Linux);
        let error = compose(&config, None).unwrap_err();
        assert!(matches!(error.problems(), [ConfigProblem::Unsupported(_)]));
    }

    #[test]
    fn test_scaling_fix_follows_pixel_format() {
        let advanced = AdvancedOptions::new().output_option("vf", "hflip");
        let resolved = Composer::new(Some(Platform::Linux))
            .resolve(&config(":0.0", "out.mkv", advanced, Platform::Linux))
            .unwrap();
        assert_eq!(resolved.output_options.get("vf"), Some(&OptionValue::from(YUV420P_SCALING)));

        let advanced = AdvancedOptions::new()
            .output_option("pix_fmt", "yuv444p")
            .output_option("vf", "hflip");
        let tokens = compose(&config(":0.0", "out.mkv", advanced, Platform::Linux), Some(Platform::Linux)).unwrap();
        assert!(tokens.iter().any(|token| token == "hflip"));
        assert!(!tokens.iter().any(|token| token == YUV420P_SCALING));
    }

    #[test]
    fn test_log_not_in_tokens_and_loglevel_passed_through() {
        let advanced = AdvancedOptions::new()
            .log("capture.log")
            .loglevel("error")
            .option("framerate", 24)
            .option("hide_banner", true);
        let config = config(":0.0", "out.mkv", advanced, Platform::Linux);
        let resolved = Composer::new(Some(Platform::Linux)).resolve(&config).unwrap();
        let tokens = resolved.tokens();

        assert_eq!(resolved.log, PathBuf::from("capture.log"));
        assert!(!tokens.iter().any(|token| token.contains("capture.log")));
        assert_eq!(resolved.output_options.get("framerate"), Some(&OptionValue::Integer(24)));

        let tail: Vec<&str> = tokens.iter().skip(tokens.len() - 5).collect();
        assert_eq!(tail, vec![YUV420P_SCALING, "-loglevel", "error", "-hide_banner", "out.mkv"]);
    }

    #[test]
    fn test_screenshot_tokens() {
        let resolved = Composer::new(Some(Platform::Windows))
            .resolve(&config("desktop", "out.mkv", AdvancedOptions::new(), Platform::Windows))
            .unwrap();
        let tokens = resolved.screenshot_tokens(Path::new("shot.png"), Some("1280x720"));
        assert_eq!(
            tokens.into_vec(),
            vec![
                "-f", "gdigrab", "-i", "desktop", "-framerate", "1", "-frames:v", "1", "-s", "1280x720",
                "shot.png",
            ]
        );
    }

    #[test]
    fn test_display_quotes_spaces() {
        let resolved = Composer::new(Some(Platform::Windows))
            .resolve(&config("title=My Window", "out.mkv", AdvancedOptions::new(), Platform::Windows))
            .unwrap();
        assert!(resolved.tokens().to_string().contains("-i \"title=My Window\""));
    }

    fn platforms() -> impl Strategy<Value = Platform> {
        prop_oneof![Just(Platform::Windows), Just(Platform::Linux), Just(Platform::MacOs)]
    }

    fn pixel_formats() -> impl Strategy<Value = Option<&'static str>> {
        prop_oneof![
            Just(None),
            Just(Some("yuv420p")),
            Just(Some("yuv444p")),
            Just(Some("nv12")),
            Just(Some("rgb24")),
        ]
    }

    proptest! {
        #[test]
        fn prop_token_layout(
            platform in platforms(),
            input in "[a-z0-9:.=]{1,12}",
            output in "[a-z]{1,8}\\.(mkv|mp4|mov)",
            pix_fmt in pixel_formats(),
        ) {
            let mut advanced = AdvancedOptions::new();
            if let Some(pix_fmt) = pix_fmt {
                advanced = advanced.output_option("pix_fmt", pix_fmt);
            }
            let config = config(&input, &output, advanced, platform);

            let tokens = compose(&config, Some(platform)).unwrap();
            let slice = tokens.as_slice();

            prop_assert_eq!(slice[0].as_str(), "-f");
            prop_assert_eq!(slice[1].as_str(), platform.capture_device());
            prop_assert_eq!(slice.last().unwrap(), &output);

            let input_at = tokens.position("-i").unwrap();
            prop_assert_eq!(&slice[input_at + 1], &input);
            prop_assert_eq!(slice[input_at + 2].as_str(), "-pix_fmt");
            let framerate_at = slice.iter().rposition(|token| token == "-framerate").unwrap();
            prop_assert!(framerate_at > input_at);

            let scaled = slice.iter().any(|token| token == YUV420P_SCALING);
            prop_assert_eq!(scaled, pix_fmt.unwrap_or(DEFAULT_PIX_FMT) == DEFAULT_PIX_FMT);

            prop_assert_eq!(compose(&config, Some(platform)).unwrap(), tokens);
        }
    }
}
