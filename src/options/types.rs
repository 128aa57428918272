//! Recording configuration types
//!
//! This module defines the structured configuration a caller hands to the
//! composer: the capture source, the output path and the nested advanced
//! options. Construction validates the whole configuration at once and
//! reports every problem together.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::capture::{Desktop, InputSource, Platform};
use crate::options::composer::DEFAULT_LOG_FILE;

/// A single option value passed to the capture tool
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// Explicitly unset; the option is skipped when serialized
    Null,
    /// `true` emits a bare flag, `false` omits it
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl OptionValue {
    /// Render the value as a command token, `None` when nothing follows the flag
    pub fn to_token(&self) -> Option<String> {
        match self {
            OptionValue::Null | OptionValue::Bool(_) => None,
            OptionValue::Integer(value) => Some(value.to_string()),
            OptionValue::Float(value) => Some(value.to_string()),
            OptionValue::Text(value) => Some(value.clone()),
        }
    }

    /// Whether the option produces any tokens at all
    pub fn is_emitted(&self) -> bool {
        !matches!(self, OptionValue::Null | OptionValue::Bool(false))
    }

    /// Text content, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            OptionValue::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Convert a JSON scalar, returning the JSON type name on failure
    pub fn from_json(value: &Value) -> Result<Self, &'static str> {
        match value {
            Value::Null => Ok(OptionValue::Null),
            Value::Bool(flag) => Ok(OptionValue::Bool(*flag)),
            Value::Number(number) => {
                if let Some(integer) = number.as_i64() {
                    Ok(OptionValue::Integer(integer))
                } else {
                    number.as_f64().map(OptionValue::Float).ok_or("number")
                }
            }
            Value::String(text) => Ok(OptionValue::Text(text.clone())),
            other => Err(json_type_name(other)),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Text(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Integer(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        OptionValue::Integer(i64::from(value))
    }
}

impl From<u32> for OptionValue {
    fn from(value: u32) -> Self {
        OptionValue::Integer(i64::from(value))
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Float(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

/// Ordered option map.
///
/// Insertion order is preserved and re-inserting an existing key replaces
/// the value in place, so merged defaults keep their position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionMap {
    entries: Vec<(String, OptionValue)>,
}

impl OptionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value, returning the previous one.
    ///
    /// Leading dashes are stripped from the key (`-pix_fmt` == `pix_fmt`).
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Option<OptionValue> {
        let key = normalize_key(key.into());
        let value = value.into();

        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        let index = self.entries.iter().position(|(existing, _)| existing == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Apply `overrides` key by key: their values win, untouched keys stay
    pub fn merge(&mut self, overrides: &OptionMap) {
        for (key, value) in overrides.iter() {
            self.insert(key, value.clone());
        }
    }

    /// Append `-key [value]` pairs for every emitted option
    pub fn push_flags(&self, tokens: &mut Vec<String>) {
        for (key, value) in self.iter() {
            if !value.is_emitted() {
                continue;
            }
            tokens.push(format!("-{}", key));
            if let Some(token) = value.to_token() {
                tokens.push(token);
            }
        }
    }
}

impl<K, V> FromIterator<(K, V)> for OptionMap
where
    K: Into<String>,
    V: Into<OptionValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OptionMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

fn normalize_key(key: String) -> String {
    if key.starts_with('-') {
        key.trim_start_matches('-').to_string()
    } else {
        key
    }
}

/// Optional tool settings grouped by where they apply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvancedOptions {
    /// Flags placed before the input source
    pub input: OptionMap,
    /// Flags placed after the input source
    pub output: OptionMap,
    /// Log file receiving the tool's stdout and stderr
    pub log: Option<PathBuf>,
    /// Tool-native verbosity, passed through as `-loglevel`
    pub loglevel: Option<String>,
    /// Remaining top-level flags
    pub extra: OptionMap,
}

impl AdvancedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input_option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.input.insert(key, value);
        self
    }

    pub fn output_option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.output.insert(key, value);
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.extra.insert(key, value);
        self
    }

    pub fn log(mut self, path: impl Into<PathBuf>) -> Self {
        self.log = Some(path.into());
        self
    }

    pub fn loglevel(mut self, level: impl Into<String>) -> Self {
        self.loglevel = Some(level.into());
        self
    }

    /// Parse the `advanced` mapping, recording problems instead of stopping
    fn from_json(map: &Map<String, Value>, problems: &mut Vec<ConfigProblem>) -> Self {
        let mut advanced = AdvancedOptions::default();

        for (key, value) in map {
            match key.as_str() {
                "input" => advanced.input = parse_stage("advanced.input", value, problems),
                "output" => advanced.output = parse_stage("advanced.output", value, problems),
                "log" => match value {
                    Value::Null => {}
                    Value::String(path) => advanced.log = Some(PathBuf::from(path)),
                    other => problems.push(ConfigProblem::invalid_type("advanced.log", "string", other)),
                },
                "loglevel" => match value {
                    Value::Null => {}
                    Value::String(level) => advanced.loglevel = Some(level.clone()),
                    Value::Number(level) => advanced.loglevel = Some(level.to_string()),
                    other => problems.push(ConfigProblem::invalid_type(
                        "advanced.loglevel",
                        "string",
                        other,
                    )),
                },
                _ => match OptionValue::from_json(value) {
                    Ok(option) => {
                        advanced.extra.insert(key.as_str(), option);
                    }
                    Err(found) => problems.push(ConfigProblem::InvalidType {
                        field: format!("advanced.{}", key),
                        expected: "scalar",
                        found,
                    }),
                },
            }
        }

        advanced
    }
}

fn parse_stage(field: &str, value: &Value, problems: &mut Vec<ConfigProblem>) -> OptionMap {
    let map = match value {
        Value::Null => return OptionMap::new(),
        Value::Object(map) => map,
        other => {
            problems.push(ConfigProblem::invalid_type(field, "mapping", other));
            return OptionMap::new();
        }
    };

    let mut options = OptionMap::new();
    for (key, value) in map {
        match OptionValue::from_json(value) {
            Ok(option) => {
                options.insert(key.as_str(), option);
            }
            Err(found) => problems.push(ConfigProblem::InvalidType {
                field: format!("{}.{}", field, key),
                expected: "scalar",
                found,
            }),
        }
    }
    options
}

/// A single configuration problem
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigProblem {
    /// A required field is absent and has no default
    #[error("missing required option {0}")]
    Missing(String),
    /// A field has the wrong shape
    #[error("{field} must be a {expected}, given: {found}")]
    InvalidType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    /// The configuration cannot be honoured on this platform
    #[error("{0}")]
    Unsupported(String),
    /// The configuration source could not be parsed at all
    #[error("malformed configuration: {0}")]
    Malformed(String),
}

impl ConfigProblem {
    pub fn missing(field: impl Into<String>) -> Self {
        ConfigProblem::Missing(field.into())
    }

    fn invalid_type(field: impl Into<String>, expected: &'static str, found: &Value) -> Self {
        ConfigProblem::InvalidType {
            field: field.into(),
            expected,
            found: json_type_name(found),
        }
    }
}

/// Configuration rejected at construction or composition time.
///
/// Always carries every problem that was found, never just the first.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", render_problems(.problems))]
pub struct ConfigError {
    problems: Vec<ConfigProblem>,
}

impl ConfigError {
    pub fn new(problems: Vec<ConfigProblem>) -> Self {
        Self { problems }
    }

    pub fn single(problem: ConfigProblem) -> Self {
        Self::new(vec![problem])
    }

    pub fn problems(&self) -> &[ConfigProblem] {
        &self.problems
    }

    /// Names of all missing required fields
    pub fn missing_fields(&self) -> Vec<&str> {
        self.problems
            .iter()
            .filter_map(|problem| match problem {
                ConfigProblem::Missing(field) => Some(field.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Missing fields are grouped into one message, other problems follow in order
fn render_problems(problems: &[ConfigProblem]) -> String {
    let missing: Vec<&str> = problems
        .iter()
        .filter_map(|problem| match problem {
            ConfigProblem::Missing(field) => Some(field.as_str()),
            _ => None,
        })
        .collect();
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("Required options are missing: [{}]", missing.join(", ")));
    }
    parts.extend(
        problems
            .iter()
            .filter(|problem| !matches!(problem, ConfigProblem::Missing(_)))
            .map(ToString::to_string),
    );
    parts.join("; ")
}

/// Validated recording configuration.
///
/// `input` is resolved when the value is built and is never empty; `output`
/// is always present.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingConfig {
    input: String,
    output: PathBuf,
    advanced: AdvancedOptions,
}

impl RecordingConfig {
    /// Build a configuration from an input strategy and an output path
    pub fn new(
        source: &dyn InputSource,
        output: Option<PathBuf>,
        advanced: AdvancedOptions,
        platform: Option<Platform>,
    ) -> Result<Self, ConfigError> {
        let mut problems = Vec::new();
        let input = resolve_input(source, platform, &mut problems);
        let output = match output {
            Some(path) if !path.as_os_str().is_empty() => Some(path),
            _ => {
                problems.push(ConfigProblem::missing("output"));
                None
            }
        };

        match (input, output) {
            (Some(input), Some(output)) if problems.is_empty() => Ok(Self {
                input,
                output,
                advanced,
            }),
            _ => Err(ConfigError::new(problems)),
        }
    }

    /// Desktop recording of the platform's default display
    pub fn desktop(output: impl Into<PathBuf>, platform: Option<Platform>) -> Result<Self, ConfigError> {
        Self::new(
            &Desktop::os_default(),
            Some(output.into()),
            AdvancedOptions::default(),
            platform,
        )
    }

    /// Build a configuration from an untyped mapping such as
    /// `{"input": ":0.0", "output": "out.mkv", "advanced": {...}}`
    pub fn from_value(value: &Value, platform: Option<Platform>) -> Result<Self, ConfigError> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(ConfigError::single(ConfigProblem::invalid_type(
                    "config", "mapping", other,
                )))
            }
        };

        let mut problems = Vec::new();

        let source = match map.get("input") {
            None | Some(Value::Null) => Some(Desktop::os_default()),
            Some(Value::String(input)) => Some(Desktop::explicit(input.as_str())),
            Some(other) => {
                problems.push(ConfigProblem::invalid_type("input", "string", other));
                None
            }
        };

        let output = match map.get("output") {
            Some(Value::String(path)) if !path.is_empty() => Some(PathBuf::from(path)),
            None | Some(Value::Null) | Some(Value::String(_)) => {
                problems.push(ConfigProblem::missing("output"));
                None
            }
            Some(other) => {
                problems.push(ConfigProblem::invalid_type("output", "string", other));
                None
            }
        };

        let advanced = match map.get("advanced") {
            None | Some(Value::Null) => AdvancedOptions::default(),
            Some(Value::Object(advanced)) => AdvancedOptions::from_json(advanced, &mut problems),
            Some(other) => {
                problems.push(ConfigProblem::invalid_type("advanced", "mapping", other));
                AdvancedOptions::default()
            }
        };

        let input = source.and_then(|source| resolve_input(&source, platform, &mut problems));

        match (input, output) {
            (Some(input), Some(output)) if problems.is_empty() => Ok(Self {
                input,
                output,
                advanced,
            }),
            _ => Err(ConfigError::new(problems)),
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn advanced(&self) -> &AdvancedOptions {
        &self.advanced
    }

    /// Log file the tool writes to (defaults to `ffmpeg.log`)
    pub fn log_path(&self) -> PathBuf {
        self.advanced
            .log
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
    }
}

fn resolve_input(
    source: &dyn InputSource,
    platform: Option<Platform>,
    problems: &mut Vec<ConfigProblem>,
) -> Option<String> {
    match source.resolve(platform) {
        Ok(input) => Some(input),
        Err(problem) => {
            problems.push(problem);
            None
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    }
}
