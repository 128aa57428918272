//! Spawn request for the supervisor

use std::fmt;
use std::path::{Path, PathBuf};

use crate::options::CommandTokens;
use crate::process::SupervisorError;

/// Program plus ordered arguments for one launch.
///
/// Leading arguments (such as `-y`) are kept apart from the composed tokens
/// so the tokens stay exactly what the composer produced.
#[derive(Debug, Clone)]
pub struct Invocation {
    program: PathBuf,
    leading_args: Vec<String>,
    tokens: CommandTokens,
    detach: bool,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>, tokens: CommandTokens) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            tokens,
            detach: false,
        }
    }

    /// Add an argument placed before the composed tokens
    pub fn leading_arg(mut self, arg: impl Into<String>) -> Self {
        self.leading_args.push(arg.into());
        self
    }

    /// Prepend `-y` so an existing output file is replaced
    pub fn overwrite(self, overwrite: bool) -> Self {
        if overwrite {
            self.leading_arg("-y")
        } else {
            self
        }
    }

    /// Fire-and-forget launch; the supervisor stops tracking the process
    pub fn detach(mut self, detach: bool) -> Self {
        self.detach = detach;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn tokens(&self) -> &CommandTokens {
        &self.tokens
    }

    pub fn is_detached(&self) -> bool {
        self.detach
    }

    /// Every argument in spawn order
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.leading_args
            .iter()
            .map(String::as_str)
            .chain(self.tokens.iter())
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.leading_args {
            write!(f, " {}", arg)?;
        }
        if !self.tokens.is_empty() {
            write!(f, " {}", self.tokens)?;
        }
        Ok(())
    }
}

/// Find the binary to execute.
///
/// Bare names are looked up on `PATH`; anything with a directory part must
/// exist as given.
pub fn resolve_binary(program: &Path) -> Result<PathBuf, SupervisorError> {
    let has_dir = program
        .parent()
        .map(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(false);

    if has_dir {
        return if program.is_file() {
            Ok(program.to_path_buf())
        } else {
            Err(SupervisorError::BinaryNotFound(program.display().to_string()))
        };
    }

    which::which(program).map_err(|e| {
        tracing::debug!("Lookup of {} on PATH failed: {}", program.display(), e);
        SupervisorError::BinaryNotFound(program.display().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Platform;
    use crate::options::{compose, RecordingConfig};

    fn tokens() -> CommandTokens {
        let config = RecordingConfig::desktop("out.mkv", Some(Platform::Linux)).unwrap();
        compose(&config, Some(Platform::Linux)).unwrap()
    }

    #[test]
    fn test_overwrite_flag_comes_first() {
        let invocation = Invocation::new("ffmpeg", tokens()).overwrite(true);
        let args: Vec<&str> = invocation.args().collect();
        assert_eq!(&args[..3], &["-y", "-f", "x11grab"]);
        assert_eq!(args.last(), Some(&"out.mkv"));
        assert!(invocation.to_string().starts_with("ffmpeg -y -f x11grab"));
    }

    #[test]
    fn test_tokens_untouched_without_overwrite() {
        let invocation = Invocation::new("ffmpeg", tokens()).overwrite(false);
        assert_eq!(invocation.args().count(), invocation.tokens().len());
        assert!(!invocation.is_detached());
    }

    #[test]
    fn test_resolve_binary() {
        let missing = resolve_binary(Path::new("/nonexistent/dir/ffmpeg"));
        assert!(matches!(missing, Err(SupervisorError::BinaryNotFound(_))));

        let unknown = resolve_binary(Path::new("no-such-capture-tool-binary"));
        assert!(matches!(unknown, Err(SupervisorError::BinaryNotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_binary_on_path() {
        let sh = resolve_binary(Path::new("sh")).unwrap();
        assert!(sh.is_absolute());
    }
}
