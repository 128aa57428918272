//! Log file receiving the capture tool's output

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// Exclusively owned log file for one process launch.
///
/// stdout and stderr of the child are both attached to it. The handle must
/// be closed before the output is probed, since some platforms lock files
/// held open for writing.
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    file: Option<File>,
}

impl LogSink {
    /// Create (or truncate) the log file, creating parent directories
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(&path)?;
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// stdout and stderr handles sharing the log file
    pub(crate) fn stdio_pair(&self) -> io::Result<(Stdio, Stdio)> {
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log sink already closed"))?;
        Ok((Stdio::from(file.try_clone()?), Stdio::from(file.try_clone()?)))
    }

    /// Release our handle to the log file
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            tracing::debug!("Closed log sink {}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_truncates_and_makes_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("ffmpeg.log");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "stale output\n").unwrap();

        let sink = LogSink::create(&path).unwrap();
        assert!(sink.is_open());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");

        let nested = LogSink::create(dir.path().join("a").join("b").join("x.log")).unwrap();
        assert!(nested.path().exists());
    }

    #[test]
    fn test_closed_sink_has_no_stdio() {
        let dir = tempdir().unwrap();
        let mut sink = LogSink::create(dir.path().join("ffmpeg.log")).unwrap();
        assert!(sink.stdio_pair().is_ok());

        sink.close();
        assert!(!sink.is_open());
        assert!(sink.stdio_pair().is_err());
    }
}
