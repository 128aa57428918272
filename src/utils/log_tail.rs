//! Reading diagnostics back out of the tool log

use std::fs;
use std::io;
use std::path::Path;

/// Which end of the log to read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogPosition {
    First,
    Last,
}

/// Read `count` lines from the start or end of a log file, joined by a space.
///
/// ffmpeg rewrites its progress line with carriage returns, so those are
/// treated as line breaks too. Blank lines are skipped.
pub fn lines_from_log(path: &Path, position: LogPosition, count: usize) -> io::Result<String> {
    let bytes = fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);

    let lines: Vec<&str> = content
        .split(['\n', '\r'])
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect();

    let selected = match position {
        LogPosition::First => &lines[..count.min(lines.len())],
        LogPosition::Last => &lines[lines.len().saturating_sub(count)..],
    };

    Ok(selected.join(" "))
}
