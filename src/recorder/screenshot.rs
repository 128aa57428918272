//! Single-frame capture of the recording source

use std::path::{Path, PathBuf};

use crate::config::RuntimeConfig;
use crate::options::ResolvedOptions;
use crate::process::{Invocation, LogSink, Supervisor};
use crate::recorder::Resolution;
use crate::utils::error::{RecorderError, RecorderResult};
use crate::utils::log_tail::{lines_from_log, LogPosition};

/// Log file for screenshot runs, next to the recording log so a running
/// recording keeps its own
pub fn screenshot_log_path(log: &Path) -> PathBuf {
    log.with_extension("screenshot.log")
}

/// Capture one frame of `options`' input into `path`.
///
/// Bounded by the stop timeout; a capture that does not finish in time is
/// stopped and reported as a failure.
pub fn capture_screenshot(
    runtime: &RuntimeConfig,
    supervisor: &Supervisor,
    options: &ResolvedOptions,
    path: &Path,
    resolution: Option<Resolution>,
) -> RecorderResult<PathBuf> {
    let size = resolution.map(|r| r.to_string());
    let tokens = options.screenshot_tokens(path, size.as_deref());
    let invocation = Invocation::new(runtime.ffmpeg_binary.clone(), tokens).overwrite(runtime.overwrite_output);

    let mut sink = LogSink::create(screenshot_log_path(&options.log))?;
    tracing::debug!("Taking screenshot: {}", invocation);
    let mut handle = supervisor.start(&invocation, &sink)?;
    let polled = supervisor.poll_for_exit(&mut handle, runtime.stop_timeout());
    sink.close();
    let exit = match polled {
        Ok(exit) => exit,
        Err(e) => {
            supervisor.kill(&mut handle);
            return Err(e.into());
        }
    };

    match exit {
        Some(exit) if exit.success() => {}
        Some(exit) => {
            let reason = lines_from_log(sink.path(), LogPosition::Last, runtime.launch_log_lines)
                .unwrap_or_default();
            return Err(RecorderError::Screenshot(format!("ffmpeg exited with {}: {}", exit, reason)));
        }
        None => {
            supervisor.stop(&mut handle, runtime.stop_timeout())?;
            return Err(RecorderError::Screenshot(format!(
                "capture did not finish within {:?}",
                runtime.stop_timeout()
            )));
        }
    }

    if !path.exists() {
        return Err(RecorderError::Screenshot(format!("{} was not written", path.display())));
    }

    tracing::info!("Screenshot: {}", path.display());
    Ok(path.to_path_buf())
}
