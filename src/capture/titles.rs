//! Window title lookup contract
//!
//! Enumerating window titles is done by OS shell utilities outside this
//! crate. This module only defines the interface recordings consume and the
//! clean-up rules applied to raw enumeration output.

use thiserror::Error;

/// Title lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TitleError {
    #[error("No open windows found for: {0}")]
    ApplicationNotFound(String),

    #[error("Window enumeration helper not available: {0}")]
    DependencyMissing(String),
}

/// Returns candidate window titles for a process name
pub trait TitleResolver {
    /// Titles in display order; never empty on success
    fn resolve(&self, process_name: &str) -> Result<Vec<String>, TitleError>;
}

const TITLE_PREFIX: &str = "Window Title:";

/// Turn raw `Window Title: ...` lines into usable titles.
///
/// `N/A` and blank titles are dropped. An empty result is
/// `ApplicationNotFound`. Titles that do not mention the process name are
/// kept, with a warning, since the caller may still want them.
pub fn clean_titles<'a, I>(process_name: &str, raw_lines: I) -> Result<Vec<String>, TitleError>
where
    I: IntoIterator<Item = &'a str>,
{
    let titles: Vec<String> = raw_lines
        .into_iter()
        .map(|line| {
            let line = line.trim_end();
            match line.strip_prefix(TITLE_PREFIX) {
                Some(rest) => {
                    let rest = rest.trim_start();
                    if rest == "N/A" {
                        ""
                    } else {
                        rest
                    }
                }
                None => line,
            }
        })
        .filter(|title| !title.is_empty())
        .map(String::from)
        .collect();

    if titles.is_empty() {
        return Err(TitleError::ApplicationNotFound(process_name.to_string()));
    }

    let joined = titles.join(",").to_lowercase();
    if !joined.contains(&process_name.to_lowercase()) {
        tracing::warn!("Process name and window title(s) do not match: {:?}", titles);
        tracing::warn!("Please manually provide the displayed window title.");
    }

    Ok(titles)
}
