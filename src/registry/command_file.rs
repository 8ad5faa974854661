//! Line-oriented command file: one shell command per line.
//!
//! Blank lines and lines starting with `#` are ignored. A missing or
//! unreadable file yields no commands and a warning.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::warn;

use crate::AppError;

/// Comment marker at the start of a line.
const COMMENT_MARKER: char = '#';

/// Read the command file at `path` and return its command lines in order.
#[must_use]
pub fn parse_config_file(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(raw) => parse_config_lines(&raw),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "command file not found, no commands loaded");
            Vec::new()
        }
        Err(err) => {
            let err = AppError::ConfigUnavailable(format!("{}: {err}", path.display()));
            warn!(%err, "command file unreadable, no commands loaded");
            Vec::new()
        }
    }
}

/// Trim each line and keep the non-blank, non-comment ones.
#[must_use]
pub fn parse_config_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(COMMENT_MARKER))
        .map(str::to_owned)
        .collect()
}
