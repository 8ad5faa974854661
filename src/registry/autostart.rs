//! Autostart discovery from freedesktop-style descriptor directories.
//!
//! Each directory is scanned for `*.desktop` files. The `[Desktop Entry]`
//! group is read as plain key-value pairs: `Exec` provides the command
//! line, and the presence of `OnlyShowIn` restricts the entry to other
//! desktop environments, which excludes it. Unreadable or malformed files
//! are skipped with a warning; nothing here is fatal.

use std::collections::{HashMap, HashSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::{AppError, Result};

/// File-name pattern of autostart descriptors.
const DESCRIPTOR_PATTERN: &str = "*.desktop";

/// Group holding the launch keys.
const ENTRY_GROUP: &str = "Desktop Entry";

/// Key whose presence marks an entry as restricted to other environments.
const RESTRICTION_KEY: &str = "OnlyShowIn";

/// An autostart descriptor reduced to what the supervisor needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutostartEntry {
    /// Command line with freedesktop field codes removed.
    pub exec_line: String,
    /// Whether the descriptor limits itself to specific environments.
    pub visibility_restricted: bool,
    /// Descriptor file the entry came from.
    pub source: PathBuf,
}

/// XDG autostart directories in precedence order: the user directory
/// (`$XDG_CONFIG_HOME/autostart`) first, then `<dir>/autostart` for every
/// entry of `$XDG_CONFIG_DIRS`. Only existing directories are returned.
#[must_use]
pub fn xdg_autostart_dirs() -> Vec<PathBuf> {
    let config_home = env::var_os("XDG_CONFIG_HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::config_dir);

    let config_dirs = env::var("XDG_CONFIG_DIRS")
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "/etc/xdg".to_owned());

    config_home
        .into_iter()
        .chain(
            config_dirs
                .split(':')
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
        )
        .map(|dir| dir.join("autostart"))
        .filter(|dir| dir.is_dir())
        .collect()
}

/// Scan `directories` in order and return every launchable entry.
///
/// Entries with a restriction marker, `Hidden=true` or an empty command
/// line are left out. A descriptor file name seen in an earlier directory
/// shadows the same name in later ones.
#[must_use]
pub fn load_autostart_entries(directories: &[PathBuf]) -> Vec<AutostartEntry> {
    let mut shadowed: HashSet<String> = HashSet::new();
    let mut entries = Vec::new();

    for dir in directories {
        for path in descriptor_files(dir) {
            let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned())
            else {
                continue;
            };
            if !shadowed.insert(file_name) {
                debug!(path = %path.display(), "descriptor shadowed by earlier directory");
                continue;
            }

            match read_entry(&path) {
                Ok(Some(entry)) if entry.visibility_restricted => {
                    debug!(path = %path.display(), "skipping restricted autostart entry");
                }
                Ok(Some(entry)) if entry.exec_line.is_empty() => {
                    debug!(path = %path.display(), "skipping autostart entry without Exec");
                }
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {
                    debug!(path = %path.display(), "skipping hidden autostart entry");
                }
                Err(err) => {
                    warn!(path = %path.display(), %err, "skipping malformed autostart descriptor");
                }
            }
        }
    }

    entries
}

/// Sorted descriptor files directly inside `dir`.
fn descriptor_files(dir: &Path) -> Vec<PathBuf> {
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(err) => {
            let err = AppError::ConfigUnavailable(format!("{}: {err}", dir.display()));
            warn!(%err, "autostart directory unavailable");
            return Vec::new();
        }
    };

    let pattern = match glob::Pattern::new(DESCRIPTOR_PATTERN) {
        Ok(pattern) => pattern,
        Err(err) => {
            warn!(%err, "invalid descriptor pattern");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = read_dir
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| pattern.matches(name))
        })
        .collect();
    files.sort();
    files
}

/// Read one descriptor. `Ok(None)` means the entry is hidden.
fn read_entry(path: &Path) -> Result<Option<AutostartEntry>> {
    let raw = fs::read_to_string(path)?;
    let group = parse_desktop_entry(&raw)?;

    if group
        .get("Hidden")
        .is_some_and(|value| value.eq_ignore_ascii_case("true"))
    {
        return Ok(None);
    }

    let exec_line = group
        .get("Exec")
        .map(|exec| strip_field_codes(exec).trim().to_owned())
        .unwrap_or_default();

    Ok(Some(AutostartEntry {
        exec_line,
        visibility_restricted: group.contains_key(RESTRICTION_KEY),
        source: path.to_path_buf(),
    }))
}

/// Parse the `[Desktop Entry]` group of a descriptor into key-value pairs.
///
/// Localized keys (`Name[de]`) are kept verbatim. Later duplicates win.
///
/// # Errors
///
/// Returns `AppError::Config` if the group is missing or a line inside it
/// is neither a comment nor a `key=value` pair.
pub fn parse_desktop_entry(raw: &str) -> Result<HashMap<String, String>> {
    let mut values = HashMap::new();
    let mut in_group = false;
    let mut found = false;

    for (index, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_group = header == ENTRY_GROUP;
            found |= in_group;
            continue;
        }

        if !in_group {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| {
            AppError::Config(format!("line {}: expected key=value", index + 1))
        })?;
        values.insert(key.trim().to_owned(), value.trim().to_owned());
    }

    if found {
        Ok(values)
    } else {
        Err(AppError::Config(format!("missing [{ENTRY_GROUP}] group")))
    }
}

/// Remove freedesktop field codes (`%f`, `%U`, ...) and unescape `%%`.
#[must_use]
pub fn strip_field_codes(exec: &str) -> String {
    static FIELD_CODE: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(re) = FIELD_CODE.get_or_init(|| Regex::new(r"(\s*)%(%|[A-Za-z])").ok()) else {
        return exec.to_owned();
    };

    re.replace_all(exec, |caps: &Captures<'_>| {
        if &caps[2] == "%" {
            format!("{}%", &caps[1])
        } else {
            String::new()
        }
    })
    .into_owned()
}
