//! Command registry: the fixed service list plus dynamically discovered
//! autostart commands.

pub mod autostart;
pub mod command_file;
pub mod services;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::models::command::CommandSpec;

/// A launchable command with its unique process-table key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedCommand {
    /// Process-table key. A base key already taken in the batch gets the
    /// first free `#n` suffix, starting at 2.
    pub key: String,
    /// Parsed program and arguments.
    pub spec: CommandSpec,
}

/// Key each command by `base`, suffixing repeats so every key in the batch
/// is unique. A literal key that looks like a generated one (`x#2`) is
/// never handed out twice.
#[must_use]
pub fn assign_keys<I>(commands: I) -> Vec<KeyedCommand>
where
    I: IntoIterator<Item = (String, CommandSpec)>,
{
    let mut taken: HashSet<String> = HashSet::new();
    commands
        .into_iter()
        .map(|(base, spec)| {
            let key = next_free_key(&base, |candidate| taken.contains(candidate));
            taken.insert(key.clone());
            KeyedCommand { key, spec }
        })
        .collect()
}

/// `base` itself when it is free, otherwise `base#n` for the smallest
/// free `n >= 2`.
#[must_use]
pub fn next_free_key(base: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(base) {
        return base.to_owned();
    }
    let mut n: usize = 2;
    loop {
        let candidate = format!("{base}#{n}");
        if !is_taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Key the static services by program name.
#[must_use]
pub fn service_commands(services: &[CommandSpec]) -> Vec<KeyedCommand> {
    assign_keys(
        services
            .iter()
            .map(|spec| (spec.program.clone(), spec.clone())),
    )
}

/// Collect every autostart command for one startup pass, keyed by the
/// literal command line.
///
/// Descriptor directories are scanned first, in the given order, followed
/// by the lines of `command_file` when one is configured. Lines that fail
/// to parse are skipped with a warning.
#[must_use]
pub fn load_autostart_commands(
    directories: &[PathBuf],
    command_file: Option<&Path>,
) -> Vec<KeyedCommand> {
    let mut lines: Vec<String> = autostart::load_autostart_entries(directories)
        .into_iter()
        .map(|entry| entry.exec_line)
        .collect();

    if let Some(path) = command_file {
        lines.extend(command_file::parse_config_file(path));
    }

    let parsed = lines.into_iter().filter_map(|line| match CommandSpec::parse_line(&line) {
        Ok(spec) => {
            debug!(%line, program = %spec.program, "autostart command queued");
            Some((line, spec))
        }
        Err(err) => {
            warn!(%line, %err, "skipping unparsable autostart command");
            None
        }
    });

    assign_keys(parsed)
}
