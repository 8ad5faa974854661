//! Command specifications: what to launch and with which arguments.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// A program plus its ordered arguments. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,
    /// Arguments passed to the program in order.
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Construct a spec from a program and its arguments.
    #[must_use]
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a shell-style command line (`sleep 5`, `app --title "a b"`).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the line has unbalanced quotes or
    /// contains no program.
    pub fn parse_line(line: &str) -> Result<Self> {
        let mut words = shell_words::split(line)
            .map_err(|err| AppError::Config(format!("cannot parse command line '{line}': {err}")))?
            .into_iter();
        let program = words
            .next()
            .ok_or_else(|| AppError::Config("empty command line".into()))?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }
}

impl Display for CommandSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.as_str());
        parts.extend(self.args.iter().map(String::as_str));
        f.write_str(&shell_words::join(parts))
    }
}
