//! Error types shared across the session supervisor.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all supervision failure modes.
///
/// Apart from [`AppError::Config`] and [`AppError::Ipc`] at bootstrap, none
/// of these escape the orchestrator: they are logged where they occur and
/// the sequence carries on.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// The OS refused to create a process.
    Spawn(String),
    /// A process was created but did not report running in time.
    StartTimeout(String),
    /// The compositor did not signal readiness within its window.
    ReadinessTimeout(String),
    /// An autostart directory or command file is missing or unreadable.
    ConfigUnavailable(String),
    /// A graceful stop did not complete within the grace period.
    TerminationTimeout(String),
    /// A process-table key is already taken.
    DuplicateKey(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// IPC communication failure.
    Ipc(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn failure: {msg}"),
            Self::StartTimeout(msg) => write!(f, "start timeout: {msg}"),
            Self::ReadinessTimeout(msg) => write!(f, "readiness timeout: {msg}"),
            Self::ConfigUnavailable(msg) => write!(f, "config unavailable: {msg}"),
            Self::TerminationTimeout(msg) => write!(f, "termination timeout: {msg}"),
            Self::DuplicateKey(msg) => write!(f, "duplicate key: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Ipc(msg) => write!(f, "ipc: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
