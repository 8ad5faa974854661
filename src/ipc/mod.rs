//! Local IPC layer for `prts-session-ctl` interaction.
//!
//! Provides a named pipe (Windows) or Unix domain socket (Linux/macOS)
//! server that accepts JSON-line commands from the companion CLI. Every
//! request carries the session's shared-secret token.

pub mod server;
pub mod token;
