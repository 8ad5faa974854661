#![forbid(unsafe_code)]

//! `prts-session` — desktop session supervisor.
//!
//! Boots the compositor, the session-critical services and the user's
//! autostart entries in order, and tears every managed process down on
//! logout.

pub mod config;
pub mod errors;
pub mod ipc;
pub mod models;
pub mod orchestrator;
pub mod process;
pub mod registry;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
