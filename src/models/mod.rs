//! Domain models for supervised commands and processes.

pub mod command;
pub mod process;
