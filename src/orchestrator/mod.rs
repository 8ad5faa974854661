//! Session orchestration modules.
//!
//! Covers the startup sequence, pre-start hooks, the logout sequence and
//! the supervisor loop that owns the process table.

pub mod hooks;
pub mod shutdown;
pub mod startup;
pub mod supervisor;
