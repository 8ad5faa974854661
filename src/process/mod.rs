//! Process supervision primitives: the OS launch seam, managed handles,
//! and the process table.

pub mod handle;
pub mod launcher;
pub mod table;
