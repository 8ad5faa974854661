//! Process table: unique keys mapped to managed processes.
//!
//! Registration order is kept so shutdown walks entries deterministically.
//! A second registration under an existing key replaces the old entry in
//! place; the old handle is killed and released.

use tracing::warn;

use crate::models::process::Origin;
use crate::process::handle::{ManagedProcess, ProcessSnapshot};
use crate::AppError;

/// Registry of managed processes, owned by the orchestrator loop.
#[derive(Debug, Default)]
pub struct ProcessTable {
    entries: Vec<ManagedProcess>,
}

impl ProcessTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `process` under its key.
    ///
    /// Returns `true` when an existing entry was replaced. The replaced
    /// handle is killed and dropped before this returns.
    pub fn register(&mut self, process: ManagedProcess) -> bool {
        if let Some(slot) = self.entries.iter_mut().find(|p| p.key() == process.key()) {
            let err = AppError::DuplicateKey(process.key().to_owned());
            warn!(%err, "replacing previous process");
            let mut previous = std::mem::replace(slot, process);
            previous.kill();
            drop(previous);
            true
        } else {
            self.entries.push(process);
            false
        }
    }

    /// Look up a process by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ManagedProcess> {
        self.entries.iter().find(|p| p.key() == key)
    }

    /// Mutable lookup by key.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut ManagedProcess> {
        self.entries.iter_mut().find(|p| p.key() == key)
    }

    /// Remove an entry, releasing its OS resources when the returned
    /// handle is dropped.
    pub fn remove(&mut self, key: &str) -> Option<ManagedProcess> {
        let index = self.entries.iter().position(|p| p.key() == key)?;
        let process = self.entries.remove(index);
        if process.state().is_live() {
            warn!(key, "removing process that has not exited");
        }
        Some(process)
    }

    /// Keys in registration order; a stable snapshot for one pass.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|p| p.key().to_owned()).collect()
    }

    /// Keys of one origin, in registration order.
    #[must_use]
    pub fn keys_for(&self, origin: Origin) -> Vec<String> {
        self.entries
            .iter()
            .filter(|p| p.origin() == origin)
            .map(|p| p.key().to_owned())
            .collect()
    }

    /// Iterate entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ManagedProcess> {
        self.entries.iter()
    }

    /// Mutably iterate entries in registration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ManagedProcess> {
        self.entries.iter_mut()
    }

    /// Refresh every entry's state and return serializable views.
    pub fn snapshot(&mut self) -> Vec<ProcessSnapshot> {
        self.entries
            .iter_mut()
            .map(|p| {
                p.poll();
                p.snapshot()
            })
            .collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
