//! Shutdown sequencer: terminate everything, then kill stragglers.
//!
//! The terminate pass covers every entry before any grace period starts,
//! so all processes react to `SIGTERM` concurrently and none is
//! kill-starved by entries ahead of it in the table.

use std::time::Duration;

use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};

use crate::process::table::ProcessTable;
use crate::AppError;

/// Upper bound on reaping a process after `SIGKILL`.
const REAP_TIMEOUT: Duration = Duration::from_secs(1);

/// How each entry was resolved during logout.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Exited within the grace period.
    pub graceful: Vec<String>,
    /// Needed a forceful kill.
    pub killed: Vec<String>,
}

impl ShutdownReport {
    /// Total number of entries resolved.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graceful.len() + self.killed.len()
    }

    /// Whether no entry had to be resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stop every process in `table` and empty it.
///
/// Each entry gets up to `grace` to exit after the terminate pass; entries
/// still running afterwards are killed. Grace periods are waited one entry
/// after another. Calling this on an already-emptied table is a no-op.
pub async fn logout(table: &mut ProcessTable, grace: Duration) -> ShutdownReport {
    let span = info_span!("logout", entries = table.len());
    stop_all(table, grace).instrument(span).await
}

async fn stop_all(table: &mut ProcessTable, grace: Duration) -> ShutdownReport {
    let mut report = ShutdownReport::default();

    if table.is_empty() {
        info!("nothing to stop");
        return report;
    }

    let keys = table.keys();

    for process in table.iter_mut() {
        process.terminate();
    }
    info!(count = keys.len(), "terminate requested for all processes");

    for key in &keys {
        let Some(process) = table.get_mut(key) else {
            continue;
        };

        if process.wait_for_exit(grace).await {
            report.graceful.push(key.clone());
        } else {
            let err = AppError::TerminationTimeout(format!("{key} still running after {grace:?}"));
            warn!(%err, "escalating to kill");
            process.kill();
            if !process.wait_for_exit(REAP_TIMEOUT).await {
                warn!(%key, "process not reaped after kill");
            }
            report.killed.push(key.clone());
        }

        drop(table.remove(key));
    }

    info!(
        graceful = report.graceful.len(),
        killed = report.killed.len(),
        "all processes resolved"
    );
    report
}
