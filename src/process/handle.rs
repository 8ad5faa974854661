//! Managed process handle: one spawned OS process plus its bookkeeping.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::command::CommandSpec;
use crate::models::process::{Origin, OutputPolicy, ProcessState};
use crate::process::launcher::{ChildProcess, ExitInfo, Launcher};
use crate::Result;

/// A supervised process. Owns its OS process exclusively; dropping the
/// handle releases it (and kills it if it is still alive).
pub struct ManagedProcess {
    key: String,
    spec: CommandSpec,
    origin: Origin,
    state: ProcessState,
    pid: Option<u32>,
    spawned_at: DateTime<Utc>,
    child: Option<Box<dyn ChildProcess>>,
}

impl std::fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("key", &self.key)
            .field("spec", &self.spec)
            .field("origin", &self.origin)
            .field("state", &self.state)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

/// Serializable view of a managed process for status reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProcessSnapshot {
    /// Process-table key.
    pub key: String,
    /// Launch phase the process belongs to.
    pub origin: Origin,
    /// Command line.
    pub command: String,
    /// OS process id, if known.
    pub pid: Option<u32>,
    /// Lifecycle state.
    pub state: ProcessState,
    /// When the spawn was issued.
    pub spawned_at: DateTime<Utc>,
}

impl ManagedProcess {
    /// Issue the spawn for `spec` and return immediately in `Starting`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Spawn` if the OS refuses to create the process.
    pub fn spawn(
        launcher: &dyn Launcher,
        key: impl Into<String>,
        spec: CommandSpec,
        origin: Origin,
        output: OutputPolicy,
    ) -> Result<Self> {
        let child = launcher.launch(&spec, output)?;
        let pid = child.id();
        Ok(Self {
            key: key.into(),
            spec,
            origin,
            state: ProcessState::Starting,
            pid,
            spawned_at: Utc::now(),
            child: Some(child),
        })
    }

    /// Process-table key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The command this process runs.
    #[must_use]
    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    /// Launch phase the process belongs to.
    #[must_use]
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Last observed lifecycle state.
    #[must_use]
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// OS process id captured at spawn.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Wait up to `timeout` for the process to report it is running.
    ///
    /// Returns `false` on timeout or if the process already exited; the
    /// state is then `Failed`, and a process that timed out has been sent
    /// a kill. Only the caller's sequence is suspended.
    pub async fn await_start(&mut self, timeout: Duration) -> bool {
        if self.state != ProcessState::Starting {
            return self.state == ProcessState::Running;
        }
        let Some(child) = self.child.as_mut() else {
            self.state = ProcessState::Failed;
            return false;
        };

        let started = tokio::time::timeout(timeout, child.started()).await;
        match started {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(key = %self.key, %err, "process failed to start");
                self.state = ProcessState::Failed;
                return false;
            }
            Err(_elapsed) => {
                warn!(key = %self.key, ?timeout, "process did not start in time, killing it");
                if let Err(err) = child.kill() {
                    warn!(key = %self.key, %err, "failed to kill unstarted process");
                }
                self.state = ProcessState::Failed;
                return false;
            }
        }

        match child.try_wait() {
            Ok(None) => {
                self.state = ProcessState::Running;
                true
            }
            Ok(Some(exit)) => {
                warn!(key = %self.key, code = ?exit.code, "process exited immediately");
                self.state = ProcessState::Failed;
                false
            }
            Err(err) => {
                warn!(key = %self.key, %err, "failed to query process state");
                self.state = ProcessState::Failed;
                false
            }
        }
    }

    /// Refresh the state from the OS without blocking.
    pub fn poll(&mut self) -> ProcessState {
        if !self.state.is_live() {
            return self.state;
        }
        if let Some(child) = self.child.as_mut() {
            match child.try_wait() {
                Ok(Some(exit)) => self.mark_exited(exit),
                Ok(None) => {}
                Err(err) => warn!(key = %self.key, %err, "failed to poll process status"),
            }
        }
        self.state
    }

    /// Request a graceful stop (`SIGTERM`). No-op once the process has
    /// exited or never started.
    pub fn terminate(&mut self) {
        if !self.poll().is_live() {
            return;
        }
        if let Some(child) = self.child.as_mut() {
            match child.terminate() {
                Ok(()) => debug!(key = %self.key, pid = ?self.pid, "terminate requested"),
                Err(err) => warn!(key = %self.key, %err, "failed to send terminate"),
            }
        }
    }

    /// Force a stop (`SIGKILL`). No-op under the same rule as
    /// [`ManagedProcess::terminate`].
    pub fn kill(&mut self) {
        if !self.poll().is_live() {
            return;
        }
        if let Some(child) = self.child.as_mut() {
            match child.kill() {
                Ok(()) => info!(key = %self.key, pid = ?self.pid, "kill issued"),
                Err(err) => warn!(key = %self.key, %err, "failed to send kill"),
            }
        }
    }

    /// Wait up to `timeout` for the process to exit. Returns `false` on
    /// timeout; the caller is expected to escalate to [`ManagedProcess::kill`].
    pub async fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        if !self.poll().is_live() {
            return true;
        }
        let Some(child) = self.child.as_mut() else {
            return true;
        };

        let waited = tokio::time::timeout(timeout, child.wait()).await;
        match waited {
            Ok(Ok(exit)) => {
                self.mark_exited(exit);
                true
            }
            Ok(Err(err)) => {
                warn!(key = %self.key, %err, "error waiting for process exit");
                self.mark_exited(ExitInfo { code: None });
                true
            }
            Err(_elapsed) => false,
        }
    }

    /// Serializable view of this process.
    #[must_use]
    pub fn snapshot(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            key: self.key.clone(),
            origin: self.origin,
            command: self.spec.to_string(),
            pid: self.pid,
            state: self.state,
            spawned_at: self.spawned_at,
        }
    }

    fn mark_exited(&mut self, exit: ExitInfo) {
        let next = ProcessState::Exited(exit.code);
        if self.state.can_transition_to(next) {
            debug!(key = %self.key, code = ?exit.code, "process exited");
            self.state = next;
        }
    }
}
