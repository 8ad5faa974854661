//! OS process seam.
//!
//! [`Launcher`] turns a [`CommandSpec`] into a running [`ChildProcess`].
//! The orchestrator only talks to these traits, so tests can substitute
//! processes that start instantly, never start, or ignore `SIGTERM`
//! without touching the OS.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::debug;

use crate::models::command::CommandSpec;
use crate::models::process::OutputPolicy;
use crate::{AppError, Result};

/// Boxed future returned by [`ChildProcess`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
}

/// A spawned OS process, exclusively owned by one `ManagedProcess`.
pub trait ChildProcess: Send {
    /// OS process id while the process has not been reaped.
    fn id(&self) -> Option<u32>;

    /// Resolve once the OS confirms the program is executing.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Spawn` if the program could not be started.
    fn started(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Non-blocking exit check.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the OS status query fails.
    fn try_wait(&mut self) -> Result<Option<ExitInfo>>;

    /// Send a graceful stop request (`SIGTERM`).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the signal cannot be delivered.
    fn terminate(&mut self) -> Result<()>;

    /// Send a forceful stop (`SIGKILL`) without waiting for the exit.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the signal cannot be delivered.
    fn kill(&mut self) -> Result<()>;

    /// Wait until the process exits.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if waiting on the OS process fails.
    fn wait(&mut self) -> BoxFuture<'_, Result<ExitInfo>>;
}

/// Creates child processes from command specs.
pub trait Launcher: Send + Sync {
    /// Issue the OS spawn for `spec` and return immediately.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Spawn` if the OS refuses to create the process.
    fn launch(&self, spec: &CommandSpec, output: OutputPolicy) -> Result<Box<dyn ChildProcess>>;
}

/// Launches real processes through `tokio::process`.
///
/// Every child gets `kill_on_drop(true)`, a null stdin, the configured
/// session environment, and no `SESSION_MANAGER` variable.
#[derive(Debug, Clone, Default)]
pub struct OsLauncher {
    environment: BTreeMap<String, String>,
}

impl OsLauncher {
    /// Launcher exporting `environment` to every child.
    #[must_use]
    pub fn new(environment: BTreeMap<String, String>) -> Self {
        Self { environment }
    }
}

impl Launcher for OsLauncher {
    fn launch(&self, spec: &CommandSpec, output: OutputPolicy) -> Result<Box<dyn ChildProcess>> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&self.environment)
            .env_remove("SESSION_MANAGER")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        match output {
            OutputPolicy::Forward => cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit()),
            OutputPolicy::Suppress => cmd.stdout(Stdio::null()).stderr(Stdio::null()),
        };

        let child = cmd
            .spawn()
            .map_err(|err| AppError::Spawn(format!("failed to spawn {}: {err}", spec.program)))?;

        debug!(program = %spec.program, pid = child.id().unwrap_or(0), "os process spawned");
        Ok(Box::new(OsChild { child }))
    }
}

/// [`ChildProcess`] over a `tokio::process::Child`.
#[derive(Debug)]
struct OsChild {
    child: Child,
}

impl ChildProcess for OsChild {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn started(&mut self) -> BoxFuture<'_, Result<()>> {
        // `spawn` only returns once exec succeeded, so a live handle has
        // already started.
        Box::pin(async { Ok(()) })
    }

    fn try_wait(&mut self) -> Result<Option<ExitInfo>> {
        Ok(self
            .child
            .try_wait()?
            .map(|status| ExitInfo { code: status.code() }))
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        let pid = i32::try_from(pid)
            .map_err(|_| AppError::Io(format!("pid {pid} out of range")))?;

        match kill(Pid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(AppError::Io(format!("SIGTERM to {pid} failed: {errno}"))),
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> Result<()> {
        self.kill()
    }

    fn kill(&mut self) -> Result<()> {
        if self.child.id().is_none() {
            return Ok(());
        }
        match self.child.start_kill() {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn wait(&mut self) -> BoxFuture<'_, Result<ExitInfo>> {
        Box::pin(async move {
            let status = self.child.wait().await?;
            Ok(ExitInfo {
                code: status.code(),
            })
        })
    }
}
