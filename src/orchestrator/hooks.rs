//! Pre-start hooks: commands run to completion before the compositor.
//!
//! Typical use is pushing the session environment to the message bus
//! (`dbus-update-activation-environment --systemd --all`). Hooks whose
//! program is not on `PATH` are skipped, and a failing hook never stops
//! the session from starting.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, info_span, warn, Instrument};

use crate::models::command::CommandSpec;
use crate::models::process::OutputPolicy;
use crate::process::launcher::Launcher;

/// How one hook ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// Exited with the given code (`None` when killed by a signal).
    Exited(Option<i32>),
    /// Program not found on `PATH`.
    Skipped,
    /// The spawn failed.
    SpawnFailed,
    /// Still running at the deadline; killed.
    TimedOut,
}

/// Run `hooks` sequentially, each bounded by `timeout`.
pub async fn run_pre_start_hooks(
    launcher: &dyn Launcher,
    hooks: &[CommandSpec],
    timeout: Duration,
) -> Vec<HookOutcome> {
    let mut outcomes = Vec::with_capacity(hooks.len());
    for hook in hooks {
        let span = info_span!("pre_start_hook", command = %hook);
        outcomes.push(run_hook(launcher, hook, timeout).instrument(span).await);
    }
    outcomes
}

async fn run_hook(launcher: &dyn Launcher, hook: &CommandSpec, timeout: Duration) -> HookOutcome {
    if find_executable(&hook.program).is_none() {
        info!(program = %hook.program, "hook program not found, skipping");
        return HookOutcome::Skipped;
    }

    let mut child = match launcher.launch(hook, OutputPolicy::Forward) {
        Ok(child) => child,
        Err(err) => {
            warn!(%err, "hook failed to spawn");
            return HookOutcome::SpawnFailed;
        }
    };

    let waited = tokio::time::timeout(timeout, child.wait()).await;
    match waited {
        Ok(Ok(exit)) => {
            if exit.code == Some(0) {
                info!("hook finished successfully");
            } else {
                warn!(code = ?exit.code, "hook exited with failure");
            }
            HookOutcome::Exited(exit.code)
        }
        Ok(Err(err)) => {
            warn!(%err, "error waiting for hook");
            HookOutcome::Exited(None)
        }
        Err(_elapsed) => {
            warn!(?timeout, "hook did not finish in time, killing it");
            if let Err(err) = child.kill() {
                warn!(%err, "failed to kill hook");
            }
            HookOutcome::TimedOut
        }
    }
}

/// Resolve `program` the way a shell would: paths containing a separator
/// are checked directly, bare names are searched on `PATH`.
#[must_use]
pub fn find_executable(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|full| full.is_file())
}
