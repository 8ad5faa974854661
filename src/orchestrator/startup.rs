//! Startup sequencer.
//!
//! Drives the session through its launch phases:
//!
//! ```text
//! Idle -> LaunchingCompositor -> AwaitingCompositorReady [-> Degraded]
//!      -> LaunchingServices -> (deferred) LaunchingAutostart -> Ready
//! ```
//!
//! Each call to [`StartupSequencer::advance`] performs one step and returns
//! the delay the caller must wait before the next one, so the scheduling
//! stays with the caller and the transitions can be tested under a paused
//! clock. Every failure is logged and absorbed; the sequence always
//! reaches `Ready`.
//!
//! Per-entry start probes run one after another, so a phase takes the sum
//! of its entries' start latencies.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::{GlobalConfig, TimeoutConfig};
use crate::models::command::CommandSpec;
use crate::models::process::{Origin, OutputPolicy};
use crate::orchestrator::hooks;
use crate::process::handle::ManagedProcess;
use crate::process::launcher::Launcher;
use crate::process::table::ProcessTable;
use crate::registry::{self, KeyedCommand};
use crate::AppError;

/// Interval between checks for the compositor ready path.
const READY_PATH_POLL: Duration = Duration::from_millis(50);

/// Phases of the startup state machine.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StartupPhase {
    /// Nothing launched yet.
    Idle,
    /// Compositor spawn issued.
    LaunchingCompositor,
    /// Bounded wait for compositor readiness.
    AwaitingCompositorReady,
    /// The compositor did not become ready; the sequence carries on.
    Degraded,
    /// Fixed service list being launched.
    LaunchingServices,
    /// Autostart entries being launched.
    LaunchingAutostart,
    /// Steady state for the rest of the session.
    Ready,
}

/// How the compositor readiness wait ended.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// A ready signal was observed.
    Ready,
    /// The wait ran out; the compositor is still running.
    TimedOut,
    /// The compositor exited during the wait.
    Exited,
    /// There was no compositor to wait for.
    NotStarted,
}

/// Everything the sequencer needs to know, resolved from configuration.
#[derive(Debug, Clone)]
pub struct StartupPlan {
    /// Compositor command.
    pub compositor: CommandSpec,
    /// Path whose appearance signals compositor readiness.
    pub ready_path: Option<PathBuf>,
    /// Static services in launch order.
    pub services: Vec<CommandSpec>,
    /// Autostart descriptor directories in precedence order.
    pub autostart_dirs: Vec<PathBuf>,
    /// Optional line-oriented command file.
    pub command_file: Option<PathBuf>,
    /// Hooks run before the compositor.
    pub pre_start: Vec<CommandSpec>,
    /// Output policy for services and autostart entries.
    pub output: OutputPolicy,
    /// Bounded waits.
    pub timeouts: TimeoutConfig,
}

impl StartupPlan {
    /// Resolve a plan from configuration, including XDG directory lookup.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            compositor: config.compositor.command(),
            ready_path: config.compositor.ready_path.clone(),
            services: config.services.clone(),
            autostart_dirs: config.autostart_directories(),
            command_file: config.autostart.command_file.clone(),
            pre_start: config.pre_start.clone(),
            output: config.output,
            timeouts: config.timeouts.clone(),
        }
    }
}

/// Keys launched and skipped by one batch.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct BatchReport {
    /// Keys registered in the process table.
    pub started: Vec<String>,
    /// Keys whose spawn or start probe failed.
    pub failed: Vec<String>,
}

/// The startup state machine.
pub struct StartupSequencer {
    plan: StartupPlan,
    launcher: Arc<dyn Launcher>,
    ready: CancellationToken,
    phase: StartupPhase,
    history: Vec<StartupPhase>,
    compositor_key: Option<String>,
    stale_ready_path: Option<SystemTime>,
    readiness: Option<Readiness>,
    services: BatchReport,
    autostart: BatchReport,
}

impl StartupSequencer {
    /// A sequencer in `Idle`. Cancelling `ready` ends the compositor wait
    /// early.
    #[must_use]
    pub fn new(plan: StartupPlan, launcher: Arc<dyn Launcher>, ready: CancellationToken) -> Self {
        Self {
            plan,
            launcher,
            ready,
            phase: StartupPhase::Idle,
            history: Vec::new(),
            compositor_key: None,
            stale_ready_path: None,
            readiness: None,
            services: BatchReport::default(),
            autostart: BatchReport::default(),
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> StartupPhase {
        self.phase
    }

    /// Every phase entered so far, in order.
    #[must_use]
    pub fn history(&self) -> &[StartupPhase] {
        &self.history
    }

    /// Whether the compositor wait ended without readiness.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.history.contains(&StartupPhase::Degraded)
    }

    /// How the compositor wait ended, once it has.
    #[must_use]
    pub fn readiness(&self) -> Option<Readiness> {
        self.readiness
    }

    /// Outcome of the service phase.
    #[must_use]
    pub fn service_report(&self) -> &BatchReport {
        &self.services
    }

    /// Outcome of the autostart phase.
    #[must_use]
    pub fn autostart_report(&self) -> &BatchReport {
        &self.autostart
    }

    /// Perform the next step. Returns the delay before the following step,
    /// or `None` once `Ready` is reached.
    pub async fn advance(&mut self, table: &mut ProcessTable) -> Option<Duration> {
        match self.phase {
            StartupPhase::Idle => {
                let span = info_span!("launch_compositor");
                self.launch_compositor(table).instrument(span).await;
                Some(Duration::ZERO)
            }
            StartupPhase::LaunchingCompositor => {
                let span = info_span!("await_compositor");
                self.await_compositor(table).instrument(span).await;
                Some(Duration::ZERO)
            }
            StartupPhase::AwaitingCompositorReady | StartupPhase::Degraded => {
                let span = info_span!("launch_services");
                self.launch_services(table).instrument(span).await;
                Some(self.plan.timeouts.autostart_delay())
            }
            StartupPhase::LaunchingServices => {
                let span = info_span!("launch_autostart");
                self.launch_autostart(table).instrument(span).await;
                self.enter(StartupPhase::Ready);
                info!("session startup complete");
                None
            }
            StartupPhase::LaunchingAutostart | StartupPhase::Ready => None,
        }
    }

    /// Run every step back to back, honouring the deferral delays.
    pub async fn run_to_ready(&mut self, table: &mut ProcessTable) {
        while let Some(delay) = self.advance(table).await {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    async fn launch_compositor(&mut self, table: &mut ProcessTable) {
        if !self.plan.pre_start.is_empty() {
            hooks::run_pre_start_hooks(
                self.launcher.as_ref(),
                &self.plan.pre_start,
                self.plan.timeouts.pre_start(),
            )
            .await;
        }

        self.enter(StartupPhase::LaunchingCompositor);
        let spec = self.plan.compositor.clone();
        let key = spec.program.clone();
        info!(program = %spec.program, "starting compositor");

        if let Some(path) = self.plan.ready_path.as_deref() {
            self.stale_ready_path = path_modified(path);
            if self.stale_ready_path.is_some() {
                warn!(
                    path = %path.display(),
                    "ready path exists before compositor start, waiting for a fresh one"
                );
            }
        }

        let mut process = match ManagedProcess::spawn(
            self.launcher.as_ref(),
            key.clone(),
            spec,
            Origin::System,
            OutputPolicy::Forward,
        ) {
            Ok(process) => process,
            Err(err) => {
                error!(%err, "failed to start compositor process");
                return;
            }
        };

        if process.await_start(self.plan.timeouts.start_probe()).await {
            info!(pid = ?process.pid(), "compositor process started, waiting for it to initialize");
            table.register(process);
            self.compositor_key = Some(key);
        } else {
            error!("compositor process failed to start");
        }
    }

    async fn await_compositor(&mut self, table: &mut ProcessTable) {
        self.enter(StartupPhase::AwaitingCompositorReady);
        let timeout = self.plan.timeouts.compositor_ready();

        let compositor = self
            .compositor_key
            .as_deref()
            .and_then(|key| table.get_mut(key));

        let readiness = match compositor {
            None => Readiness::NotStarted,
            Some(process) => {
                let ready_path = self.plan.ready_path.clone();
                tokio::select! {
                    () = self.ready.cancelled() => Readiness::Ready,
                    () = wait_for_path(ready_path.as_deref(), self.stale_ready_path) => Readiness::Ready,
                    exited = process.wait_for_exit(timeout) => {
                        if exited { Readiness::Exited } else { Readiness::TimedOut }
                    }
                }
            }
        };
        self.readiness = Some(readiness);

        match readiness {
            Readiness::Ready => info!("compositor ready"),
            Readiness::TimedOut => {
                let err = AppError::ReadinessTimeout(format!(
                    "compositor not ready after {timeout:?}"
                ));
                warn!(%err, "continuing without confirmed compositor");
                self.enter(StartupPhase::Degraded);
            }
            Readiness::Exited => {
                error!("compositor exited before becoming ready");
                self.enter(StartupPhase::Degraded);
            }
            Readiness::NotStarted => {
                error!("no compositor running, continuing without it");
                self.enter(StartupPhase::Degraded);
            }
        }
    }

    async fn launch_services(&mut self, table: &mut ProcessTable) {
        self.enter(StartupPhase::LaunchingServices);
        let commands = registry::service_commands(&self.plan.services);
        let report = self
            .launch_batch(table, commands, Origin::System, self.plan.output)
            .await;
        info!(
            started = report.started.len(),
            failed = report.failed.len(),
            "session services launched"
        );
        self.services = report;
    }

    async fn launch_autostart(&mut self, table: &mut ProcessTable) {
        self.enter(StartupPhase::LaunchingAutostart);
        let commands = registry::load_autostart_commands(
            &self.plan.autostart_dirs,
            self.plan.command_file.as_deref(),
        );
        let report = self
            .launch_batch(table, commands, Origin::Autostart, self.plan.output)
            .await;
        info!(
            started = report.started.len(),
            failed = report.failed.len(),
            "autostart entries launched"
        );
        self.autostart = report;
    }

    /// Spawn, probe and register each command in order. A failure only
    /// affects its own entry. Keys already present in `table` are suffixed
    /// rather than replaced.
    async fn launch_batch(
        &self,
        table: &mut ProcessTable,
        commands: Vec<KeyedCommand>,
        origin: Origin,
        output: OutputPolicy,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for KeyedCommand { key, spec } in commands {
            // Earlier phases own their keys; never replace one of them.
            let key = registry::next_free_key(&key, |candidate| table.get(candidate).is_some());
            let command = spec.to_string();
            let mut process =
                match ManagedProcess::spawn(self.launcher.as_ref(), key.clone(), spec, origin, output)
                {
                    Ok(process) => process,
                    Err(err) => {
                        warn!(%key, %err, "failed to start process");
                        report.failed.push(key);
                        continue;
                    }
                };

            if process.await_start(self.plan.timeouts.start_probe()).await {
                info!(%key, %command, pid = ?process.pid(), ?origin, "process running");
                table.register(process);
                report.started.push(key);
            } else {
                let err = AppError::StartTimeout(format!("{command} did not report running"));
                warn!(%key, %err, "discarding process");
                report.failed.push(key);
            }
        }

        report
    }

    fn enter(&mut self, phase: StartupPhase) {
        self.phase = phase;
        self.history.push(phase);
    }
}

/// Resolve once `path` exists and is not the leftover described by
/// `stale`: the path must either vanish first or carry a new modification
/// time. Never resolves without a path.
async fn wait_for_path(path: Option<&Path>, stale: Option<SystemTime>) {
    let Some(path) = path else {
        return std::future::pending::<()>().await;
    };
    let mut seen_absent = stale.is_none();
    let mut interval = tokio::time::interval(READY_PATH_POLL);
    loop {
        interval.tick().await;
        match path_modified(path) {
            None => seen_absent = true,
            Some(modified) if seen_absent || Some(modified) != stale => return,
            Some(_) => {}
        }
    }
}

/// Modification time of an existing path. Filesystems without mtimes
/// report the epoch.
fn path_modified(path: &Path) -> Option<SystemTime> {
    let metadata = std::fs::metadata(path).ok()?;
    Some(metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH))
}
