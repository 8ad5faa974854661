#![forbid(unsafe_code)]

//! `prts-session` — desktop session supervisor binary.
//!
//! Bootstraps configuration, runs the startup sequence under the session
//! supervisor, serves the IPC control surface for `prts-session-ctl`, and
//! exits with status 0 once logout has resolved every managed process.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use prts_session::config::GlobalConfig;
use prts_session::ipc::server::spawn_ipc_server;
use prts_session::ipc::token;
use prts_session::orchestrator::startup::StartupPlan;
use prts_session::orchestrator::supervisor::Supervisor;
use prts_session::process::launcher::OsLauncher;
use prts_session::{AppError, Result};

/// Upper bound on flushing in-flight IPC responses after logout.
const IPC_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "prts-session", about = "Desktop session supervisor", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    ///
    /// Defaults to `$XDG_CONFIG_HOME/prts-session/session.toml`; built-in
    /// defaults apply when the file does not exist.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("prts-session bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let config_path = args.config.or_else(default_config_path);
    let config = GlobalConfig::load_or_default(config_path.as_deref())?;
    info!(
        services = config.services.len(),
        compositor = %config.compositor.program,
        "configuration loaded"
    );

    // ── Build the supervisor ────────────────────────────
    let launcher = Arc::new(OsLauncher::new(config.environment.clone()));
    let plan = StartupPlan::from_config(&config);
    let (supervisor, session) = Supervisor::new(plan, launcher);

    // ── Start the control surface ───────────────────────
    let ct = CancellationToken::new();
    let tracker = TaskTracker::new();

    // Generate a random IPC auth token for this session.
    let ipc_auth_token = token::generate_token();
    let token_path = token::token_path(&config.ipc_name);
    if let Err(err) = token::write_token_file(&token_path, &ipc_auth_token) {
        error!(
            %err,
            path = %token_path.display(),
            "failed to write ipc token, ctl cannot authenticate"
        );
    }

    let ipc_handle = match spawn_ipc_server(
        &config.ipc_name,
        Some(ipc_auth_token),
        session.clone(),
        ct.clone(),
        tracker.clone(),
    ) {
        Ok(handle) => Some(handle),
        Err(err) => {
            error!(%err, "ipc server unavailable, logout only via signals");
            None
        }
    };

    // ── Signals map to logout ───────────────────────────
    let signal_session = session;
    let signal_handle = tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, logging out");
        if let Err(err) = signal_session.logout().await {
            warn!(%err, "signal-triggered logout not accepted");
        }
    });

    // ── Run until logout ────────────────────────────────
    let report = supervisor.run().await;
    info!(
        graceful = report.graceful.len(),
        killed = report.killed.len(),
        "session logged out"
    );

    // ── Wind down background tasks ──────────────────────
    signal_handle.abort();
    ct.cancel();
    if let Some(handle) = ipc_handle {
        if let Err(err) = handle.await {
            warn!(%err, "ipc server task failed");
        }
    }
    tracker.close();
    if tokio::time::timeout(IPC_DRAIN_TIMEOUT, tracker.wait())
        .await
        .is_err()
    {
        warn!("ipc connections still open at exit");
    }
    token::remove_token_file(&token_path);

    info!("prts-session shut down");
    Ok(())
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("prts-session").join("session.toml"))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
