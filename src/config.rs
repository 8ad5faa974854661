//! Global configuration parsing and validation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::models::command::CommandSpec;
use crate::models::process::OutputPolicy;
use crate::registry::{autostart, services};
use crate::{AppError, Result};

/// The window-manager / compositor launched before everything else.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CompositorConfig {
    /// Compositor binary.
    #[serde(default = "default_compositor_program")]
    pub program: String,
    /// Compositor arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Path whose appearance ends the readiness wait early (for example
    /// `$XDG_RUNTIME_DIR/wayland-0`). Without it only the timeout or an
    /// early compositor exit end the wait. A path left over from an
    /// earlier session does not count until it is removed or rewritten.
    #[serde(default)]
    pub ready_path: Option<PathBuf>,
}

impl CompositorConfig {
    /// The compositor as a launchable command.
    #[must_use]
    pub fn command(&self) -> CommandSpec {
        CommandSpec::new(self.program.clone(), self.args.clone())
    }
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            program: default_compositor_program(),
            args: Vec::new(),
            ready_path: None,
        }
    }
}

fn default_compositor_program() -> String {
    "kwin_wayland".into()
}

/// Bounded waits used by the startup and shutdown sequencers.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Maximum wait for the compositor to become ready.
    #[serde(default = "default_compositor_ready_seconds")]
    pub compositor_ready_seconds: u64,
    /// Delay between the end of service launch and autostart launch.
    #[serde(default = "default_autostart_delay_ms")]
    pub autostart_delay_ms: u64,
    /// Grace period between the terminate pass and force-kill.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    /// Maximum wait for a single process to report it started.
    #[serde(default = "default_start_probe_ms")]
    pub start_probe_ms: u64,
    /// Maximum run time of one pre-start hook before it is killed.
    #[serde(default = "default_pre_start_seconds")]
    pub pre_start_seconds: u64,
}

impl TimeoutConfig {
    /// Compositor readiness window.
    #[must_use]
    pub fn compositor_ready(&self) -> Duration {
        Duration::from_secs(self.compositor_ready_seconds)
    }

    /// Deferral before the autostart phase.
    #[must_use]
    pub fn autostart_delay(&self) -> Duration {
        Duration::from_millis(self.autostart_delay_ms)
    }

    /// Shutdown grace period.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Per-process start probe window.
    #[must_use]
    pub fn start_probe(&self) -> Duration {
        Duration::from_millis(self.start_probe_ms)
    }

    /// Pre-start hook run limit.
    #[must_use]
    pub fn pre_start(&self) -> Duration {
        Duration::from_secs(self.pre_start_seconds)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            compositor_ready_seconds: default_compositor_ready_seconds(),
            autostart_delay_ms: default_autostart_delay_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            start_probe_ms: default_start_probe_ms(),
            pre_start_seconds: default_pre_start_seconds(),
        }
    }
}

fn default_compositor_ready_seconds() -> u64 {
    30
}

fn default_autostart_delay_ms() -> u64 {
    100
}

fn default_shutdown_grace_ms() -> u64 {
    2000
}

fn default_start_probe_ms() -> u64 {
    5000
}

fn default_pre_start_seconds() -> u64 {
    30
}

/// Where autostart entries come from.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AutostartConfig {
    /// Extra descriptor directories, scanned before the XDG ones.
    #[serde(default)]
    pub directories: Vec<PathBuf>,
    /// Whether the XDG autostart directories are scanned.
    #[serde(default = "default_true")]
    pub include_xdg: bool,
    /// Optional line-oriented file with one command per line.
    #[serde(default)]
    pub command_file: Option<PathBuf>,
}

impl Default for AutostartConfig {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            include_xdg: true,
            command_file: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_services() -> Vec<CommandSpec> {
    services::static_service_list()
}

fn default_ipc_name() -> String {
    "prts-session".into()
}

/// Global configuration parsed from `session.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Compositor launch settings.
    #[serde(default)]
    pub compositor: CompositorConfig,
    /// Session-critical services, launched in order after the compositor.
    #[serde(default = "default_services")]
    pub services: Vec<CommandSpec>,
    /// Bounded wait configuration.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Autostart discovery settings.
    #[serde(default)]
    pub autostart: AutostartConfig,
    /// Variables exported to every managed child.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Commands run to completion before the compositor starts.
    #[serde(default)]
    pub pre_start: Vec<CommandSpec>,
    /// Output policy for services and autostart entries. The compositor
    /// always forwards its output.
    #[serde(default)]
    pub output: OutputPolicy,
    /// Named pipe / Unix socket identifier for the control surface.
    #[serde(default = "default_ipc_name")]
    pub ipc_name: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            compositor: CompositorConfig::default(),
            services: default_services(),
            timeouts: TimeoutConfig::default(),
            autostart: AutostartConfig::default(),
            environment: BTreeMap::new(),
            pre_start: Vec::new(),
            output: OutputPolicy::default(),
            ipc_name: default_ipc_name(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Load the config at `path` when it exists, otherwise fall back to the
    /// built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if an existing file fails to parse or
    /// validate.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load_from_path(path),
            Some(path) => {
                warn!(
                    path = %path.display(),
                    "config file not found, using built-in defaults"
                );
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Ordered autostart directories: explicit ones first, then XDG ones.
    #[must_use]
    pub fn autostart_directories(&self) -> Vec<PathBuf> {
        let mut dirs = self.autostart.directories.clone();
        if self.autostart.include_xdg {
            for dir in autostart::xdg_autostart_dirs() {
                if !dirs.contains(&dir) {
                    dirs.push(dir);
                }
            }
        }
        dirs
    }

    fn validate(&self) -> Result<()> {
        if self.compositor.program.trim().is_empty() {
            return Err(AppError::Config(
                "compositor.program must not be empty".into(),
            ));
        }

        if self.timeouts.shutdown_grace_ms == 0 {
            return Err(AppError::Config(
                "timeouts.shutdown_grace_ms must be greater than zero".into(),
            ));
        }

        if let Some(spec) = self
            .services
            .iter()
            .chain(&self.pre_start)
            .find(|spec| spec.program.trim().is_empty())
        {
            return Err(AppError::Config(format!(
                "command with empty program: {spec:?}"
            )));
        }

        if self.ipc_name.trim().is_empty() {
            return Err(AppError::Config("ipc_name must not be empty".into()));
        }

        Ok(())
    }
}
