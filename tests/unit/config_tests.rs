use std::path::PathBuf;
use std::time::Duration;

use serial_test::serial;

use prts_session::models::command::CommandSpec;
use prts_session::models::process::OutputPolicy;
use prts_session::{config::GlobalConfig, AppError};

fn sample_toml(dir: &str) -> String {
    format!(
        r#"
ipc_name = "prts-session-test"
output = "suppress"

[compositor]
program = "kwin_wayland"
args = ["--xwayland"]
ready_path = "/run/user/1000/wayland-0"

[[services]]
program = "firefox"

[[services]]
program = "plasmashell"
args = ["--no-respawn"]

[timeouts]
compositor_ready_seconds = 10
autostart_delay_ms = 250
shutdown_grace_ms = 1500
start_probe_ms = 3000
pre_start_seconds = 5

[autostart]
directories = ['{dir}']
include_xdg = false
command_file = '{dir}/autostart.conf'

[environment]
XDG_CURRENT_DESKTOP = "PRTS"

[[pre_start]]
program = "dbus-update-activation-environment"
args = ["--systemd", "--all"]
"#
    )
}

#[test]
fn parses_full_config() {
    let config = GlobalConfig::from_toml_str(&sample_toml("/tmp/autostart")).expect("valid");

    assert_eq!(config.ipc_name, "prts-session-test");
    assert_eq!(config.output, OutputPolicy::Suppress);
    assert_eq!(
        config.compositor.command(),
        CommandSpec::new("kwin_wayland", ["--xwayland"])
    );
    assert_eq!(
        config.compositor.ready_path,
        Some(PathBuf::from("/run/user/1000/wayland-0"))
    );
    assert_eq!(
        config.services,
        vec![
            CommandSpec::new("firefox", Vec::<String>::new()),
            CommandSpec::new("plasmashell", ["--no-respawn"]),
        ]
    );
    assert_eq!(config.timeouts.compositor_ready(), Duration::from_secs(10));
    assert_eq!(config.timeouts.autostart_delay(), Duration::from_millis(250));
    assert_eq!(config.timeouts.shutdown_grace(), Duration::from_millis(1500));
    assert_eq!(config.timeouts.start_probe(), Duration::from_millis(3000));
    assert_eq!(config.timeouts.pre_start(), Duration::from_secs(5));
    assert_eq!(
        config.environment.get("XDG_CURRENT_DESKTOP").map(String::as_str),
        Some("PRTS")
    );
    assert_eq!(config.pre_start.len(), 1);
    assert_eq!(
        config.autostart_directories(),
        vec![PathBuf::from("/tmp/autostart")]
    );
}

#[test]
fn empty_config_uses_defaults() {
    let config = GlobalConfig::from_toml_str("").expect("valid");

    assert_eq!(config, GlobalConfig::default());
    assert_eq!(config.compositor.program, "kwin_wayland");
    assert_eq!(
        config.services,
        vec![CommandSpec::new("firefox", Vec::<String>::new())]
    );
    assert_eq!(config.timeouts.compositor_ready(), Duration::from_secs(30));
    assert_eq!(config.timeouts.autostart_delay(), Duration::from_millis(100));
    assert_eq!(config.timeouts.shutdown_grace(), Duration::from_millis(2000));
    assert_eq!(config.output, OutputPolicy::Forward);
    assert_eq!(config.ipc_name, "prts-session");
    assert!(config.autostart.include_xdg);
}

#[test]
fn zero_grace_is_rejected() {
    let err = GlobalConfig::from_toml_str("[timeouts]\nshutdown_grace_ms = 0\n")
        .expect_err("zero grace");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn empty_compositor_program_is_rejected() {
    let err = GlobalConfig::from_toml_str("[compositor]\nprogram = \"  \"\n")
        .expect_err("empty compositor");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn empty_service_program_is_rejected() {
    let err = GlobalConfig::from_toml_str("[[services]]\nprogram = \"\"\n")
        .expect_err("empty service");
    assert!(err.to_string().contains("empty program"));
}

#[test]
fn malformed_toml_is_config_error() {
    let err = GlobalConfig::from_toml_str("[timeouts\n").expect_err("bad toml");
    assert!(err.to_string().starts_with("config:"));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.toml");
    let config = GlobalConfig::load_or_default(Some(path.as_path())).expect("defaults");
    assert_eq!(config, GlobalConfig::default());
}

#[test]
fn existing_file_is_loaded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.toml");
    std::fs::write(&path, "ipc_name = \"from-file\"\n").expect("write config");

    let config = GlobalConfig::load_or_default(Some(path.as_path())).expect("loaded");
    assert_eq!(config.ipc_name, "from-file");
}

#[test]
#[serial]
fn xdg_directories_follow_explicit_ones() {
    let home = tempfile::tempdir().expect("tempdir");
    let system = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir(home.path().join("autostart")).expect("mkdir");
    std::fs::create_dir(system.path().join("autostart")).expect("mkdir");

    std::env::set_var("XDG_CONFIG_HOME", home.path());
    std::env::set_var("XDG_CONFIG_DIRS", system.path());

    let mut config = GlobalConfig::default();
    config.autostart.directories = vec![PathBuf::from("/opt/session/autostart")];
    let dirs = config.autostart_directories();

    std::env::remove_var("XDG_CONFIG_HOME");
    std::env::remove_var("XDG_CONFIG_DIRS");

    assert_eq!(
        dirs,
        vec![
            PathBuf::from("/opt/session/autostart"),
            home.path().join("autostart"),
            system.path().join("autostart"),
        ]
    );
}
