//! Integration tests for the process table and managed process handles.

use std::time::Duration;

use prts_session::models::command::CommandSpec;
use prts_session::models::process::{Origin, OutputPolicy, ProcessState};
use prts_session::process::handle::ManagedProcess;
use prts_session::process::launcher::Launcher;
use prts_session::process::table::ProcessTable;

use super::test_helpers::{Behavior, FakeLauncher, Signal};

fn spawn(launcher: &dyn Launcher, key: &str, program: &str, origin: Origin) -> ManagedProcess {
    ManagedProcess::spawn(
        launcher,
        key,
        CommandSpec::new(program, Vec::<String>::new()),
        origin,
        OutputPolicy::Forward,
    )
    .expect("fake spawn")
}

#[tokio::test(start_paused = true)]
async fn spawn_returns_in_starting_state() {
    let launcher = FakeLauncher::new();
    let process = spawn(launcher.as_ref(), "panel", "panel", Origin::System);
    assert_eq!(process.state(), ProcessState::Starting);
    assert!(process.pid().is_some());
}

#[tokio::test(start_paused = true)]
async fn await_start_confirms_running() {
    let launcher = FakeLauncher::new();
    let mut process = spawn(launcher.as_ref(), "panel", "panel", Origin::System);
    assert!(process.await_start(Duration::from_secs(1)).await);
    assert_eq!(process.state(), ProcessState::Running);
}

#[tokio::test(start_paused = true)]
async fn terminate_and_kill_are_idempotent_after_exit() {
    let launcher = FakeLauncher::new();
    let mut process = spawn(launcher.as_ref(), "panel", "panel", Origin::System);
    assert!(process.await_start(Duration::from_secs(1)).await);

    process.terminate();
    assert!(process.wait_for_exit(Duration::from_secs(1)).await);
    assert_eq!(process.state(), ProcessState::Exited(None));

    process.terminate();
    process.kill();
    process.kill();

    let stops = launcher
        .signals()
        .into_iter()
        .filter(|s| !matches!(s, Signal::Launch(_)))
        .count();
    assert_eq!(stops, 1);
}

#[tokio::test(start_paused = true)]
async fn never_started_handle_ignores_stop_requests() {
    let launcher = FakeLauncher::new();
    launcher.script("bad", Behavior::Exits(127));
    let mut process = spawn(launcher.as_ref(), "bad", "bad", Origin::Autostart);
    assert!(!process.await_start(Duration::from_secs(1)).await);
    assert_eq!(process.state(), ProcessState::Failed);

    process.terminate();
    process.kill();
    assert!(process.wait_for_exit(Duration::from_secs(1)).await);
    assert_eq!(launcher.signals(), vec![Signal::Launch("bad".into())]);
}

#[tokio::test(start_paused = true)]
async fn wait_for_exit_times_out_on_stubborn_process() {
    let launcher = FakeLauncher::new();
    launcher.script("stubborn", Behavior::IgnoresTerm);
    let mut process = spawn(launcher.as_ref(), "stubborn", "stubborn", Origin::System);
    assert!(process.await_start(Duration::from_secs(1)).await);

    process.terminate();
    assert!(!process.wait_for_exit(Duration::from_millis(500)).await);
    assert_eq!(process.state(), ProcessState::Running);

    process.kill();
    assert!(process.wait_for_exit(Duration::from_millis(500)).await);
    assert!(!process.state().is_live());
}

#[tokio::test(start_paused = true)]
async fn poll_observes_exit() {
    let launcher = FakeLauncher::new();
    launcher.script("short", Behavior::ExitsAfter(Duration::from_secs(1)));
    let mut process = spawn(launcher.as_ref(), "short", "short", Origin::Autostart);
    assert!(process.await_start(Duration::from_millis(10)).await);
    assert_eq!(process.poll(), ProcessState::Running);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(process.poll(), ProcessState::Exited(Some(0)));
    assert_eq!(process.snapshot().state, ProcessState::Exited(Some(0)));
}

#[tokio::test(start_paused = true)]
async fn table_keeps_registration_order() {
    let launcher = FakeLauncher::new();
    let mut table = ProcessTable::new();
    for key in ["compositor", "panel", "sleep 5"] {
        let origin = if key == "sleep 5" {
            Origin::Autostart
        } else {
            Origin::System
        };
        assert!(!table.register(spawn(launcher.as_ref(), key, "app", origin)));
    }

    assert_eq!(table.keys(), vec!["compositor", "panel", "sleep 5"]);
    assert_eq!(table.keys_for(Origin::Autostart), vec!["sleep 5"]);
    assert_eq!(table.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn duplicate_key_replaces_and_disposes_old_handle() {
    let launcher = FakeLauncher::new();
    let mut table = ProcessTable::new();

    let mut first = spawn(launcher.as_ref(), "panel", "panel-old", Origin::System);
    assert!(first.await_start(Duration::from_secs(1)).await);
    table.register(first);
    table.register(spawn(launcher.as_ref(), "other", "other", Origin::System));

    let replaced = table.register(spawn(launcher.as_ref(), "panel", "panel-new", Origin::System));

    assert!(replaced);
    assert_eq!(table.keys(), vec!["panel", "other"]);
    assert_eq!(
        table.get("panel").map(|p| p.spec().program.as_str()),
        Some("panel-new")
    );
    assert!(launcher.signals().contains(&Signal::Kill("panel-old".into())));
}

#[tokio::test(start_paused = true)]
async fn remove_drops_entry() {
    let launcher = FakeLauncher::new();
    let mut table = ProcessTable::new();
    table.register(spawn(launcher.as_ref(), "panel", "panel", Origin::System));

    let removed = table.remove("panel").expect("entry present");
    assert_eq!(removed.key(), "panel");
    assert!(table.is_empty());
    assert!(table.remove("panel").is_none());
}

#[tokio::test(start_paused = true)]
async fn snapshot_reports_command_and_origin() {
    let launcher = FakeLauncher::new();
    let mut table = ProcessTable::new();
    let process = ManagedProcess::spawn(
        launcher.as_ref(),
        "applet --tray",
        CommandSpec::new("applet", ["--tray"]),
        Origin::Autostart,
        OutputPolicy::Suppress,
    )
    .expect("fake spawn");
    table.register(process);

    let snapshot = table.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].key, "applet --tray");
    assert_eq!(snapshot[0].command, "applet --tray");
    assert_eq!(snapshot[0].origin, Origin::Autostart);
    assert_eq!(snapshot[0].state, ProcessState::Starting);
}
