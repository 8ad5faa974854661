//! Unit tests for command specs and process lifecycle models.

use prts_session::models::command::CommandSpec;
use prts_session::models::process::{Origin, OutputPolicy, ProcessState};

#[test]
fn parse_line_splits_like_a_shell() {
    let spec = CommandSpec::parse_line(r#"notify-send --app "Session Bar" 'hello world'"#)
        .expect("valid line");
    assert_eq!(spec.program, "notify-send");
    assert_eq!(spec.args, vec!["--app", "Session Bar", "hello world"]);
}

#[test]
fn parse_line_rejects_empty_and_unbalanced_lines() {
    assert!(CommandSpec::parse_line("   ").is_err());
    assert!(CommandSpec::parse_line("echo 'open").is_err());
}

#[test]
fn display_quotes_arguments_with_spaces() {
    let spec = CommandSpec::new("sh", ["-c", "sleep 600"]);
    assert_eq!(spec.to_string(), "sh -c 'sleep 600'");
    assert_eq!(CommandSpec::parse_line(&spec.to_string()).expect("reparse"), spec);
}

#[test]
fn command_spec_deserializes_without_args() {
    let spec: CommandSpec = toml::from_str("program = \"firefox\"").expect("valid toml");
    assert_eq!(spec, CommandSpec::new("firefox", Vec::<String>::new()));
}

#[test]
fn live_states() {
    assert!(ProcessState::Starting.is_live());
    assert!(ProcessState::Running.is_live());
    assert!(!ProcessState::Exited(Some(0)).is_live());
    assert!(!ProcessState::Failed.is_live());
}

#[test]
fn transitions_only_move_forward() {
    assert!(ProcessState::Starting.can_transition_to(ProcessState::Running));
    assert!(ProcessState::Starting.can_transition_to(ProcessState::Failed));
    assert!(ProcessState::Running.can_transition_to(ProcessState::Exited(None)));
    assert!(!ProcessState::Running.can_transition_to(ProcessState::Starting));
    assert!(!ProcessState::Exited(Some(1)).can_transition_to(ProcessState::Running));
    assert!(!ProcessState::Failed.can_transition_to(ProcessState::Running));
}

#[test]
fn state_serializes_with_exit_code() {
    let json = serde_json::to_value(ProcessState::Exited(Some(3))).expect("serialize");
    assert_eq!(json, serde_json::json!({ "state": "exited", "code": 3 }));
    let json = serde_json::to_value(ProcessState::Running).expect("serialize");
    assert_eq!(json, serde_json::json!({ "state": "running" }));
}

#[test]
fn origin_and_output_use_snake_case() {
    assert_eq!(
        serde_json::to_value(Origin::Autostart).expect("serialize"),
        serde_json::json!("autostart")
    );
    assert_eq!(OutputPolicy::default(), OutputPolicy::Forward);
    let policy: OutputPolicy = serde_json::from_str("\"suppress\"").expect("deserialize");
    assert_eq!(policy, OutputPolicy::Suppress);
}
