//! Unit tests for the command registry: command file, keys and the
//! built-in service list.

use std::fs;

use prts_session::models::command::CommandSpec;
use prts_session::registry::command_file::{parse_config_file, parse_config_lines};
use prts_session::registry::services::static_service_list;
use prts_session::registry::{
    assign_keys, load_autostart_commands, next_free_key, service_commands,
};

#[test]
fn comment_and_blank_lines_are_discarded() {
    let raw = "first\n# one\n\nsecond\n   # two\n\t\nthird\n#three\n";
    assert_eq!(parse_config_lines(raw), vec!["first", "second", "third"]);
}

#[test]
fn missing_command_file_yields_empty_sequence() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(parse_config_file(&dir.path().join("absent.conf")).is_empty());
}

#[test]
fn command_file_keeps_file_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("autostart.conf");
    fs::write(&path, "  b --x  \na\n# c\n").expect("write");
    assert_eq!(parse_config_file(&path), vec!["b --x", "a"]);
}

#[test]
fn duplicate_lines_get_distinct_keys() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("autostart.conf");
    fs::write(&path, "sleep 5\n# x\nsleep 5\n").expect("write");

    let commands = load_autostart_commands(&[], Some(path.as_path()));

    let keys: Vec<&str> = commands.iter().map(|c| c.key.as_str()).collect();
    assert_eq!(keys, vec!["sleep 5", "sleep 5#2"]);
    assert!(commands
        .iter()
        .all(|c| c.spec == CommandSpec::new("sleep", ["5"])));
}

#[test]
fn descriptors_come_before_command_file_lines() {
    let dir = tempfile::tempdir().expect("tempdir");
    let descriptors = dir.path().join("autostart");
    fs::create_dir(&descriptors).expect("mkdir");
    fs::write(
        descriptors.join("clock.desktop"),
        "[Desktop Entry]\nExec=clock --seconds\n",
    )
    .expect("write descriptor");
    let command_file = dir.path().join("autostart.conf");
    fs::write(&command_file, "tray\n").expect("write");

    let commands = load_autostart_commands(&[descriptors], Some(command_file.as_path()));

    let keys: Vec<&str> = commands.iter().map(|c| c.key.as_str()).collect();
    assert_eq!(keys, vec!["clock --seconds", "tray"]);
}

#[test]
fn unparsable_lines_are_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("autostart.conf");
    fs::write(&path, "echo \"unterminated\nvalid --flag\n").expect("write");

    let commands = load_autostart_commands(&[], Some(path.as_path()));

    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].key, "valid --flag");
}

#[test]
fn assign_keys_numbers_each_repeat() {
    let spec = CommandSpec::new("x", Vec::<String>::new());
    let keyed = assign_keys(vec![
        ("x".to_owned(), spec.clone()),
        ("y".to_owned(), spec.clone()),
        ("x".to_owned(), spec.clone()),
        ("x".to_owned(), spec),
    ]);
    let keys: Vec<&str> = keyed.iter().map(|c| c.key.as_str()).collect();
    assert_eq!(keys, vec!["x", "y", "x#2", "x#3"]);
}

#[test]
fn services_are_keyed_by_program_in_order() {
    let services = vec![
        CommandSpec::new("panel", ["--top"]),
        CommandSpec::new("notifier", Vec::<String>::new()),
    ];
    let keyed = service_commands(&services);
    let keys: Vec<&str> = keyed.iter().map(|c| c.key.as_str()).collect();
    assert_eq!(keys, vec!["panel", "notifier"]);
    assert_eq!(keyed[0].spec, services[0]);
}

#[test]
fn static_service_list_is_not_empty() {
    let list = static_service_list();
    assert_eq!(list, vec![CommandSpec::new("firefox", Vec::<String>::new())]);
}

#[test]
fn literal_suffix_lines_never_share_a_key() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("autostart.conf");
    fs::write(&path, "sleep 5#2\nsleep 5\nsleep 5\n").expect("write");

    let commands = load_autostart_commands(&[], Some(path.as_path()));

    let keys: Vec<&str> = commands.iter().map(|c| c.key.as_str()).collect();
    assert_eq!(keys, vec!["sleep 5#2", "sleep 5", "sleep 5#3"]);
}

#[test]
fn next_free_key_skips_every_taken_candidate() {
    let taken = ["firefox", "firefox#2"];
    assert_eq!(
        next_free_key("firefox", |k| taken.contains(&k)),
        "firefox#3"
    );
    assert_eq!(next_free_key("panel", |k| taken.contains(&k)), "panel");
}
