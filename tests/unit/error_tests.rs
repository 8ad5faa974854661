//! Unit tests for `AppError` display format and conversions.

use prts_session::AppError;

#[test]
fn display_prefixes_identify_the_failure_kind() {
    let cases = [
        (AppError::Config("x".into()), "config: x"),
        (AppError::Spawn("x".into()), "spawn failure: x"),
        (AppError::StartTimeout("x".into()), "start timeout: x"),
        (AppError::ReadinessTimeout("x".into()), "readiness timeout: x"),
        (AppError::ConfigUnavailable("x".into()), "config unavailable: x"),
        (AppError::TerminationTimeout("x".into()), "termination timeout: x"),
        (AppError::DuplicateKey("x".into()), "duplicate key: x"),
        (AppError::NotFound("x".into()), "not found: x"),
        (AppError::Ipc("x".into()), "ipc: x"),
        (AppError::Io("x".into()), "io: x"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn io_errors_convert_to_io_variant() {
    let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(err, AppError::Io(ref msg) if msg == "gone"));
}

#[test]
fn toml_errors_convert_to_config_variant() {
    let toml_err = toml::from_str::<toml::Value>("= nope").expect_err("invalid toml");
    let err: AppError = toml_err.into();
    assert!(matches!(err, AppError::Config(_)));
}
