//! Unit tests for `AppError` display format and conversions.

use agent_relay::AppError;

#[test]
fn string_variants_are_prefixed_by_kind() {
    let cases = [
        (AppError::Config("bad".into()), "config: bad"),
        (AppError::Spawn("no such file".into()), "spawn: no such file"),
        (AppError::Io("pipe closed".into()), "io: pipe closed"),
        (AppError::Timeout("too slow".into()), "timeout: too slow"),
        (AppError::Bridge("stopped".into()), "bridge: stopped"),
        (AppError::Sink("rejected".into()), "sink: rejected"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn process_failure_with_exit_code_includes_stderr() {
    let err = AppError::ProcessFailed {
        code: Some(2),
        signal: None,
        stderr: "usage: agent".into(),
    };
    assert_eq!(err.to_string(), "process failed: exit code 2: usage: agent");
}

#[test]
fn process_failure_by_signal_names_the_signal() {
    let err = AppError::ProcessFailed {
        code: None,
        signal: Some("SIGTERM".into()),
        stderr: String::new(),
    };
    assert_eq!(err.to_string(), "process failed: signal SIGTERM");
}

#[test]
fn error_messages_have_no_trailing_period() {
    let err = AppError::Spawn("failed to spawn agent".into());
    let s = err.to_string();
    assert!(!s.ends_with('.'), "error message must not end with a period: {s}");
}

#[test]
fn io_error_converts_to_io_variant() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
    let err: AppError = io.into();
    assert!(matches!(err, AppError::Io(ref msg) if msg == "pipe closed"));
}

#[test]
fn toml_error_converts_to_config_variant() {
    let toml_err = toml::from_str::<toml::Value>("= nope").expect_err("invalid toml");
    let err: AppError = toml_err.into();
    assert!(err.to_string().starts_with("config: invalid config:"));
}

#[test]
fn app_error_is_a_std_error() {
    fn assert_error<E: std::error::Error>(_: &E) {}
    assert_error(&AppError::Io("x".into()));
}
