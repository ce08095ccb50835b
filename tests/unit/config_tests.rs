//! Unit tests for relay configuration parsing and validation.

use std::io::Write;
use std::time::Duration;

use agent_relay::bridge::ToolResultVerbosity;
use agent_relay::process::{EnvPolicy, InvocationDescriptor};
use agent_relay::{AppError, RelayConfig};

#[test]
fn empty_config_yields_defaults() {
    let config = RelayConfig::from_toml_str("").expect("empty config is valid");

    assert_eq!(config, RelayConfig::default());
    assert_eq!(config.timeout(), Duration::from_secs(600));
    assert_eq!(config.env_policy(), EnvPolicy::Inherit);
    assert_eq!(config.bridge.tool_debounce_ms, 500);
    assert!(!config.bridge.verbose_tool_results);
}

#[test]
fn full_config_is_parsed() {
    let raw = r"
        [process]
        timeout_seconds = 30
        inherit_env = false

        [bridge]
        tool_debounce_ms = 250
        verbose_tool_results = true
    ";
    let config = RelayConfig::from_toml_str(raw).expect("valid config");

    assert_eq!(config.timeout(), Duration::from_secs(30));
    assert_eq!(config.env_policy(), EnvPolicy::Allowlist);

    let options = config.bridge_options();
    assert_eq!(options.tool_debounce, Duration::from_millis(250));
    assert!(matches!(
        options.verbose_tool_results,
        ToolResultVerbosity::On
    ));
}

#[test]
fn partial_section_keeps_other_defaults() {
    let config = RelayConfig::from_toml_str("[process]\ntimeout_seconds = 5\n").expect("valid");

    assert_eq!(config.process.timeout_seconds, 5);
    assert!(config.process.inherit_env);
    assert_eq!(config.bridge.tool_debounce_ms, 500);
}

#[test]
fn zero_timeout_is_rejected() {
    let err = RelayConfig::from_toml_str("[process]\ntimeout_seconds = 0\n")
        .expect_err("zero timeout must fail validation");

    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("timeout_seconds")));
}

#[test]
fn malformed_toml_is_a_config_error() {
    let err = RelayConfig::from_toml_str("[process\ntimeout_seconds = ").expect_err("invalid");
    assert!(err.to_string().starts_with("config: invalid config"));
}

#[test]
fn wrong_field_type_is_a_config_error() {
    let err = RelayConfig::from_toml_str("[bridge]\ntool_debounce_ms = \"fast\"\n")
        .expect_err("string debounce must fail");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn apply_to_sets_timeout_and_env_policy() {
    let config =
        RelayConfig::from_toml_str("[process]\ntimeout_seconds = 12\ninherit_env = false\n")
            .expect("valid");
    let descriptor = config.apply_to(InvocationDescriptor::new("agent", ["--print"]));

    assert_eq!(descriptor.timeout(), Duration::from_secs(12));
    assert_eq!(descriptor.env_policy(), EnvPolicy::Allowlist);
    assert_eq!(descriptor.program(), "agent");
    assert_eq!(descriptor.args(), ["--print".to_owned()]);
}

#[test]
fn bridge_options_get_fresh_run_ids() {
    let config = RelayConfig::default();
    assert_ne!(config.bridge_options().run_id, config.bridge_options().run_id);
}

#[test]
fn load_from_path_reads_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[bridge]\ntool_debounce_ms = 100").expect("write config");

    let config = RelayConfig::load_from_path(file.path()).expect("load config");
    assert_eq!(config.bridge.tool_debounce_ms, 100);
}

#[test]
fn load_from_missing_path_is_a_config_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = RelayConfig::load_from_path(dir.path().join("missing.toml"))
        .expect_err("missing file must fail");

    assert!(matches!(err, AppError::Config(ref msg) if msg.starts_with("failed to read config")));
}
