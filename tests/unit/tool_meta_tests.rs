//! Unit tests for tool summaries and their aggregate formatting.

use serde_json::json;

use agent_relay::bridge::{format_tool_aggregate, infer_tool_meta};

#[test]
fn file_tools_report_their_path() {
    assert_eq!(
        infer_tool_meta("read", &json!({"path": "src/lib.rs"})).as_deref(),
        Some("src/lib.rs")
    );
    assert_eq!(
        infer_tool_meta("Edit", &json!({"file_path": "Cargo.toml"})).as_deref(),
        Some("Cargo.toml")
    );
    assert_eq!(
        infer_tool_meta("write_file", &json!({"path": "out.txt", "content": "x"})).as_deref(),
        Some("out.txt")
    );
}

#[test]
fn shell_tools_report_the_first_command_line() {
    assert_eq!(
        infer_tool_meta("bash", &json!({"command": "cargo fmt\ncargo test"})).as_deref(),
        Some("cargo fmt")
    );
}

#[test]
fn long_commands_are_truncated() {
    let command = "x".repeat(120);
    let meta = infer_tool_meta("exec", &json!({ "command": command })).unwrap_or_default();

    assert_eq!(meta.chars().count(), 81);
    assert!(meta.ends_with('…'));
}

#[test]
fn search_tools_combine_pattern_and_path() {
    assert_eq!(
        infer_tool_meta("grep", &json!({"pattern": "TODO", "path": "src"})).as_deref(),
        Some("TODO in src")
    );
    assert_eq!(
        infer_tool_meta("glob", &json!({"pattern": "**/*.rs"})).as_deref(),
        Some("**/*.rs")
    );
}

#[test]
fn web_tools_report_url_or_query() {
    assert_eq!(
        infer_tool_meta("web_fetch", &json!({"url": "https://docs.rs"})).as_deref(),
        Some("https://docs.rs")
    );
    assert_eq!(
        infer_tool_meta("web_search", &json!({"query": "tokio select"})).as_deref(),
        Some("tokio select")
    );
}

#[test]
fn unknown_tools_and_missing_args_have_no_meta() {
    assert_eq!(infer_tool_meta("deploy", &json!({"path": "x"})), None);
    assert_eq!(infer_tool_meta("read", &json!({})), None);
    assert_eq!(infer_tool_meta("read", &json!({"path": "   "})), None);
    assert_eq!(infer_tool_meta("bash", &serde_json::Value::Null), None);
}

#[test]
fn aggregate_lists_metas_after_the_name() {
    assert_eq!(format_tool_aggregate("read", &["a.rs", "b.rs"]), "read: a.rs, b.rs");
    assert_eq!(format_tool_aggregate::<&str>("bash", &[]), "bash");
    assert_eq!(format_tool_aggregate("edit", &["", "c.rs"]), "edit: c.rs");
}
