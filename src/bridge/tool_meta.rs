//! Short human-readable summaries of tool invocations.

use serde_json::Value;

/// Longest command excerpt kept in a meta string.
const MAX_COMMAND_CHARS: usize = 80;

/// Derive a one-line summary of what a tool call is doing, e.g. the path a
/// `read` touches or the command a `bash` call runs.
///
/// Returns `None` for tools without a known summary.
#[must_use]
pub fn infer_tool_meta(tool_name: &str, args: &Value) -> Option<String> {
    let name = tool_name.to_ascii_lowercase();
    match name.as_str() {
        "read" | "write" | "edit" | "read_file" | "write_file" | "edit_file" => {
            string_arg(args, &["path", "file_path"]).map(str::to_owned)
        }
        "bash" | "exec" | "shell" => string_arg(args, &["command", "cmd"]).map(command_excerpt),
        "grep" | "glob" | "find" | "search" => {
            let pattern = string_arg(args, &["pattern", "query"])?;
            Some(match string_arg(args, &["path"]) {
                Some(path) => format!("{pattern} in {path}"),
                None => pattern.to_owned(),
            })
        }
        "web_fetch" | "fetch" => string_arg(args, &["url"]).map(str::to_owned),
        "web_search" => string_arg(args, &["query"]).map(str::to_owned),
        _ => None,
    }
}

/// Render one tool and its metas as a single line.
///
/// `read` with metas `a.rs`, `b.rs` becomes `read: a.rs, b.rs`; with no
/// metas it is just `read`.
#[must_use]
pub fn format_tool_aggregate<S: AsRef<str>>(tool_name: &str, metas: &[S]) -> String {
    let metas: Vec<&str> = metas
        .iter()
        .map(AsRef::as_ref)
        .filter(|meta| !meta.is_empty())
        .collect();
    if metas.is_empty() {
        tool_name.to_owned()
    } else {
        format!("{tool_name}: {}", metas.join(", "))
    }
}

fn string_arg<'a>(args: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| args.get(*key).and_then(Value::as_str))
        .find(|value| !value.trim().is_empty())
}

fn command_excerpt(command: &str) -> String {
    let first_line = command.lines().next().unwrap_or_default().trim();
    if first_line.chars().count() <= MAX_COMMAND_CHARS {
        first_line.to_owned()
    } else {
        let cut: String = first_line.chars().take(MAX_COMMAND_CHARS).collect();
        format!("{cut}…")
    }
}
