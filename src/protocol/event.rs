//! Stream-json line decoding.
//!
//! Each line emitted by an agent CLI in stream-json mode is one JSON object
//! tagged by a string `type` field:
//!
//! | `type`        | Maps to                         |
//! |---------------|---------------------------------|
//! | `system`      | [`ProtocolEvent::System`]       |
//! | `assistant`   | [`ProtocolEvent::Assistant`]    |
//! | `tool_use`    | [`ProtocolEvent::ToolUse`]      |
//! | `tool_result` | [`ProtocolEvent::ToolResult`]   |
//! | `result`      | [`ProtocolEvent::Result`]       |
//! | *(any other)* | Skipped                         |
//!
//! Lines that are not JSON or lack a string `type` are skipped. Skipping is
//! the protocol's compatibility rule, so [`parse_line`] returns `None`
//! rather than an error. Optional fields are read one by one: a field of the
//! wrong JSON type counts as absent and the rest of the event survives.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::trace;

/// Tool name reported for a call id that was never registered.
pub const UNKNOWN_TOOL: &str = "unknown";

/// Token counts reported by a `result` event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    /// Prompt/input tokens.
    pub input: Option<u64>,
    /// Completion/output tokens.
    pub output: Option<u64>,
}

/// One decoded stream-json event.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    /// Session bootstrap.
    System {
        /// Session identifier, if the agent reported one.
        session_id: Option<String>,
    },
    /// Assistant message; only non-empty text blocks are kept, in order.
    Assistant {
        /// Text fragments.
        text_blocks: Vec<String>,
    },
    /// The agent invoked a tool.
    ToolUse {
        /// Call id correlating this invocation with its result.
        tool_call_id: String,
        /// Tool name.
        name: String,
        /// Invocation payload; `Null` when absent.
        args: Value,
    },
    /// A tool invocation finished.
    ToolResult {
        /// Call id of the matching [`ProtocolEvent::ToolUse`].
        tool_call_id: String,
        /// Whether the tool reported failure.
        is_error: bool,
        /// Result rendered as text.
        result_text: String,
    },
    /// Final event of a run.
    Result {
        /// Final answer text, when present and non-empty.
        final_text: Option<String>,
        /// Session identifier, if reported.
        session_id: Option<String>,
        /// Token usage, if reported.
        usage: Option<Usage>,
    },
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    System(WireSystem),
    Assistant(WireAssistant),
    ToolUse(WireToolUse),
    ToolResult(WireToolResult),
    Result(WireResult),
}

#[derive(Debug, Deserialize)]
struct WireSystem {
    #[serde(default, deserialize_with = "lenient")]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireAssistant {
    #[serde(default, deserialize_with = "lenient")]
    message: Option<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default, deserialize_with = "lenient")]
    content: Option<WireContent>,
}

/// Message content is either a plain string or a list of typed blocks.
/// Blocks stay as raw JSON so non-text kinds never fail the line.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Blocks(Vec<Value>),
}

#[derive(Debug, Deserialize)]
struct WireToolUse {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    tool_use_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    name: Option<String>,
    input: Option<Value>,
    arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireToolResult {
    #[serde(default, deserialize_with = "lenient")]
    tool_use_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    is_error: Option<bool>,
    content: Option<Value>,
    output: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireResult {
    #[serde(default, deserialize_with = "lenient")]
    result: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    session_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default, deserialize_with = "lenient")]
    input_tokens: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    input: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    output_tokens: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    output: Option<u64>,
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Decode one stream-json line.
///
/// Returns `None` for empty lines, non-JSON, and missing or unknown `type`
/// values.
#[must_use]
pub fn parse_line(line: &str) -> Option<ProtocolEvent> {
    if line.trim().is_empty() {
        return None;
    }

    match serde_json::from_str::<WireEvent>(line) {
        Ok(wire) => Some(wire.into()),
        Err(err) => {
            trace!(%err, "skipping undecodable stream-json line");
            None
        }
    }
}

impl From<WireEvent> for ProtocolEvent {
    fn from(wire: WireEvent) -> Self {
        match wire {
            WireEvent::System(system) => Self::System {
                session_id: system.session_id,
            },
            WireEvent::Assistant(assistant) => Self::Assistant {
                text_blocks: assistant
                    .message
                    .and_then(|message| message.content)
                    .map(text_blocks)
                    .unwrap_or_default(),
            },
            WireEvent::ToolUse(tool) => Self::ToolUse {
                tool_call_id: tool.id.or(tool.tool_use_id).unwrap_or_default(),
                name: tool.name.unwrap_or_else(|| UNKNOWN_TOOL.to_owned()),
                args: tool.input.or(tool.arguments).unwrap_or(Value::Null),
            },
            WireEvent::ToolResult(tool) => Self::ToolResult {
                tool_call_id: tool.tool_use_id.or(tool.id).unwrap_or_default(),
                is_error: tool.is_error.unwrap_or(false),
                result_text: result_text(tool.content, tool.output),
            },
            WireEvent::Result(result) => Self::Result {
                final_text: result.result.filter(|text| !text.is_empty()),
                session_id: result.session_id,
                usage: result.usage.map(|usage| Usage {
                    input: usage.input_tokens.or(usage.input),
                    output: usage.output_tokens.or(usage.output),
                }),
            },
        }
    }
}

// ── Private helpers ──────────────────────────────────────────────────────────

/// Read an optional field, treating a value of the wrong type as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

fn text_blocks(content: WireContent) -> Vec<String> {
    match content {
        WireContent::Text(text) if text.is_empty() => Vec::new(),
        WireContent::Text(text) => vec![text],
        WireContent::Blocks(blocks) => blocks
            .iter()
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .filter(|text| !text.is_empty())
            .map(str::to_owned)
            .collect(),
    }
}

/// Render a tool result payload as text.
///
/// A string `content` wins, then a string `output`. Otherwise the first
/// present payload is serialized as compact JSON. With no payload at all
/// the result is the empty string.
fn result_text(content: Option<Value>, output: Option<Value>) -> String {
    match (content, output) {
        (Some(Value::String(text)), _) | (_, Some(Value::String(text))) => text,
        (Some(payload), _) | (None, Some(payload)) => payload.to_string(),
        (None, None) => String::new(),
    }
}
