//! Stateful stream-json accumulator.
//!
//! A [`StreamAccumulator`] is fed one stdout line at a time. It keeps the
//! tool-call registry, the running assistant text, and the latest session
//! id and usage, and reports each event to a [`StreamObserver`] as it is
//! decoded.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use crate::protocol::event::{parse_line, ProtocolEvent, Usage, UNKNOWN_TOOL};

/// Tool invocation reported to [`StreamObserver::on_tool_use`].
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUseNotice {
    /// Tool name.
    pub name: String,
    /// Call id.
    pub tool_call_id: String,
    /// Invocation payload.
    pub args: Value,
}

/// Tool completion reported to [`StreamObserver::on_tool_result`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResultNotice {
    /// Tool name resolved through the registry.
    pub name: String,
    /// Call id.
    pub tool_call_id: String,
    /// Whether the tool reported failure.
    pub is_error: bool,
    /// Result text.
    pub result: String,
}

/// Per-event callbacks. Every method defaults to a no-op; `()` observes
/// nothing.
pub trait StreamObserver {
    /// One non-empty assistant text fragment, in arrival order.
    fn on_assistant_text(&mut self, _text: &str) {}

    /// A tool was invoked.
    fn on_tool_use(&mut self, _notice: &ToolUseNotice) {}

    /// A tool finished.
    fn on_tool_result(&mut self, _notice: &ToolResultNotice) {}
}

impl StreamObserver for () {}

/// Append-only map from tool-call id to tool name, scoped to one run.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    names: HashMap<String, String>,
}

impl ToolRegistry {
    /// Record that `tool_call_id` refers to `name`.
    pub fn register(&mut self, tool_call_id: impl Into<String>, name: impl Into<String>) {
        self.names.insert(tool_call_id.into(), name.into());
    }

    /// Tool name for `tool_call_id`, or [`UNKNOWN_TOOL`].
    #[must_use]
    pub fn resolve(&self, tool_call_id: &str) -> &str {
        self.names
            .get(tool_call_id)
            .map_or(UNKNOWN_TOOL, String::as_str)
    }

    /// Number of registered calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no call has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Snapshot of a run's accumulated output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateOutput {
    /// Final text: the `result` event's text if one arrived, otherwise every
    /// assistant fragment concatenated.
    pub text: String,
    /// Last session id seen.
    pub session_id: Option<String>,
    /// Last usage seen.
    pub usage: Option<Usage>,
}

/// Line-at-a-time stream-json consumer.
#[derive(Debug, Default)]
pub struct StreamAccumulator<O = ()> {
    observer: O,
    registry: ToolRegistry,
    output: AggregateOutput,
}

impl StreamAccumulator<()> {
    /// Accumulator without an observer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<O: StreamObserver> StreamAccumulator<O> {
    /// Accumulator reporting to `observer`.
    #[must_use]
    pub fn with_observer(observer: O) -> Self {
        Self {
            observer,
            registry: ToolRegistry::default(),
            output: AggregateOutput::default(),
        }
    }

    /// Process one line. Undecodable lines leave the state untouched.
    pub fn consume(&mut self, line: &str) {
        if let Some(event) = parse_line(line) {
            self.apply(event);
        }
    }

    /// Apply an already-decoded event.
    pub fn apply(&mut self, event: ProtocolEvent) {
        match event {
            ProtocolEvent::System { session_id } => {
                if session_id.is_some() {
                    self.output.session_id = session_id;
                }
            }
            ProtocolEvent::Assistant { text_blocks } => {
                for text in text_blocks.iter().filter(|text| !text.is_empty()) {
                    self.output.text.push_str(text);
                    self.observer.on_assistant_text(text);
                }
            }
            ProtocolEvent::ToolUse {
                tool_call_id,
                name,
                args,
            } => {
                trace!(tool_call_id = tool_call_id.as_str(), name = name.as_str(), "tool use");
                self.registry.register(tool_call_id.clone(), name.clone());
                self.observer.on_tool_use(&ToolUseNotice {
                    name,
                    tool_call_id,
                    args,
                });
            }
            ProtocolEvent::ToolResult {
                tool_call_id,
                is_error,
                result_text,
            } => {
                let name = self.registry.resolve(&tool_call_id).to_owned();
                trace!(
                    tool_call_id = tool_call_id.as_str(),
                    name = name.as_str(),
                    is_error,
                    "tool result"
                );
                self.observer.on_tool_result(&ToolResultNotice {
                    name,
                    tool_call_id,
                    is_error,
                    result: result_text,
                });
            }
            ProtocolEvent::Result {
                final_text,
                session_id,
                usage,
            } => {
                if let Some(text) = final_text.filter(|text| !text.is_empty()) {
                    self.output.text = text;
                }
                if session_id.is_some() {
                    self.output.session_id = session_id;
                }
                if usage.is_some() {
                    self.output.usage = usage;
                }
            }
        }
    }

    /// Current aggregate. Pure read; may be called any number of times.
    #[must_use]
    pub fn finalize(&self) -> AggregateOutput {
        self.output.clone()
    }

    /// Tool name registered for `tool_call_id`, or `"unknown"`.
    #[must_use]
    pub fn resolve_tool_name(&self, tool_call_id: &str) -> &str {
        self.registry.resolve(tool_call_id)
    }

    /// The observer.
    #[must_use]
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Consume the accumulator, returning the observer.
    #[must_use]
    pub fn into_observer(self) -> O {
        self.observer
    }
}
