//! Output interfaces of the event bridge.
//!
//! Two kinds of consumer receive bridge output:
//!
//! - a single [`TelemetryEmitter`], called for every `tool`, `assistant`
//!   and `lifecycle` event whether or not any sink is registered;
//! - zero or more [`BridgeSink`]s supplied by the caller. Each method
//!   defaults to a no-op, so a sink implements only what it consumes.
//!
//! Sink errors never stop the bridge: they are logged and the remaining
//! sinks still receive the delivery.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::Result;

/// Text (and optional attachments) bound for a human-facing channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplyPayload {
    /// Message text.
    pub text: String,
    /// Media references extracted from the text.
    #[serde(rename = "mediaUrls", skip_serializing_if = "Vec::is_empty")]
    pub media_urls: Vec<String>,
}

impl ReplyPayload {
    /// Text-only payload.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media_urls: Vec::new(),
        }
    }
}

/// Caller-supplied consumer of bridge output.
pub trait BridgeSink: Send + Sync {
    /// Cleaned assistant text so far, or a debounced tool summary.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the bridge logs and continues.
    fn on_partial_reply(&self, _reply: &ReplyPayload) -> Result<()> {
        Ok(())
    }

    /// Summary of a single finished tool, when verbose tool results are on.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the bridge discards the error.
    fn on_tool_result(&self, _reply: &ReplyPayload) -> Result<()> {
        Ok(())
    }

    /// Structured event on `stream` (`tool` or `assistant`).
    ///
    /// # Errors
    ///
    /// Implementations may fail; the bridge logs and continues.
    fn on_agent_event(&self, _stream: &str, _data: &Value) -> Result<()> {
        Ok(())
    }
}

/// One telemetry record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStreamEvent {
    /// Run the event belongs to.
    #[serde(rename = "runId")]
    pub run_id: String,
    /// Position within the run, starting at 1.
    pub seq: u64,
    /// Stream name: `tool`, `assistant`, or `lifecycle`.
    pub stream: String,
    /// Emission time.
    pub ts: DateTime<Utc>,
    /// Stream-specific payload.
    pub data: Value,
}

/// Unconditional observer of bridge events.
pub trait TelemetryEmitter: Send + Sync {
    /// Record one event.
    fn emit(&self, event: &AgentStreamEvent);
}

/// Telemetry that writes every event to the `tracing` pipeline at `DEBUG`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetryEmitter for TracingTelemetry {
    fn emit(&self, event: &AgentStreamEvent) {
        debug!(
            run_id = event.run_id.as_str(),
            seq = event.seq,
            stream = event.stream.as_str(),
            data = %event.data,
            "agent event"
        );
    }
}
