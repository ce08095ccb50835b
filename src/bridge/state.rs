//! Synchronous core of the agent event bridge.
//!
//! [`EventBridge`] reacts to one [`SessionEvent`] at a time. It owns the
//! rolling assistant-text buffer, the thinking stripper, and the tool
//! debounce queue, and fans results out to telemetry and sinks. The async
//! driver in [`crate::bridge`] feeds it events and timer expiries; tests can
//! drive it directly.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::bridge::debounce::{ToolDebounceQueue, DEFAULT_TOOL_DEBOUNCE};
use crate::bridge::media::extract_media;
use crate::bridge::session::{AgentMessage, AssistantUpdate, SessionEvent};
use crate::bridge::sink::{
    AgentStreamEvent, BridgeSink, ReplyPayload, TelemetryEmitter, TracingTelemetry,
};
use crate::bridge::thinking::{strip_thinking, ThinkingStripper};
use crate::bridge::tool_meta::{format_tool_aggregate, infer_tool_meta};

/// Whether each finished tool is also reported individually.
#[derive(Clone, Default)]
pub enum ToolResultVerbosity {
    /// Only debounced aggregates.
    #[default]
    Off,
    /// Every finished tool.
    On,
    /// Decided per tool result by the predicate.
    Predicate(Arc<dyn Fn() -> bool + Send + Sync>),
}

impl ToolResultVerbosity {
    fn enabled(&self) -> bool {
        match self {
            Self::Off => false,
            Self::On => true,
            Self::Predicate(predicate) => predicate(),
        }
    }
}

impl fmt::Debug for ToolResultVerbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("Off"),
            Self::On => f.write_str("On"),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Policy knobs for one attachment.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Identifier stamped on telemetry records.
    pub run_id: String,
    /// Quiet period before tool summaries are flushed.
    pub tool_debounce: Duration,
    /// Per-tool verbose delivery.
    pub verbose_tool_results: ToolResultVerbosity,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            tool_debounce: DEFAULT_TOOL_DEBOUNCE,
            verbose_tool_results: ToolResultVerbosity::Off,
        }
    }
}

/// Consumers of one attachment's output.
#[derive(Clone)]
pub struct BridgeSinks {
    /// Always-on telemetry.
    pub telemetry: Arc<dyn TelemetryEmitter>,
    /// Caller sinks, in delivery order.
    pub sinks: Vec<Arc<dyn BridgeSink>>,
}

impl Default for BridgeSinks {
    fn default() -> Self {
        Self {
            telemetry: Arc::new(TracingTelemetry),
            sinks: Vec::new(),
        }
    }
}

impl fmt::Debug for BridgeSinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeSinks")
            .field("sinks", &self.sinks.len())
            .finish_non_exhaustive()
    }
}

impl BridgeSinks {
    /// Telemetry plus caller sinks.
    #[must_use]
    pub fn new(telemetry: Arc<dyn TelemetryEmitter>, sinks: Vec<Arc<dyn BridgeSink>>) -> Self {
        Self { telemetry, sinks }
    }

    /// Default telemetry with one caller sink.
    #[must_use]
    pub fn with_sink(sink: Arc<dyn BridgeSink>) -> Self {
        Self {
            sinks: vec![sink],
            ..Self::default()
        }
    }
}

/// A finished tool and its summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolMeta {
    /// Tool name.
    pub tool_name: String,
    /// Summary, if one could be derived.
    pub meta: Option<String>,
}

/// Outputs readable while the bridge runs.
#[derive(Debug, Default)]
pub struct Collected {
    /// Cleaned text of each completed assistant message.
    pub texts: Vec<String>,
    /// Every finished tool, in completion order.
    pub tool_metas: Vec<ToolMeta>,
}

/// Shared handle to [`Collected`].
pub type SharedCollected = Arc<Mutex<Collected>>;

/// Per-attachment bridge state.
pub struct EventBridge {
    options: BridgeOptions,
    sinks: BridgeSinks,
    seq: u64,
    tool_metas_by_id: HashMap<String, Option<String>>,
    delta_buffer: String,
    stripper: ThinkingStripper,
    last_streamed: Option<String>,
    debounce: ToolDebounceQueue,
    collected: SharedCollected,
}

impl fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBridge")
            .field("run_id", &self.options.run_id)
            .field("seq", &self.seq)
            .field("pending_tools", &self.debounce.len())
            .finish_non_exhaustive()
    }
}

impl EventBridge {
    /// Fresh state for one attachment.
    #[must_use]
    pub fn new(options: BridgeOptions, sinks: BridgeSinks) -> Self {
        let debounce = ToolDebounceQueue::new(options.tool_debounce);
        Self {
            options,
            sinks,
            seq: 0,
            tool_metas_by_id: HashMap::new(),
            delta_buffer: String::new(),
            stripper: ThinkingStripper::new(),
            last_streamed: None,
            debounce,
            collected: SharedCollected::default(),
        }
    }

    /// Shared view of collected texts and tool metas.
    #[must_use]
    pub fn collected(&self) -> SharedCollected {
        Arc::clone(&self.collected)
    }

    /// Snapshot of collected assistant texts.
    #[must_use]
    pub fn collected_texts(&self) -> Vec<String> {
        lock(&self.collected).texts.clone()
    }

    /// Snapshot of collected tool metas.
    #[must_use]
    pub fn collected_tool_metas(&self) -> Vec<ToolMeta> {
        lock(&self.collected).tool_metas.clone()
    }

    /// When the pending tool summary is due, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// Handle one session event observed at `now`.
    pub fn handle_event(&mut self, event: SessionEvent, now: Instant) {
        match event {
            SessionEvent::ToolExecutionStart {
                tool_call_id,
                tool_name,
                args,
            } => self.on_tool_start(tool_call_id, &tool_name, &args),
            SessionEvent::ToolExecutionEnd {
                tool_call_id,
                tool_name,
                is_error,
                ..
            } => self.on_tool_end(&tool_call_id, &tool_name, is_error, now),
            SessionEvent::MessageStart { message } => {
                if message.is_assistant() {
                    self.reset_stream();
                }
            }
            SessionEvent::MessageUpdate { message, update } => {
                if message.is_assistant() {
                    self.on_assistant_update(&update);
                }
            }
            SessionEvent::MessageEnd { message } => {
                if message.is_assistant() {
                    self.on_assistant_end(&message);
                }
            }
            SessionEvent::AgentEnd => {
                self.flush_tools();
                self.emit_telemetry("lifecycle", json!({ "phase": "end" }));
            }
        }
    }

    /// Flush the pending tool summary if its deadline has passed.
    pub fn poll_timer(&mut self, now: Instant) {
        if self.debounce.is_due(now) {
            self.flush_tools();
        }
    }

    /// Deliver any pending tool summary now, regardless of the deadline.
    pub fn flush_tools(&mut self) {
        let Some(summary) = self.debounce.drain() else {
            return;
        };
        debug!(
            run_id = self.options.run_id.as_str(),
            summary = summary.as_str(),
            "flushing tool summary"
        );
        let reply = ReplyPayload::text(summary);
        for sink in &self.sinks.sinks {
            if let Err(err) = sink.on_partial_reply(&reply) {
                warn!(%err, "sink rejected tool summary");
            }
        }
    }

    // ── Tool events ──────────────────────────────────────────────────────────

    fn on_tool_start(&mut self, tool_call_id: String, tool_name: &str, args: &Value) {
        let meta = infer_tool_meta(tool_name, args);
        let data = json!({
            "phase": "start",
            "name": tool_name,
            "toolCallId": tool_call_id,
            "args": args,
        });
        self.tool_metas_by_id.insert(tool_call_id, meta);
        self.publish("tool", &data);
    }

    fn on_tool_end(&mut self, tool_call_id: &str, tool_name: &str, is_error: bool, now: Instant) {
        let meta = self.tool_metas_by_id.remove(tool_call_id).flatten();

        lock(&self.collected).tool_metas.push(ToolMeta {
            tool_name: tool_name.to_owned(),
            meta: meta.clone(),
        });
        self.debounce.push(tool_name, meta.clone(), now);

        let data = json!({
            "phase": "result",
            "name": tool_name,
            "toolCallId": tool_call_id,
            "meta": meta,
            "isError": is_error,
        });
        self.publish("tool", &data);

        if self.options.verbose_tool_results.enabled() {
            let reply = ReplyPayload::text(format_tool_aggregate(tool_name, meta.as_slice()));
            for sink in &self.sinks.sinks {
                if let Err(err) = sink.on_tool_result(&reply) {
                    debug!(%err, "tool result delivery failed");
                }
            }
        }
    }

    // ── Assistant text ───────────────────────────────────────────────────────

    fn on_assistant_update(&mut self, update: &AssistantUpdate) {
        let chunk = match update {
            AssistantUpdate::TextDelta { delta } => delta.as_str(),
            AssistantUpdate::TextStart { content } | AssistantUpdate::TextEnd { content } => {
                unseen_suffix(&self.delta_buffer, content)
            }
            AssistantUpdate::Other => return,
        };
        if chunk.is_empty() {
            return;
        }

        let chunk = chunk.to_owned();
        self.delta_buffer.push_str(&chunk);
        self.stripper.push(&chunk);

        let cleaned = self.stripper.visible().trim();
        if cleaned.is_empty() || self.last_streamed.as_deref() == Some(cleaned) {
            return;
        }
        let cleaned = cleaned.to_owned();
        self.last_streamed = Some(cleaned.clone());

        let split = extract_media(&cleaned);
        let data = json!({
            "text": split.text,
            "delta": chunk,
            "mediaUrls": split.media_urls,
        });
        self.publish("assistant", &data);

        let reply = ReplyPayload {
            text: split.text,
            media_urls: split.media_urls,
        };
        for sink in &self.sinks.sinks {
            if let Err(err) = sink.on_partial_reply(&reply) {
                warn!(%err, "sink rejected partial reply");
            }
        }
    }

    fn on_assistant_end(&mut self, message: &AgentMessage) {
        let text = strip_thinking(&message.text()).trim().to_owned();
        if !text.is_empty() {
            lock(&self.collected).texts.push(text);
        }
        self.reset_stream();
    }

    fn reset_stream(&mut self) {
        self.delta_buffer.clear();
        self.stripper.reset();
        self.last_streamed = None;
    }

    // ── Fan-out ──────────────────────────────────────────────────────────────

    /// Emit to telemetry and forward to every sink's structured channel.
    fn publish(&mut self, stream: &str, data: &Value) {
        self.emit_telemetry(stream, data.clone());
        for sink in &self.sinks.sinks {
            if let Err(err) = sink.on_agent_event(stream, data) {
                warn!(%err, stream, "sink rejected agent event");
            }
        }
    }

    fn emit_telemetry(&mut self, stream: &str, data: Value) {
        self.seq += 1;
        self.sinks.telemetry.emit(&AgentStreamEvent {
            run_id: self.options.run_id.clone(),
            seq: self.seq,
            stream: stream.to_owned(),
            ts: Utc::now(),
            data,
        });
    }
}

/// The part of a block's full `content` not yet in `buffer`.
///
/// Start/end events repeat text already streamed as deltas; only genuinely
/// new text is appended.
fn unseen_suffix<'a>(buffer: &str, content: &'a str) -> &'a str {
    if let Some(rest) = content.strip_prefix(buffer) {
        rest
    } else if buffer.contains(content) {
        ""
    } else {
        content
    }
}

fn lock(collected: &SharedCollected) -> std::sync::MutexGuard<'_, Collected> {
    collected.lock().unwrap_or_else(PoisonError::into_inner)
}
