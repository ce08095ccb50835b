//! Shared test doubles for integration tests.
//!
//! Provides a recording stream observer, a recording bridge sink, and a
//! helper that writes a stream-json transcript to a temp file so a plain
//! `cat` can stand in for an agent CLI.

use std::io::Write;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tempfile::NamedTempFile;

use agent_relay::bridge::{BridgeSink, ReplyPayload};
use agent_relay::protocol::{StreamObserver, ToolResultNotice, ToolUseNotice};
use agent_relay::Result;

/// Observer that records callbacks, optionally mirroring assistant text into
/// a log shared with other observers.
#[derive(Debug, Default)]
pub struct Recorder {
    pub label: String,
    pub shared: Option<Arc<Mutex<Vec<String>>>>,
    pub texts: Vec<String>,
    pub tool_uses: Vec<ToolUseNotice>,
    pub tool_results: Vec<ToolResultNotice>,
}

impl Recorder {
    /// Recorder that also appends `"{label}:{text}"` to `shared`.
    pub fn shared(label: &str, shared: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            label: label.to_owned(),
            shared: Some(Arc::clone(shared)),
            ..Self::default()
        }
    }
}

impl StreamObserver for Recorder {
    fn on_assistant_text(&mut self, text: &str) {
        if let Some(shared) = &self.shared {
            shared
                .lock()
                .unwrap()
                .push(format!("{}:{text}", self.label));
        }
        self.texts.push(text.to_owned());
    }

    fn on_tool_use(&mut self, notice: &ToolUseNotice) {
        self.tool_uses.push(notice.clone());
    }

    fn on_tool_result(&mut self, notice: &ToolResultNotice) {
        self.tool_results.push(notice.clone());
    }
}

/// Bridge sink that records every delivery.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub partials: Mutex<Vec<ReplyPayload>>,
    pub tool_results: Mutex<Vec<ReplyPayload>>,
    pub events: Mutex<Vec<(String, Value)>>,
}

impl RecordingSink {
    pub fn partial_texts(&self) -> Vec<String> {
        self.partials
            .lock()
            .unwrap()
            .iter()
            .map(|reply| reply.text.clone())
            .collect()
    }
}

impl BridgeSink for RecordingSink {
    fn on_partial_reply(&self, reply: &ReplyPayload) -> Result<()> {
        self.partials.lock().unwrap().push(reply.clone());
        Ok(())
    }

    fn on_tool_result(&self, reply: &ReplyPayload) -> Result<()> {
        self.tool_results.lock().unwrap().push(reply.clone());
        Ok(())
    }

    fn on_agent_event(&self, stream: &str, data: &Value) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push((stream.to_owned(), data.clone()));
        Ok(())
    }
}

/// Write `lines` (one JSON value per line) to a temp file.
pub fn transcript(lines: &[Value]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp transcript");
    for line in lines {
        writeln!(file, "{line}").expect("write transcript line");
    }
    file.flush().expect("flush transcript");
    file
}
