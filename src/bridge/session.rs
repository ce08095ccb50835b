//! Event vocabulary of an in-process agent session.
//!
//! The session owns the conversation; the bridge only listens. Events are
//! serde-tagged (`"type": "tool_execution_start"`, …) so sessions living in
//! another process can forward them as JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// End user.
    User,
    /// The model.
    Assistant,
    /// A tool result fed back to the model.
    ToolResult,
}

/// One block of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Visible text.
    Text {
        /// The text.
        text: String,
    },
    /// Model reasoning delivered as a separate block.
    Thinking {
        /// The reasoning text.
        thinking: String,
    },
    /// A tool call embedded in the message.
    ToolCall {
        /// Call id.
        id: String,
        /// Tool name.
        name: String,
        /// Arguments.
        #[serde(default)]
        arguments: Value,
    },
}

/// A session message as seen on the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Author.
    pub role: MessageRole,
    /// Content blocks in order.
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl AgentMessage {
    /// Assistant message made of one text block.
    #[must_use]
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: vec![MessageContent::Text { text: text.into() }],
        }
    }

    /// Whether the model authored this message.
    #[must_use]
    pub fn is_assistant(&self) -> bool {
        self.role == MessageRole::Assistant
    }

    /// All text blocks joined with newlines.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                MessageContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Streaming update within an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantUpdate {
    /// A text block opened; `content` is the block text so far.
    TextStart {
        /// Block text so far.
        #[serde(default)]
        content: String,
    },
    /// New text appended to the current block.
    TextDelta {
        /// The appended text.
        delta: String,
    },
    /// A text block closed; `content` is its full text.
    TextEnd {
        /// Full block text.
        #[serde(default)]
        content: String,
    },
    /// Reasoning or tool-call streaming; ignored by the bridge.
    #[serde(other)]
    Other,
}

/// Events emitted by an agent session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A tool began executing.
    ToolExecutionStart {
        /// Call id.
        tool_call_id: String,
        /// Tool name.
        tool_name: String,
        /// Arguments.
        #[serde(default)]
        args: Value,
    },
    /// A tool finished executing.
    ToolExecutionEnd {
        /// Call id.
        tool_call_id: String,
        /// Tool name.
        tool_name: String,
        /// Tool output.
        #[serde(default)]
        result: Value,
        /// Whether the tool failed.
        #[serde(default)]
        is_error: bool,
    },
    /// A message began.
    MessageStart {
        /// The message as it stands.
        message: AgentMessage,
    },
    /// A message is streaming.
    MessageUpdate {
        /// The message as it stands.
        message: AgentMessage,
        /// What changed.
        update: AssistantUpdate,
    },
    /// A message is complete.
    MessageEnd {
        /// The final message.
        message: AgentMessage,
    },
    /// The run finished.
    AgentEnd,
}

/// A live agent session the bridge can listen to.
pub trait AgentSession {
    /// Open a new subscription to the session's events.
    fn subscribe(&self) -> mpsc::Receiver<SessionEvent>;
}
