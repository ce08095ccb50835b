//! Coalescing of rapid tool completions into one summary line.
//!
//! [`ToolDebounceQueue`] holds pending `(tool, meta)` pairs and a single
//! deadline that every push moves forward. The owner checks
//! [`is_due`](ToolDebounceQueue::is_due) when the deadline passes, or calls
//! [`drain`](ToolDebounceQueue::drain) directly to flush at end of run.

use std::time::Duration;

use tokio::time::Instant;

use crate::bridge::tool_meta::format_tool_aggregate;

/// Default quiet period before pending tool summaries are flushed.
pub const DEFAULT_TOOL_DEBOUNCE: Duration = Duration::from_millis(500);

/// Pending tool summaries plus their flush deadline.
#[derive(Debug, Clone)]
pub struct ToolDebounceQueue {
    window: Duration,
    pending: Vec<(String, Option<String>)>,
    deadline: Option<Instant>,
}

impl Default for ToolDebounceQueue {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL_DEBOUNCE)
    }
}

impl ToolDebounceQueue {
    /// Queue that flushes after `window` without new pushes.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Vec::new(),
            deadline: None,
        }
    }

    /// Add a finished tool and push the deadline to `now + window`.
    pub fn push(&mut self, tool_name: impl Into<String>, meta: Option<String>, now: Instant) {
        self.pending.push((tool_name.into(), meta));
        self.deadline = Some(now + self.window);
    }

    /// Current flush deadline, if anything is pending.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }

    /// Number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Clear the queue and cancel the deadline, returning the aggregate.
    ///
    /// Consecutive entries for the same tool are grouped
    /// (`read: a.rs, b.rs`); groups are joined with `; `. Returns `None`
    /// when nothing was pending.
    pub fn drain(&mut self) -> Option<String> {
        self.deadline = None;
        if self.pending.is_empty() {
            return None;
        }

        let mut groups: Vec<(String, Vec<String>)> = Vec::new();
        for (tool_name, meta) in self.pending.drain(..) {
            match groups.last_mut() {
                Some((last, metas)) if *last == tool_name => metas.extend(meta),
                _ => groups.push((tool_name, meta.into_iter().collect())),
            }
        }

        Some(
            groups
                .iter()
                .map(|(tool_name, metas)| format_tool_aggregate(tool_name, metas))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}
