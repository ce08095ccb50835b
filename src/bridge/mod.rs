//! Agent session event bridge.
//!
//! Attaches to a live [`AgentSession`] and turns its raw event stream into
//! output fit for a human-facing channel:
//!
//! - assistant text is buffered across deltas, stripped of thinking spans
//!   (`thinking`), split from `MEDIA:` references (`media`), and forwarded
//!   as partial replies only when the visible text actually changed;
//! - finished tools are summarized (`tool_meta`) and coalesced into one
//!   debounced line (`debounce`);
//! - every event is also reported to telemetry and generic sinks (`sink`).
//!
//! [`attach`] spawns one tokio task per attachment. Events are handled in
//! the order the session emits them; [`BridgeHandle::flush`] is handled
//! after any events already queued.

pub mod debounce;
pub mod media;
pub mod session;
pub mod sink;
pub mod state;
pub mod thinking;
pub mod tool_meta;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

use crate::{AppError, Result};

pub use debounce::{ToolDebounceQueue, DEFAULT_TOOL_DEBOUNCE};
pub use media::{extract_media, MediaSplit};
pub use session::{
    AgentMessage, AgentSession, AssistantUpdate, MessageContent, MessageRole, SessionEvent,
};
pub use sink::{AgentStreamEvent, BridgeSink, ReplyPayload, TelemetryEmitter, TracingTelemetry};
pub use state::{
    BridgeOptions, BridgeSinks, Collected, EventBridge, SharedCollected, ToolMeta,
    ToolResultVerbosity,
};
pub use thinking::{strip_thinking, ThinkingStripper};
pub use tool_meta::{format_tool_aggregate, infer_tool_meta};

/// Requests from a [`BridgeHandle`] to its task.
#[derive(Debug)]
enum BridgeCommand {
    Flush(oneshot::Sender<()>),
}

/// Control surface of one attachment.
///
/// Dropping the handle stops the bridge task without flushing.
#[derive(Debug)]
pub struct BridgeHandle {
    collected: SharedCollected,
    commands: mpsc::UnboundedSender<BridgeCommand>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Drop for BridgeHandle {
    /// Cancel the background bridge task when the handle is dropped.
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl BridgeHandle {
    /// Cleaned text of each completed assistant message so far.
    #[must_use]
    pub fn collected_texts(&self) -> Vec<String> {
        self.lock_collected().texts.clone()
    }

    /// Every finished tool so far.
    #[must_use]
    pub fn collected_tool_metas(&self) -> Vec<ToolMeta> {
        self.lock_collected().tool_metas.clone()
    }

    /// Deliver any pending tool summary now.
    ///
    /// Resolves after the bridge has handled every event queued before the
    /// call and performed the flush.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Bridge`] if the bridge task has stopped.
    pub async fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.commands
            .send(BridgeCommand::Flush(ack_tx))
            .map_err(|_| AppError::Bridge("bridge task is not running".into()))?;
        ack_rx
            .await
            .map_err(|_| AppError::Bridge("bridge task stopped before flushing".into()))
    }

    /// Stop listening and wait for the bridge task to exit.
    ///
    /// Pending tool summaries are discarded; call [`flush`](Self::flush)
    /// first to deliver them.
    pub async fn detach(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(%err, "bridge task ended abnormally");
            }
        }
    }

    fn lock_collected(&self) -> std::sync::MutexGuard<'_, Collected> {
        self.collected
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Subscribe to `session` and start bridging its events.
#[must_use]
pub fn attach<S>(session: &S, sinks: BridgeSinks, options: BridgeOptions) -> BridgeHandle
where
    S: AgentSession + ?Sized,
{
    attach_receiver(session.subscribe(), sinks, options)
}

/// Start bridging events arriving on `events`.
///
/// Must be called within a tokio runtime.
#[must_use]
pub fn attach_receiver(
    events: mpsc::Receiver<SessionEvent>,
    sinks: BridgeSinks,
    options: BridgeOptions,
) -> BridgeHandle {
    let span = info_span!("agent_bridge", run_id = options.run_id.as_str());
    let bridge = EventBridge::new(options, sinks);
    let collected = bridge.collected();
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let task = tokio::spawn(run(bridge, events, commands_rx, cancel.clone()).instrument(span));

    BridgeHandle {
        collected,
        commands: commands_tx,
        cancel,
        task: Some(task),
    }
}

/// Bridge task loop.
async fn run(
    mut bridge: EventBridge,
    mut events: mpsc::Receiver<SessionEvent>,
    mut commands: mpsc::UnboundedReceiver<BridgeCommand>,
    cancel: CancellationToken,
) {
    let mut events_open = true;

    loop {
        let deadline = bridge.next_deadline();

        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("bridge detached");
                break;
            }

            event = events.recv(), if events_open => match event {
                Some(event) => bridge.handle_event(event, Instant::now()),
                None => {
                    debug!("session event stream closed");
                    events_open = false;
                }
            },

            command = commands.recv() => match command {
                Some(BridgeCommand::Flush(ack)) => {
                    bridge.flush_tools();
                    let _ = ack.send(());
                }
                None => break,
            },

            () = sleep_until(deadline) => bridge.poll_timer(Instant::now()),
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
