//! Per-resource execution serializer.
//!
//! [`ResourceSerializer::run_exclusive`] guarantees that at most one
//! operation per resource key (typically a session transcript path) is in
//! flight, in strict arrival order, while operations on different keys run
//! concurrently.
//!
//! Each key maps to the *tail* of a chain of one-shot completion signals.
//! A new operation swaps itself in as the tail, waits for the previous tail
//! to complete, runs, and then signals its own completion. The signal is
//! sent by dropping a guard, so a failing, panicking, or cancelled operation
//! releases its slot exactly like a successful one. The key's entry is
//! removed when the last operation in the chain finishes, so idle keys cost
//! nothing.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, info_span, Instrument};

/// Tail of one key's chain.
#[derive(Debug)]
struct Tail {
    /// Ticket of the operation currently at the tail.
    ticket: u64,
    /// Resolves when that operation completes.
    done: oneshot::Receiver<()>,
}

type Tails = Arc<Mutex<HashMap<String, Tail>>>;

/// Keyed FIFO mutual-exclusion queue.
///
/// Cloning is cheap and clones share the same queues.
#[derive(Debug, Clone, Default)]
pub struct ResourceSerializer {
    tails: Tails,
    next_ticket: Arc<AtomicU64>,
}

impl ResourceSerializer {
    /// Create an empty serializer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `operation` once every earlier operation for `key` has finished.
    ///
    /// Returns whatever the operation returns; if it yields an `Err`, that
    /// error goes to this caller only and the next queued operation still
    /// runs.
    pub async fn run_exclusive<F, Fut, T>(&self, key: impl Into<String>, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let key = key.into();
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (done_tx, done_rx) = oneshot::channel();

        let previous = {
            let mut tails = lock(&self.tails);
            tails
                .insert(
                    key.clone(),
                    Tail {
                        ticket,
                        done: done_rx,
                    },
                )
                .map(|tail| tail.done)
        };

        // Constructed before the first await so that cancellation while
        // queued still hands the slot on in order.
        let mut slot = SlotGuard {
            tails: Arc::clone(&self.tails),
            key: key.clone(),
            ticket,
            previous,
            done: Some(done_tx),
        };

        let span = info_span!("run_exclusive", key = key.as_str(), ticket);
        async move {
            if let Some(previous) = slot.previous.as_mut() {
                debug!("waiting for earlier operation on key");
                // An error only means the earlier slot was released without
                // sending, which is still completion.
                let _ = previous.await;
            }
            slot.previous = None;

            debug!("slot acquired");
            let output = operation().await;
            drop(slot);
            output
        }
        .instrument(span)
        .await
    }

    /// Number of keys with at least one queued or running operation.
    #[must_use]
    pub fn active_keys(&self) -> usize {
        lock(&self.tails).len()
    }
}

/// Releases a slot when the holding operation ends, however it ends.
struct SlotGuard {
    tails: Tails,
    key: String,
    ticket: u64,
    /// Still set if the operation was dropped before its turn came.
    previous: Option<oneshot::Receiver<()>>,
    done: Option<oneshot::Sender<()>>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let Some(done) = self.done.take() else {
            return;
        };
        let tails = Arc::clone(&self.tails);
        let key = std::mem::take(&mut self.key);
        let ticket = self.ticket;

        match (self.previous.take(), tokio::runtime::Handle::try_current()) {
            // Abandoned while queued: successors must still wait for the
            // operation ahead of this one.
            (Some(previous), Ok(runtime)) => {
                runtime.spawn(async move {
                    let _ = previous.await;
                    release(&tails, &key, ticket, done);
                });
            }
            _ => release(&tails, &key, ticket, done),
        }
    }
}

/// Signal completion and drop the key's entry if this ticket is still the tail.
fn release(tails: &Tails, key: &str, ticket: u64, done: oneshot::Sender<()>) {
    let mut guard = lock(tails);
    if guard.get(key).is_some_and(|tail| tail.ticket == ticket) {
        guard.remove(key);
    }
    drop(guard);
    let _ = done.send(());
}

/// The map is never left inconsistent mid-update, so a poisoned lock is
/// still safe to use.
fn lock(tails: &Tails) -> MutexGuard<'_, HashMap<String, Tail>> {
    tails.lock().unwrap_or_else(PoisonError::into_inner)
}
