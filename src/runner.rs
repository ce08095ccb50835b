//! End-to-end execution of a stream-json agent CLI.
//!
//! [`run_cli`] takes the serializer slot for the session's resource key,
//! runs the subprocess, and folds every stdout line into a
//! [`StreamAccumulator`]. Retry policy, if any, belongs to the caller.

use tracing::{info, warn};

use crate::process::{execute, InvocationDescriptor, ProcessOutcome};
use crate::protocol::{AggregateOutput, StreamAccumulator, StreamObserver};
use crate::serializer::ResourceSerializer;
use crate::{AppError, Result};

/// Everything a finished CLI run produced.
#[derive(Debug)]
pub struct CliRunReport<O> {
    /// Accumulated text, session id, and usage.
    pub output: AggregateOutput,
    /// How the process ended.
    pub outcome: ProcessOutcome,
    /// The observer, handed back to the caller.
    pub observer: O,
}

impl<O> CliRunReport<O> {
    /// Classify the run.
    ///
    /// # Errors
    ///
    /// - [`AppError::Timeout`]: the process was killed by the timeout.
    /// - [`AppError::ProcessFailed`]: the process exited non-zero or was
    ///   signaled.
    pub fn ensure_success(&self) -> Result<()> {
        if self.outcome.was_killed {
            return Err(AppError::Timeout("agent cli exceeded its timeout".into()));
        }
        if self.outcome.code == Some(0) {
            return Ok(());
        }
        Err(AppError::ProcessFailed {
            code: self.outcome.code,
            signal: self.outcome.signal.clone(),
            stderr: self.outcome.stderr.trim().to_owned(),
        })
    }
}

/// Run `descriptor` exclusively under `key`, accumulating its stream-json
/// output and reporting each event to `observer`.
///
/// # Errors
///
/// Returns [`AppError::Spawn`] if the CLI cannot be launched, or
/// [`AppError::Io`] if waiting on it fails. Unsuccessful exits are reported
/// in the [`CliRunReport`]; see [`CliRunReport::ensure_success`].
pub async fn run_cli<O>(
    serializer: &ResourceSerializer,
    key: &str,
    descriptor: &InvocationDescriptor,
    observer: O,
) -> Result<CliRunReport<O>>
where
    O: StreamObserver,
{
    serializer
        .run_exclusive(key, || async move {
            let mut accumulator = StreamAccumulator::with_observer(observer);
            let outcome = execute(descriptor, |line| accumulator.consume(line)).await?;
            let output = accumulator.finalize();

            if outcome.success() {
                info!(
                    key,
                    session_id = output.session_id.as_deref().unwrap_or(""),
                    text_len = output.text.len(),
                    "agent cli run finished"
                );
            } else {
                warn!(
                    key,
                    code = ?outcome.code,
                    signal = ?outcome.signal,
                    was_killed = outcome.was_killed,
                    "agent cli run ended unsuccessfully"
                );
            }

            Ok::<_, AppError>(CliRunReport {
                output,
                outcome,
                observer: accumulator.into_observer(),
            })
        })
        .await
}
