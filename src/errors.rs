//! Error types shared across the crate.

use std::fmt::{Display, Formatter};

/// Shared crate result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Error enumeration covering every failure the relay surfaces to callers.
///
/// Ordinary process failure (non-zero exit, signal, timeout kill) is **not**
/// an error at the executor level; it is reported in
/// [`ProcessOutcome`](crate::process::ProcessOutcome). The `Timeout` and
/// `ProcessFailed` variants exist for callers that opt into strict
/// classification via
/// [`CliRunReport::ensure_success`](crate::runner::CliRunReport::ensure_success).
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// The subprocess could not be launched at all.
    Spawn(String),
    /// File-system, pipe, or other I/O failure.
    Io(String),
    /// The subprocess was force-killed after exceeding its timeout.
    Timeout(String),
    /// The subprocess exited unsuccessfully.
    ProcessFailed {
        /// Exit code, if the process exited normally.
        code: Option<i32>,
        /// Terminating signal name, if the process was signaled.
        signal: Option<String>,
        /// Trimmed standard error output.
        stderr: String,
    },
    /// The agent event bridge task is no longer running.
    Bridge(String),
    /// A caller-supplied sink rejected a delivery.
    Sink(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::ProcessFailed {
                code,
                signal,
                stderr,
            } => {
                match (code, signal) {
                    (Some(code), _) => write!(f, "process failed: exit code {code}")?,
                    (None, Some(signal)) => write!(f, "process failed: signal {signal}")?,
                    (None, None) => write!(f, "process failed")?,
                }
                if stderr.is_empty() {
                    Ok(())
                } else {
                    write!(f, ": {stderr}")
                }
            }
            Self::Bridge(msg) => write!(f, "bridge: {msg}"),
            Self::Sink(msg) => write!(f, "sink: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
