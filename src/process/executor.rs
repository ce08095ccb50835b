//! Streaming subprocess executor.
//!
//! Spawns an external command described by an [`InvocationDescriptor`],
//! delivers its stdout line by line to a caller callback, accumulates
//! stderr, and enforces a wall-clock timeout with a single forced kill.
//!
//! - `kill_on_drop(true)` so an abandoned invocation never leaks a process.
//! - On unix the child leads its own process group; the timeout kill
//!   targets the whole group. Output pipes still held open after the kill
//!   (by a descendant that left the group) are abandoned after
//!   [`KILL_DRAIN_GRACE`], so the timeout always bounds the invocation.
//! - With [`EnvPolicy::Allowlist`], the parent environment is cleared and
//!   only [`ALLOWED_ENV_VARS`] plus explicit overrides reach the child.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::process::codec::LineCodec;
use crate::{AppError, Result};

// ── Environment allowlist ────────────────────────────────────────────────────

/// Environment variables inherited by the child under
/// [`EnvPolicy::Allowlist`].
///
/// Every other variable from the host environment is stripped via
/// `env_clear()` before the child is launched.
pub const ALLOWED_ENV_VARS: &[&str] = &[
    "PATH",
    "HOME",
    "USER",
    "LANG",
    "TERM",
    "TMPDIR",
    "RUST_LOG",
    // Windows-specific variables.
    "USERPROFILE",
    "SystemRoot",
    "TEMP",
    "TMP",
    "USERNAME",
    "APPDATA",
    "LOCALAPPDATA",
    "COMSPEC",
];

/// How the child's environment is derived from the host's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnvPolicy {
    /// Inherit the full host environment, then apply overrides.
    #[default]
    Inherit,
    /// Clear the environment, pass through [`ALLOWED_ENV_VARS`], then apply
    /// overrides.
    Allowlist,
}

// ── Descriptor ───────────────────────────────────────────────────────────────

/// Default wall-clock limit for one invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Fully-built description of one subprocess invocation.
///
/// Built with the consuming `with_*` methods and then handed to
/// [`execute`] by reference; nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationDescriptor {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
    env_policy: EnvPolicy,
    input: Option<String>,
    timeout: Duration,
}

impl InvocationDescriptor {
    /// Describe an invocation of `program` with the given argument vector.
    #[must_use]
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            env: Vec::new(),
            env_policy: EnvPolicy::default(),
            input: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Run the child in `dir`.
    #[must_use]
    pub fn with_cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Add one environment override; later overrides win.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Select how the host environment is passed through.
    #[must_use]
    pub fn with_env_policy(mut self, policy: EnvPolicy) -> Self {
        self.env_policy = policy;
        self
    }

    /// Write `input` to the child's stdin, then close it.
    #[must_use]
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Kill the child if it is still running after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Executable name or path.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Ordered argument vector (excluding the program).
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Working directory, if set.
    #[must_use]
    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Environment overrides in insertion order.
    #[must_use]
    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    /// Environment pass-through policy.
    #[must_use]
    pub fn env_policy(&self) -> EnvPolicy {
        self.env_policy
    }

    /// Stdin payload, if any.
    #[must_use]
    pub fn input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    /// Wall-clock limit.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// How long stdout and stderr may keep draining after the timeout kill.
pub const KILL_DRAIN_GRACE: Duration = Duration::from_millis(500);

// ── Outcome ──────────────────────────────────────────────────────────────────

/// Terminal state of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
    /// Always empty: stdout is consumed through the line callback.
    pub stdout: String,
    /// Standard error, verbatim.
    pub stderr: String,
    /// Exit code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    /// Terminating signal name (e.g. `SIGKILL`); `None` on normal exit.
    pub signal: Option<String>,
    /// Set when the timeout fired and the process was force-killed.
    pub was_killed: bool,
}

impl ProcessOutcome {
    /// Whether the process exited with code 0 without being killed.
    #[must_use]
    pub fn success(&self) -> bool {
        !self.was_killed && self.code == Some(0)
    }
}

// ── Executor ─────────────────────────────────────────────────────────────────

/// Run `descriptor` to completion, delivering each stdout line to `on_line`.
///
/// Lines are delivered in the order the child produced them, with the `\n`
/// stripped; a trailing unterminated line is delivered last. Every callback
/// happens before this function returns.
///
/// Non-zero exits, signals, and timeout kills are reported in the returned
/// [`ProcessOutcome`], never as errors.
///
/// # Errors
///
/// - [`AppError::Spawn`]: the executable could not be launched.
/// - [`AppError::Io`]: waiting on the child failed at the OS level.
pub async fn execute<F>(descriptor: &InvocationDescriptor, mut on_line: F) -> Result<ProcessOutcome>
where
    F: FnMut(&str),
{
    let mut cmd = build_command(descriptor);
    let mut child = cmd.spawn().map_err(|err| {
        AppError::Spawn(format!("failed to spawn {}: {err}", descriptor.program()))
    })?;

    debug!(
        program = descriptor.program(),
        pid = child.id().unwrap_or(0),
        timeout_ms = u64::try_from(descriptor.timeout().as_millis()).unwrap_or(u64::MAX),
        "subprocess spawned"
    );

    if let (Some(mut stdin), Some(input)) = (child.stdin.take(), descriptor.input()) {
        let payload = input.to_owned();
        tokio::spawn(async move {
            if let Err(err) = stdin.write_all(payload.as_bytes()).await {
                debug!(%err, "failed to write subprocess stdin");
            }
            // Dropping `stdin` closes the pipe.
        });
    }

    let stop_stderr = CancellationToken::new();
    let stderr_task = child
        .stderr
        .take()
        .map(|stderr| tokio::spawn(read_all(stderr, stop_stderr.clone())));

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Io("failed to capture subprocess stdout".into()))?;
    let mut lines = FramedRead::new(stdout, LineCodec::new());

    let deadline = tokio::time::sleep(descriptor.timeout());
    tokio::pin!(deadline);

    let mut was_killed = false;
    let mut stdout_open = true;

    let status = loop {
        let step = tokio::select! {
            () = &mut deadline, if !was_killed || stdout_open => {
                if was_killed { Step::DrainExpired } else { Step::TimedOut }
            }
            item = lines.next(), if stdout_open => Step::Stdout(item),
            status = child.wait(), if !stdout_open => Step::Exited(status),
        };

        match step {
            Step::TimedOut => {
                warn!(
                    program = descriptor.program(),
                    pid = child.id().unwrap_or(0),
                    "subprocess exceeded timeout, killing"
                );
                force_kill(&mut child);
                was_killed = true;
                deadline.as_mut().reset(Instant::now() + KILL_DRAIN_GRACE);
            }
            Step::DrainExpired => {
                debug!(
                    program = descriptor.program(),
                    "stdout still open after kill, abandoning it"
                );
                stdout_open = false;
            }
            Step::Stdout(Some(Ok(line))) => on_line(&line),
            Step::Stdout(Some(Err(err))) => {
                warn!(%err, "subprocess stdout read failed, discarding remainder");
                stdout_open = false;
            }
            Step::Stdout(None) => stdout_open = false,
            Step::Exited(status) => break status?,
        }
    };

    drop(lines);

    let stderr_limit = if was_killed {
        Instant::now() + KILL_DRAIN_GRACE
    } else {
        deadline.deadline()
    };
    let stderr = match stderr_task {
        Some(mut task) => {
            let joined = match tokio::time::timeout_at(stderr_limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    debug!(
                        program = descriptor.program(),
                        "stderr still open after exit, abandoning it"
                    );
                    stop_stderr.cancel();
                    task.await
                }
            };
            joined.map_err(|err| AppError::Io(format!("stderr reader task failed: {err}")))?
        }
        None => String::new(),
    };

    let outcome = ProcessOutcome {
        stdout: String::new(),
        stderr,
        code: status.code(),
        signal: signal_name(status),
        was_killed,
    };

    debug!(
        program = descriptor.program(),
        code = ?outcome.code,
        signal = ?outcome.signal,
        was_killed,
        "subprocess exited"
    );

    Ok(outcome)
}

// ── Private helpers ──────────────────────────────────────────────────────────

/// One wake-up of the executor loop.
enum Step {
    TimedOut,
    DrainExpired,
    Stdout(Option<Result<String>>),
    Exited(std::io::Result<ExitStatus>),
}

/// Translate a descriptor into a ready-to-spawn [`Command`].
fn build_command(descriptor: &InvocationDescriptor) -> Command {
    let mut std_cmd = std::process::Command::new(descriptor.program());
    std_cmd.args(descriptor.args());

    if descriptor.env_policy() == EnvPolicy::Allowlist {
        std_cmd.env_clear();
        for &key in ALLOWED_ENV_VARS {
            if let Ok(val) = std::env::var(key) {
                std_cmd.env(key, val);
            }
        }
    }
    for (key, value) in descriptor.env() {
        std_cmd.env(key, value);
    }

    if let Some(dir) = descriptor.cwd() {
        std_cmd.current_dir(dir);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        std_cmd.process_group(0);
    }

    let stdin = if descriptor.input().is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    };

    let mut cmd = Command::from(std_cmd);
    cmd.stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Send one immediate hard kill to the child (and its process group on unix).
fn force_kill(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
            Ok(()) => return,
            Err(err) => debug!(pid, %err, "killpg failed, falling back to direct kill"),
        }
    }

    if let Err(err) = child.start_kill() {
        // The child has usually already exited when this fails.
        debug!(%err, "failed to kill subprocess");
    }
}

/// Drain a pipe to EOF or until `stop` fires, decoding what arrived lossily.
async fn read_all<R>(mut pipe: R, stop: CancellationToken) -> String
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        tokio::select! {
            biased;
            () = stop.cancelled() => break,
            read = pipe.read_buf(&mut buf) => match read {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) => {
                    debug!(%err, "subprocess stderr read failed");
                    break;
                }
            },
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(unix)]
fn signal_name(status: ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;

    status.signal().map(|raw| {
        nix::sys::signal::Signal::try_from(raw)
            .map_or_else(|_| format!("SIG{raw}"), |sig| sig.as_str().to_owned())
    })
}

#[cfg(not(unix))]
fn signal_name(_status: ExitStatus) -> Option<String> {
    None
}
