#![forbid(unsafe_code)]

//! `agent-relay`: run a stream-json agent CLI and print its final answer.
//!
//! Streams assistant text and tool activity to the log as it arrives, then
//! prints the aggregate and process outcome as JSON on stdout.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use agent_relay::process::InvocationDescriptor;
use agent_relay::protocol::{StreamObserver, ToolResultNotice, ToolUseNotice};
use agent_relay::runner::run_cli;
use agent_relay::serializer::ResourceSerializer;
use agent_relay::{AppError, RelayConfig, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "agent-relay", about = "Run a stream-json agent CLI", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Resource key serializing runs (defaults to the working directory).
    #[arg(long)]
    key: Option<String>,

    /// Working directory for the agent process.
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Timeout in seconds, overriding the configuration.
    #[arg(long)]
    timeout: Option<u64>,

    /// Text written to the agent's stdin.
    #[arg(long)]
    input: Option<String>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Agent program followed by its arguments.
    #[arg(last = true, required = true, num_args = 1..)]
    command: Vec<String>,
}

/// Logs stream events as they arrive.
struct LogObserver;

impl StreamObserver for LogObserver {
    fn on_assistant_text(&mut self, text: &str) {
        info!(text, "assistant");
    }

    fn on_tool_use(&mut self, notice: &ToolUseNotice) {
        info!(
            tool = notice.name.as_str(),
            tool_call_id = notice.tool_call_id.as_str(),
            "tool use"
        );
    }

    fn on_tool_result(&mut self, notice: &ToolResultNotice) {
        info!(
            tool = notice.name.as_str(),
            tool_call_id = notice.tool_call_id.as_str(),
            is_error = notice.is_error,
            "tool result"
        );
    }
}

fn main() -> ExitCode {
    let args = Cli::parse();
    if let Err(err) = init_tracing(args.log_format) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(%err, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "agent run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let config = match &args.config {
        Some(path) => RelayConfig::load_from_path(path)?,
        None => RelayConfig::default(),
    };

    let (program, program_args) = args
        .command
        .split_first()
        .ok_or_else(|| AppError::Config("missing agent command".into()))?;

    let cwd = match args.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()
            .map_err(|err| AppError::Config(format!("cannot resolve working directory: {err}")))?,
    };
    let key = args
        .key
        .unwrap_or_else(|| cwd.to_string_lossy().into_owned());

    // ── Build invocation ────────────────────────────────
    let mut descriptor = config.apply_to(
        InvocationDescriptor::new(program, program_args.iter().cloned()).with_cwd(&cwd),
    );
    if let Some(secs) = args.timeout {
        descriptor = descriptor.with_timeout(Duration::from_secs(secs));
    }
    if let Some(input) = args.input {
        descriptor = descriptor.with_input(input);
    }
    info!(
        program = program.as_str(),
        key = key.as_str(),
        "starting agent cli"
    );

    // ── Run ─────────────────────────────────────────────
    let serializer = ResourceSerializer::new();
    let report = run_cli(&serializer, &key, &descriptor, LogObserver).await?;

    let summary = json!({
        "output": report.output,
        "outcome": report.outcome,
    });
    let rendered = serde_json::to_string_pretty(&summary)
        .map_err(|err| AppError::Io(format!("failed to render report: {err}")))?;
    println!("{rendered}");

    report.ensure_success()
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
