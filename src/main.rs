//! component-sdk CLI - run runner configs, inspect config, classify errors

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use serde::de::DeserializeOwned;

use component_sdk::component::{execute_fn, ExecutionPayload};
use component_sdk::config::SdkConfig;
use component_sdk::context::{
    create_execution_context, ExecutionContextOptions, LogCollector, LogEntry, LogLevel,
    LogStream, NdjsonTraceSink, TerminalChunk, TerminalCollector,
};
use component_sdk::error::{ComponentError, SdkError};
use component_sdk::runner::{Runner, RunnerConfig};

#[derive(Parser)]
#[command(name = "component-sdk")]
#[command(about = "Component SDK - run and inspect workflow components")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a runner config against a payload
    Run {
        /// Runner config JSON (`{"kind": "docker", "image": ...}`)
        #[arg(long)]
        runner: PathBuf,

        /// Payload JSON (`{"inputs": {...}, "params": {...}}`)
        #[arg(long)]
        payload: Option<PathBuf>,

        /// Append trace events as NDJSON
        #[arg(long)]
        trace_file: Option<PathBuf>,

        /// Stream container output through a pseudo-terminal
        #[arg(long)]
        pty: bool,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Classify an HTTP status into an error payload
    Classify {
        status: u16,

        /// Retry-After header value in seconds
        #[arg(long)]
        retry_after: Option<u64>,

        /// Response body excerpt
        #[arg(long)]
        body: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            runner,
            payload,
            trace_file,
            pty,
        } => run(&runner, payload.as_deref(), trace_file.as_deref(), pty).await,
        Commands::Config => show_config(),
        Commands::Classify {
            status,
            retry_after,
            body,
        } => classify(status, retry_after, body.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(
    runner_path: &Path,
    payload_path: Option<&Path>,
    trace_file: Option<&Path>,
    pty: bool,
) -> Result<(), SdkError> {
    let settings = SdkConfig::load()?.with_env();
    let config: RunnerConfig = read_json(runner_path)?;
    let payload: ExecutionPayload = match payload_path {
        Some(path) => read_json(path)?,
        None => ExecutionPayload::default(),
    };

    let run_id = uuid::Uuid::new_v4().to_string();
    let mut options = ExecutionContextOptions::new(run_id.clone(), "cli")
        .log_collector(Arc::new(ConsoleLogCollector));
    if let Some(path) = trace_file {
        options = options.trace_sink(Arc::new(NdjsonTraceSink::create(path)?));
    }
    if pty {
        options = options.terminal_collector(Arc::new(ConsoleTerminal));
    }
    let ctx = create_execution_context(options);

    eprintln!(
        "{} {} runner | run {}",
        "→".cyan(),
        config.kind_name().cyan().bold(),
        run_id.dimmed()
    );

    // Inline runs have no component behind them; echo the inputs back
    let echo = execute_fn(|payload, _ctx| async move { Ok(payload.inputs) });
    let output = Runner::new(settings)
        .run(&config, &echo, payload, &ctx)
        .await?;

    println!("{}", serde_json::to_string_pretty(&output).map_err(SdkError::from)?);
    Ok(())
}

fn show_config() -> Result<(), SdkError> {
    let config = SdkConfig::load()?.with_env();
    eprintln!(
        "{} {}",
        "#".dimmed(),
        SdkConfig::config_path().display().to_string().dimmed()
    );
    print!("{}", config.to_toml()?);
    Ok(())
}

fn classify(status: u16, retry_after: Option<u64>, body: Option<&str>) -> Result<(), SdkError> {
    let mut headers = HeaderMap::new();
    if let Some(seconds) = retry_after {
        headers.insert(RETRY_AFTER, HeaderValue::from(seconds));
    }
    let status_text = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("");

    let error = ComponentError::from_http_response(status, status_text, &headers, body);
    let label = if error.is_retryable() {
        "retryable".green()
    } else {
        "terminal".red()
    };
    eprintln!("{} {} ({})", "→".cyan(), error.error_type().bold(), label);
    println!(
        "{}",
        serde_json::to_string_pretty(&error.to_payload()).map_err(SdkError::from)?
    );
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, SdkError> {
    let text = std::fs::read_to_string(path).map_err(SdkError::from)?;
    serde_json::from_str(&text).map_err(|e| SdkError::Config {
        reason: format!("{}: {}", path.display(), e),
    })
}

/// Prints log entries to stderr
struct ConsoleLogCollector;

impl LogCollector for ConsoleLogCollector {
    fn collect(&self, entry: LogEntry) {
        let stream = match entry.stream {
            LogStream::Stdout => "stdout".dimmed(),
            LogStream::Stderr => "stderr".yellow(),
            LogStream::Console => "log".cyan(),
        };
        let message = match entry.level {
            LogLevel::Error => entry.message.red(),
            LogLevel::Warn => entry.message.yellow(),
            LogLevel::Debug => entry.message.dimmed(),
            LogLevel::Info => entry.message.normal(),
        };
        eprintln!("  [{}] {}", stream, message);
    }
}

/// Writes terminal chunks straight to stdout
struct ConsoleTerminal;

impl TerminalCollector for ConsoleTerminal {
    fn collect(&self, chunk: TerminalChunk) {
        if let Ok(bytes) = chunk.bytes() {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(&bytes);
            let _ = out.flush();
        }
    }
}
