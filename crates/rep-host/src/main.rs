//! rep-host - native messaging host that streams captured requests from the
//! browser agent into the live snapshot.

use anyhow::Result;
use clap::Parser;
use rep_core::LiveBuffer;
use rep_host::config::HostConfig;
use rep_host::{ingest, logging};
use std::path::PathBuf;

use logging::{LogConfig, LogFormat};

/// rep-host - capture ingest for rep.
#[derive(Parser, Debug)]
#[command(name = "rep-host")]
#[command(about = "Native messaging host that maintains the rep live capture buffer")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Keep live data when the capture agent disconnects
    #[arg(long)]
    keep: bool,

    /// Override the live buffer capacity
    #[arg(long, value_name = "N")]
    capacity: Option<usize>,

    /// Override the live snapshot path
    #[arg(long, value_name = "FILE")]
    live_path: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace logging (TRACE level for everything)
    #[arg(long)]
    trace: bool,

    /// Quiet mode (WARN and ERROR only)
    #[arg(short, long)]
    quiet: bool,

    /// Set log level for specific targets (e.g., "live=debug").
    /// Can be specified multiple times. Targets are prefixed with "rep::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL")]
    log_overrides: Vec<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Window handle passed by some browsers on Windows
    #[arg(long = "parent-window", hide = true)]
    parent_window: Option<String>,

    /// Caller origin appended by the browser
    #[arg(hide = true, trailing_var_arg = true, allow_hyphen_values = true)]
    origin: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        cli.log_overrides,
        cli.log_format,
    );
    logging::init(&log_config);

    let mut config = match &cli.config {
        Some(path) => HostConfig::load_from(path)?,
        None => HostConfig::load()?,
    };
    config.apply_env(|key| std::env::var(key).ok());

    if cli.keep {
        config.keep_on_disconnect = true;
    }
    if let Some(capacity) = cli.capacity {
        config.capacity = capacity;
    }
    if let Some(path) = cli.live_path {
        config.live_path = Some(path);
    }

    let live_file = config.live_file()?;
    tracing::info!(
        target: "rep::startup",
        "Live snapshot at {} (capacity: {}, keep on disconnect: {})",
        live_file.display(),
        config.capacity,
        config.keep_on_disconnect
    );
    if !cli.origin.is_empty() {
        tracing::debug!(target: "rep::startup", "Started by {}", cli.origin.join(" "));
    }
    if let Some(window) = &cli.parent_window {
        tracing::debug!(target: "rep::startup", "Parent window {}", window);
    }

    let buffer = LiveBuffer::open(live_file, config.live_options());

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    ingest::run(&buffer, &mut stdin, &mut stdout).await?;

    tracing::info!(target: "rep::startup", "Shutting down");
    Ok(())
}
