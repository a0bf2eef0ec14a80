//! telemux runtime - process bootstrap
//!
//! Loads configuration from the environment, initialises tracing and
//! metrics, builds the declared consumers and forwards newline-delimited
//! JSON events until input ends or the process is asked to stop.
//!
//! # Quick start
//!
//! ```ignore
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     telemux_runtime::run(tokio::io::stdin()).await
//! }
//! ```
//!
//! Each input line is one event:
//!
//! ```json
//! {"type": "systemInfo", "destinationIds": ["collector"], "data": {"system": {"hostname": "h"}}}
//! ```

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod prelude;

use anyhow::Context as _;
use std::sync::Arc;
use telemux_core::Event;
use telemux_gateway::config::{Config, LogFormat, PipelineConfig};
use telemux_gateway::metrics::{self, Metrics};
use telemux_gateway::runner::{EventSender, Pipeline};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Run a pipeline fed from `input` with settings from the environment
pub async fn run<R>(input: R) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
{
    // ── 1. Load config from env ──────────────────────────────
    let config = Config::from_env()?;

    // ── 2. Init tracing ──────────────────────────────────────
    init_tracing(&config);
    info!(
        pipeline = ?config.pipeline_path,
        channel_capacity = config.channel_capacity,
        max_in_flight = config.max_in_flight,
        "Starting telemux"
    );

    // ── 3. Init metrics ──────────────────────────────────────
    Metrics::init()?;

    // ── 4. Build consumers from the declaration ─────────────
    let pipeline = match &config.pipeline_path {
        Some(path) => PipelineConfig::from_path(path)
            .with_context(|| format!("loading pipeline from {}", path.display()))?,
        None => {
            warn!("TELEMUX_CONFIG not set, no consumers declared");
            PipelineConfig::default()
        }
    };
    let registry = Arc::new(pipeline.build_registry()?);

    // ── 5. Spawn the forwarder ───────────────────────────────
    let (sender, runner) = Pipeline::new(registry)
        .channel_capacity(config.channel_capacity)
        .max_in_flight(config.max_in_flight)
        .build();
    let runner_handle = tokio::spawn(runner.run());

    // ── 6. Feed events until EOF or a signal ─────────────────
    tokio::select! {
        result = read_events(input, sender) => {
            let stats = result?;
            info!(accepted = stats.accepted, rejected = stats.rejected, "Input closed");
        }
        _ = shutdown_signal() => {}
    }

    // ── 7. Drain and shut down ───────────────────────────────
    let processed = runner_handle.await.context("forwarder task failed")?;
    info!(processed, "telemux shutdown complete");
    tracing::debug!(metrics = %metrics::gather(), "Final metrics");

    Ok(())
}

/// Input line counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub accepted: u64,
    /// Lines that were not a valid event
    pub rejected: u64,
}

/// Parse newline-delimited JSON events from `input` and send them on
///
/// Blank lines are ignored; malformed lines are logged and counted. Stops
/// at end of input, or early if the pipeline stops accepting events. The
/// sender is dropped on return, which lets the runner finish.
pub async fn read_events<R>(input: R, sender: EventSender) -> anyhow::Result<IngestStats>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    let mut stats = IngestStats::default();
    let mut line_no = 0u64;

    while let Some(line) = lines.next_line().await.context("reading input")? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Event>(&line) {
            Ok(event) => {
                sender.send(event).await?;
                stats.accepted += 1;
            }
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping malformed event");
                stats.rejected += 1;
            }
        }
    }

    Ok(stats)
}

/// Initialise the tracing subscriber based on config.
///
/// `RUST_LOG`, when set, wins over `TELEMUX_LOG_LEVEL`.
pub fn init_tracing(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    // A subscriber may already be installed when embedded
    let result = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    if let Err(e) = result {
        eprintln!("tracing already initialised: {e}");
    }
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
