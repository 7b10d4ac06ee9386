//! Gantry CLI: launch a configured set of processing graphs and wait for
//! them to drain.
//!
//! Without a real engine attached this binary drives the in-process
//! loopback engine, which echoes each graph's input back to its terminal
//! ports after a short latency. The orchestration path is identical either
//! way.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use gantry::{Config, LoopbackEngine, init_tracing, run_graphs};

/// Concurrent launcher for device-bound processing graphs.
#[derive(Parser, Debug)]
#[command(name = "gantry")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the runner configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dry run - validate configuration without launching graphs.
    #[arg(long)]
    dry_run: bool,

    /// Echo latency of the loopback engine, in milliseconds.
    #[arg(long, default_value_t = 50)]
    loopback_latency_ms: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log_level);

    info!("gantry starting");

    let config = match Config::from_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!("Launching {} graph(s)", config.graph_count());
    for graph in &config.graphs {
        info!(
            "  {}: {} on {} (entry stage {}, {} terminal(s))",
            graph.graph_id,
            graph.source,
            graph.context_id,
            graph.entry.stage,
            graph.terminals.len()
        );
    }

    if args.dry_run {
        info!("Dry run mode - configuration is valid");
        return ExitCode::SUCCESS;
    }

    let engine = Arc::new(LoopbackEngine::new(Duration::from_millis(
        args.loopback_latency_ms,
    )));

    match run_graphs(engine, &config).await {
        Ok(summary) => {
            // Per-graph failures are logged above; they do not fail the
            // run as a whole.
            info!(
                "Run finished: {} completed, {} interrupted, {} failed",
                summary.completed, summary.interrupted, summary.failed
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Run failed: {e}");
            ExitCode::FAILURE
        }
    }
}
