//! Graph orchestration: fan out N supervisors, fan in their termination.
//!
//! The runner spawns one tokio task per graph, each owning its supervisor
//! outright, and joins all of them before returning. The shutdown handler
//! is installed before the first task is spawned, so a signal arriving
//! during bring-up cannot be missed. An interrupt is a hard global stop:
//! the token reaches every poll loop within one interval and each
//! supervisor destroys its own graph on the way out.

use rand::Rng;
use snafu::ResultExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{Config, GraphId};
use crate::context::ContextRegistry;
use crate::engine::GraphEngine;
use crate::error::{InvalidConfigSnafu, SetupError, StartError};
use crate::signal::shutdown_signal;
use crate::supervisor::{CompletionReason, GraphSupervisor};

/// Tally of per-graph outcomes for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Graphs that drained their expected outputs.
    pub completed: usize,
    /// Graphs stopped by the shutdown signal.
    pub interrupted: usize,
    /// Graphs that failed to start (or panicked).
    pub failed: usize,
}

impl RunSummary {
    /// Total graphs accounted for.
    pub fn total(&self) -> usize {
        self.completed + self.interrupted + self.failed
    }
}

/// Orchestrates multiple graph runs with shared shutdown handling.
pub struct GraphRunner {
    supervisors: Vec<GraphSupervisor>,
    shutdown: CancellationToken,
    start_jitter_secs: u64,
}

impl GraphRunner {
    /// Build a runner from a validated config.
    ///
    /// Each supervisor gets its own immutable copy of its graph config;
    /// the shared pieces are the engine, the context registry and the
    /// shutdown token.
    pub fn from_config(
        engine: Arc<dyn GraphEngine>,
        config: &Config,
        shutdown: CancellationToken,
    ) -> Self {
        let contexts = Arc::new(ContextRegistry::new());
        let poll_interval = config.runner.poll_interval();

        let supervisors = config
            .graphs
            .iter()
            .map(|graph| {
                GraphSupervisor::new(
                    engine.clone(),
                    contexts.clone(),
                    graph.clone(),
                    shutdown.clone(),
                    poll_interval,
                )
            })
            .collect();

        Self {
            supervisors,
            shutdown,
            start_jitter_secs: config.runner.start_jitter_secs,
        }
    }

    /// Spawn the shutdown signal handler.
    ///
    /// Must run before [`GraphRunner::run`] so the signal listener is
    /// armed before any supervisor starts polling.
    pub fn spawn_shutdown_handler(&self) {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.cancel();
        });
    }

    /// Run all graphs to completion and join them.
    ///
    /// A start failure in one graph never prevents the others from
    /// running; every outcome is logged and tallied.
    pub async fn run(self) -> RunSummary {
        let mut handles: JoinSet<(GraphId, Result<CompletionReason, StartError>)> = JoinSet::new();

        for supervisor in self.supervisors {
            let shutdown = self.shutdown.clone();
            let graph_id = supervisor.graph_id();
            let start_jitter = random_jitter(self.start_jitter_secs);

            handles.spawn(async move {
                // Stagger start times, but respect the shutdown signal
                if !start_jitter.is_zero() {
                    info!(
                        graph = %graph_id,
                        jitter_secs = start_jitter.as_secs(),
                        "Delaying graph start for jitter"
                    );
                    if shutdown
                        .run_until_cancelled(tokio::time::sleep(start_jitter))
                        .await
                        .is_none()
                    {
                        info!(graph = %graph_id, "Shutdown requested during jitter delay");
                        return (graph_id, Ok(CompletionReason::Interrupted));
                    }
                }

                let result = supervisor.run().await;
                (graph_id, result)
            });
        }

        info!("Spawned {} graph tasks", handles.len());

        let mut summary = RunSummary::default();
        while let Some(result) = handles.join_next().await {
            match result {
                Ok((graph_id, Ok(CompletionReason::Completed))) => {
                    summary.completed += 1;
                    info!(graph = %graph_id, "Graph completed");
                }
                Ok((graph_id, Ok(CompletionReason::Interrupted))) => {
                    summary.interrupted += 1;
                    info!(graph = %graph_id, "Graph interrupted");
                }
                Ok((graph_id, Err(e))) => {
                    summary.failed += 1;
                    error!(graph = %graph_id, error = %e, "Graph failed");
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(error = %e, "Graph task panicked");
                }
            }
        }

        info!(
            completed = summary.completed,
            interrupted = summary.interrupted,
            failed = summary.failed,
            "All graphs complete"
        );
        summary
    }
}

/// Run all configured graphs against `engine` with signal handling wired.
///
/// 1. Validate the configuration
/// 2. Create the shutdown token and arm the signal listener
/// 3. Spawn one supervisor task per graph
/// 4. Join them all and return the tally
pub async fn run_graphs(
    engine: Arc<dyn GraphEngine>,
    config: &Config,
) -> Result<RunSummary, SetupError> {
    config.validate().context(InvalidConfigSnafu)?;

    let shutdown = CancellationToken::new();
    let runner = GraphRunner::from_config(engine, config, shutdown);
    runner.spawn_shutdown_handler();
    Ok(runner.run().await)
}

/// Generate a random jitter duration up to the specified maximum seconds.
pub fn random_jitter(max_secs: u64) -> Duration {
    if max_secs > 0 {
        Duration::from_millis(rand::rng().random_range(0..max_secs * 1000))
    } else {
        Duration::ZERO
    }
}
