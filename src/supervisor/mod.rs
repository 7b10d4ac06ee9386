//! Per-graph lifecycle management.
//!
//! A [`GraphSupervisor`] owns exactly one graph from creation to
//! destruction: it initializes the execution context, creates the graph,
//! wires a [`CompletionSink`] to every terminal port, sends the initial
//! payload, then polls until the graph's pending count drains or a
//! shutdown signal arrives, and finally destroys the graph.
//!
//! The wait is a deliberately coarse poll: completion notifications arrive
//! on the engine's own execution context, and there is no wake primitive
//! at that boundary we control. A bounded sleep between checks trades a
//! few milliseconds of latency for simplicity.

mod sink;

pub use sink::{CompletionSink, PendingCount};

use snafu::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{GraphConfig, GraphId};
use crate::context::{ContextInit, ContextRegistry};
use crate::engine::{GraphEngine, Payload};
use crate::error::{
    CreateFailedSnafu, InitFailedSnafu, LookupFailedSnafu, RegisterFailedSnafu, SendFailedSnafu,
    StartError,
};

/// Why a supervisor stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// Every expected output arrived.
    Completed,
    /// A shutdown signal arrived first.
    Interrupted,
}

/// Lifecycle states of a supervised graph.
///
/// `Destroyed` is terminal; a graph id is never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SupervisorState {
    Uninitialized,
    Created,
    AwaitingCompletion,
    Completed,
    Interrupted,
    Destroyed,
}

/// Manages exactly one graph from creation to destruction.
pub struct GraphSupervisor {
    engine: Arc<dyn GraphEngine>,
    contexts: Arc<ContextRegistry>,
    config: GraphConfig,
    pending: Arc<PendingCount>,
    shutdown: CancellationToken,
    poll_interval: Duration,
    state: SupervisorState,
    destroyed: bool,
}

impl GraphSupervisor {
    /// Create a supervisor for one graph.
    ///
    /// The supervisor takes its own copy of the config; nothing about it
    /// is shared with sibling supervisors except the context registry and
    /// the shutdown token.
    pub fn new(
        engine: Arc<dyn GraphEngine>,
        contexts: Arc<ContextRegistry>,
        config: GraphConfig,
        shutdown: CancellationToken,
        poll_interval: Duration,
    ) -> Self {
        let pending = Arc::new(PendingCount::new(config.expected_outputs));
        Self {
            engine,
            contexts,
            config,
            pending,
            shutdown,
            poll_interval,
            state: SupervisorState::Uninitialized,
            destroyed: false,
        }
    }

    /// Id of the supervised graph.
    pub fn graph_id(&self) -> GraphId {
        self.config.graph_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    fn transition(&mut self, next: SupervisorState) {
        info!(
            graph = %self.config.graph_id,
            from = ?self.state,
            to = ?next,
            "State transition"
        );
        self.state = next;
    }

    /// Bring the graph up: context init, create, resolve, wire sinks,
    /// send the initial payload.
    ///
    /// Any error here is fatal to this graph only.
    pub async fn start(&mut self) -> Result<(), StartError> {
        let graph_id = self.config.graph_id;

        match self
            .contexts
            .ensure_initialized(self.engine.as_ref(), self.config.context_id)
            .await
        {
            Ok(ContextInit::Initialized) => {
                debug!(graph = %graph_id, context = %self.config.context_id, "Context initialized");
            }
            Ok(ContextInit::AlreadyInitialized) => {
                // Soft condition: several graphs sharing a context is
                // legal, the first one wins the initialization.
                warn!(
                    graph = %graph_id,
                    context = %self.config.context_id,
                    "Context already initialized, skipping"
                );
            }
            Err(e) => return Err(e).context(InitFailedSnafu { graph_id }),
        }

        self.engine
            .create_graph(&self.config)
            .await
            .context(CreateFailedSnafu { graph_id })?;
        self.transition(SupervisorState::Created);

        let Some(handle) = self.engine.resolve_graph(graph_id).await else {
            return LookupFailedSnafu { graph_id }.fail();
        };

        let terminals: Vec<_> = self.config.terminal_addresses().collect();
        for port in terminals {
            let sink = Arc::new(CompletionSink::new(graph_id, self.pending.clone()));
            handle
                .register_completion(port, sink)
                .await
                .context(RegisterFailedSnafu { graph_id })?;
            debug!(port = %port, "Completion sink registered");
        }

        let payload = Payload::new(self.config.type_tag.clone(), self.config.payload.clone());
        handle
            .send_input(self.config.entry_address(), payload)
            .await
            .context(SendFailedSnafu { graph_id })?;
        info!(graph = %graph_id, entry = %self.config.entry_address(), "Initial payload sent");

        Ok(())
    }

    /// Block until every expected output has arrived or a shutdown signal
    /// fires, re-checking once per poll interval.
    pub async fn await_completion(&mut self) -> CompletionReason {
        self.transition(SupervisorState::AwaitingCompletion);

        loop {
            if self.pending.is_complete() {
                self.transition(SupervisorState::Completed);
                return CompletionReason::Completed;
            }
            if self.shutdown.is_cancelled() {
                self.transition(SupervisorState::Interrupted);
                return CompletionReason::Interrupted;
            }

            let shutdown = self.shutdown.clone();
            tokio::select! {
                _ = shutdown.cancelled() => {
                    self.transition(SupervisorState::Interrupted);
                    return CompletionReason::Interrupted;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Destroy the graph. Idempotent; destroy failures are logged and
    /// never propagated so one graph's teardown cannot block another's.
    pub async fn shutdown(&mut self) {
        if self.destroyed {
            debug!(graph = %self.config.graph_id, "Shutdown already performed");
            return;
        }
        self.destroyed = true;

        // Nothing to destroy if the graph never came into existence.
        if self.state < SupervisorState::Created {
            debug!(graph = %self.config.graph_id, "Graph was never created, nothing to destroy");
            return;
        }

        if let Err(e) = self.engine.destroy_graph(self.config.graph_id).await {
            warn!(
                graph = %self.config.graph_id,
                error = %e,
                "Graph destruction failed, continuing teardown"
            );
        }
        self.transition(SupervisorState::Destroyed);
    }

    /// Full per-graph sequence: start, await completion, destroy.
    ///
    /// A start failure still performs a best-effort destroy (the graph may
    /// exist but be unreachable) and reports the error upward without
    /// touching sibling graphs.
    pub async fn run(mut self) -> Result<CompletionReason, StartError> {
        if let Err(e) = self.start().await {
            error!(graph = %self.config.graph_id, error = %e, "Graph failed to start");
            self.shutdown().await;
            return Err(e);
        }

        let reason = self.await_completion().await;
        self.shutdown().await;
        Ok(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::config::{ContextId, StagePort};
    use crate::engine::{GraphHandle, LoopbackEngine};
    use crate::error::EngineError;

    fn test_config(graph_id: u32) -> GraphConfig {
        GraphConfig {
            source: "./test.config".to_string(),
            graph_id: GraphId(graph_id),
            context_id: ContextId(0),
            entry: StagePort { stage: 101, port: 0 },
            terminals: vec![StagePort { stage: 106, port: 0 }],
            expected_outputs: 1,
            payload: String::new(),
            type_tag: "string".to_string(),
        }
    }

    fn supervisor_with(engine: Arc<dyn GraphEngine>, graph_id: u32) -> GraphSupervisor {
        GraphSupervisor::new(
            engine,
            Arc::new(ContextRegistry::new()),
            test_config(graph_id),
            CancellationToken::new(),
            Duration::from_millis(1),
        )
    }

    #[tokio::test]
    async fn test_run_to_completion() {
        let engine = Arc::new(LoopbackEngine::new(Duration::ZERO));
        let supervisor = supervisor_with(engine.clone(), 100);

        let reason = supervisor.run().await.unwrap();
        assert_eq!(reason, CompletionReason::Completed);
        // Destroyed on the way out.
        assert!(engine.resolve_graph(GraphId(100)).await.is_none());
    }

    #[tokio::test]
    async fn test_interrupt_during_poll() {
        // Loopback latency far beyond the test horizon: completion never
        // fires, only the token can end the wait.
        let engine = Arc::new(LoopbackEngine::new(Duration::from_secs(3600)));
        let token = CancellationToken::new();
        let supervisor = GraphSupervisor::new(
            engine.clone(),
            Arc::new(ContextRegistry::new()),
            test_config(100),
            token.clone(),
            Duration::from_millis(1),
        );

        let run = tokio::spawn(supervisor.run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        let reason = run.await.unwrap().unwrap();
        assert_eq!(reason, CompletionReason::Interrupted);
        assert!(engine.resolve_graph(GraphId(100)).await.is_none());
    }

    /// Engine that creates graphs but can never resolve them.
    #[derive(Default)]
    struct UnresolvableEngine {
        destroy_calls: AtomicUsize,
    }

    #[async_trait]
    impl GraphEngine for UnresolvableEngine {
        async fn init_context(&self, _context_id: ContextId) -> Result<(), EngineError> {
            Ok(())
        }

        async fn create_graph(&self, _config: &GraphConfig) -> Result<(), EngineError> {
            Ok(())
        }

        async fn resolve_graph(&self, _graph_id: GraphId) -> Option<Arc<dyn GraphHandle>> {
            None
        }

        async fn destroy_graph(&self, _graph_id: GraphId) -> Result<(), EngineError> {
            self.destroy_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_lookup_failure_is_reported_and_destroys() {
        let engine = Arc::new(UnresolvableEngine::default());
        let supervisor = supervisor_with(engine.clone(), 100);

        let err = supervisor.run().await.unwrap_err();
        assert!(matches!(err, StartError::LookupFailed { .. }));
        // The graph was created, so teardown still destroys it.
        assert_eq!(engine.destroy_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let engine = Arc::new(LoopbackEngine::new(Duration::ZERO));
        let mut supervisor = supervisor_with(engine.clone(), 100);

        supervisor.start().await.unwrap();
        supervisor.shutdown().await;
        assert_eq!(supervisor.state(), SupervisorState::Destroyed);
        // Second call is a no-op.
        supervisor.shutdown().await;
        assert_eq!(supervisor.state(), SupervisorState::Destroyed);
    }
}
