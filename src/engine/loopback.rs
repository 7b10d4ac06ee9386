//! In-process stand-in for a real graph engine.
//!
//! `LoopbackEngine` performs no computation: it records created graphs in
//! a map and, when input is sent, spawns a task that waits a configurable
//! latency and then echoes the payload to the registered observers, one
//! notification per expected output. It exists so the CLI can be exercised
//! end to end without an engine attached, and doubles as a smoke-test
//! fixture.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::{ContextId, GraphConfig, GraphId};
use crate::error::EngineError;

use super::{CompletionObserver, GraphEngine, GraphHandle, Payload, PortAddress};

/// One "running" loopback graph: just observer bookkeeping.
struct LoopbackGraph {
    graph_id: GraphId,
    outputs_per_input: u32,
    latency: Duration,
    observers: Mutex<Vec<(PortAddress, Arc<dyn CompletionObserver>)>>,
}

#[async_trait]
impl GraphHandle for LoopbackGraph {
    async fn register_completion(
        &self,
        port: PortAddress,
        observer: Arc<dyn CompletionObserver>,
    ) -> Result<(), EngineError> {
        debug!(port = %port, "Registering loopback observer");
        self.observers.lock().await.push((port, observer));
        Ok(())
    }

    async fn send_input(&self, port: PortAddress, payload: Payload) -> Result<(), EngineError> {
        debug!(port = %port, type_tag = %payload.type_tag, "Loopback input received");

        let observers = self.observers.lock().await.clone();
        let outputs = self.outputs_per_input;
        let latency = self.latency;
        let graph_id = self.graph_id;

        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            if observers.is_empty() {
                debug!(graph = %graph_id, "No observers registered, dropping output");
                return;
            }
            // Echo one notification per expected output, cycling through
            // the registered terminal ports.
            for n in 0..outputs as usize {
                let (port, observer) = &observers[n % observers.len()];
                debug!(port = %port, "Loopback emitting output");
                observer.on_receive(payload.clone());
            }
        });

        Ok(())
    }
}

/// Engine stand-in that echoes inputs back to terminal observers.
pub struct LoopbackEngine {
    latency: Duration,
    graphs: Mutex<HashMap<GraphId, Arc<LoopbackGraph>>>,
}

impl LoopbackEngine {
    /// Create an engine that echoes each input after `latency`.
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            graphs: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for LoopbackEngine {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

#[async_trait]
impl GraphEngine for LoopbackEngine {
    async fn init_context(&self, context_id: ContextId) -> Result<(), EngineError> {
        info!(context = %context_id, "Loopback context initialized");
        Ok(())
    }

    async fn create_graph(&self, config: &GraphConfig) -> Result<(), EngineError> {
        let graph = Arc::new(LoopbackGraph {
            graph_id: config.graph_id,
            outputs_per_input: config.expected_outputs,
            latency: self.latency,
            observers: Mutex::new(Vec::new()),
        });
        self.graphs.lock().await.insert(config.graph_id, graph);
        info!(graph = %config.graph_id, source = %config.source, "Loopback graph created");
        Ok(())
    }

    async fn resolve_graph(&self, graph_id: GraphId) -> Option<Arc<dyn GraphHandle>> {
        self.graphs
            .lock()
            .await
            .get(&graph_id)
            .cloned()
            .map(|g| g as Arc<dyn GraphHandle>)
    }

    async fn destroy_graph(&self, graph_id: GraphId) -> Result<(), EngineError> {
        let removed = self.graphs.lock().await.remove(&graph_id);
        if removed.is_some() {
            info!(graph = %graph_id, "Loopback graph destroyed");
        } else {
            debug!(graph = %graph_id, "Destroy for unknown graph (already gone)");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingObserver(AtomicUsize);

    impl CompletionObserver for CountingObserver {
        fn on_receive(&self, _payload: Payload) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_config(graph_id: u32, expected_outputs: u32) -> GraphConfig {
        GraphConfig {
            source: "./test.config".to_string(),
            graph_id: GraphId(graph_id),
            context_id: ContextId(0),
            entry: crate::config::StagePort { stage: 101, port: 0 },
            terminals: vec![crate::config::StagePort { stage: 106, port: 0 }],
            expected_outputs,
            payload: String::new(),
            type_tag: "string".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_resolve_destroy() {
        let engine = LoopbackEngine::new(Duration::ZERO);
        let config = test_config(100, 1);

        engine.create_graph(&config).await.unwrap();
        assert!(engine.resolve_graph(GraphId(100)).await.is_some());
        assert!(engine.resolve_graph(GraphId(999)).await.is_none());

        engine.destroy_graph(GraphId(100)).await.unwrap();
        assert!(engine.resolve_graph(GraphId(100)).await.is_none());

        // Idempotent destroy
        engine.destroy_graph(GraphId(100)).await.unwrap();
    }

    #[tokio::test]
    async fn test_echoes_one_output_per_expected() {
        let engine = LoopbackEngine::new(Duration::ZERO);
        let config = test_config(100, 3);
        engine.create_graph(&config).await.unwrap();

        let handle = engine.resolve_graph(GraphId(100)).await.unwrap();
        let observer = Arc::new(CountingObserver(AtomicUsize::new(0)));
        handle
            .register_completion(config.terminal_addresses().next().unwrap(), observer.clone())
            .await
            .unwrap();
        handle
            .send_input(config.entry_address(), Payload::new("string", ""))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(observer.0.load(Ordering::SeqCst), 3);
    }
}
