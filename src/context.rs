//! Once-per-process execution context initialization.
//!
//! Several graphs may name the same context id in degenerate
//! configurations. The engine's `init_context` is only safe to call once
//! per id, so supervisors route initialization through a shared registry:
//! the first caller initializes, later callers get a logged no-op.

use std::collections::HashSet;
use tokio::sync::Mutex;

use crate::config::ContextId;
use crate::engine::GraphEngine;
use crate::error::EngineError;

/// Outcome of [`ContextRegistry::ensure_initialized`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextInit {
    /// This call performed the initialization.
    Initialized,
    /// Another graph already initialized this context.
    AlreadyInitialized,
}

/// Process-wide record of initialized context ids.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    initialized: Mutex<HashSet<ContextId>>,
}

impl ContextRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize `context_id` through `engine` unless it already is.
    ///
    /// The lock is held across the engine call so two graphs racing on the
    /// same id cannot both initialize it. A failed initialization is not
    /// recorded, so a later graph may retry.
    pub async fn ensure_initialized(
        &self,
        engine: &dyn GraphEngine,
        context_id: ContextId,
    ) -> Result<ContextInit, EngineError> {
        let mut initialized = self.initialized.lock().await;
        if initialized.contains(&context_id) {
            return Ok(ContextInit::AlreadyInitialized);
        }
        engine.init_context(context_id).await?;
        initialized.insert(context_id);
        Ok(ContextInit::Initialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::config::{GraphConfig, GraphId};
    use crate::engine::GraphHandle;
    use crate::error::ContextInitSnafu;

    #[derive(Default)]
    struct CountingEngine {
        init_calls: AtomicUsize,
        fail_init: bool,
    }

    #[async_trait]
    impl GraphEngine for CountingEngine {
        async fn init_context(&self, context_id: ContextId) -> Result<(), EngineError> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_init {
                return ContextInitSnafu {
                    context_id,
                    message: "injected".to_string(),
                }
                .fail();
            }
            Ok(())
        }

        async fn create_graph(&self, _config: &GraphConfig) -> Result<(), EngineError> {
            Ok(())
        }

        async fn resolve_graph(&self, _graph_id: GraphId) -> Option<Arc<dyn GraphHandle>> {
            None
        }

        async fn destroy_graph(&self, _graph_id: GraphId) -> Result<(), EngineError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_initializes_once_per_context() {
        let engine = CountingEngine::default();
        let registry = ContextRegistry::new();

        let first = registry
            .ensure_initialized(&engine, ContextId(0))
            .await
            .unwrap();
        let second = registry
            .ensure_initialized(&engine, ContextId(0))
            .await
            .unwrap();

        assert_eq!(first, ContextInit::Initialized);
        assert_eq!(second, ContextInit::AlreadyInitialized);
        assert_eq!(engine.init_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_contexts_initialized_separately() {
        let engine = CountingEngine::default();
        let registry = ContextRegistry::new();

        registry
            .ensure_initialized(&engine, ContextId(0))
            .await
            .unwrap();
        registry
            .ensure_initialized(&engine, ContextId(1))
            .await
            .unwrap();

        assert_eq!(engine.init_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_init_is_not_recorded() {
        let engine = CountingEngine {
            fail_init: true,
            ..Default::default()
        };
        let registry = ContextRegistry::new();

        assert!(
            registry
                .ensure_initialized(&engine, ContextId(0))
                .await
                .is_err()
        );
        // A retry reaches the engine again rather than being swallowed.
        assert!(
            registry
                .ensure_initialized(&engine, ContextId(0))
                .await
                .is_err()
        );
        assert_eq!(engine.init_calls.load(Ordering::SeqCst), 2);
    }
}
