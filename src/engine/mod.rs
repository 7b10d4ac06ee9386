//! Seam toward the external graph engine.
//!
//! Gantry never interprets what a graph computes; it talks to the engine
//! through [`GraphEngine`] (process-level operations keyed by id) and
//! [`GraphHandle`] (operations on one running graph). Completion flows the
//! other way: the engine invokes a registered [`CompletionObserver`] on its
//! own tasks whenever output arrives at a terminal port, so observer
//! implementations must be cheap, non-blocking and infallible.

mod loopback;

pub use loopback::LoopbackEngine;

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

use crate::config::{ContextId, GraphId};
use crate::error::EngineError;

/// Locator for a port within a running graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortAddress {
    /// Graph the port belongs to.
    pub graph_id: GraphId,
    /// Stage within the graph.
    pub stage: u32,
    /// Port index on the stage.
    pub port: u32,
}

impl fmt::Display for PortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/stage-{}/port-{}", self.graph_id, self.stage, self.port)
    }
}

/// An opaque unit of data moving through a graph.
///
/// Gantry forwards payloads without inspecting them; the `type_tag` is the
/// engine's business.
#[derive(Debug, Clone, Default)]
pub struct Payload {
    /// Engine-defined tag describing the body.
    pub type_tag: String,
    /// The body itself.
    pub data: Bytes,
}

impl Payload {
    /// Build a payload from a tag and body.
    pub fn new(type_tag: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            type_tag: type_tag.into(),
            data: data.into(),
        }
    }
}

/// Callback target for output arriving at a terminal port.
///
/// Invoked by the engine on its own execution context, concurrently with
/// anything the supervisor is doing. Must not block and must not fail.
pub trait CompletionObserver: Send + Sync {
    /// Called once per unit of output the graph emits.
    fn on_receive(&self, payload: Payload);
}

/// One running graph, resolvable by id after creation.
#[async_trait]
pub trait GraphHandle: Send + Sync {
    /// Register `observer` to be invoked for every unit of output arriving
    /// at `port`.
    async fn register_completion(
        &self,
        port: PortAddress,
        observer: Arc<dyn CompletionObserver>,
    ) -> Result<(), EngineError>;

    /// Send `payload` into the graph at `port`.
    async fn send_input(&self, port: PortAddress, payload: Payload) -> Result<(), EngineError>;
}

/// The external graph engine.
///
/// Implementations own graph creation, execution and destruction; gantry
/// only sequences the calls. `destroy_graph` must be idempotent:
/// supervisors call it exactly once per graph on the happy path, but an
/// interrupt race may produce a second call for an already-gone id.
#[async_trait]
pub trait GraphEngine: Send + Sync + 'static {
    /// Initialize the execution context with the given id.
    ///
    /// Called at most once per id per process (the caller serializes via
    /// [`crate::context::ContextRegistry`]).
    async fn init_context(&self, context_id: ContextId) -> Result<(), EngineError>;

    /// Create a graph from its configuration. On success the graph is
    /// resolvable via [`GraphEngine::resolve_graph`] under
    /// `config.graph_id`.
    async fn create_graph(&self, config: &crate::config::GraphConfig) -> Result<(), EngineError>;

    /// Look up a running graph by id.
    async fn resolve_graph(&self, graph_id: GraphId) -> Option<Arc<dyn GraphHandle>>;

    /// Destroy a graph. Idempotent; unknown ids are not an error.
    async fn destroy_graph(&self, graph_id: GraphId) -> Result<(), EngineError>;
}
