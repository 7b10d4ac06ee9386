//! Gantry: concurrent launcher for device-bound processing graphs.
//!
//! This crate handles:
//! - Bringing up a fixed set of externally-defined processing graphs, one
//!   tokio task per graph
//! - Initializing each graph's execution context (once per context id)
//! - Feeding each graph an initial payload and counting completions
//!   reported at its terminal ports
//! - Coordinated, signal-driven teardown of every running graph
//!
//! What a graph actually computes is the business of an external engine
//! implementing the [`engine::GraphEngine`] trait; gantry only drives the
//! lifecycle.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod runner;
pub mod signal;
pub mod supervisor;
pub mod tracing;

// Re-export commonly used items
pub use config::{Config, ContextId, GraphConfig, GraphId, RunnerConfig, StagePort};
pub use context::ContextRegistry;
pub use engine::{
    CompletionObserver, GraphEngine, GraphHandle, LoopbackEngine, Payload, PortAddress,
};
pub use error::{ConfigError, EngineError, SetupError, StartError};
pub use runner::{GraphRunner, RunSummary, run_graphs};
pub use signal::shutdown_signal;
pub use supervisor::{
    CompletionReason, CompletionSink, GraphSupervisor, PendingCount, SupervisorState,
};
pub use tracing::init_tracing;
