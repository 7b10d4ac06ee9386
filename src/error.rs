//! Error types for graph orchestration.
//!
//! Errors are scoped per concern: [`EngineError`] for failures reported by
//! the external graph engine, [`StartError`] for the per-graph bring-up
//! sequence, [`ConfigError`] for configuration loading, and [`SetupError`]
//! for process-level wiring. A `StartError` is always fatal to exactly one
//! graph and never to its siblings.

use snafu::prelude::*;

use crate::config::{ContextId, GraphId};

// ============ Engine Errors ============

/// Errors reported by the external graph engine.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EngineError {
    /// Execution context initialization failed.
    #[snafu(display("Failed to initialize context {context_id}: {message}"))]
    ContextInit {
        context_id: ContextId,
        message: String,
    },

    /// Graph creation from its topology source failed.
    #[snafu(display("Failed to create graph from '{source_path}': {message}"))]
    GraphCreate {
        source_path: String,
        message: String,
    },

    /// No running graph with the given identifier.
    #[snafu(display("Graph {graph_id} not found"))]
    GraphNotFound { graph_id: GraphId },

    /// Callback registration at a terminal port failed.
    #[snafu(display("Failed to register callback on graph {graph_id}: {message}"))]
    CallbackRegister { graph_id: GraphId, message: String },

    /// Sending input into the entry port failed.
    #[snafu(display("Failed to send input to graph {graph_id}: {message}"))]
    InputSend { graph_id: GraphId, message: String },

    /// Graph destruction failed. Destruction is best-effort; callers log
    /// this and continue.
    #[snafu(display("Failed to destroy graph {graph_id}: {message}"))]
    GraphDestroy { graph_id: GraphId, message: String },
}

// ============ Start Errors ============

/// Errors that can occur while bringing up a single graph.
///
/// Each variant aborts only the owning supervisor's sequence; sibling
/// graphs keep running.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StartError {
    /// Context initialization failed fatally.
    #[snafu(display("Context init failed for graph {graph_id}: {source}"))]
    InitFailed {
        graph_id: GraphId,
        source: EngineError,
    },

    /// The engine could not create the graph.
    #[snafu(display("Create failed for graph {graph_id}: {source}"))]
    CreateFailed {
        graph_id: GraphId,
        source: EngineError,
    },

    /// The graph was created but cannot be resolved by its identifier.
    /// Treated as a recoverable no-op: log and skip this graph.
    #[snafu(display("Graph {graph_id} created but not resolvable"))]
    LookupFailed { graph_id: GraphId },

    /// Completion callback registration failed.
    #[snafu(display("Callback registration failed for graph {graph_id}: {source}"))]
    RegisterFailed {
        graph_id: GraphId,
        source: EngineError,
    },

    /// The initial payload could not be delivered to the entry port.
    #[snafu(display("Initial send failed for graph {graph_id}: {source}"))]
    SendFailed {
        graph_id: GraphId,
        source: EngineError,
    },
}

// ============ Config Errors ============

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[snafu(display("Failed to read configuration file: {source}"))]
    ReadFile { source: std::io::Error },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// Configuration declares no graphs.
    #[snafu(display("Configuration must declare at least one graph"))]
    NoGraphs,

    /// The same graph id appears more than once.
    #[snafu(display("Duplicate graph id: {graph_id}"))]
    DuplicateGraphId { graph_id: GraphId },

    /// A graph declares no terminal ports, so completion could never be
    /// observed.
    #[snafu(display("Graph {graph_id} has no terminal ports"))]
    NoTerminals { graph_id: GraphId },

    /// A graph expects zero outputs, so it would complete before running.
    #[snafu(display("Graph {graph_id} has expected_outputs of 0"))]
    ZeroExpectedOutputs { graph_id: GraphId },
}

// ============ Setup Errors ============

/// Errors that can occur wiring up the runner (before any graph starts).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SetupError {
    /// Configuration failed validation.
    #[snafu(display("Invalid configuration: {source}"))]
    InvalidConfig { source: ConfigError },
}
