//! Configuration for the gantry graph launcher.
//!
//! A runner config is a YAML file declaring an ordered list of graphs,
//! each with its topology source, ids, entry/terminal stages and initial
//! payload, plus runner-wide polling settings:
//!
//! ```yaml
//! runner:
//!   poll_interval_ms: 10
//! graphs:
//!   - source: ./graph0.config
//!     graph_id: 100
//!     context_id: 0
//!     entry: { stage: 101 }
//!     terminals:
//!       - { stage: 106 }
//! ```

mod graph_id;

pub use graph_id::{ContextId, GraphId};

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::engine::PortAddress;
use crate::error::{
    ConfigError, DuplicateGraphIdSnafu, NoGraphsSnafu, NoTerminalsSnafu, ReadFileSnafu,
    YamlParseSnafu, ZeroExpectedOutputsSnafu,
};

/// A (stage, port) attachment point within a graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StagePort {
    /// Stage identifier, unique within the graph.
    pub stage: u32,
    /// Port index on the stage.
    #[serde(default)]
    pub port: u32,
}

impl StagePort {
    /// Resolve this attachment point against a graph id.
    pub fn address(&self, graph_id: GraphId) -> PortAddress {
        PortAddress {
            graph_id,
            stage: self.stage,
            port: self.port,
        }
    }
}

/// Configuration for a single graph run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphConfig {
    /// Location of the topology description. Opaque to gantry; handed to
    /// the engine as-is.
    pub source: String,
    /// Identifier the graph will be resolvable under once created.
    pub graph_id: GraphId,
    /// Execution context (device/resource scope) to run under.
    pub context_id: ContextId,
    /// Entry stage the initial payload is sent to.
    pub entry: StagePort,
    /// Terminal stages whose output counts toward completion.
    pub terminals: Vec<StagePort>,
    /// Number of terminal outputs expected before the run is complete.
    #[serde(default = "default_expected_outputs")]
    pub expected_outputs: u32,
    /// Initial payload body.
    #[serde(default)]
    pub payload: String,
    /// Type tag sent along with the initial payload.
    #[serde(default = "default_type_tag")]
    pub type_tag: String,
}

fn default_expected_outputs() -> u32 {
    1
}

fn default_type_tag() -> String {
    "string".to_string()
}

impl GraphConfig {
    /// Address of the entry port.
    pub fn entry_address(&self) -> PortAddress {
        self.entry.address(self.graph_id)
    }

    /// Addresses of all terminal ports.
    pub fn terminal_addresses(&self) -> impl Iterator<Item = PortAddress> + '_ {
        self.terminals.iter().map(|t| t.address(self.graph_id))
    }
}

/// Runner-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    /// Interval between completion checks, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum random delay before each graph starts, in seconds.
    /// Zero disables staggered starts.
    #[serde(default)]
    pub start_jitter_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    10
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            start_jitter_secs: 0,
        }
    }
}

impl RunnerConfig {
    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Top-level configuration: runner settings plus an ordered list of graphs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Runner-wide settings.
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Graphs to launch, in declaration order.
    pub graphs: Vec<GraphConfig>,
}

impl Config {
    /// Load and validate configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).context(ReadFileSnafu)?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-graph invariants.
    ///
    /// Graph ids must be unique across the whole run: two supervisors
    /// resolving the same id would both believe they own the graph.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.graphs.is_empty(), NoGraphsSnafu);

        let mut seen = HashSet::new();
        for graph in &self.graphs {
            ensure!(
                seen.insert(graph.graph_id),
                DuplicateGraphIdSnafu {
                    graph_id: graph.graph_id
                }
            );
            ensure!(
                !graph.terminals.is_empty(),
                NoTerminalsSnafu {
                    graph_id: graph.graph_id
                }
            );
            ensure!(
                graph.expected_outputs > 0,
                ZeroExpectedOutputsSnafu {
                    graph_id: graph.graph_id
                }
            );
        }
        Ok(())
    }

    /// Number of graphs declared.
    pub fn graph_count(&self) -> usize {
        self.graphs.len()
    }
}
