//! Numeric identifiers for graphs and execution contexts.
//!
//! Graph ids and context ids are assigned by whoever authored the graph
//! topologies; gantry treats them as opaque numbers. `GraphId` must be
//! unique across all concurrently running graphs in the process (validated
//! at config load), while several graphs may legitimately share a
//! `ContextId`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a processing graph.
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphId(pub u32);

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph-{}", self.0)
    }
}

impl From<u32> for GraphId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Identifier for the device/resource scope a graph runs under.
///
/// Initialized at most once per id per process; see
/// [`crate::context::ContextRegistry`].
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(pub u32);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context-{}", self.0)
    }
}

impl From<u32> for ContextId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", GraphId(100)), "graph-100");
        assert_eq!(format!("{}", ContextId(0)), "context-0");
    }

    #[test]
    fn test_serde_transparent() {
        let id: GraphId = serde_yaml::from_str("100").unwrap();
        assert_eq!(id, GraphId(100));
        assert_eq!(serde_yaml::to_string(&id).unwrap().trim(), "100");
    }

    #[test]
    fn test_ordering() {
        assert!(GraphId(100) < GraphId(101));
        assert_eq!(GraphId(100), GraphId::from(100));
    }

    #[test]
    fn test_hash_map_key() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(GraphId(100), "a");
        map.insert(GraphId(101), "b");
        assert_eq!(map.get(&GraphId(100)), Some(&"a"));
        assert_eq!(map.get(&GraphId(101)), Some(&"b"));
    }
}
