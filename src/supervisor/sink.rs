//! Completion counting for a single graph.
//!
//! The engine delivers completion notifications on its own execution
//! context, out of band with the supervisor's poll loop. The bridge is a
//! per-graph [`PendingCount`]: the sink decrements it, the poll loop reads
//! it. Nothing here is shared between graphs, so a notification for one
//! graph can never touch another's state.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, warn};

use crate::config::GraphId;
use crate::engine::{CompletionObserver, Payload};

/// Number of outputs still expected before a graph run is complete.
///
/// Signed on purpose: a misbehaving graph may deliver more notifications
/// than expected, and the count simply goes negative rather than wrapping.
/// The completion condition is `<= 0`.
#[derive(Debug)]
pub struct PendingCount(AtomicI64);

impl PendingCount {
    /// Create a counter expecting `expected` outputs.
    pub fn new(expected: u32) -> Self {
        Self(AtomicI64::new(i64::from(expected)))
    }

    /// Record one arrived output. Returns the remaining count.
    pub fn decrement(&self) -> i64 {
        self.0.fetch_sub(1, Ordering::AcqRel) - 1
    }

    /// Outputs still outstanding (may be negative under over-delivery).
    pub fn remaining(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }

    /// Whether every expected output has arrived.
    pub fn is_complete(&self) -> bool {
        self.remaining() <= 0
    }
}

/// Observer registered at a graph's terminal ports.
///
/// Counts arrivals and nothing else: payload content is not interpreted,
/// and a payload that looks wrong is still one completion unit.
pub struct CompletionSink {
    graph_id: GraphId,
    pending: Arc<PendingCount>,
}

impl CompletionSink {
    /// Create a sink decrementing `pending` on behalf of `graph_id`.
    pub fn new(graph_id: GraphId, pending: Arc<PendingCount>) -> Self {
        Self { graph_id, pending }
    }
}

impl CompletionObserver for CompletionSink {
    fn on_receive(&self, payload: Payload) {
        if payload.type_tag.is_empty() {
            warn!(
                graph = %self.graph_id,
                "Completion payload has no type tag, counting it anyway"
            );
        }
        let remaining = self.pending.decrement();
        debug!(
            graph = %self.graph_id,
            remaining,
            "Completion notification received"
        );
        if remaining < 0 {
            warn!(
                graph = %self.graph_id,
                remaining,
                "More completions than expected"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_count_reaches_zero() {
        let pending = PendingCount::new(2);
        assert!(!pending.is_complete());
        assert_eq!(pending.decrement(), 1);
        assert!(!pending.is_complete());
        assert_eq!(pending.decrement(), 0);
        assert!(pending.is_complete());
    }

    #[test]
    fn test_pending_count_goes_negative() {
        let pending = PendingCount::new(1);
        pending.decrement();
        pending.decrement();
        assert_eq!(pending.remaining(), -1);
        // Over-delivery still satisfies the completion condition.
        assert!(pending.is_complete());
    }

    #[test]
    fn test_sink_decrements_own_graph_only() {
        let pending_a = Arc::new(PendingCount::new(1));
        let pending_b = Arc::new(PendingCount::new(1));
        let sink_a = CompletionSink::new(GraphId(100), pending_a.clone());

        sink_a.on_receive(Payload::new("string", ""));

        assert!(pending_a.is_complete());
        assert_eq!(pending_b.remaining(), 1);
    }

    #[test]
    fn test_sink_counts_malformed_payload() {
        let pending = Arc::new(PendingCount::new(1));
        let sink = CompletionSink::new(GraphId(100), pending.clone());

        // Empty tag and body: still one completion unit.
        sink.on_receive(Payload::default());
        assert!(pending.is_complete());
    }

    #[test]
    fn test_concurrent_decrements() {
        let pending = Arc::new(PendingCount::new(64));
        let sink = Arc::new(CompletionSink::new(GraphId(100), pending.clone()));

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let sink = sink.clone();
                std::thread::spawn(move || sink.on_receive(Payload::new("string", "")))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(pending.remaining(), 0);
    }
}
