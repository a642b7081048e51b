//! Connections between blocks.
//!
//! Edges only carry data-flow order for linearization. The graph stores a
//! [`FlowEdge`] weight holding the id and an insertion ordinal, so outgoing
//! edges can be walked in the order they were drawn regardless of how
//! petgraph reuses slots.

use serde::{Deserialize, Serialize};

use crate::id::{EdgeId, NodeId};

/// A connection as exchanged with the editor and storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
}

impl Edge {
    pub fn new(id: impl Into<EdgeId>, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Edge {
            id: id.into(),
            source: source.into(),
            target: target.into(),
        }
    }

    /// Connection with the editor's generated id.
    pub fn connect(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        let source = source.into();
        let target = target.into();
        Edge {
            id: EdgeId::between(&source, &target),
            source,
            target,
        }
    }
}

/// Edge weight stored in the petgraph graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub id: EdgeId,
    /// Monotonic per-graph insertion counter.
    pub ordinal: u64,
}
