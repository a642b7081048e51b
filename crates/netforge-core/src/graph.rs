//! ArchitectureGraph: the block graph behind the editor.
//!
//! Blocks live in a petgraph `StableGraph` keyed by their stable string ids.
//! Next to it the graph keeps two ordered family collections:
//! - **Neural** (`Input`, `Hidden`, `Output`): fully connected chain.
//! - **Spatial** (`Convolutional`, `Pooling`): feature extraction chain.
//!
//! Each collection is kept sorted by `sequence_index`, ties broken by the
//! order in which blocks entered the family, so shape propagation can walk a
//! family front to back without re-sorting.
//!
//! All mutations go through `ArchitectureGraph` methods so the id maps and
//! family collections stay in step with the underlying graph.

use std::collections::HashMap;

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};

use crate::block::Family;
use crate::edge::{Edge, FlowEdge};
use crate::error::CoreError;
use crate::id::{EdgeId, NodeId};
use crate::node::{BlockParams, Node, Position};

/// Flat `(nodes, edges)` form used by storage and the HTTP API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// The architecture graph container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(into = "GraphDocument", try_from = "GraphDocument")]
pub struct ArchitectureGraph {
    graph: StableGraph<Node, FlowEdge, Directed, u32>,
    node_index: HashMap<NodeId, NodeIndex<u32>>,
    edge_index: HashMap<EdgeId, EdgeIndex<u32>>,
    neural: Vec<NodeIndex<u32>>,
    spatial: Vec<NodeIndex<u32>>,
    next_edge_ordinal: u64,
}

impl ArchitectureGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a graph from its flat form, validating ids and endpoints.
    pub fn from_document(doc: GraphDocument) -> Result<Self, CoreError> {
        let mut graph = ArchitectureGraph::new();
        for node in doc.nodes {
            graph.add_node(node)?;
        }
        for edge in doc.edges {
            graph.add_edge(edge)?;
        }
        Ok(graph)
    }

    /// Flat form: nodes in index order, edges in insertion order.
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self.nodes().cloned().collect(),
            edges: self.edges(),
        }
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.node_index.get(id).and_then(|&idx| self.graph.node_weight(idx))
    }

    /// Like [`node`](Self::node) but reports a missing id as an error.
    pub fn get_node(&self, id: &NodeId) -> Result<&Node, CoreError> {
        self.node(id)
            .ok_or_else(|| CoreError::NodeNotFound { id: id.clone() })
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    pub fn edge(&self, id: &EdgeId) -> Option<Edge> {
        self.edge_index.get(id).and_then(|&idx| self.edge_at(idx))
    }

    /// All edges, oldest first.
    pub fn edges(&self) -> Vec<Edge> {
        let mut indices: Vec<EdgeIndex<u32>> = self.graph.edge_indices().collect();
        indices.sort_by_key(|&idx| self.graph[idx].ordinal);
        indices.into_iter().filter_map(|idx| self.edge_at(idx)).collect()
    }

    fn edge_at(&self, idx: EdgeIndex<u32>) -> Option<Edge> {
        let (s, t) = self.graph.edge_endpoints(idx)?;
        Some(Edge {
            id: self.graph[idx].id.clone(),
            source: self.graph[s].id.clone(),
            target: self.graph[t].id.clone(),
        })
    }

    /// Edges leaving or entering `id`, oldest first.
    pub fn edges_directed(&self, id: &NodeId, dir: Direction) -> Vec<Edge> {
        let Some(&idx) = self.node_index.get(id) else {
            return Vec::new();
        };
        let mut refs: Vec<_> = self.graph.edges_directed(idx, dir).collect();
        refs.sort_by_key(|e| e.weight().ordinal);
        refs.into_iter().filter_map(|e| self.edge_at(e.id())).collect()
    }

    pub fn incoming(&self, id: &NodeId) -> Vec<Edge> {
        self.edges_directed(id, Direction::Incoming)
    }

    pub fn outgoing(&self, id: &NodeId) -> Vec<Edge> {
        self.edges_directed(id, Direction::Outgoing)
    }

    /// Direct successors of `id` in the order their edges were added.
    /// Parallel edges yield the successor once per edge.
    pub fn successors(&self, id: &NodeId) -> Vec<NodeId> {
        self.outgoing(id).into_iter().map(|e| e.target).collect()
    }

    pub fn incoming_count(&self, id: &NodeId) -> usize {
        self.node_index
            .get(id)
            .map(|&idx| self.graph.edges_directed(idx, Direction::Incoming).count())
            .unwrap_or(0)
    }

    /// Blocks of `family`, ordered by sequence index.
    pub fn family(&self, family: Family) -> impl Iterator<Item = &Node> {
        self.family_slot(family).iter().map(move |&idx| &self.graph[idx])
    }

    pub fn family_ids(&self, family: Family) -> Vec<NodeId> {
        self.family(family).map(|n| n.id.clone()).collect()
    }

    pub fn family_len(&self, family: Family) -> usize {
        self.family_slot(family).len()
    }

    fn family_slot(&self, family: Family) -> &Vec<NodeIndex<u32>> {
        match family {
            Family::Neural => &self.neural,
            Family::Spatial => &self.spatial,
        }
    }

    fn family_slot_mut(&mut self, family: Family) -> &mut Vec<NodeIndex<u32>> {
        match family {
            Family::Neural => &mut self.neural,
            Family::Spatial => &mut self.spatial,
        }
    }

    // -----------------------------------------------------------------------
    // Node mutations
    // -----------------------------------------------------------------------

    /// Adds a block. Its family position follows its `sequence_index`.
    pub fn add_node(&mut self, node: Node) -> Result<(), CoreError> {
        if self.node_index.contains_key(&node.id) {
            return Err(CoreError::DuplicateNode { id: node.id });
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.node_index.insert(id, idx);
        self.file_into_family(idx);

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(())
    }

    /// Removes a block and its incident edges. Nothing else cascades.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<Node, CoreError> {
        let idx = self
            .node_index
            .remove(id)
            .ok_or_else(|| CoreError::NodeNotFound { id: id.clone() })?;
        let incident: Vec<EdgeId> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .chain(self.graph.edges_directed(idx, Direction::Incoming))
            .map(|e| e.weight().id.clone())
            .collect();
        for edge_id in incident {
            self.edge_index.remove(&edge_id);
        }
        self.unfile_from_family(idx);
        let node = self
            .graph
            .remove_node(idx)
            .ok_or_else(|| CoreError::NodeNotFound { id: id.clone() })?;

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(node)
    }

    /// Mutates a block's parameters in place. The block is re-filed if the
    /// closure changes its kind.
    pub fn update_params<R>(
        &mut self,
        id: &NodeId,
        f: impl FnOnce(&mut BlockParams) -> R,
    ) -> Result<R, CoreError> {
        let idx = *self
            .node_index
            .get(id)
            .ok_or_else(|| CoreError::NodeNotFound { id: id.clone() })?;
        let before = self.graph[idx].family();
        let out = f(&mut self.graph[idx].params);
        if self.graph[idx].family() != before {
            self.unfile_from_family(idx);
            self.file_into_family(idx);
        }
        Ok(out)
    }

    /// Moves a block within its family.
    pub fn set_sequence_index(&mut self, id: &NodeId, sequence_index: u32) -> Result<(), CoreError> {
        let idx = *self
            .node_index
            .get(id)
            .ok_or_else(|| CoreError::NodeNotFound { id: id.clone() })?;
        if self.graph[idx].sequence_index == sequence_index {
            return Ok(());
        }
        self.unfile_from_family(idx);
        self.graph[idx].sequence_index = sequence_index;
        self.file_into_family(idx);

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(())
    }

    /// Increments the sequence index of every block in `family` at or after
    /// `from`, opening a slot for an insertion.
    pub fn make_room(&mut self, family: Family, from: u32) {
        let members = self.family_slot(family).clone();
        for idx in members {
            let node = &mut self.graph[idx];
            if node.sequence_index >= from {
                node.sequence_index = node.sequence_index.saturating_add(1);
            }
        }
    }

    /// Sequence index one past the last block of `family`.
    pub fn next_sequence_index(&self, family: Family) -> u32 {
        self.family(family)
            .map(|n| n.sequence_index.saturating_add(1))
            .max()
            .unwrap_or(0)
    }

    pub fn set_label(&mut self, id: &NodeId, label: String) -> Result<(), CoreError> {
        let idx = self.index_of(id)?;
        self.graph[idx].label = label;
        Ok(())
    }

    pub fn set_position(&mut self, id: &NodeId, position: Option<Position>) -> Result<(), CoreError> {
        let idx = self.index_of(id)?;
        self.graph[idx].position = position;
        Ok(())
    }

    fn index_of(&self, id: &NodeId) -> Result<NodeIndex<u32>, CoreError> {
        self.node_index
            .get(id)
            .copied()
            .ok_or_else(|| CoreError::NodeNotFound { id: id.clone() })
    }

    fn file_into_family(&mut self, idx: NodeIndex<u32>) {
        let Some(family) = self.graph[idx].family() else {
            return;
        };
        let seq = self.graph[idx].sequence_index;
        let graph = &self.graph;
        let pos = match family {
            Family::Neural => &self.neural,
            Family::Spatial => &self.spatial,
        }
        .iter()
        .position(|&other| graph[other].sequence_index > seq);
        let slot = self.family_slot_mut(family);
        match pos {
            Some(p) => slot.insert(p, idx),
            None => slot.push(idx),
        }
    }

    fn unfile_from_family(&mut self, idx: NodeIndex<u32>) {
        self.neural.retain(|&i| i != idx);
        self.spatial.retain(|&i| i != idx);
    }

    // -----------------------------------------------------------------------
    // Edge mutations
    // -----------------------------------------------------------------------

    /// Adds a connection. Both endpoints must exist; self loops are rejected.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), CoreError> {
        if self.edge_index.contains_key(&edge.id) {
            return Err(CoreError::DuplicateEdge { id: edge.id });
        }
        if edge.source == edge.target {
            return Err(CoreError::InvalidEdge {
                reason: format!("block '{}' cannot connect to itself", edge.source),
            });
        }
        let source = *self.node_index.get(&edge.source).ok_or_else(|| CoreError::InvalidEdge {
            reason: format!("source block '{}' does not exist", edge.source),
        })?;
        let target = *self.node_index.get(&edge.target).ok_or_else(|| CoreError::InvalidEdge {
            reason: format!("target block '{}' does not exist", edge.target),
        })?;
        let ordinal = self.next_edge_ordinal;
        self.next_edge_ordinal += 1;
        let idx = self.graph.add_edge(
            source,
            target,
            FlowEdge {
                id: edge.id.clone(),
                ordinal,
            },
        );
        self.edge_index.insert(edge.id, idx);
        Ok(())
    }

    pub fn remove_edge(&mut self, id: &EdgeId) -> Result<Edge, CoreError> {
        let idx = *self
            .edge_index
            .get(id)
            .ok_or_else(|| CoreError::EdgeNotFound { id: id.clone() })?;
        let edge = self
            .edge_at(idx)
            .ok_or_else(|| CoreError::EdgeNotFound { id: id.clone() })?;
        self.graph.remove_edge(idx);
        self.edge_index.remove(id);
        Ok(edge)
    }

    // -----------------------------------------------------------------------
    // Consistency checks
    // -----------------------------------------------------------------------

    /// Verifies that the id maps and family collections agree with the
    /// underlying graph.
    ///
    /// Only called in debug builds (via `cfg(debug_assertions)`).
    #[cfg(debug_assertions)]
    fn assert_consistency(&self) {
        assert_eq!(
            self.node_index.len(),
            self.graph.node_count(),
            "node id map out of sync with graph"
        );
        assert_eq!(
            self.edge_index.len(),
            self.graph.edge_count(),
            "edge id map out of sync with graph"
        );
        for family in [Family::Neural, Family::Spatial] {
            let slot = self.family_slot(family);
            for pair in slot.windows(2) {
                assert!(
                    self.graph[pair[0]].sequence_index <= self.graph[pair[1]].sequence_index,
                    "{:?} family out of order",
                    family
                );
            }
            for &idx in slot {
                assert_eq!(self.graph[idx].family(), Some(family), "block filed under wrong family");
            }
        }
    }
}

impl From<ArchitectureGraph> for GraphDocument {
    fn from(graph: ArchitectureGraph) -> Self {
        graph.to_document()
    }
}

impl TryFrom<GraphDocument> for ArchitectureGraph {
    type Error = CoreError;

    fn try_from(doc: GraphDocument) -> Result<Self, Self::Error> {
        ArchitectureGraph::from_document(doc)
    }
}
