//! Decompose/recompose conversions between `ArchitectureGraph` and flat
//! storage rows.
//!
//! A block row keeps the editor's type string next to the JSON of its data
//! object, so placeholder blocks survive a round trip untouched. Connection
//! rows carry an ordinal; recomposing adds them back in ordinal order, which
//! preserves the successor order the linearizer depends on.

use netforge_core::node::RawBlock;
use netforge_core::{ArchitectureGraph, BlockParams, Edge, EdgeId, Node, NodeId, Position};

use crate::error::StorageError;

/// One block as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlock {
    pub id: String,
    pub kind: String,
    pub sequence_index: u32,
    pub label: String,
    pub position: Option<Position>,
    pub data_json: String,
}

/// One connection as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub ordinal: i64,
}

/// All rows of one project graph.
#[derive(Debug, Clone, Default)]
pub struct DecomposedGraph {
    pub blocks: Vec<StoredBlock>,
    pub edges: Vec<StoredEdge>,
}

pub fn block_to_row(node: &Node) -> Result<StoredBlock, StorageError> {
    let raw = RawBlock::from(node.params.clone());
    Ok(StoredBlock {
        id: node.id.0.clone(),
        kind: raw.kind,
        sequence_index: node.sequence_index,
        label: node.label.clone(),
        position: node.position,
        data_json: serde_json::to_string(&raw.data)?,
    })
}

pub fn row_to_block(row: StoredBlock) -> Result<Node, StorageError> {
    let data: serde_json::Value = serde_json::from_str(&row.data_json)?;
    let params = BlockParams::from_raw(RawBlock {
        kind: row.kind,
        data,
    })
    .map_err(|e| StorageError::ReconstructionError {
        reason: format!("block '{}': {}", row.id, e),
    })?;
    Ok(Node {
        id: NodeId(row.id),
        sequence_index: row.sequence_index,
        label: row.label,
        position: row.position,
        params,
    })
}

pub fn edge_to_row(edge: &Edge, ordinal: i64) -> StoredEdge {
    StoredEdge {
        id: edge.id.0.clone(),
        source: edge.source.0.clone(),
        target: edge.target.0.clone(),
        ordinal,
    }
}

pub fn row_to_edge(row: StoredEdge) -> Edge {
    Edge {
        id: EdgeId(row.id),
        source: NodeId(row.source),
        target: NodeId(row.target),
    }
}

/// Breaks a graph into rows; connections are numbered from zero in their
/// current order.
pub fn decompose(graph: &ArchitectureGraph) -> Result<DecomposedGraph, StorageError> {
    let blocks = graph
        .nodes()
        .map(block_to_row)
        .collect::<Result<Vec<_>, _>>()?;
    let edges = graph
        .edges()
        .iter()
        .enumerate()
        .map(|(i, e)| edge_to_row(e, i as i64))
        .collect();
    Ok(DecomposedGraph { blocks, edges })
}

/// Rebuilds a graph from rows. Blocks are added in row order, connections
/// in ordinal order.
pub fn recompose(rows: DecomposedGraph) -> Result<ArchitectureGraph, StorageError> {
    let mut graph = ArchitectureGraph::new();
    for row in rows.blocks {
        let node = row_to_block(row)?;
        graph
            .add_node(node)
            .map_err(|e| StorageError::ReconstructionError { reason: e.to_string() })?;
    }
    let mut edges = rows.edges;
    edges.sort_by_key(|e| e.ordinal);
    for row in edges {
        graph
            .add_edge(row_to_edge(row))
            .map_err(|e| StorageError::ReconstructionError { reason: e.to_string() })?;
    }
    Ok(graph)
}
