//! Deterministic content hashing for project graphs using blake3.
//!
//! The graph hash is derived state, never stored. Clients receive it as the
//! graph `revision` and compare revisions to notice unsaved or concurrent
//! changes.
//!
//! Determinism comes from:
//! - `serde_json::to_vec` of types that contain no `HashMap`
//! - sorting block hashes by block id before composing them
//! - feeding connections in insertion order, which is itself meaningful
//!   (it fixes successor order during linearization)

use netforge_core::{ArchitectureGraph, Node, TrainingConfig};

/// Hash of a single block: id, kind, parameters, sequence index and label.
/// Canvas position is excluded so dragging a block does not change the
/// revision.
pub fn hash_node_content(node: &Node) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(node.id.as_str().as_bytes());
    hasher.update(&[0]);
    hasher.update(&node.sequence_index.to_le_bytes());
    hasher.update(node.label.as_bytes());
    hasher.update(&[0]);
    let params = serde_json::to_vec(&node.params).unwrap_or_default();
    hasher.update(&params);
    hasher.finalize()
}

/// Composite hash of every block, every connection and the training config.
pub fn hash_graph(graph: &ArchitectureGraph, training: &TrainingConfig) -> blake3::Hash {
    let mut blocks: Vec<(&str, blake3::Hash)> = graph
        .nodes()
        .map(|n| (n.id.as_str(), hash_node_content(n)))
        .collect();
    blocks.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = blake3::Hasher::new();
    for (_, h) in &blocks {
        hasher.update(h.as_bytes());
    }
    for edge in graph.edges() {
        hasher.update(edge.id.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(edge.source.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(edge.target.as_str().as_bytes());
        hasher.update(&[1]);
    }
    let training = serde_json::to_vec(training).unwrap_or_default();
    hasher.update(&training);
    hasher.finalize()
}

/// Hex form of [`hash_graph`], as exposed over the API.
pub fn revision(graph: &ArchitectureGraph, training: &TrainingConfig) -> String {
    hash_graph(graph, training).to_hex().to_string()
}
