//! Compiler error types covering all compilation failure modes.

use netforge_core::{CoreError, NodeId};

/// Errors that can occur while linearizing and compiling a graph.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Zero or several blocks have no incoming connection.
    #[error("expected exactly one start block, found {}", .candidates.len())]
    AmbiguousStart { candidates: Vec<NodeId> },

    /// The linearized graph contains no layer blocks.
    #[error("the architecture has no layers")]
    NoLayers,

    /// A layer's parameters cannot produce a valid model entry.
    #[error("invalid layer {node}: {reason}")]
    InvalidLayer { node: NodeId, reason: String },

    /// Graph or configuration error from the core crate.
    #[error(transparent)]
    Core(#[from] CoreError),
}
