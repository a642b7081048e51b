//! Core error types for netforge-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of the block registry and the architecture graph.

use crate::id::{EdgeId, NodeId};
use thiserror::Error;

/// Core errors produced by the netforge-core crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// A node id was not found in the graph.
    #[error("node not found: {id}")]
    NodeNotFound { id: NodeId },

    /// An edge id was not found in the graph.
    #[error("edge not found: {id}")]
    EdgeNotFound { id: EdgeId },

    /// A node with this id already exists.
    #[error("duplicate node id: {id}")]
    DuplicateNode { id: NodeId },

    /// An edge with this id already exists.
    #[error("duplicate edge id: {id}")]
    DuplicateEdge { id: EdgeId },

    /// An edge failed validation.
    #[error("invalid edge: {reason}")]
    InvalidEdge { reason: String },

    /// The registry has no entry for this block kind.
    #[error("unrecognized block kind '{kind}'")]
    UnknownBlockKind { kind: String },

    /// The block kind has no parameter with this name.
    #[error("block kind '{kind}' has no parameter '{param}'")]
    UnknownParameter { kind: String, param: String },

    /// The parameter is derived by shape propagation and cannot be set directly.
    #[error("parameter '{param}' of '{kind}' is derived and cannot be edited")]
    ReadOnlyParameter { kind: String, param: String },

    /// The value lies outside the parameter's domain.
    #[error("invalid value for '{param}': {reason}")]
    InvalidParameterValue { param: String, reason: String },

    /// Stored block data could not be decoded into the kind's parameters.
    #[error("malformed '{kind}' block data: {reason}")]
    MalformedBlock { kind: String, reason: String },
}
