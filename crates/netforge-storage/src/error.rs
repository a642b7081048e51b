//! Storage error types for netforge-storage.

use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Applying schema migrations failed.
    #[error("migration error: {0}")]
    Migration(String),

    #[error("project not found: {0}")]
    ProjectNotFound(i64),

    #[error("block not found: project={project}, block={node}")]
    NodeNotFound { project: i64, node: String },

    #[error("connection not found: project={project}, edge={edge}")]
    EdgeNotFound { project: i64, edge: String },

    /// A write would leave the stored graph inconsistent (duplicate id,
    /// dangling endpoint).
    #[error("integrity error: {reason}")]
    IntegrityError { reason: String },

    /// Stored rows could not be turned back into an `ArchitectureGraph`.
    #[error("reconstruction error: {reason}")]
    ReconstructionError { reason: String },
}
