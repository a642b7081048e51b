//! The [`ProjectStore`] trait defining the storage contract for projects.
//!
//! Row-level CRUD methods write exactly one block or connection and serve as
//! the incremental save path. `save_project`/`load_project` move a whole
//! graph at once. Both backends implement this trait and are swappable
//! without touching the service layer.

use netforge_core::{ArchitectureGraph, Edge, EdgeId, Node, NodeId, TrainingConfig};

use crate::error::StorageError;
use crate::types::{Project, ProjectId, ProjectSummary};

/// The storage contract for netforge projects.
///
/// Synchronous: callers that live in async code hold the store behind a
/// mutex and keep each call short.
pub trait ProjectStore {
    // -------------------------------------------------------------------
    // Project-level operations
    // -------------------------------------------------------------------

    /// Creates an empty project with the default training configuration.
    fn create_project(&mut self, name: &str, owner: &str) -> Result<ProjectId, StorageError>;

    /// Loads the project and rebuilds its graph from stored rows.
    fn load_project(&self, id: ProjectId) -> Result<Project, StorageError>;

    /// Replaces the stored graph and training configuration.
    fn save_project(
        &mut self,
        id: ProjectId,
        graph: &ArchitectureGraph,
        training: &TrainingConfig,
    ) -> Result<(), StorageError>;

    /// Deletes a project together with its blocks and connections.
    fn delete_project(&mut self, id: ProjectId) -> Result<(), StorageError>;

    /// Lists projects in creation order, optionally only those of `owner`.
    fn list_projects(&self, owner: Option<&str>) -> Result<Vec<ProjectSummary>, StorageError>;

    // -------------------------------------------------------------------
    // Block CRUD (incremental save)
    // -------------------------------------------------------------------

    fn insert_node(&mut self, project: ProjectId, node: &Node) -> Result<(), StorageError>;

    fn get_node(&self, project: ProjectId, id: &NodeId) -> Result<Node, StorageError>;

    /// Overwrites the stored block with the same id.
    fn update_node(&mut self, project: ProjectId, node: &Node) -> Result<(), StorageError>;

    /// Deletes a block and every connection touching it.
    fn delete_node(&mut self, project: ProjectId, id: &NodeId) -> Result<(), StorageError>;

    // -------------------------------------------------------------------
    // Connection CRUD
    // -------------------------------------------------------------------

    /// Appends a connection; both endpoints must already be stored.
    fn insert_edge(&mut self, project: ProjectId, edge: &Edge) -> Result<(), StorageError>;

    fn get_edge(&self, project: ProjectId, id: &EdgeId) -> Result<Edge, StorageError>;

    fn delete_edge(&mut self, project: ProjectId, id: &EdgeId) -> Result<(), StorageError>;

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    /// Connections leaving `node`, oldest first.
    fn find_edges_from(&self, project: ProjectId, node: &NodeId) -> Result<Vec<Edge>, StorageError>;

    /// Connections entering `node`, oldest first.
    fn find_edges_to(&self, project: ProjectId, node: &NodeId) -> Result<Vec<Edge>, StorageError>;

    /// Blocks whose editor type string equals `kind`, in stored order.
    fn find_nodes_by_kind(&self, project: ProjectId, kind: &str) -> Result<Vec<Node>, StorageError>;

    // -------------------------------------------------------------------
    // Training configuration
    // -------------------------------------------------------------------

    fn get_training_config(&self, project: ProjectId) -> Result<TrainingConfig, StorageError>;

    fn set_training_config(
        &mut self,
        project: ProjectId,
        training: &TrainingConfig,
    ) -> Result<(), StorageError>;
}
