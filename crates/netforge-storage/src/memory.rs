//! In-memory implementation of [`ProjectStore`].
//!
//! [`InMemoryStore`] backs tests and throwaway sessions. It keeps the same
//! rows the SQLite backend writes, with the same ordering and integrity
//! rules, so the two are interchangeable.

use std::collections::BTreeMap;

use netforge_core::{ArchitectureGraph, Edge, EdgeId, Node, NodeId, TrainingConfig};

use crate::convert::{
    block_to_row, decompose, edge_to_row, recompose, row_to_block, row_to_edge, DecomposedGraph,
    StoredBlock, StoredEdge,
};
use crate::error::StorageError;
use crate::traits::ProjectStore;
use crate::types::{Project, ProjectId, ProjectSummary};

#[derive(Debug, Clone)]
struct StoredProject {
    name: String,
    owner: String,
    training: TrainingConfig,
    /// In insertion order, like SQLite rowid order.
    blocks: Vec<StoredBlock>,
    edges: Vec<StoredEdge>,
    next_ordinal: i64,
}

impl StoredProject {
    fn new(name: &str, owner: &str) -> Self {
        StoredProject {
            name: name.to_string(),
            owner: owner.to_string(),
            training: TrainingConfig::default(),
            blocks: Vec::new(),
            edges: Vec::new(),
            next_ordinal: 0,
        }
    }

    fn block_position(&self, id: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    fn edges_where(&self, pred: impl Fn(&StoredEdge) -> bool) -> Vec<Edge> {
        let mut rows: Vec<StoredEdge> = self.edges.iter().filter(|e| pred(e)).cloned().collect();
        rows.sort_by_key(|e| e.ordinal);
        rows.into_iter().map(row_to_edge).collect()
    }
}

/// In-memory backend. Projects are listed in id order.
#[derive(Debug)]
pub struct InMemoryStore {
    projects: BTreeMap<ProjectId, StoredProject>,
    next_id: i64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            projects: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn project(&self, id: ProjectId) -> Result<&StoredProject, StorageError> {
        self.projects
            .get(&id)
            .ok_or(StorageError::ProjectNotFound(id.0))
    }

    fn project_mut(&mut self, id: ProjectId) -> Result<&mut StoredProject, StorageError> {
        self.projects
            .get_mut(&id)
            .ok_or(StorageError::ProjectNotFound(id.0))
    }
}

impl ProjectStore for InMemoryStore {
    fn create_project(&mut self, name: &str, owner: &str) -> Result<ProjectId, StorageError> {
        let id = ProjectId(self.next_id);
        self.next_id = id.0 + 1;
        self.projects.insert(id, StoredProject::new(name, owner));
        Ok(id)
    }

    fn load_project(&self, id: ProjectId) -> Result<Project, StorageError> {
        let stored = self.project(id)?;
        let graph = recompose(DecomposedGraph {
            blocks: stored.blocks.clone(),
            edges: stored.edges.clone(),
        })?;
        Ok(Project {
            id,
            name: stored.name.clone(),
            owner: stored.owner.clone(),
            graph,
            training: stored.training.clone(),
        })
    }

    fn save_project(
        &mut self,
        id: ProjectId,
        graph: &ArchitectureGraph,
        training: &TrainingConfig,
    ) -> Result<(), StorageError> {
        let rows = decompose(graph)?;
        let stored = self.project_mut(id)?;
        stored.next_ordinal = rows.edges.len() as i64;
        stored.blocks = rows.blocks;
        stored.edges = rows.edges;
        stored.training = training.clone();
        Ok(())
    }

    fn delete_project(&mut self, id: ProjectId) -> Result<(), StorageError> {
        self.projects
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::ProjectNotFound(id.0))
    }

    fn list_projects(&self, owner: Option<&str>) -> Result<Vec<ProjectSummary>, StorageError> {
        Ok(self
            .projects
            .iter()
            .filter(|(_, p)| owner.map_or(true, |o| p.owner == o))
            .map(|(id, p)| ProjectSummary {
                id: *id,
                name: p.name.clone(),
                owner: p.owner.clone(),
            })
            .collect())
    }

    fn insert_node(&mut self, project: ProjectId, node: &Node) -> Result<(), StorageError> {
        let row = block_to_row(node)?;
        let stored = self.project_mut(project)?;
        if stored.block_position(&row.id).is_some() {
            return Err(StorageError::IntegrityError {
                reason: format!("block '{}' already exists", row.id),
            });
        }
        stored.blocks.push(row);
        Ok(())
    }

    fn get_node(&self, project: ProjectId, id: &NodeId) -> Result<Node, StorageError> {
        let stored = self.project(project)?;
        let row = stored
            .blocks
            .iter()
            .find(|b| b.id == id.0)
            .cloned()
            .ok_or_else(|| StorageError::NodeNotFound {
                project: project.0,
                node: id.0.clone(),
            })?;
        row_to_block(row)
    }

    fn update_node(&mut self, project: ProjectId, node: &Node) -> Result<(), StorageError> {
        let row = block_to_row(node)?;
        let stored = self.project_mut(project)?;
        let pos = stored
            .block_position(&row.id)
            .ok_or_else(|| StorageError::NodeNotFound {
                project: project.0,
                node: row.id.clone(),
            })?;
        stored.blocks[pos] = row;
        Ok(())
    }

    fn delete_node(&mut self, project: ProjectId, id: &NodeId) -> Result<(), StorageError> {
        let stored = self.project_mut(project)?;
        let pos = stored
            .block_position(&id.0)
            .ok_or_else(|| StorageError::NodeNotFound {
                project: project.0,
                node: id.0.clone(),
            })?;
        stored.blocks.remove(pos);
        stored.edges.retain(|e| e.source != id.0 && e.target != id.0);
        Ok(())
    }

    fn insert_edge(&mut self, project: ProjectId, edge: &Edge) -> Result<(), StorageError> {
        let stored = self.project_mut(project)?;
        if stored.edges.iter().any(|e| e.id == edge.id.0) {
            return Err(StorageError::IntegrityError {
                reason: format!("connection '{}' already exists", edge.id),
            });
        }
        for end in [&edge.source, &edge.target] {
            if stored.block_position(&end.0).is_none() {
                return Err(StorageError::IntegrityError {
                    reason: format!("connection '{}' references missing block '{}'", edge.id, end),
                });
            }
        }
        let row = edge_to_row(edge, stored.next_ordinal);
        stored.next_ordinal += 1;
        stored.edges.push(row);
        Ok(())
    }

    fn get_edge(&self, project: ProjectId, id: &EdgeId) -> Result<Edge, StorageError> {
        let stored = self.project(project)?;
        stored
            .edges
            .iter()
            .find(|e| e.id == id.0)
            .cloned()
            .map(row_to_edge)
            .ok_or_else(|| StorageError::EdgeNotFound {
                project: project.0,
                edge: id.0.clone(),
            })
    }

    fn delete_edge(&mut self, project: ProjectId, id: &EdgeId) -> Result<(), StorageError> {
        let stored = self.project_mut(project)?;
        let before = stored.edges.len();
        stored.edges.retain(|e| e.id != id.0);
        if stored.edges.len() == before {
            return Err(StorageError::EdgeNotFound {
                project: project.0,
                edge: id.0.clone(),
            });
        }
        Ok(())
    }

    fn find_edges_from(&self, project: ProjectId, node: &NodeId) -> Result<Vec<Edge>, StorageError> {
        Ok(self.project(project)?.edges_where(|e| e.source == node.0))
    }

    fn find_edges_to(&self, project: ProjectId, node: &NodeId) -> Result<Vec<Edge>, StorageError> {
        Ok(self.project(project)?.edges_where(|e| e.target == node.0))
    }

    fn find_nodes_by_kind(&self, project: ProjectId, kind: &str) -> Result<Vec<Node>, StorageError> {
        self.project(project)?
            .blocks
            .iter()
            .filter(|b| b.kind == kind)
            .cloned()
            .map(row_to_block)
            .collect()
    }

    fn get_training_config(&self, project: ProjectId) -> Result<TrainingConfig, StorageError> {
        Ok(self.project(project)?.training.clone())
    }

    fn set_training_config(
        &mut self,
        project: ProjectId,
        training: &TrainingConfig,
    ) -> Result<(), StorageError> {
        self.project_mut(project)?.training = training.clone();
        Ok(())
    }
}
