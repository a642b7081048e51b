//! Storage-layer types for project identity and metadata.
//!
//! [`ProjectId`] lives here rather than in netforge-core because a project
//! only gains an id once it is persisted.

use std::fmt;

use serde::{Deserialize, Serialize};

use netforge_core::{ArchitectureGraph, TrainingConfig};

/// Unique identifier for a stored project. Aligns with SQLite's
/// `INTEGER PRIMARY KEY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub i64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Summary of a stored project (for listing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub name: String,
    pub owner: String,
}

/// A fully loaded project.
#[derive(Debug, Clone)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub owner: String,
    pub graph: ArchitectureGraph,
    pub training: TrainingConfig,
}

impl Project {
    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            id: self.id,
            name: self.name.clone(),
            owner: self.owner.clone(),
        }
    }
}
