//! Project management request/response types.

use serde::{Deserialize, Serialize};

use netforge_check::Adjustment;
use netforge_storage::ProjectSummary;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub owner: String,
}

/// `GET /projects?owner=...`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectListQuery {
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<ProjectSummary>,
    /// Id of the project edits currently apply to.
    pub active: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadProjectResponse {
    pub project: ProjectSummary,
    /// Derived values fixed up by the reconciliation that runs on load.
    pub adjustments: Vec<Adjustment>,
    pub revision: String,
}
