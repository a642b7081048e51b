//! Project management handlers (create, list, delete, load).

use axum::extract::{Path, Query, State};
use axum::Json;

use netforge_storage::{ProjectId, ProjectSummary};

use crate::error::ApiError;
use crate::schema::projects::{
    CreateProjectRequest, LoadProjectResponse, ProjectListQuery, ProjectListResponse,
};
use crate::state::AppState;

/// `GET /projects`
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectListQuery>,
) -> Result<Json<ProjectListResponse>, ApiError> {
    let service = state.service.lock().await;
    let projects = service.list_projects(query.owner.as_deref())?;
    Ok(Json(ProjectListResponse {
        projects,
        active: service.project_id().0,
    }))
}

/// `POST /projects`
pub async fn create_project(
    State(state): State<AppState>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<Json<ProjectSummary>, ApiError> {
    let mut service = state.service.lock().await;
    Ok(Json(service.create_project(&req.name, &req.owner)?))
}

/// `DELETE /projects/{id}`
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut service = state.service.lock().await;
    service.delete_project(ProjectId(id))?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// `POST /projects/{id}/load`
pub async fn load_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<LoadProjectResponse>, ApiError> {
    let mut service = state.service.lock().await;
    let (project, adjustments) = service.load_project(ProjectId(id))?;
    Ok(Json(LoadProjectResponse {
        project,
        adjustments,
        revision: service.revision(),
    }))
}
