//! Graph query and edit handlers.

use axum::extract::{Path, State};
use axum::Json;

use netforge_core::{EdgeId, NodeId};
use netforge_storage::ProjectId;

use crate::error::ApiError;
use crate::schema::graph::{
    AddEdgeRequest, CheckResponse, DeleteNodeResponse, EdgeResponse, EditNodeRequest,
    GraphResponse, InsertBlockRequest, NodeResponse, ReconcileResponse,
};
use crate::state::AppState;

/// `GET /projects/{id}/graph`
pub async fn get_graph(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<GraphResponse>, ApiError> {
    let service = state.service.lock().await;
    Ok(Json(service.graph(ProjectId(id))?))
}

/// `POST /projects/{id}/nodes`
pub async fn insert_block(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<InsertBlockRequest>,
) -> Result<Json<NodeResponse>, ApiError> {
    let mut service = state.service.lock().await;
    let node = service.insert_block(ProjectId(id), req)?;
    Ok(Json(NodeResponse {
        node,
        edit: None,
        revision: service.revision(),
    }))
}

/// `GET /projects/{id}/nodes/{node_id}`
pub async fn get_node(
    State(state): State<AppState>,
    Path((id, node_id)): Path<(i64, String)>,
) -> Result<Json<NodeResponse>, ApiError> {
    let service = state.service.lock().await;
    let node = service.node(ProjectId(id), &NodeId(node_id))?;
    Ok(Json(NodeResponse {
        node,
        edit: None,
        revision: service.revision(),
    }))
}

/// `PATCH /projects/{id}/nodes/{node_id}`
pub async fn edit_node(
    State(state): State<AppState>,
    Path((id, node_id)): Path<(i64, String)>,
    Json(req): Json<EditNodeRequest>,
) -> Result<Json<NodeResponse>, ApiError> {
    let mut service = state.service.lock().await;
    let (node, edit) = service.edit_node(ProjectId(id), &NodeId(node_id), req)?;
    Ok(Json(NodeResponse {
        node,
        edit,
        revision: service.revision(),
    }))
}

/// `DELETE /projects/{id}/nodes/{node_id}`
pub async fn delete_node(
    State(state): State<AppState>,
    Path((id, node_id)): Path<(i64, String)>,
) -> Result<Json<DeleteNodeResponse>, ApiError> {
    let mut service = state.service.lock().await;
    let (removed, adjustments) = service.delete_node(ProjectId(id), &NodeId(node_id))?;
    Ok(Json(DeleteNodeResponse {
        removed,
        adjustments,
        revision: service.revision(),
    }))
}

/// `POST /projects/{id}/edges`
pub async fn add_edge(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AddEdgeRequest>,
) -> Result<Json<EdgeResponse>, ApiError> {
    let mut service = state.service.lock().await;
    let edge = service.add_edge(ProjectId(id), req)?;
    Ok(Json(EdgeResponse {
        edge,
        revision: service.revision(),
    }))
}

/// `DELETE /projects/{id}/edges/{edge_id}`
pub async fn delete_edge(
    State(state): State<AppState>,
    Path((id, edge_id)): Path<(i64, String)>,
) -> Result<Json<EdgeResponse>, ApiError> {
    let mut service = state.service.lock().await;
    let edge = service.delete_edge(ProjectId(id), &EdgeId(edge_id))?;
    Ok(Json(EdgeResponse {
        edge,
        revision: service.revision(),
    }))
}

/// `POST /projects/{id}/reconcile`
pub async fn reconcile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ReconcileResponse>, ApiError> {
    let mut service = state.service.lock().await;
    let adjustments = service.reconcile(ProjectId(id))?;
    Ok(Json(ReconcileResponse {
        adjustments,
        revision: service.revision(),
    }))
}

/// `GET /projects/{id}/check`
pub async fn check(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CheckResponse>, ApiError> {
    let service = state.service.lock().await;
    let violations = service.check(ProjectId(id))?;
    Ok(Json(CheckResponse {
        valid: violations.is_empty(),
        violations,
    }))
}
