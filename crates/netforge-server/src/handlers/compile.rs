//! Training configuration and compilation handlers.

use axum::extract::{Path, State};
use axum::Json;

use netforge_compiler::Compilation;
use netforge_core::TrainingConfig;
use netforge_storage::ProjectId;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /projects/{id}/training-config`
pub async fn get_training_config(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TrainingConfig>, ApiError> {
    let service = state.service.lock().await;
    Ok(Json(service.training_config(ProjectId(id))?))
}

/// `PUT /projects/{id}/training-config`
pub async fn set_training_config(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(training): Json<TrainingConfig>,
) -> Result<Json<TrainingConfig>, ApiError> {
    let mut service = state.service.lock().await;
    service.set_training_config(ProjectId(id), training)?;
    Ok(Json(service.training_config(ProjectId(id))?))
}

/// `POST /projects/{id}/compile`
///
/// Returns the model description together with skipped blocks, unreachable
/// layers and shape warnings.
pub async fn compile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Compilation>, ApiError> {
    let service = state.service.lock().await;
    Ok(Json(service.compile(ProjectId(id))?))
}
