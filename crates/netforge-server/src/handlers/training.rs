//! Handlers that talk to the training and inference service.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::Json;

use netforge_storage::ProjectId;

use crate::error::ApiError;
use crate::jobs::JobView;
use crate::schema::training::TrainResponse;
use crate::state::AppState;
use crate::training::Classification;

/// `POST /projects/{id}/train`
///
/// Compiles the project, submits the model and starts polling its status.
pub async fn train(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TrainResponse>, ApiError> {
    let project = ProjectId(id);
    let model = {
        let service = state.service.lock().await;
        service.compile_for_training(project)?
    };

    let training_id = state.training.submit(&model).await?;
    tracing::info!(
        "project {}: submitted {} layer(s) for training as {}",
        project,
        model.len(),
        training_id
    );
    let job = state
        .jobs
        .start(state.training.clone(), training_id.clone(), project, state.poll);

    Ok(Json(TrainResponse {
        training_id,
        layers: model.len(),
        job,
    }))
}

/// `GET /trainings/{training_id}`
pub async fn training_status(
    State(state): State<AppState>,
    Path(training_id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    state
        .jobs
        .get(&training_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("training {}", training_id)))
}

/// `POST /trainings/{training_id}/cancel`
pub async fn cancel_training(
    State(state): State<AppState>,
    Path(training_id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    state
        .jobs
        .cancel(&training_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("training {}", training_id)))
}

/// `POST /models/{model_id}/classify`
///
/// The request body is the raw image; it is forwarded unchanged.
pub async fn classify(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Classification>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("image body is empty".to_string()));
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let classification = state.training.classify(&model_id, body, content_type).await?;
    Ok(Json(classification))
}
