//! Block registry listing.

use axum::extract::State;
use axum::Json;

use crate::state::AppState;

/// `GET /blocks`
pub async fn list_blocks(State(state): State<AppState>) -> Json<serde_json::Value> {
    let service = state.service.lock().await;
    Json(serde_json::json!({ "blocks": service.blocks() }))
}
