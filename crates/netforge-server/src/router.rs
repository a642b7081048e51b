//! Router assembly for the netforge HTTP API.

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the complete router. Routes use axum 0.8 `/{param}` syntax; CORS
/// is permissive for the browser editor.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/blocks", get(handlers::blocks::list_blocks))
        // Project management
        .route(
            "/projects",
            get(handlers::projects::list_projects).post(handlers::projects::create_project),
        )
        .route(
            "/projects/{id}",
            delete(handlers::projects::delete_project),
        )
        .route("/projects/{id}/load", post(handlers::projects::load_project))
        // Graph
        .route("/projects/{id}/graph", get(handlers::graph::get_graph))
        .route("/projects/{id}/nodes", post(handlers::graph::insert_block))
        .route(
            "/projects/{id}/nodes/{node_id}",
            get(handlers::graph::get_node)
                .patch(handlers::graph::edit_node)
                .delete(handlers::graph::delete_node),
        )
        .route("/projects/{id}/edges", post(handlers::graph::add_edge))
        .route(
            "/projects/{id}/edges/{edge_id}",
            delete(handlers::graph::delete_edge),
        )
        .route("/projects/{id}/reconcile", post(handlers::graph::reconcile))
        .route("/projects/{id}/check", get(handlers::graph::check))
        // Training configuration and compilation
        .route(
            "/projects/{id}/training-config",
            get(handlers::compile::get_training_config).put(handlers::compile::set_training_config),
        )
        .route("/projects/{id}/compile", post(handlers::compile::compile))
        // Training service
        .route("/projects/{id}/train", post(handlers::training::train))
        .route("/trainings/{training_id}", get(handlers::training::training_status))
        .route(
            "/trainings/{training_id}/cancel",
            post(handlers::training::cancel_training),
        )
        .route("/models/{model_id}/classify", post(handlers::training::classify))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
