pub mod chat;
pub mod models;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Wires the three public route groups (§4.I / §6) onto a fresh router.
#[must_use]
pub fn configure_routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route("/v1/models", get(models::list_models))
        .route("/v1/models/sync/all", post(models::sync_all))
        .route("/v1/models/sync/{provider}", post(models::sync_one))
        .with_state(state)
}
