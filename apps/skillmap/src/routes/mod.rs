pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::engine::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/extract", post(handlers::handle_extract))
        .route(
            "/api/v1/extract-object",
            post(handlers::handle_extract_object),
        )
        .route("/api/v1/normalize", post(handlers::handle_normalize))
        .route("/api/v1/matrix", post(handlers::handle_matrix))
        .with_state(state)
}
