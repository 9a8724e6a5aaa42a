pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::assessment::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Assessment API
        .route(
            "/api/v1/candidates/:id/assessment",
            get(handlers::handle_get_assessment),
        )
        .route(
            "/api/v1/candidates/:id/projects",
            post(handlers::handle_submit_project),
        )
        .route(
            "/api/v1/candidates/:id/regenerate",
            post(handlers::handle_regenerate),
        )
        .route(
            "/api/v1/projects/:id",
            patch(handlers::handle_rename_project).delete(handlers::handle_remove_project),
        )
        .with_state(state)
}
