use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session control
        .route("/session/start", post(handlers::start_session))
        .route("/session/stop", post(handlers::stop_session))
        .route("/session/mode", post(handlers::set_mode))
        // Session queries
        .route("/session/status", get(handlers::get_status))
        .route("/session/interim", get(handlers::get_interim))
        .route("/session/captions", get(handlers::get_captions))
        // Caption mutation
        .route("/session/captions/:id/edit", post(handlers::edit_caption))
        .route(
            "/session/captions/:id/translation",
            post(handlers::attach_translation),
        )
        // Correction settings
        .route("/session/dictionary", put(handlers::set_dictionary))
        .route("/session/profanity", put(handlers::set_profanity))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
