use super::handlers;
use super::socket;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Event relay
        .route("/ws", get(socket::ws_handler))
        // Session control
        .route("/transcription/start", post(handlers::start_transcription))
        .route("/transcription/stop", post(handlers::stop_transcription))
        .route("/transcription/status", get(handlers::get_status))
        // Browser pages may be served from another origin
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
