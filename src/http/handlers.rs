use super::state::AppState;
use crate::error::SessionError;
use crate::session::SessionStats;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::info;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub status: String,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(err: SessionError) -> axum::response::Response {
    let status = match err {
        SessionError::AlreadyActive => StatusCode::CONFLICT,
        SessionError::NoActiveSession => StatusCode::NOT_FOUND,
        SessionError::Audio(_) | SessionError::Link(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /transcription/start
/// Start a new transcription session
pub async fn start_transcription(State(state): State<AppState>) -> impl IntoResponse {
    info!("Start requested over HTTP");

    match state.manager.start().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ControlResponse {
                status: "transcription_started".to_string(),
                stats: state.manager.stats().await,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /transcription/stop
/// Stop the live transcription session
pub async fn stop_transcription(State(state): State<AppState>) -> impl IntoResponse {
    info!("Stop requested over HTTP");

    match state.manager.stop().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ControlResponse {
                status: "transcription_stopped".to_string(),
                stats: state.manager.stats().await,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /transcription/status
/// Get statistics for the current or most recent session
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.manager.stats().await))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
