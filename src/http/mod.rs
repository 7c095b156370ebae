//! HTTP / WebSocket relay between browser listeners and the session manager
//!
//! - GET /ws - Bidirectional event socket (controls in, session events out)
//! - POST /transcription/start - Start a session
//! - POST /transcription/stop - Stop the live session
//! - GET /transcription/status - Current session statistics
//! - GET /health - Health check

mod handlers;
mod routes;
mod socket;
mod state;

pub use routes::create_router;
pub use socket::ControlRequest;
pub use state::AppState;
