use crate::session::{BroadcastSink, SessionManager};

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The single transcription session manager
    pub manager: SessionManager,

    /// Event fan-out; every WebSocket listener subscribes here
    pub events: BroadcastSink,
}

impl AppState {
    pub fn new(manager: SessionManager, events: BroadcastSink) -> Self {
        Self { manager, events }
    }
}
