use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Events relayed to front-end listeners
///
/// Serialized as `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Reply to a successful start request
    TranscriptionStarted,
    /// Reply to a successful stop request
    TranscriptionStopped,
    /// Connected (`"connected"`), then again once the service assigns an id
    SessionStarted { session_id: String },
    TranscriptUpdate { transcript: String, is_final: bool },
    /// The service ended the session; `duration` is seconds of audio processed
    SessionTerminated { duration: f64 },
    Error { message: String },
}

impl SessionEvent {
    /// Event name on the wire
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::TranscriptionStarted => "transcription_started",
            SessionEvent::TranscriptionStopped => "transcription_stopped",
            SessionEvent::SessionStarted { .. } => "session_started",
            SessionEvent::TranscriptUpdate { .. } => "transcript_update",
            SessionEvent::SessionTerminated { .. } => "session_terminated",
            SessionEvent::Error { .. } => "error",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        SessionEvent::Error {
            message: message.into(),
        }
    }
}

/// Receives session events; implementations must not block
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SessionEvent);
}

/// Fans events out to every subscribed listener
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<SessionEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            debug!("No listeners for session event");
        }
    }
}
