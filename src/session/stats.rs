use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::SessionState;

/// Snapshot of the current (or most recent) session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub state: SessionState,

    /// Local identifier, fresh for every start
    pub session_id: Option<Uuid>,

    /// Identifier assigned by the transcription service
    pub remote_session_id: Option<String>,

    /// When the session was started
    pub started_at: Option<DateTime<Utc>>,

    /// Seconds since the session was started
    pub duration_secs: f64,

    /// Audio frames sent over the link
    pub frames_sent: u64,

    /// Transcript updates relayed to listeners
    pub transcript_updates: u64,
}

impl SessionStats {
    /// Stats when no session has ever run
    pub fn idle() -> Self {
        Self {
            state: SessionState::Idle,
            session_id: None,
            remote_session_id: None,
            started_at: None,
            duration_secs: 0.0,
            frames_sent: 0,
            transcript_updates: 0,
        }
    }
}
