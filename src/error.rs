//! Error types for live-transcribe
//!
//! Session-scoped failures are reported to listeners as `error` events and never
//! bring the process down; only configuration errors are fatal at start-up.

use thiserror::Error;

/// Errors raised by an [`AudioSource`](crate::audio::AudioSource)
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio device not found: '{0}'")]
    DeviceNotFound(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio stream error: {0}")]
    Stream(String),

    #[error("Audio source is closed")]
    Closed,

    #[error("Audio source exhausted")]
    Exhausted,
}

/// Errors raised by a [`RemoteLink`](crate::remote::RemoteLink)
#[derive(Error, Debug, Clone)]
pub enum LinkError {
    #[error("Failed to connect to transcription service: {0}")]
    Connect(String),

    #[error("Link is not connected")]
    NotConnected,

    #[error("Failed to send over link: {0}")]
    Send(String),

    #[error("Link protocol error: {0}")]
    Protocol(String),
}

/// Errors surfaced by the session manager to the requester
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Transcription already in progress")]
    AlreadyActive,

    #[error("No active transcription session")]
    NoActiveSession,

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Link(#[from] LinkError),
}

/// Error decoding an inbound control frame
#[derive(Error, Debug)]
#[error("Malformed control message: {0}")]
pub struct DecodeError(#[from] pub serde_json::Error);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_messages() {
        assert_eq!(
            SessionError::AlreadyActive.to_string(),
            "Transcription already in progress"
        );
        assert_eq!(
            SessionError::NoActiveSession.to_string(),
            "No active transcription session"
        );
    }

    #[test]
    fn test_link_error_is_transparent_in_session_error() {
        let err: SessionError = LinkError::Connect("timeout".to_string()).into();
        assert!(err.to_string().contains("timeout"));
    }
}
