//! Streaming transcription wire messages
//!
//! Inbound frames are JSON objects discriminated by `type`; outbound control
//! frames use the same shape. Audio itself travels as raw binary frames.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Streaming endpoint of the transcription service
pub const STREAMING_API_URL: &str = "wss://streaming.assemblyai.com/v3/ws";

/// Build the connection URL carrying the stream parameters
pub fn endpoint_url(base: &str, sample_rate: u32, format_turns: bool) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!(
        "{}{}sample_rate={}&format_turns={}",
        base, separator, sample_rate, format_turns
    )
}

/// Messages sent to the transcription service
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Ask the service to flush and end the session
    Terminate,
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Raw inbound frame as sent by the service
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ServerMessage {
    Begin {
        id: String,
        #[serde(default)]
        expires_at: Option<serde_json::Value>,
    },
    Turn {
        #[serde(default)]
        transcript: String,
        #[serde(default)]
        turn_is_formatted: bool,
    },
    Termination {
        #[serde(default)]
        audio_duration_seconds: Option<f64>,
    },
    #[serde(other)]
    Unknown,
}

/// Domain view of an inbound control frame
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// The service assigned a session id
    SessionBegin { id: String, expires_at: Option<i64> },
    /// Partial or formatted transcript for the current turn
    TranscriptUpdate { text: String, is_final: bool },
    /// The service ended the session
    SessionEnd { audio_duration_seconds: f64 },
    /// Any message type the session has no use for
    Unrecognized,
}

/// Decode one inbound text frame
///
/// Returns `Ok(None)` for turns carrying an empty transcript, which produce no
/// event at all.
pub fn decode(text: &str) -> Result<Option<ControlMessage>, DecodeError> {
    let message = match serde_json::from_str::<ServerMessage>(text)? {
        ServerMessage::Begin { id, expires_at } => ControlMessage::SessionBegin {
            id,
            expires_at: expires_at.and_then(|v| v.as_i64()),
        },
        ServerMessage::Turn {
            transcript,
            turn_is_formatted,
        } => {
            if transcript.is_empty() {
                return Ok(None);
            }
            ControlMessage::TranscriptUpdate {
                text: transcript,
                is_final: turn_is_formatted,
            }
        }
        ServerMessage::Termination {
            audio_duration_seconds,
        } => ControlMessage::SessionEnd {
            audio_duration_seconds: audio_duration_seconds.unwrap_or(0.0),
        },
        ServerMessage::Unknown => ControlMessage::Unrecognized,
    };

    Ok(Some(message))
}
