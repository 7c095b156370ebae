use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::messages::ClientMessage;
use crate::error::LinkError;

/// What the receive side of a link reports, strictly in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// The connection is established and ready for sends
    Open,
    /// One inbound text frame
    Message(String),
    /// Link-level failure; no further events follow
    Error(String),
    /// The connection closed cleanly, from either side
    Closed { code: Option<u16>, reason: String },
}

/// Send half of a full-duplex connection to the transcription service
#[async_trait]
pub trait RemoteLink: Send + Sync {
    /// Send one binary audio payload
    async fn send_binary(&self, payload: Vec<u8>) -> Result<(), LinkError>;

    /// Send one text frame
    async fn send_text(&self, text: String) -> Result<(), LinkError>;

    /// Serialize and send a control message
    async fn send_control(&self, message: &ClientMessage) -> Result<(), LinkError> {
        let json = message
            .to_json()
            .map_err(|e| LinkError::Protocol(e.to_string()))?;
        self.send_text(json).await
    }

    /// Whether the connection is currently open
    fn is_connected(&self) -> bool;

    /// Close the connection. Closing an already closed link is a no-op.
    async fn close(&self) -> Result<(), LinkError>;
}

/// A freshly started connection: the send half plus its event stream
///
/// The event stream is finite; it ends once the link has closed or failed.
pub struct LinkHandle {
    pub link: Arc<dyn RemoteLink>,
    pub events: mpsc::Receiver<LinkEvent>,
}

/// Starts connections to the transcription service
///
/// `connect` returns immediately; the connection is established in the
/// background and reported as [`LinkEvent::Open`].
pub trait LinkConnector: Send + Sync {
    fn connect(&self) -> Result<LinkHandle, LinkError>;
}
