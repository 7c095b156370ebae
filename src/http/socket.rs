use super::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Control messages accepted from a listener socket
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRequest {
    StartTranscription,
    StopTranscription,
}

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Relay session events to one listener and apply its control requests
///
/// Replies to start/stop arrive through the broadcast like every other event.
/// When the listener goes away the live session is disconnected.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.events.subscribe();

    info!("Client connected");

    let forward_task = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Listener lagged, skipped {} events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to serialize {}: {}", event.name(), e);
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                debug!("Listener socket closed");
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Err(e) => {
                warn!("WebSocket error: {}", e);
                break;
            }
            _ => continue,
        };

        match serde_json::from_str::<ControlRequest>(&text) {
            // Outcomes are reported to listeners as events
            Ok(ControlRequest::StartTranscription) => {
                let _ = state.manager.start().await;
            }
            Ok(ControlRequest::StopTranscription) => {
                let _ = state.manager.stop().await;
            }
            Err(e) => warn!("Invalid control message: {}", e),
        }
    }

    info!("Client disconnected");
    forward_task.abort();
    state.manager.disconnect().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_request_parsing() {
        assert_eq!(
            serde_json::from_str::<ControlRequest>(r#"{"type":"start_transcription"}"#).unwrap(),
            ControlRequest::StartTranscription
        );
        assert_eq!(
            serde_json::from_str::<ControlRequest>(r#"{"type":"stop_transcription"}"#).unwrap(),
            ControlRequest::StopTranscription
        );
        assert!(serde_json::from_str::<ControlRequest>(r#"{"type":"pause"}"#).is_err());
    }
}
