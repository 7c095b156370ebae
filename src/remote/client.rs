//! WebSocket link to the streaming transcription service
//!
//! `connect()` spawns a driver task that performs the handshake, installs the
//! write half once connected and then forwards inbound frames as
//! [`LinkEvent`]s until either side closes the connection.

use async_trait::async_trait;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{HeaderValue, Request},
        Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::link::{LinkConnector, LinkEvent, LinkHandle, RemoteLink};
use crate::error::LinkError;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Timeout for the WebSocket handshake
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on waiting for the write half while closing
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Buffered inbound events per link
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Close codes in this range carry application errors from the service
const APPLICATION_CLOSE_CODES: std::ops::RangeInclusive<u16> = 4000..=4999;

/// Opens authenticated WebSocket links to a fixed endpoint
pub struct WebSocketConnector {
    url: String,
    api_key: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    fn build_request(&self) -> Result<Request<()>, LinkError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| LinkError::Connect(e.to_string()))?;

        request.headers_mut().insert(
            "Authorization",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| LinkError::Connect(format!("invalid API key header: {}", e)))?,
        );

        Ok(request)
    }
}

impl LinkConnector for WebSocketConnector {
    fn connect(&self) -> Result<LinkHandle, LinkError> {
        let request = self.build_request()?;
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let link = Arc::new(WebSocketLink::new());
        tokio::spawn(drive(Arc::clone(&link), request, events_tx));

        Ok(LinkHandle {
            link,
            events: events_rx,
        })
    }
}

/// Send half of a WebSocket connection
pub struct WebSocketLink {
    sink: Mutex<Option<WsSink>>,
    connected: AtomicBool,
    shutdown: CancellationToken,
}

impl WebSocketLink {
    fn new() -> Self {
        Self {
            sink: Mutex::new(None),
            connected: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    /// Send one frame; abandoned as soon as the link is closed
    ///
    /// A peer that stops reading can stall a send indefinitely while it holds
    /// the write half. Racing against shutdown releases the lock for `close`.
    async fn send_message(&self, message: Message) -> Result<(), LinkError> {
        tokio::select! {
            _ = self.shutdown.cancelled() => Err(LinkError::NotConnected),
            result = async {
                let mut guard = self.sink.lock().await;
                let sink = guard.as_mut().ok_or(LinkError::NotConnected)?;
                sink.send(message)
                    .await
                    .map_err(|e| LinkError::Send(e.to_string()))
            } => result,
        }
    }
}

#[async_trait]
impl RemoteLink for WebSocketLink {
    async fn send_binary(&self, payload: Vec<u8>) -> Result<(), LinkError> {
        self.send_message(Message::Binary(payload)).await
    }

    async fn send_text(&self, text: String) -> Result<(), LinkError> {
        self.send_message(Message::Text(text)).await
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), LinkError> {
        // Stops the driver whether or not the handshake has finished
        self.shutdown.cancel();
        self.connected.store(false, Ordering::SeqCst);

        let mut guard = timeout(CLOSE_TIMEOUT, self.sink.lock())
            .await
            .map_err(|_| LinkError::Send("timed out waiting for pending send".to_string()))?;

        if let Some(mut sink) = guard.take() {
            info!("Closing WebSocket connection");
            sink.close()
                .await
                .map_err(|e| LinkError::Send(e.to_string()))?;
        }

        Ok(())
    }
}

/// Handshake, then pump inbound frames into `events` until the link ends
async fn drive(link: Arc<WebSocketLink>, request: Request<()>, events: mpsc::Sender<LinkEvent>) {
    info!("Connecting to {}", request.uri());

    let connected = tokio::select! {
        _ = link.shutdown.cancelled() => {
            let _ = events
                .send(LinkEvent::Closed {
                    code: None,
                    reason: "closed before connecting".to_string(),
                })
                .await;
            return;
        }
        result = timeout(CONNECTION_TIMEOUT, connect_async(request)) => result,
    };

    let ws_stream = match connected {
        Ok(Ok((ws_stream, _response))) => ws_stream,
        Ok(Err(e)) => {
            error!("WebSocket connection failed: {}", e);
            let _ = events.send(LinkEvent::Error(e.to_string())).await;
            return;
        }
        Err(_) => {
            error!("WebSocket connection timed out");
            let _ = events
                .send(LinkEvent::Error("Connection timeout".to_string()))
                .await;
            return;
        }
    };

    let (write, mut read) = ws_stream.split();
    {
        let mut guard = link.sink.lock().await;
        if link.shutdown.is_cancelled() {
            // close() ran while the handshake was in flight
            let mut write = write;
            let _ = write.close().await;
            drop(guard);
            let _ = events
                .send(LinkEvent::Closed {
                    code: None,
                    reason: "closed locally".to_string(),
                })
                .await;
            return;
        }
        *guard = Some(write);
        link.connected.store(true, Ordering::SeqCst);
    }

    info!("WebSocket connection opened");
    if events.send(LinkEvent::Open).await.is_err() {
        debug!("Link event receiver dropped");
        link.connected.store(false, Ordering::SeqCst);
        return;
    }

    let final_event = loop {
        tokio::select! {
            biased;
            _ = link.shutdown.cancelled() => {
                break LinkEvent::Closed {
                    code: None,
                    reason: "closed locally".to_string(),
                };
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if events.send(LinkEvent::Message(text)).await.is_err() {
                        debug!("Link event receiver dropped");
                        break LinkEvent::Closed {
                            code: None,
                            reason: "receiver dropped".to_string(),
                        };
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (Some(u16::from(f.code)), f.reason.into_owned()))
                        .unwrap_or((None, String::new()));
                    info!("WebSocket disconnected: status={:?} reason={}", code, reason);
                    match code {
                        Some(code) if APPLICATION_CLOSE_CODES.contains(&code) => {
                            break LinkEvent::Error(format!(
                                "Connection closed by service ({}): {}",
                                code, reason
                            ));
                        }
                        _ => break LinkEvent::Closed { code, reason },
                    }
                }
                Some(Ok(_)) => {} // Ignore ping/pong/binary
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    break LinkEvent::Error(e.to_string());
                }
                None => {
                    break LinkEvent::Closed {
                        code: None,
                        reason: "stream ended".to_string(),
                    };
                }
            },
        }
    };

    link.connected.store(false, Ordering::SeqCst);
    let _ = events.send(final_event).await;
    debug!("Link driver exiting");
}
