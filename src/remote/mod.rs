//! Connection to the remote streaming transcription service
//!
//! - `link`: transport-agnostic send half and ordered event stream
//! - `client`: WebSocket implementation with header authentication
//! - `messages`: JSON control message codec

pub mod client;
pub mod link;
pub mod messages;

pub use client::{WebSocketConnector, WebSocketLink};
pub use link::{LinkConnector, LinkEvent, LinkHandle, RemoteLink};
pub use messages::{decode, endpoint_url, ClientMessage, ControlMessage, STREAMING_API_URL};
