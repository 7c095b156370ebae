pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod remote;
pub mod session;

pub use audio::{
    AudioBackend, AudioBackendFactory, AudioFormat, AudioFrame, AudioInput, AudioSource,
    WavFileBackend, WavFileSource,
};
pub use config::Config;
pub use error::{AudioError, DecodeError, LinkError, SessionError};
pub use http::{create_router, AppState};
pub use remote::{
    ClientMessage, ControlMessage, LinkConnector, LinkEvent, LinkHandle, RemoteLink,
    WebSocketConnector,
};
pub use session::{
    BroadcastSink, EventSink, SessionConfig, SessionEvent, SessionManager, SessionState,
    SessionStats,
};
