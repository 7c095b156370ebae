//! Streaming session management
//!
//! This module provides the `SessionManager` that owns one session at a time:
//! - Audio source and remote link acquisition on start
//! - Audio forwarding on a blocking task once the link opens
//! - Control message interpretation and event emission
//! - Deterministic teardown on stop, termination or failure

mod config;
mod events;
mod manager;
mod session;
mod state;
mod stats;

pub use config::SessionConfig;
pub use events::{BroadcastSink, EventSink, SessionEvent};
pub use manager::SessionManager;
pub use session::Session;
pub use state::SessionState;
pub use stats::SessionStats;
