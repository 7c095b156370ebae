use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::SessionConfig;
use super::events::{EventSink, SessionEvent};
use super::session::Session;
use super::state::SessionState;
use super::stats::SessionStats;
use crate::audio::AudioBackend;
use crate::error::SessionError;
use crate::remote::{self, ControlMessage, LinkConnector, LinkEvent, LinkHandle};

/// Owns the lifecycle of one streaming transcription session at a time
///
/// Every state write goes through a single mutex. The receive loop of the live
/// session applies link events under that mutex, in arrival order; start, stop
/// and disconnect requests take the same lock, so transitions never interleave.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: SessionConfig,
    audio: Arc<dyn AudioBackend>,
    connector: Arc<dyn LinkConnector>,
    sink: Arc<dyn EventSink>,
    /// Current or most recent session
    slot: Mutex<Option<Session>>,
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        audio: Arc<dyn AudioBackend>,
        connector: Arc<dyn LinkConnector>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                audio,
                connector,
                sink,
                slot: Mutex::new(None),
            }),
        }
    }

    /// Start a new session
    ///
    /// Emits `transcription_started` on success. Rejected with an `error` event,
    /// and without touching the live session, while one is already running.
    pub async fn start(&self) -> Result<(), SessionError> {
        let mut slot = self.inner.slot.lock().await;

        if let Some(current) = slot.as_ref() {
            if !current.state().accepts_start() {
                warn!("Start rejected: session {} is {}", current.id(), current.state());
                return Err(self.reject(SessionError::AlreadyActive));
            }
        }

        let mut source = match self.inner.audio.open(&self.inner.config.format) {
            Ok(source) => source,
            Err(e) => {
                error!("Failed to open audio source: {}", e);
                return Err(self.reject(e.into()));
            }
        };

        let LinkHandle { link, events } = match self.inner.connector.connect() {
            Ok(handle) => handle,
            Err(e) => {
                error!("Failed to start transcription: {}", e);
                if let Err(e) = source.close() {
                    warn!("Error closing audio source: {}", e);
                }
                return Err(self.reject(e.into()));
            }
        };

        let mut session = Session::new(source, link);
        let id = session.id();
        info!("Starting transcription session {}", id);

        session.set_receive_task(tokio::spawn(self.clone().receive_loop(id, events)));
        // Dropping the previous session here releases nothing: terminal
        // sessions hold no resources.
        *slot = Some(session);

        self.emit(SessionEvent::TranscriptionStarted);
        Ok(())
    }

    /// Stop the live session
    ///
    /// Emits `transcription_stopped` once the link has been asked to close;
    /// resources are released when the link reports closure. With no live
    /// session an `error` event is emitted instead.
    pub async fn stop(&self) -> Result<(), SessionError> {
        self.request_stop(true).await
    }

    /// Stop on behalf of a listener that went away; emits no reply
    pub async fn disconnect(&self) {
        match self.request_stop(false).await {
            Ok(()) => info!("Session stopped after client disconnect"),
            Err(SessionError::NoActiveSession) => {}
            Err(e) => error!("Error during disconnect: {}", e),
        }
    }

    async fn request_stop(&self, reply: bool) -> Result<(), SessionError> {
        let mut slot = self.inner.slot.lock().await;

        let Some(session) = slot
            .as_mut()
            .filter(|s| s.state().accepts_stop() && s.has_resources())
        else {
            return Err(if reply {
                self.reject(SessionError::NoActiveSession)
            } else {
                SessionError::NoActiveSession
            });
        };

        info!("Stopping transcription session {}", session.id());
        session.set_state(SessionState::Stopping);

        match session.request_termination().await {
            Ok(()) => {
                if reply && session.claim_terminal_report() {
                    self.emit(SessionEvent::TranscriptionStopped);
                }
                Ok(())
            }
            Err(e) => {
                error!("Error stopping transcription: {}", e);
                if reply && session.claim_terminal_report() {
                    self.emit(SessionEvent::error(e.to_string()));
                }
                Err(e.into())
            }
        }
    }

    /// Current state; `Idle` before the first session
    pub async fn state(&self) -> SessionState {
        self.inner
            .slot
            .lock()
            .await
            .as_ref()
            .map(Session::state)
            .unwrap_or_default()
    }

    /// Stats for the current or most recent session
    pub async fn stats(&self) -> SessionStats {
        self.inner
            .slot
            .lock()
            .await
            .as_ref()
            .map(Session::stats)
            .unwrap_or_else(SessionStats::idle)
    }

    /// Wait for the current session's receive loop to finish
    ///
    /// Returns immediately if there is nothing to wait for. Once this returns
    /// after a stop, the session has reached a terminal state and released
    /// everything it held.
    pub async fn wait_finished(&self) {
        let task = {
            let mut slot = self.inner.slot.lock().await;
            slot.as_mut().and_then(Session::take_receive_task)
        };

        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Receive task panicked: {}", e);
            }
        }
    }

    /// Drain link events for one session until it ends
    async fn receive_loop(self, id: Uuid, mut events: mpsc::Receiver<LinkEvent>) {
        debug!("Receive loop started for session {}", id);

        while let Some(event) = events.recv().await {
            if self.apply(id, event).await {
                debug!("Receive loop finished for session {}", id);
                return;
            }
        }

        // The link went away without reporting how
        self.apply(
            id,
            LinkEvent::Closed {
                code: None,
                reason: "link event stream ended".to_string(),
            },
        )
        .await;
        debug!("Receive loop finished for session {}", id);
    }

    /// Apply one link event; returns true once the session has ended
    async fn apply(&self, id: Uuid, event: LinkEvent) -> bool {
        let mut slot = self.inner.slot.lock().await;

        let Some(session) = slot.as_mut().filter(|s| s.id() == id) else {
            debug!("Dropping link event for stale session {}", id);
            return true;
        };
        if session.state().is_terminal() {
            return true;
        }

        match event {
            LinkEvent::Open => {
                if session.state() == SessionState::Starting && session.begin_streaming() {
                    self.emit(SessionEvent::SessionStarted {
                        session_id: "connected".to_string(),
                    });
                } else {
                    debug!("Ignoring link open while {}", session.state());
                }
                false
            }

            LinkEvent::Message(text) => match remote::decode(&text) {
                Ok(Some(message)) => self.handle_control(session, message).await,
                Ok(None) => false,
                Err(e) => {
                    warn!("Error decoding message: {}", e);
                    false
                }
            },

            LinkEvent::Error(message) => {
                error!("Link error: {}", message);
                if session.claim_terminal_report() {
                    self.emit(SessionEvent::error(message));
                }
                session.teardown(self.inner.config.join_timeout).await;
                session.set_state(SessionState::Failed);
                true
            }

            LinkEvent::Closed { code, reason } => {
                info!("Link closed: code={:?} reason={}", code, reason);
                if session.claim_terminal_report() {
                    self.emit(SessionEvent::SessionTerminated { duration: 0.0 });
                }
                session.teardown(self.inner.config.join_timeout).await;
                session.set_state(SessionState::Terminated);
                true
            }
        }
    }

    async fn handle_control(&self, session: &mut Session, message: ControlMessage) -> bool {
        match message {
            ControlMessage::SessionBegin { id, .. } => {
                info!("Session began: ID={}", id);
                session.set_remote_session_id(id.clone());
                self.emit(SessionEvent::SessionStarted { session_id: id });
                false
            }

            ControlMessage::TranscriptUpdate { text, is_final } => {
                info!("Transcript: {}", text);
                session.record_transcript_update();
                self.emit(SessionEvent::TranscriptUpdate {
                    transcript: text,
                    is_final,
                });
                false
            }

            ControlMessage::SessionEnd {
                audio_duration_seconds,
            } => {
                info!("Session terminated: {}s", audio_duration_seconds);
                if session.claim_terminal_report() {
                    self.emit(SessionEvent::SessionTerminated {
                        duration: audio_duration_seconds,
                    });
                }
                session.teardown(self.inner.config.join_timeout).await;
                session.set_state(SessionState::Terminated);
                true
            }

            ControlMessage::Unrecognized => {
                debug!("Ignoring unrecognized control message");
                false
            }
        }
    }

    /// Report a rejected request to listeners and hand the error back
    fn reject(&self, err: SessionError) -> SessionError {
        self.emit(SessionEvent::error(err.to_string()));
        err
    }

    fn emit(&self, event: SessionEvent) {
        debug!("Emitting {}", event.name());
        self.inner.sink.emit(event);
    }
}
