use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::state::SessionState;
use super::stats::SessionStats;
use crate::audio::AudioSource;
use crate::error::{AudioError, LinkError};
use crate::remote::{ClientMessage, RemoteLink};

/// One streaming transcription session
///
/// Owns the audio source and the link while live. The audio source moves into
/// the forwarding task once the link opens and comes back when that task is
/// joined during teardown. Sessions are never reused; every start builds a new
/// one.
pub struct Session {
    id: Uuid,
    state: SessionState,
    remote_session_id: Option<String>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,

    audio: Option<Box<dyn AudioSource>>,
    audio_task: Option<JoinHandle<Box<dyn AudioSource>>>,
    link: Option<Arc<dyn RemoteLink>>,
    cancel: CancellationToken,

    /// Receive loop driving this session; joined by whoever waits on the manager
    receive_task: Option<JoinHandle<()>>,

    frames_sent: Arc<AtomicU64>,
    transcript_updates: u64,

    /// A stop reply, termination or error has been reported
    terminal_reported: bool,
}

impl Session {
    /// A session in `Starting` holding freshly acquired resources
    pub(crate) fn new(audio: Box<dyn AudioSource>, link: Arc<dyn RemoteLink>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Starting,
            remote_session_id: None,
            started_at: Utc::now(),
            ended_at: None,
            audio: Some(audio),
            audio_task: None,
            link: Some(link),
            cancel: CancellationToken::new(),
            receive_task: None,
            frames_sent: Arc::new(AtomicU64::new(0)),
            transcript_updates: 0,
            terminal_reported: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn remote_session_id(&self) -> Option<&str> {
        self.remote_session_id.as_deref()
    }

    /// Whether the audio source or the link is still held
    pub fn has_resources(&self) -> bool {
        self.audio.is_some() || self.audio_task.is_some() || self.link.is_some()
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            info!("Session {}: {} -> {}", self.id, self.state, state);
            self.state = state;
        }
    }

    pub(crate) fn set_remote_session_id(&mut self, id: String) {
        self.remote_session_id = Some(id);
    }

    pub(crate) fn record_transcript_update(&mut self) {
        self.transcript_updates += 1;
    }

    pub(crate) fn set_receive_task(&mut self, task: JoinHandle<()>) {
        self.receive_task = Some(task);
    }

    pub(crate) fn take_receive_task(&mut self) -> Option<JoinHandle<()>> {
        self.receive_task.take()
    }

    /// Claim the session's single terminal report; true only the first time
    pub(crate) fn claim_terminal_report(&mut self) -> bool {
        !std::mem::replace(&mut self.terminal_reported, true)
    }

    /// Launch the audio forwarding task and move to `Streaming`
    ///
    /// Returns false if there is no audio source or link to stream with.
    pub(crate) fn begin_streaming(&mut self) -> bool {
        let Some(link) = self.link.clone() else {
            return false;
        };
        let Some(source) = self.audio.take() else {
            return false;
        };

        let cancel = self.cancel.clone();
        let frames_sent = Arc::clone(&self.frames_sent);
        let runtime = Handle::current();

        self.audio_task = Some(tokio::task::spawn_blocking(move || {
            forward_audio(source, link, cancel, frames_sent, runtime)
        }));
        self.set_state(SessionState::Streaming);
        true
    }

    /// Ask the service to finish, then close the link
    ///
    /// The terminate message is only sent while the link is connected.
    pub(crate) async fn request_termination(&mut self) -> Result<(), LinkError> {
        let Some(link) = self.link.as_ref() else {
            return Err(LinkError::NotConnected);
        };

        if link.is_connected() {
            debug!("Sending terminate message");
            if let Err(e) = link.send_control(&ClientMessage::Terminate).await {
                warn!("Failed to send terminate message: {}", e);
            }
        }

        link.close().await
    }

    /// Release every resource the session holds
    ///
    /// Safe to call any number of times; each resource is released at most once.
    /// The link is closed first so an in-flight send cannot keep the forwarding
    /// task alive. Returns only once the audio source has been closed.
    pub(crate) async fn teardown(&mut self, join_timeout: Duration) {
        self.cancel.cancel();

        if let Some(link) = self.link.take() {
            if let Err(e) = link.close().await {
                warn!("Error closing link: {}", e);
            }
        }

        if let Some(mut task) = self.audio_task.take() {
            let joined = match timeout(join_timeout, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(
                        "Audio forwarding task still running after {:?}; waiting for it",
                        join_timeout
                    );
                    task.await
                }
            };
            match joined {
                Ok(source) => self.audio = Some(source),
                // The source was dropped with the panicking task
                Err(e) => error!("Audio forwarding task panicked: {}", e),
            }
        }

        if let Some(mut source) = self.audio.take() {
            release_audio(source.as_mut());
        }

        if self.ended_at.is_none() {
            self.ended_at = Some(Utc::now());
        }
        debug!("Session {} resources released", self.id);
    }

    pub fn stats(&self) -> SessionStats {
        let ended_at = self.ended_at.unwrap_or_else(Utc::now);
        let duration = ended_at.signed_duration_since(self.started_at);

        SessionStats {
            state: self.state,
            session_id: Some(self.id),
            remote_session_id: self.remote_session_id.clone(),
            started_at: Some(self.started_at),
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            frames_sent: self.frames_sent.load(Ordering::SeqCst),
            transcript_updates: self.transcript_updates,
        }
    }
}

/// Stop the stream if it is still running, then close the device
fn release_audio(source: &mut dyn AudioSource) {
    if source.is_active() {
        if let Err(e) = source.stop() {
            warn!("Error stopping audio source: {}", e);
        }
    }
    if let Err(e) = source.close() {
        warn!("Error closing audio source: {}", e);
    }
}

/// Body of the audio forwarding task
///
/// Reads one frame at a time and sends it before reading the next, so frames
/// leave in capture order. Cancellation is checked once per frame and also
/// interrupts a send that is stuck on a stalled connection. Failures end
/// the loop but never touch session state: the link reports how the session
/// ends.
fn forward_audio(
    mut source: Box<dyn AudioSource>,
    link: Arc<dyn RemoteLink>,
    cancel: CancellationToken,
    frames_sent: Arc<AtomicU64>,
    runtime: Handle,
) -> Box<dyn AudioSource> {
    info!("Starting audio streaming from {}", source.name());

    while !cancel.is_cancelled() {
        let frame = match source.read_frame() {
            Ok(frame) => frame,
            Err(AudioError::Exhausted) => {
                info!("Audio source exhausted");
                break;
            }
            Err(e) => {
                error!("Error reading audio: {}", e);
                break;
            }
        };

        let outcome = runtime.block_on(async {
            tokio::select! {
                _ = cancel.cancelled() => None,
                result = link.send_binary(frame.into_bytes()) => Some(result),
            }
        });
        match outcome {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                error!("Error streaming audio: {}", e);
                break;
            }
            None => {
                debug!("Audio send abandoned on cancellation");
                break;
            }
        }

        let sent = frames_sent.fetch_add(1, Ordering::SeqCst) + 1;
        if sent % 200 == 0 {
            debug!("Sent {} audio frames", sent);
        }
    }

    info!(
        "Audio streaming stopped after {} frames",
        frames_sent.load(Ordering::SeqCst)
    );
    source
}
