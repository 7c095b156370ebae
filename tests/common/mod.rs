// Shared test doubles for session integration tests
//
// The mocks record every call so tests can assert on resource release, and
// the remote side is driven by hand through `MockRemote`.

#![allow(dead_code)]

use async_trait::async_trait;
use live_transcribe::{
    AudioBackend, AudioError, AudioFormat, AudioFrame, AudioSource, EventSink, LinkConnector,
    LinkError, LinkEvent, LinkHandle, RemoteLink, SessionConfig, SessionEvent, SessionManager,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// Audio
// ============================================================================

/// Counts what happened to the sources a backend handed out
#[derive(Default)]
pub struct AudioProbe {
    pub opened: AtomicUsize,
    pub frames_read: AtomicUsize,
    pub stops: AtomicUsize,
    pub closes: AtomicUsize,
}

pub struct MockSource {
    probe: Arc<AudioProbe>,
    sequence: u64,
    active: bool,
}

impl AudioSource for MockSource {
    fn read_frame(&mut self) -> Result<AudioFrame, AudioError> {
        if !self.active {
            return Err(AudioError::Closed);
        }
        std::thread::sleep(Duration::from_millis(5));
        self.probe.frames_read.fetch_add(1, Ordering::SeqCst);
        let frame = AudioFrame::from_samples(&[0i16; 160], self.sequence);
        self.sequence += 1;
        Ok(frame)
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
        self.active = false;
        Ok(())
    }

    fn close(&mut self) -> Result<(), AudioError> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        self.active = false;
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[derive(Default)]
pub struct MockBackend {
    pub probe: Arc<AudioProbe>,
    pub fail_open: AtomicBool,
}

impl AudioBackend for MockBackend {
    fn open(&self, _format: &AudioFormat) -> Result<Box<dyn AudioSource>, AudioError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(AudioError::DeviceNotFound("mock microphone".to_string()));
        }
        self.probe.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSource {
            probe: Arc::clone(&self.probe),
            sequence: 0,
            active: true,
        }))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// Remote link
// ============================================================================

pub struct MockLink {
    events: mpsc::Sender<LinkEvent>,
    connected: AtomicBool,
    /// Audio sends never complete, like a peer that stopped reading
    stall_sends: bool,
    pub audio_frames: AtomicUsize,
    pub texts: Mutex<Vec<String>>,
    pub closes: AtomicUsize,
}

impl MockLink {
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    pub fn is_connected_now(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteLink for MockLink {
    async fn send_binary(&self, _payload: Vec<u8>) -> Result<(), LinkError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(LinkError::NotConnected);
        }
        if self.stall_sends {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        self.audio_frames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_text(&self, text: String) -> Result<(), LinkError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(LinkError::NotConnected);
        }
        self.texts.lock().unwrap().push(text);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Behaves like a real socket: the first close reports `Closed`
    async fn close(&self) -> Result<(), LinkError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.events.try_send(LinkEvent::Closed {
                code: Some(1000),
                reason: "closed locally".to_string(),
            });
        }
        Ok(())
    }
}

/// Test-side handle on one connection: the link plus its event feed
#[derive(Clone)]
pub struct MockRemote {
    pub link: Arc<MockLink>,
    events: mpsc::Sender<LinkEvent>,
}

impl MockRemote {
    pub async fn send(&self, event: LinkEvent) {
        // The receive loop may already be gone once the session has ended
        let _ = self.events.send(event).await;
    }

    pub async fn open(&self) {
        self.send(LinkEvent::Open).await;
    }

    pub async fn message(&self, json: &str) {
        self.send(LinkEvent::Message(json.to_string())).await;
    }
}

#[derive(Default)]
pub struct MockConnector {
    remotes: Mutex<Vec<MockRemote>>,
    pub fail_connect: AtomicBool,
    pub stall_sends: AtomicBool,
}

impl MockConnector {
    pub fn connections(&self) -> usize {
        self.remotes.lock().unwrap().len()
    }

    pub fn last(&self) -> MockRemote {
        self.remotes
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no connection was made")
    }
}

impl LinkConnector for MockConnector {
    fn connect(&self) -> Result<LinkHandle, LinkError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(LinkError::Connect("connection refused".to_string()));
        }

        let (tx, rx) = mpsc::channel(64);
        let link = Arc::new(MockLink {
            events: tx.clone(),
            connected: AtomicBool::new(true),
            stall_sends: self.stall_sends.load(Ordering::SeqCst),
            audio_frames: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        });

        self.remotes.lock().unwrap().push(MockRemote {
            link: Arc::clone(&link),
            events: tx,
        });

        Ok(LinkHandle { link, events: rx })
    }
}

// ============================================================================
// Events
// ============================================================================

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(SessionEvent::name).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names().into_iter().filter(|n| *n == name).count()
    }

    /// Wait until an event with this name has been emitted
    pub async fn wait_for(&self, name: &str) {
        wait_until(|| self.count(name) > 0).await;
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: SessionEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub manager: SessionManager,
    pub backend: Arc<MockBackend>,
    pub connector: Arc<MockConnector>,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    pub fn new() -> Self {
        let backend = Arc::new(MockBackend::default());
        let connector = Arc::new(MockConnector::default());
        let sink = Arc::new(RecordingSink::default());

        let manager = SessionManager::new(
            SessionConfig {
                join_timeout: Duration::from_secs(1),
                ..Default::default()
            },
            backend.clone(),
            connector.clone(),
            sink.clone(),
        );

        Self {
            manager,
            backend,
            connector,
            sink,
        }
    }

    pub fn audio(&self) -> &AudioProbe {
        &self.backend.probe
    }

    /// Start a session and let the mock service accept the connection
    pub async fn start_streaming(&self) -> MockRemote {
        self.manager.start().await.expect("start failed");
        let remote = self.connector.last();
        remote.open().await;
        self.sink.wait_for("session_started").await;
        remote
    }
}

/// Poll `condition` until it holds; panics after two seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not met within 2s");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
