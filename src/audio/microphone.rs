//! cpal-based microphone capture
//!
//! cpal::Stream is not Send, so the stream lives on a dedicated thread and
//! hands sample buffers to the reader through a bounded channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, info, warn};

use super::backend::{AudioBackend, AudioFormat, AudioFrame, AudioSource};
use crate::error::AudioError;

/// Buffers queued between the device callback and the reader
const CHANNEL_CAPACITY: usize = 64;

enum CaptureCommand {
    Stop,
}

/// Live capture from the default input device
pub struct MicrophoneSource {
    samples_rx: Receiver<Vec<i16>>,
    cmd_tx: Option<mpsc::Sender<CaptureCommand>>,
    thread_handle: Option<thread::JoinHandle<()>>,
    pending: Vec<i16>,
    samples_per_read: usize,
    read_timeout: Duration,
    overflows: Arc<AtomicU64>,
    sequence: u64,
    active: bool,
}

impl MicrophoneSource {
    pub fn open(format: &AudioFormat) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| AudioError::DeviceNotFound("default".to_string()))?;

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        info!("Using audio device: {}", device_name);

        let stream_config = cpal::StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (samples_tx, samples_rx) = mpsc::sync_channel::<Vec<i16>>(CHANNEL_CAPACITY);
        let (cmd_tx, cmd_rx) = mpsc::channel::<CaptureCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), AudioError>>();
        let overflows = Arc::new(AtomicU64::new(0));
        let overflow_counter = Arc::clone(&overflows);

        let thread_handle = thread::spawn(move || {
            let stream = match build_stream(&device, &stream_config, samples_tx, overflow_counter) {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(AudioError::Stream(e.to_string())));
                return;
            }
            let _ = ready_tx.send(Ok(()));
            debug!("Audio capture thread started");

            // Either an explicit stop or the reader going away ends capture
            let _ = cmd_rx.recv();
            drop(stream);

            debug!("Audio capture thread stopped");
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread_handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread_handle.join();
                return Err(AudioError::Stream("capture thread exited".to_string()));
            }
        }

        Ok(Self {
            samples_rx,
            cmd_tx: Some(cmd_tx),
            thread_handle: Some(thread_handle),
            pending: Vec::new(),
            samples_per_read: format.samples_per_frame() * format.channels as usize,
            read_timeout: Duration::from_millis(format.frame_duration_ms as u64 * 2),
            overflows,
            sequence: 0,
            active: true,
        })
    }

    fn next_frame(&mut self) -> AudioFrame {
        let take = self.samples_per_read.min(self.pending.len());
        let mut chunk: Vec<i16> = self.pending.drain(..take).collect();
        chunk.resize(self.samples_per_read, 0);
        let frame = AudioFrame::from_samples(&chunk, self.sequence);
        self.sequence += 1;
        frame
    }
}

impl AudioSource for MicrophoneSource {
    fn read_frame(&mut self) -> Result<AudioFrame, AudioError> {
        if !self.active {
            return Err(AudioError::Closed);
        }

        while self.pending.len() < self.samples_per_read {
            match self.samples_rx.recv_timeout(self.read_timeout) {
                Ok(samples) => self.pending.extend_from_slice(&samples),
                Err(RecvTimeoutError::Timeout) => {
                    // Under-run: hand out what we have padded with silence
                    debug!(
                        "Audio under-run, padding {} samples",
                        self.samples_per_read - self.pending.len()
                    );
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(AudioError::Stream("capture stream ended".to_string()));
                }
            }
        }

        Ok(self.next_frame())
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        if let Some(cmd_tx) = self.cmd_tx.take() {
            let _ = cmd_tx.send(CaptureCommand::Stop);
        }
        self.active = false;
        Ok(())
    }

    fn close(&mut self) -> Result<(), AudioError> {
        self.stop()?;
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                error!("Audio capture thread panicked");
            }
            let overflows = self.overflows.load(Ordering::Relaxed);
            if overflows > 0 {
                warn!("Dropped {} audio buffers on overflow", overflows);
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    tx: SyncSender<Vec<i16>>,
    overflows: Arc<AtomicU64>,
) -> Result<cpal::Stream, AudioError> {
    device
        .build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                // Overflow never raises: the buffer is dropped and counted
                if let Err(TrySendError::Full(_)) = tx.try_send(data.to_vec()) {
                    overflows.fetch_add(1, Ordering::Relaxed);
                }
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))
}

/// Backend opening the default input device
pub struct MicrophoneBackend;

impl MicrophoneBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MicrophoneBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for MicrophoneBackend {
    fn open(&self, format: &AudioFormat) -> Result<Box<dyn AudioSource>, AudioError> {
        Ok(Box::new(MicrophoneSource::open(format)?))
    }

    fn name(&self) -> &str {
        "microphone"
    }
}
