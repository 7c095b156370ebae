use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::AudioError;

/// Capture format shared by every audio source (16-bit signed PCM, little-endian)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (1 = mono)
    pub channels: u16,
    /// Duration of one frame in milliseconds
    pub frame_duration_ms: u32,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 16000,     // Streaming STT expects 16kHz
            channels: 1,            // Mono
            frame_duration_ms: 50,  // 50ms frames
        }
    }
}

impl AudioFormat {
    /// Samples (per channel) in one frame
    pub fn samples_per_frame(&self) -> usize {
        (self.sample_rate as u64 * self.frame_duration_ms as u64 / 1000) as usize
    }

    /// Size of one encoded frame in bytes
    pub fn bytes_per_frame(&self) -> usize {
        self.samples_per_frame() * self.channels as usize * 2
    }
}

/// One capture interval of PCM16 audio
///
/// Frames are immutable once built; ownership moves from the source to the
/// forwarding task and finally into the link's send call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    data: Vec<u8>,
    sequence: u64,
}

impl AudioFrame {
    /// Encode interleaved samples as little-endian bytes
    pub fn from_samples(samples: &[i16], sequence: u64) -> Self {
        let data = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self { data, sequence }
    }

    pub fn from_bytes(data: Vec<u8>, sequence: u64) -> Self {
        Self { data, sequence }
    }

    /// Capture order of this frame within its session
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// An open capture stream with blocking read semantics
///
/// `read_frame` must not fail on device overflow or under-run: sources return
/// the best-available frame instead. Errors are reserved for conditions that
/// end the stream.
pub trait AudioSource: Send {
    /// Block until one full frame is available
    fn read_frame(&mut self) -> Result<AudioFrame, AudioError>;

    /// Whether the underlying stream is still running
    fn is_active(&self) -> bool;

    /// Stop the stream; the device stays open
    fn stop(&mut self) -> Result<(), AudioError>;

    /// Release the device. Calling it on a closed source is a no-op.
    fn close(&mut self) -> Result<(), AudioError>;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// Opens a fresh [`AudioSource`] for every session
pub trait AudioBackend: Send + Sync {
    fn open(&self, format: &AudioFormat) -> Result<Box<dyn AudioSource>, AudioError>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Where session audio comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioInput {
    /// Default capture device (requires the `microphone` feature)
    Microphone,
    /// A 16-bit PCM WAV file replayed in real time
    WavFile(PathBuf),
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Create the backend for the configured input
    pub fn create(input: AudioInput) -> Result<Arc<dyn AudioBackend>> {
        match input {
            AudioInput::Microphone => {
                #[cfg(feature = "microphone")]
                {
                    Ok(Arc::new(super::microphone::MicrophoneBackend::new()))
                }

                #[cfg(not(feature = "microphone"))]
                {
                    anyhow::bail!(
                        "Microphone capture is not compiled in; \
                         rebuild with `--features microphone` or configure audio.wav_path"
                    )
                }
            }

            AudioInput::WavFile(path) => Ok(Arc::new(super::file::WavFileBackend::new(path))),
        }
    }
}
