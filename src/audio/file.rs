use hound::{SampleFormat, WavReader};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::backend::{AudioBackend, AudioFormat, AudioFrame, AudioSource};
use crate::error::AudioError;

/// Replays a WAV file as if it were a live capture device
///
/// Frames are paced to wall-clock time so the remote service sees a realistic
/// stream. The last frame is padded with silence; after that `read_frame`
/// returns [`AudioError::Exhausted`].
pub struct WavFileSource {
    path: String,
    samples: Vec<i16>,
    position: usize,
    samples_per_read: usize,
    frame_duration: Duration,
    next_deadline: Option<Instant>,
    realtime: bool,
    sequence: u64,
    active: bool,
    closed: bool,
}

impl WavFileSource {
    pub fn open(path: impl AsRef<Path>, format: &AudioFormat) -> Result<Self, AudioError> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .map_err(|e| AudioError::DeviceNotFound(format!("{}: {}", path.display(), e)))?;

        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(AudioError::UnsupportedFormat(format!(
                "expected 16-bit PCM, got {}-bit {:?}",
                spec.bits_per_sample, spec.sample_format
            )));
        }
        if spec.sample_rate != format.sample_rate || spec.channels != format.channels {
            return Err(AudioError::UnsupportedFormat(format!(
                "expected {}Hz {}ch, got {}Hz {}ch",
                format.sample_rate, format.channels, spec.sample_rate, spec.channels
            )));
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            samples,
            position: 0,
            samples_per_read: format.samples_per_frame() * format.channels as usize,
            frame_duration: Duration::from_millis(format.frame_duration_ms as u64),
            next_deadline: None,
            realtime: true,
            sequence: 0,
            active: true,
            closed: false,
        })
    }

    /// Return frames as fast as they are requested
    pub fn without_pacing(mut self) -> Self {
        self.realtime = false;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn wait_for_deadline(&mut self) {
        if !self.realtime {
            return;
        }
        let now = Instant::now();
        let deadline = *self.next_deadline.get_or_insert(now);
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        self.next_deadline = Some(deadline + self.frame_duration);
    }
}

impl AudioSource for WavFileSource {
    fn read_frame(&mut self) -> Result<AudioFrame, AudioError> {
        if self.closed || !self.active {
            return Err(AudioError::Closed);
        }
        if self.position >= self.samples.len() {
            return Err(AudioError::Exhausted);
        }

        self.wait_for_deadline();

        let end = (self.position + self.samples_per_read).min(self.samples.len());
        let mut chunk = self.samples[self.position..end].to_vec();
        chunk.resize(self.samples_per_read, 0);
        self.position = end;

        let frame = AudioFrame::from_samples(&chunk, self.sequence);
        self.sequence += 1;
        Ok(frame)
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.active = false;
        Ok(())
    }

    fn close(&mut self) -> Result<(), AudioError> {
        if self.closed {
            return Ok(());
        }
        debug!("Closing audio file: {}", self.path);
        self.active = false;
        self.closed = true;
        self.samples = Vec::new();
        Ok(())
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}

/// Backend that opens the same WAV file for every session
pub struct WavFileBackend {
    path: PathBuf,
}

impl WavFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AudioBackend for WavFileBackend {
    fn open(&self, format: &AudioFormat) -> Result<Box<dyn AudioSource>, AudioError> {
        Ok(Box::new(WavFileSource::open(&self.path, format)?))
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}
