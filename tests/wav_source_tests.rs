// Integration tests for WAV file replay
//
// These tests write small WAV files to a temp dir and read them back through
// the AudioSource interface the session uses.

use anyhow::Result;
use hound::{SampleFormat, WavSpec, WavWriter};
use live_transcribe::{
    AudioBackend, AudioError, AudioFormat, AudioSource, WavFileBackend, WavFileSource,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn write_wav(dir: &Path, name: &str, spec: WavSpec, samples: &[i16]) -> Result<PathBuf> {
    let path = dir.join(name);
    let mut writer = WavWriter::create(&path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(path)
}

fn pcm16(sample_rate: u32, channels: u16) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

#[test]
fn test_frames_cover_file_and_pad_last() -> Result<()> {
    let dir = TempDir::new()?;
    let format = AudioFormat::default();
    // Two and a half frames of a ramp
    let samples: Vec<i16> = (0..2000).map(|i| i as i16).collect();
    let path = write_wav(dir.path(), "ramp.wav", pcm16(16000, 1), &samples)?;

    let mut source = WavFileSource::open(&path, &format)?.without_pacing();

    let first = source.read_frame()?;
    assert_eq!(first.len(), format.bytes_per_frame());
    assert_eq!(first.sequence(), 0);
    assert_eq!(&first.as_bytes()[..4], &[0, 0, 1, 0]);

    let second = source.read_frame()?;
    assert_eq!(second.sequence(), 1);

    let last = source.read_frame()?;
    assert_eq!(last.len(), format.bytes_per_frame());
    // 400 real samples, then silence
    assert!(last.as_bytes()[800..].iter().all(|&b| b == 0));

    assert!(matches!(source.read_frame(), Err(AudioError::Exhausted)));
    Ok(())
}

#[test]
fn test_pacing_follows_frame_duration() -> Result<()> {
    let dir = TempDir::new()?;
    let format = AudioFormat {
        frame_duration_ms: 20,
        ..Default::default()
    };
    let path = write_wav(dir.path(), "silence.wav", pcm16(16000, 1), &[0; 320 * 4])?;

    let mut source = WavFileSource::open(&path, &format)?;
    let started = Instant::now();
    for _ in 0..4 {
        source.read_frame()?;
    }

    // First frame is immediate; the next three wait one frame each
    assert!(started.elapsed() >= Duration::from_millis(55));
    Ok(())
}

#[test]
fn test_rejects_mismatched_sample_rate() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_wav(dir.path(), "cd.wav", pcm16(44100, 2), &[0; 100])?;

    let result = WavFileSource::open(&path, &AudioFormat::default());

    assert!(matches!(result, Err(AudioError::UnsupportedFormat(_))));
    Ok(())
}

#[test]
fn test_rejects_float_samples() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("float.wav");
    let spec = WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(&path, spec)?;
    writer.write_sample(0.5f32)?;
    writer.finalize()?;

    let result = WavFileSource::open(&path, &AudioFormat::default());

    assert!(matches!(result, Err(AudioError::UnsupportedFormat(_))));
    Ok(())
}

#[test]
fn test_missing_file() {
    let result = WavFileSource::open("/nonexistent/path/to/audio.wav", &AudioFormat::default());
    assert!(matches!(result, Err(AudioError::DeviceNotFound(_))));
}

#[test]
fn test_stop_and_close() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_wav(dir.path(), "short.wav", pcm16(16000, 1), &[1; 1600])?;
    let mut source = WavFileSource::open(&path, &AudioFormat::default())?.without_pacing();

    assert!(source.is_active());
    source.stop()?;
    assert!(!source.is_active());
    assert!(matches!(source.read_frame(), Err(AudioError::Closed)));

    source.close()?;
    // Closing twice is a no-op
    source.close()?;
    Ok(())
}

#[test]
fn test_backend_opens_fresh_source_each_time() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_wav(dir.path(), "session.wav", pcm16(16000, 1), &[0; 800])?;
    let backend = WavFileBackend::new(path.clone());
    let format = AudioFormat::default();

    let mut first = backend.open(&format)?;
    first.close()?;

    let mut second = backend.open(&format)?;
    assert!(second.is_active());
    assert_eq!(second.read_frame()?.sequence(), 0);
    Ok(())
}
