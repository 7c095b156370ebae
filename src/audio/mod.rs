pub mod backend;
pub mod file;

#[cfg(feature = "microphone")]
pub mod microphone;

pub use backend::{
    AudioBackend, AudioBackendFactory, AudioFormat, AudioFrame, AudioInput, AudioSource,
};
pub use file::{WavFileBackend, WavFileSource};

#[cfg(feature = "microphone")]
pub use microphone::{MicrophoneBackend, MicrophoneSource};
