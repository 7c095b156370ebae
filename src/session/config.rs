use std::time::Duration;

use crate::audio::AudioFormat;

/// Configuration for a session manager
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Capture format requested from the audio backend
    pub format: AudioFormat,

    /// After this long teardown warns that the audio forwarding task has not
    /// exited yet; it keeps waiting until the source is back and closed.
    /// Default: 2 seconds (one frame read + send is normally ~50ms)
    pub join_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            format: AudioFormat::default(),
            join_timeout: Duration::from_secs(2),
        }
    }
}
