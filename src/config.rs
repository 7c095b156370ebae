use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::audio::{AudioFormat, AudioInput};
use crate::remote::{endpoint_url, STREAMING_API_URL};

/// Environment variable holding the transcription service credential
pub const API_KEY_ENV: &str = "ASSEMBLYAI_API_KEY";

/// Prefix for environment overrides, e.g. `LIVE_TRANSCRIBE__SERVICE__HTTP__PORT=8080`
const ENV_PREFIX: &str = "LIVE_TRANSCRIBE";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub remote: RemoteConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "live-transcribe".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5002,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_ms: u32,
    /// Replay this WAV file instead of capturing from the microphone
    pub wav_path: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        let format = AudioFormat::default();
        Self {
            sample_rate: format.sample_rate,
            channels: format.channels,
            frame_ms: format.frame_duration_ms,
            wav_path: None,
        }
    }
}

impl AudioConfig {
    pub fn format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            frame_duration_ms: self.frame_ms,
        }
    }

    pub fn input(&self) -> AudioInput {
        match &self.wav_path {
            Some(path) => AudioInput::WavFile(PathBuf::from(path)),
            None => AudioInput::Microphone,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub endpoint: String,
    /// Ask the service for punctuated, formatted final turns
    pub format_turns: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: STREAMING_API_URL.to_string(),
            format_turns: true,
        }
    }
}

impl RemoteConfig {
    pub fn url(&self, sample_rate: u32) -> String {
        endpoint_url(&self.endpoint, sample_rate, self.format_turns)
    }
}

impl Config {
    /// Load from an optional config file, overlaid by environment variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 || self.audio.channels == 0 || self.audio.frame_ms == 0 {
            bail!(
                "Invalid audio format: {}Hz, {} channels, {}ms frames",
                self.audio.sample_rate,
                self.audio.channels,
                self.audio.frame_ms
            );
        }
        Ok(())
    }
}

/// Read the service credential; its absence is fatal at start-up
pub fn api_key() -> Result<String> {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => bail!("{} environment variable is required", API_KEY_ENV),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_configuration() {
        let cfg = Config::default();

        assert_eq!(cfg.service.http.port, 5002);
        assert_eq!(cfg.audio.format(), AudioFormat::default());
        assert_eq!(cfg.audio.input(), AudioInput::Microphone);
        assert_eq!(
            cfg.remote.url(16000),
            "wss://streaming.assemblyai.com/v3/ws?sample_rate=16000&format_turns=true"
        );
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");

        let cfg = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.service.name, "live-transcribe");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[service.http]
port = 8080

[audio]
sample_rate = 8000
wav_path = "meeting.wav"

[remote]
format_turns = false
"#
        )
        .unwrap();

        let cfg = Config::load(file.path().to_str().unwrap()).unwrap();

        assert_eq!(cfg.service.http.port, 8080);
        assert_eq!(cfg.service.http.bind, "0.0.0.0");
        assert_eq!(cfg.audio.format().samples_per_frame(), 400);
        assert_eq!(cfg.audio.input(), AudioInput::WavFile("meeting.wav".into()));
        assert!(cfg.remote.url(8000).ends_with("format_turns=false"));
    }

    #[test]
    fn test_invalid_audio_format_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[audio]\nframe_ms = 0").unwrap();

        assert!(Config::load(file.path().to_str().unwrap()).is_err());
    }
}
