use crate::stt::SttSettings;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub stt: SttSettings,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub correction: CorrectionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture sample rate; backends expect 16 kHz.
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per delivered frame.
    pub frame_samples: usize,
    /// WAV file standing in for the capture device, when set.
    pub input_wav: Option<String>,
    /// Pace file playback to real time.
    pub realtime: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            frame_samples: 4096,
            input_wav: None,
            realtime: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Relay WebSocket URL the session publishes to; `None` disables
    /// broadcasting.
    pub url: Option<String>,
    /// Listener address for the standalone relay binary.
    pub bind: String,
    pub port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: None,
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    pub profanity_filter: bool,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
