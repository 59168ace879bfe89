//! Transcription backends
//!
//! One trait, three variants selected by configured mode:
//! - on-device continuous recognition (`device`)
//! - streaming socket to a local inference server (`socket`)
//! - bidirectional cloud streaming session (`cloud`)
//!
//! Each variant owns its own reconnect policy and emits connectivity
//! transitions alongside transcript events, so the session controller can
//! surface Active/Degraded without driving any retry loop itself.

pub mod cloud;
pub mod device;
pub mod socket;

pub use cloud::CloudStreamBackend;
pub use device::{OnDeviceBackend, RecognitionFacility};
pub use socket::SocketStreamBackend;

use crate::audio::AudioFrame;
use crate::error::{CaptionError, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Confidence assigned to transcripts from backends that do not report one.
pub const DEFAULT_CONFIDENCE: f32 = 0.95;

/// Operating mode selecting the backend variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    OnDevice,
    LocalSocket,
    CloudStream,
}

impl Default for BackendMode {
    fn default() -> Self {
        BackendMode::OnDevice
    }
}

impl std::fmt::Display for BackendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendMode::OnDevice => write!(f, "on_device"),
            BackendMode::LocalSocket => write!(f, "local_socket"),
            BackendMode::CloudStream => write!(f, "cloud_stream"),
        }
    }
}

/// Backend connection settings, loaded from configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SttSettings {
    #[serde(default)]
    pub mode: BackendMode,

    /// WebSocket URL of the local inference server (`local_socket` mode).
    #[serde(default)]
    pub local_server_url: Option<String>,

    /// Cloud streaming endpoint (`cloud_stream` mode).
    #[serde(default)]
    pub cloud_url: Option<String>,

    /// API credential for the cloud endpoint.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptKind {
    Partial,
    Final,
}

/// One recognition result from a backend.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub kind: TranscriptKind,
    pub text: String,
    pub confidence: f32,
}

impl Transcript {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            kind: TranscriptKind::Partial,
            text: text.into(),
            confidence: DEFAULT_CONFIDENCE,
        }
    }

    pub fn final_with(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            kind: TranscriptKind::Final,
            text: text.into(),
            confidence,
        }
    }
}

/// Event stream produced by a running backend.
#[derive(Debug)]
pub enum TranscriptEvent {
    /// Connection (re)established.
    Connected,
    /// Non-fatal disconnect; the backend's own reconnect loop is running.
    Reconnecting { reason: String },
    /// A partial or final recognition result.
    Transcript(Transcript),
    /// Unrecoverable failure; the session must tear down.
    Fatal(CaptionError),
}

/// A polymorphic speech-to-text backend.
///
/// `start` consumes the audio frame channel and returns a lazy, infinite,
/// non-restartable event stream; `stop` tears down sockets and cancels any
/// outstanding reconnect timer. Calling `stop` more than once is a no-op.
#[async_trait::async_trait]
pub trait TranscriptionBackend: Send {
    async fn start(
        &mut self,
        audio: mpsc::Receiver<AudioFrame>,
    ) -> Result<mpsc::Receiver<TranscriptEvent>>;

    async fn stop(&mut self) -> Result<()>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Creates the backend for a requested mode.
///
/// The session controller holds one factory per session; `create` is called
/// at most once per session instance (a mode switch requires a new session).
pub trait BackendFactory: Send {
    fn create(&mut self, mode: BackendMode) -> Result<Box<dyn TranscriptionBackend>>;
}

/// Default factory wiring the three variants to their settings.
///
/// Fail-fast checks happen here, before any socket or audio resource is
/// allocated: a missing URL or credential for the selected mode and an absent
/// recognition facility are fatal and never retried.
pub struct ModeBackendFactory {
    settings: SttSettings,
    facility: Option<Box<dyn RecognitionFacility>>,
}

impl ModeBackendFactory {
    pub fn new(settings: SttSettings) -> Self {
        Self {
            settings,
            facility: None,
        }
    }

    /// Provide the platform recognition facility for `on_device` mode.
    pub fn with_facility(mut self, facility: Box<dyn RecognitionFacility>) -> Self {
        self.facility = Some(facility);
        self
    }
}

impl BackendFactory for ModeBackendFactory {
    fn create(&mut self, mode: BackendMode) -> Result<Box<dyn TranscriptionBackend>> {
        match mode {
            BackendMode::OnDevice => {
                let facility =
                    self.facility
                        .take()
                        .ok_or_else(|| CaptionError::UnsupportedEnvironment {
                            message: "no continuous recognition facility on this platform"
                                .to_string(),
                        })?;
                Ok(Box::new(OnDeviceBackend::new(facility)))
            }
            BackendMode::LocalSocket => {
                let url = self.settings.local_server_url.clone().ok_or_else(|| {
                    CaptionError::ConfigurationMissing {
                        key: "stt.local_server_url".to_string(),
                    }
                })?;
                Ok(Box::new(SocketStreamBackend::new(url)))
            }
            BackendMode::CloudStream => {
                let url = self.settings.cloud_url.clone().ok_or_else(|| {
                    CaptionError::ConfigurationMissing {
                        key: "stt.cloud_url".to_string(),
                    }
                })?;
                let api_key = self.settings.api_key.clone().ok_or_else(|| {
                    CaptionError::ConfigurationMissing {
                        key: "stt.api_key".to_string(),
                    }
                })?;
                Ok(Box::new(CloudStreamBackend::new(url, api_key)))
            }
        }
    }
}
