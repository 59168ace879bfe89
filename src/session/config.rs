use crate::stt::{BackendMode, SttSettings};
use serde::{Deserialize, Serialize};

/// Configuration for a captioning session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (also the relay session id when broadcasting).
    pub session_id: String,

    /// Transcription backend mode. Switching requires a full stop first.
    pub mode: BackendMode,

    /// Backend connection settings.
    #[serde(default)]
    pub stt: SttSettings,

    /// Relay server URL; `None` disables broadcasting.
    #[serde(default)]
    pub relay_url: Option<String>,

    /// Profanity masking for the correction engine.
    #[serde(default)]
    pub profanity_filter: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            mode: BackendMode::default(),
            stt: SttSettings::default(),
            relay_url: None,
            profanity_filter: false,
        }
    }
}
