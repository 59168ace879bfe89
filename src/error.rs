//! Error types for livecaption.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptionError {
    // Fatal, surfaced before any resource is acquired
    #[error("Audio permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Missing configuration value: {key}")]
    ConfigurationMissing { key: String },

    #[error("Recognition facility unavailable: {message}")]
    UnsupportedEnvironment { message: String },

    // Recovered by the owning backend's reconnect policy; visible only as
    // a Degraded session state
    #[error("Transient network error: {message}")]
    TransientNetwork { message: String },

    // Broadcast is best-effort; never session-fatal
    #[error("Relay unavailable: {message}")]
    RelayUnavailable { message: String },

    // Rejected state machine operations (mode switch while recording,
    // restarting a stopped session instance)
    #[error("Invalid session state: {message}")]
    InvalidState { message: String },

    #[error("Unknown caption id: {id}")]
    UnknownCaption { id: String },

    #[error("Audio source error: {message}")]
    AudioSource { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl CaptionError {
    /// Whether the backend's own reconnect policy handles this error.
    /// Everything else tears the session down.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CaptionError::TransientNetwork { .. } | CaptionError::RelayUnavailable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CaptionError>;
