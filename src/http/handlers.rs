use super::state::AppState;
use crate::audio::{AudioSource, AudioSourceConfig, WavFileSource};
use crate::caption::{Caption, DictionaryEntry};
use crate::error::CaptionError;
use crate::session::{CaptionSession, SessionConfig, SessionState, SessionStats};
use crate::stt::{BackendMode, ModeBackendFactory};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    /// Optional session ID (if not provided, generate UUID)
    pub session_id: Option<String>,

    /// Backend mode override (defaults to the configured mode)
    pub mode: Option<BackendMode>,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub state: SessionState,
}

#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub session_id: String,
    pub state: SessionState,
    pub stats: SessionStats,
}

#[derive(Debug, Deserialize)]
pub struct SetModeRequest {
    pub mode: BackendMode,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub session_id: String,
    pub state: SessionState,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct InterimResponse {
    pub interim: String,
}

#[derive(Debug, Deserialize)]
pub struct EditCaptionRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SetProfanityRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(e: CaptionError) -> axum::response::Response {
    let status = match &e {
        CaptionError::InvalidState { .. } => StatusCode::CONFLICT,
        CaptionError::UnknownCaption { .. } => StatusCode::NOT_FOUND,
        CaptionError::ConfigurationMissing { .. }
        | CaptionError::UnsupportedEnvironment { .. }
        | CaptionError::PermissionDenied { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

async fn current_session(state: &AppState) -> Result<Arc<CaptionSession>, axum::response::Response> {
    let session = state.session.read().await;
    session.clone().ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "no session".to_string(),
            }),
        )
            .into_response()
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /session/start
/// Start a new captioning session (a wholly new instance each time).
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> impl IntoResponse {
    // Only one live session at a time; a stopped instance is replaced.
    {
        let session = state.session.read().await;
        if let Some(existing) = session.as_ref() {
            if existing.state().await != SessionState::Stopped {
                return (
                    StatusCode::CONFLICT,
                    Json(ErrorResponse {
                        error: "a session is already running".to_string(),
                    }),
                )
                    .into_response();
            }
        }
    }

    let session_id = req
        .session_id
        .unwrap_or_else(|| format!("session-{}", uuid::Uuid::new_v4()));
    let mode = req.mode.unwrap_or(state.config.stt.mode);

    info!(session_id = %session_id, mode = %mode, "starting session");

    let audio: Box<dyn AudioSource> = match &state.config.audio.input_wav {
        Some(path) => Box::new(WavFileSource::new(
            path,
            AudioSourceConfig {
                target_sample_rate: state.config.audio.sample_rate,
                target_channels: state.config.audio.channels,
                frame_samples: state.config.audio.frame_samples,
            },
            state.config.audio.realtime,
        )),
        None => {
            return error_response(CaptionError::ConfigurationMissing {
                key: "audio.input_wav".to_string(),
            })
        }
    };

    let session_config = SessionConfig {
        session_id: session_id.clone(),
        mode,
        stt: state.config.stt.clone(),
        relay_url: state.config.relay.url.clone(),
        profanity_filter: state.config.correction.profanity_filter,
    };
    let factory = Box::new(ModeBackendFactory::new(state.config.stt.clone()));

    let session = Arc::new(CaptionSession::new(session_config, audio, factory));
    if let Err(e) = session.start().await {
        error!(error = %e, "failed to start session");
        return error_response(e);
    }

    let response = StartSessionResponse {
        session_id,
        state: session.state().await,
    };
    *state.session.write().await = Some(session);

    (StatusCode::OK, Json(response)).into_response()
}

/// POST /session/stop
/// Stop the active session, returning final statistics.
pub async fn stop_session(State(state): State<AppState>) -> impl IntoResponse {
    let session = match current_session(&state).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    match session.stop().await {
        Ok(stats) => (
            StatusCode::OK,
            Json(StopSessionResponse {
                session_id: session.session_id().to_string(),
                state: SessionState::Stopped,
                stats,
            }),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to stop session");
            error_response(e)
        }
    }
}

/// POST /session/mode
/// Switch the backend mode; rejected while recording.
pub async fn set_mode(
    State(state): State<AppState>,
    Json(req): Json<SetModeRequest>,
) -> impl IntoResponse {
    let session = match current_session(&state).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    match session.set_mode(req.mode).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /session/status
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let session = match current_session(&state).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    let response = StatusResponse {
        session_id: session.session_id().to_string(),
        state: session.state().await,
        stats: session.stats().await,
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// GET /session/interim
pub async fn get_interim(State(state): State<AppState>) -> impl IntoResponse {
    let session = match current_session(&state).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    (
        StatusCode::OK,
        Json(InterimResponse {
            interim: session.interim().await,
        }),
    )
        .into_response()
}

/// GET /session/captions
pub async fn get_captions(State(state): State<AppState>) -> impl IntoResponse {
    let session = match current_session(&state).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    let captions: Vec<Caption> = session.captions().await;
    (StatusCode::OK, Json(captions)).into_response()
}

/// POST /session/captions/:id/edit
/// Replace a caption's text and mark it corrected (no engine re-run).
pub async fn edit_caption(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<EditCaptionRequest>,
) -> impl IntoResponse {
    let session = match current_session(&state).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    match session.edit_caption(&id, req.text).await {
        Ok(caption) => (StatusCode::OK, Json(caption)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /session/captions/:id/translation
pub async fn attach_translation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<EditCaptionRequest>,
) -> impl IntoResponse {
    let session = match current_session(&state).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    match session.attach_translation(&id, req.text).await {
        Ok(caption) => (StatusCode::OK, Json(caption)).into_response(),
        Err(e) => error_response(e),
    }
}

/// PUT /session/dictionary
/// Replace the correction dictionary wholesale.
pub async fn set_dictionary(
    State(state): State<AppState>,
    Json(entries): Json<Vec<DictionaryEntry>>,
) -> impl IntoResponse {
    let session = match current_session(&state).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    session.set_dictionary(entries).await;
    StatusCode::NO_CONTENT.into_response()
}

/// PUT /session/profanity
pub async fn set_profanity(
    State(state): State<AppState>,
    Json(req): Json<SetProfanityRequest>,
) -> impl IntoResponse {
    let session = match current_session(&state).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    session.set_profanity_filter(req.enabled).await;
    StatusCode::NO_CONTENT.into_response()
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
