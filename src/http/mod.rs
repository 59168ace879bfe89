//! HTTP API server for external control (the UI layer's boundary)
//!
//! This module provides a REST API for controlling the captioning session:
//! - POST /session/start - Start a new captioning session
//! - POST /session/stop - Stop the session, returning final stats
//! - POST /session/mode - Switch backend mode (rejected while recording)
//! - GET /session/status - Session state plus current stats
//! - GET /session/interim - Current interim (unfinalized) text
//! - GET /session/captions - Ordered caption sequence
//! - POST /session/captions/:id/edit - Manual caption edit
//! - POST /session/captions/:id/translation - Attach a translation
//! - PUT /session/dictionary - Replace the correction dictionary
//! - PUT /session/profanity - Toggle profanity masking
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
