use crate::config::Config;
use crate::session::CaptionSession;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// The active session instance, if any. Stopped instances stay here
    /// until the next start replaces them, so their captions and stats
    /// remain queryable.
    pub session: Arc<RwLock<Option<Arc<CaptionSession>>>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            session: Arc::new(RwLock::new(None)),
        }
    }
}
