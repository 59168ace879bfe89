pub mod audio;
pub mod caption;
pub mod config;
pub mod correction;
pub mod error;
pub mod http;
pub mod relay;
pub mod session;
pub mod stt;

pub use audio::{AudioFrame, AudioSource, AudioSourceConfig, ChannelSource, WavFileSource};
pub use caption::{Caption, DictionaryEntry, EntryKind};
pub use config::Config;
pub use error::{CaptionError, Result};
pub use http::{create_router, AppState};
pub use relay::{PeerRole, RelayMessage, RelayPublisher, RelayState};
pub use session::{CaptionSession, SessionConfig, SessionState, SessionStats, SystemHealth};
pub use stt::{
    BackendFactory, BackendMode, ModeBackendFactory, RecognitionFacility, SttSettings, Transcript,
    TranscriptEvent, TranscriptKind, TranscriptionBackend,
};
