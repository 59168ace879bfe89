use super::config::SessionConfig;
use super::stats::SessionStats;
use crate::audio::AudioSource;
use crate::caption::{Caption, DictionaryEntry};
use crate::correction;
use crate::error::{CaptionError, Result};
use crate::relay::RelayPublisher;
use crate::stt::{
    BackendFactory, BackendMode, Transcript, TranscriptEvent, TranscriptKind,
    TranscriptionBackend,
};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Session lifecycle states.
///
/// `Idle` is initial; `Stopped` is terminal per instance. A new session
/// requires a new `CaptionSession`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Degraded,
    Stopped,
}

/// State shared between the controller handle and its event-loop task.
struct Shared {
    state: RwLock<SessionState>,
    dictionary: RwLock<Vec<DictionaryEntry>>,
    profanity_filter: AtomicBool,
    interim: RwLock<String>,
    captions: RwLock<Vec<Caption>>,
    stats: RwLock<SessionStats>,
    sequence: AtomicU64,
    started: RwLock<Option<Instant>>,
    backend: Mutex<Option<Box<dyn TranscriptionBackend>>>,
    audio: Mutex<Option<Box<dyn AudioSource>>>,
    relay: Mutex<Option<RelayPublisher>>,
}

/// The session controller: owns the backend lifecycle state machine and
/// turns raw transcript events into finalized, corrected captions.
///
/// Cross-callback state that the surrounding application mutates over time
/// (dictionary, profanity policy) lives here as explicit fields rather than
/// globals; backend tasks only ever see the event channel.
pub struct CaptionSession {
    config: SessionConfig,
    mode: RwLock<BackendMode>,
    shared: Arc<Shared>,
    factory: Mutex<Box<dyn BackendFactory>>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl CaptionSession {
    pub fn new(
        config: SessionConfig,
        audio: Box<dyn AudioSource>,
        factory: Box<dyn BackendFactory>,
    ) -> Self {
        let mode = config.mode;
        let profanity = config.profanity_filter;
        Self {
            config,
            mode: RwLock::new(mode),
            shared: Arc::new(Shared {
                state: RwLock::new(SessionState::Idle),
                dictionary: RwLock::new(Vec::new()),
                profanity_filter: AtomicBool::new(profanity),
                interim: RwLock::new(String::new()),
                captions: RwLock::new(Vec::new()),
                stats: RwLock::new(SessionStats::new(Utc::now())),
                sequence: AtomicU64::new(0),
                started: RwLock::new(None),
                backend: Mutex::new(None),
                audio: Mutex::new(Some(audio)),
                relay: Mutex::new(None),
            }),
            factory: Mutex::new(factory),
            event_task: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    /// Start captioning. Valid only from `Idle`; any failure before the
    /// backend is running transitions straight to `Stopped`.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.shared.state.write().await;
            match *state {
                SessionState::Idle => *state = SessionState::Connecting,
                SessionState::Stopped => {
                    return Err(CaptionError::InvalidState {
                        message: "session instance is stopped; start a new session".to_string(),
                    })
                }
                _ => {
                    return Err(CaptionError::InvalidState {
                        message: "session already started".to_string(),
                    })
                }
            }
        }

        let mode = *self.mode.read().await;
        info!(session_id = %self.config.session_id, mode = %mode, "starting captioning session");

        // Typed configuration/platform errors surface here, before any
        // socket or audio resource is acquired.
        let mut backend = match self.factory.lock().await.create(mode) {
            Ok(backend) => backend,
            Err(e) => {
                self.abort_start().await;
                return Err(e);
            }
        };

        let audio_rx = {
            let mut audio = self.shared.audio.lock().await;
            let source = match audio.as_mut() {
                Some(source) => source,
                None => {
                    self.abort_start().await;
                    return Err(CaptionError::AudioSource {
                        message: "audio source already released".to_string(),
                    });
                }
            };
            match source.start().await {
                Ok(rx) => rx,
                Err(e) => {
                    self.abort_start().await;
                    return Err(e);
                }
            }
        };

        let events = match backend.start(audio_rx).await {
            Ok(events) => events,
            Err(e) => {
                self.abort_start().await;
                return Err(e);
            }
        };

        *self.shared.backend.lock().await = Some(backend);
        *self.shared.started.write().await = Some(Instant::now());
        *self.shared.stats.write().await = SessionStats::new(Utc::now());

        // Broadcast is best-effort: a missing or unreachable relay degrades
        // delivery silently and never blocks the session.
        if let Some(url) = &self.config.relay_url {
            let publisher = RelayPublisher::start(url.clone(), self.config.session_id.clone());
            *self.shared.relay.lock().await = Some(publisher);
        }

        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(run_event_loop(shared, events));
        *self.event_task.lock().await = Some(task);

        Ok(())
    }

    /// Stop the session and return the final statistics. Idempotent: calling
    /// stop on a stopped session returns the stats without touching any
    /// resource a second time.
    pub async fn stop(&self) -> Result<SessionStats> {
        {
            let mut state = self.shared.state.write().await;
            if *state == SessionState::Stopped {
                return Ok(self.stats().await);
            }
            *state = SessionState::Stopped;
        }

        info!(session_id = %self.config.session_id, "stopping captioning session");

        if let Some(task) = self.event_task.lock().await.take() {
            task.abort();
        }
        teardown(&self.shared).await;

        let elapsed = elapsed_secs(&self.shared).await;
        let mut stats = self.shared.stats.write().await;
        stats.set_duration(elapsed);
        Ok(stats.clone())
    }

    /// Switch the backend mode. Only allowed before the session starts;
    /// while recording the request is rejected without touching the running
    /// backend.
    pub async fn set_mode(&self, mode: BackendMode) -> Result<()> {
        let state = *self.shared.state.read().await;
        match state {
            SessionState::Idle => {
                *self.mode.write().await = mode;
                Ok(())
            }
            SessionState::Stopped => Err(CaptionError::InvalidState {
                message: "session instance is stopped; start a new session".to_string(),
            }),
            _ => Err(CaptionError::InvalidState {
                message: "cannot switch mode while recording; stop the session first".to_string(),
            }),
        }
    }

    /// Replace a finalized caption's text and mark it corrected. The
    /// correction engine is not re-run on manual edits.
    pub async fn edit_caption(&self, id: &str, new_text: String) -> Result<Caption> {
        let mut captions = self.shared.captions.write().await;
        let caption = captions
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| CaptionError::UnknownCaption { id: id.to_string() })?;
        caption.text = new_text;
        caption.corrected = true;
        Ok(caption.clone())
    }

    /// Attach a translation to an existing caption. Translation itself is an
    /// external concern; this only stores the result.
    pub async fn attach_translation(&self, id: &str, translated: String) -> Result<Caption> {
        let mut captions = self.shared.captions.write().await;
        let caption = captions
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| CaptionError::UnknownCaption { id: id.to_string() })?;
        caption.translated_text = Some(translated);
        Ok(caption.clone())
    }

    /// Replace the correction dictionary. Entries apply to the next
    /// finalized utterance; in-flight text is unaffected.
    pub async fn set_dictionary(&self, entries: Vec<DictionaryEntry>) {
        *self.shared.dictionary.write().await = entries;
    }

    pub async fn set_profanity_filter(&self, enabled: bool) {
        self.shared.profanity_filter.store(enabled, Ordering::SeqCst);
    }

    pub async fn state(&self) -> SessionState {
        *self.shared.state.read().await
    }

    pub async fn interim(&self) -> String {
        self.shared.interim.read().await.clone()
    }

    pub async fn captions(&self) -> Vec<Caption> {
        self.shared.captions.read().await.clone()
    }

    pub async fn stats(&self) -> SessionStats {
        let elapsed = elapsed_secs(&self.shared).await;
        let mut stats = self.shared.stats.write().await;
        if elapsed > 0.0 {
            stats.set_duration(elapsed);
        }
        stats.clone()
    }

    async fn abort_start(&self) {
        *self.shared.state.write().await = SessionState::Stopped;
        teardown(&self.shared).await;
    }
}

async fn elapsed_secs(shared: &Shared) -> f64 {
    shared
        .started
        .read()
        .await
        .map(|t| t.elapsed().as_secs_f64())
        .unwrap_or(0.0)
}

/// Release every resource exactly once. Safe to call repeatedly: the
/// `Option` slots are taken on first use.
async fn teardown(shared: &Shared) {
    if let Some(mut backend) = shared.backend.lock().await.take() {
        if let Err(e) = backend.stop().await {
            error!(error = %e, "failed to stop transcription backend");
        }
    }
    if let Some(mut audio) = shared.audio.lock().await.take() {
        if let Err(e) = audio.stop().await {
            error!(error = %e, "failed to stop audio source");
        }
    }
    shared.relay.lock().await.take();
    shared.interim.write().await.clear();
}

async fn run_event_loop(shared: Arc<Shared>, mut events: mpsc::Receiver<TranscriptEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            TranscriptEvent::Connected => {
                let mut state = shared.state.write().await;
                match *state {
                    SessionState::Connecting | SessionState::Degraded => {
                        *state = SessionState::Active;
                        info!("transcription backend connected");
                    }
                    _ => {}
                }
            }
            TranscriptEvent::Reconnecting { reason } => {
                let mut state = shared.state.write().await;
                if *state == SessionState::Active {
                    *state = SessionState::Degraded;
                    warn!(reason = %reason, "transcription backend reconnecting");
                }
            }
            TranscriptEvent::Transcript(transcript) => match transcript.kind {
                TranscriptKind::Partial => {
                    // Interim text is replaced wholesale, never diffed.
                    *shared.interim.write().await = transcript.text;
                }
                TranscriptKind::Final => {
                    finalize_transcript(&shared, transcript).await;
                }
            },
            TranscriptEvent::Fatal(e) => {
                error!(error = %e, "fatal backend error, stopping session");
                shared.stats.write().await.mark_offline();
                *shared.state.write().await = SessionState::Stopped;
                teardown(&shared).await;
                break;
            }
        }
    }
}

/// Correction, caption construction, stats, and relay emit for one final
/// transcript.
async fn finalize_transcript(shared: &Shared, transcript: Transcript) {
    let received = Instant::now();

    let outcome = {
        let dictionary = shared.dictionary.read().await;
        correction::apply(
            &transcript.text,
            &dictionary,
            shared.profanity_filter.load(Ordering::SeqCst),
        )
    };

    // Empty results are discarded silently, never stored.
    if outcome.text.trim().is_empty() {
        return;
    }

    let sequence = shared.sequence.fetch_add(1, Ordering::SeqCst);
    let caption = Caption::new(
        sequence,
        outcome.text.clone(),
        transcript.confidence,
        outcome.corrected(),
    );

    shared.captions.write().await.push(caption.clone());
    shared.interim.write().await.clear();

    let word_count = outcome.text.split_whitespace().count();
    let elapsed = elapsed_secs(shared).await;
    {
        let mut stats = shared.stats.write().await;
        stats.record_caption(
            word_count,
            transcript.confidence as f64,
            outcome.change.as_deref(),
            elapsed,
        );
        stats.set_latency(received.elapsed().as_millis() as u32);
    }

    if let Some(publisher) = shared.relay.lock().await.as_ref() {
        publisher.publish_caption(&caption);
    }
}
