//! Cloud-streaming backend: bidirectional session with a remote speech
//! service. Outbound audio is base64-encoded 16-bit PCM; inbound transcript
//! deltas accumulate into an interim transcript until the service signals a
//! completed turn, which finalizes the accumulated text in one caption and
//! clears the buffer. Closed sessions reconnect after 1 s; failed
//! initialization retries after 2 s; both loops run until teardown.

use crate::audio::{samples_to_le_bytes, AudioFrame};
use crate::error::Result;
use crate::stt::{Transcript, TranscriptEvent, TranscriptionBackend};
use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const INIT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Outbound messages to the streaming service.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CloudRequest {
    Start { sample_rate: u32, encoding: String },
    Audio { data: String },
}

/// Inbound events from the streaming service.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CloudEvent {
    /// Incremental transcript text for the current turn.
    Delta { text: String },
    /// The current turn is complete; interim text becomes final.
    TurnComplete,
    /// Service-reported error; treated as a connection loss.
    Error { message: String },
}

/// What a folded cloud event means for the session.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnUpdate {
    /// Updated interim transcript (replaces the previous preview wholesale).
    Interim(String),
    /// A turn completed with this accumulated text.
    Finalized(String),
    /// Nothing to surface (empty turn, service error handled elsewhere).
    None,
}

/// Accumulates delta events into an interim transcript until turn completion.
#[derive(Debug, Default)]
pub struct TurnAccumulator {
    interim: String,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one service event into the accumulator.
    pub fn apply(&mut self, event: &CloudEvent) -> TurnUpdate {
        match event {
            CloudEvent::Delta { text } => {
                self.interim.push_str(text);
                TurnUpdate::Interim(self.interim.clone())
            }
            CloudEvent::TurnComplete => {
                if self.interim.is_empty() {
                    TurnUpdate::None
                } else {
                    TurnUpdate::Finalized(std::mem::take(&mut self.interim))
                }
            }
            CloudEvent::Error { .. } => TurnUpdate::None,
        }
    }

    /// Drop any half-accumulated turn (used when a session is torn down or
    /// replaced; leftover interim text must not leak into the next turn).
    pub fn clear(&mut self) {
        self.interim.clear();
    }

    pub fn interim(&self) -> &str {
        &self.interim
    }
}

pub struct CloudStreamBackend {
    url: String,
    api_key: String,
    task: Option<JoinHandle<()>>,
}

impl CloudStreamBackend {
    pub fn new(url: String, api_key: String) -> Self {
        Self {
            url,
            api_key,
            task: None,
        }
    }

    fn session_url(&self) -> String {
        if self.url.contains('?') {
            format!("{}&key={}", self.url, self.api_key)
        } else {
            format!("{}?key={}", self.url, self.api_key)
        }
    }
}

#[async_trait::async_trait]
impl TranscriptionBackend for CloudStreamBackend {
    async fn start(
        &mut self,
        mut audio: mpsc::Receiver<AudioFrame>,
    ) -> Result<mpsc::Receiver<TranscriptEvent>> {
        let (tx, rx) = mpsc::channel(64);
        let url = self.session_url();

        let task = tokio::spawn(async move {
            loop {
                match connect_async(url.as_str()).await {
                    Ok((stream, _)) => {
                        info!("cloud streaming session established");
                        if tx.send(TranscriptEvent::Connected).await.is_err() {
                            return;
                        }
                        let reason = pump(stream, &mut audio, &tx).await;
                        warn!(reason = %reason, "cloud streaming session closed");
                        if tx
                            .send(TranscriptEvent::Reconnecting { reason })
                            .await
                            .is_err()
                        {
                            return;
                        }
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                    Err(e) => {
                        debug!(error = %e, "cloud session initialization failed");
                        if tx
                            .send(TranscriptEvent::Reconnecting {
                                reason: e.to_string(),
                            })
                            .await
                            .is_err()
                        {
                            return;
                        }
                        tokio::time::sleep(INIT_RETRY_DELAY).await;
                    }
                }
            }
        });

        self.task = Some(task);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "cloud-stream"
    }
}

/// Pump one live session. Returns the close reason.
async fn pump(
    mut stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    audio: &mut mpsc::Receiver<AudioFrame>,
    events: &mpsc::Sender<TranscriptEvent>,
) -> String {
    let start = CloudRequest::Start {
        sample_rate: 16000,
        encoding: "pcm_s16le".to_string(),
    };
    if let Ok(payload) = serde_json::to_string(&start) {
        if let Err(e) = stream.send(Message::Text(payload)).await {
            return e.to_string();
        }
    }

    // Interim state is per-connection: a reconnect starts a fresh turn.
    let mut accumulator = TurnAccumulator::new();
    let mut audio_open = true;

    loop {
        tokio::select! {
            frame = audio.recv(), if audio_open => {
                match frame {
                    Some(frame) => {
                        let data = base64::engine::general_purpose::STANDARD
                            .encode(samples_to_le_bytes(&frame.samples));
                        let request = CloudRequest::Audio { data };
                        match serde_json::to_string(&request) {
                            Ok(payload) => {
                                if let Err(e) = stream.send(Message::Text(payload)).await {
                                    return e.to_string();
                                }
                            }
                            Err(e) => debug!(error = %e, "failed to encode audio frame"),
                        }
                    }
                    None => {
                        audio_open = false;
                    }
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(payload))) => {
                        let event = match serde_json::from_str::<CloudEvent>(&payload) {
                            Ok(event) => event,
                            Err(e) => {
                                debug!(error = %e, "unparseable service event");
                                continue;
                            }
                        };
                        if let CloudEvent::Error { message } = &event {
                            return message.clone();
                        }
                        let transcript = match accumulator.apply(&event) {
                            TurnUpdate::Interim(text) => Transcript::partial(text),
                            TurnUpdate::Finalized(text) => {
                                Transcript::final_with(text, crate::stt::DEFAULT_CONFIDENCE)
                            }
                            TurnUpdate::None => continue,
                        };
                        if events
                            .send(TranscriptEvent::Transcript(transcript))
                            .await
                            .is_err()
                        {
                            return "event channel closed".to_string();
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return "session closed".to_string(),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_accumulate_until_turn_complete() {
        let mut acc = TurnAccumulator::new();

        let update = acc.apply(&CloudEvent::Delta {
            text: "hello ".to_string(),
        });
        assert_eq!(update, TurnUpdate::Interim("hello ".to_string()));

        let update = acc.apply(&CloudEvent::Delta {
            text: "world".to_string(),
        });
        assert_eq!(update, TurnUpdate::Interim("hello world".to_string()));

        let update = acc.apply(&CloudEvent::TurnComplete);
        assert_eq!(update, TurnUpdate::Finalized("hello world".to_string()));

        // Buffer cleared: the next turn starts fresh.
        assert_eq!(acc.interim(), "");
        let update = acc.apply(&CloudEvent::TurnComplete);
        assert_eq!(update, TurnUpdate::None);
    }

    #[test]
    fn empty_turn_is_not_finalized() {
        let mut acc = TurnAccumulator::new();
        assert_eq!(acc.apply(&CloudEvent::TurnComplete), TurnUpdate::None);
    }

    #[test]
    fn clear_drops_half_turn() {
        let mut acc = TurnAccumulator::new();
        acc.apply(&CloudEvent::Delta {
            text: "stale".to_string(),
        });
        acc.clear();
        assert_eq!(acc.apply(&CloudEvent::TurnComplete), TurnUpdate::None);
    }

    #[test]
    fn cloud_event_wire_format() {
        let event: CloudEvent = serde_json::from_str(r#"{"type":"delta","text":"hi"}"#).unwrap();
        assert!(matches!(event, CloudEvent::Delta { ref text } if text == "hi"));

        let event: CloudEvent = serde_json::from_str(r#"{"type":"turn_complete"}"#).unwrap();
        assert!(matches!(event, CloudEvent::TurnComplete));
    }
}
