//! Streaming-socket backend: persistent WebSocket to a local inference
//! server. Audio goes out as binary frames of 4096 mono 16 kHz i16 samples;
//! the server answers with `{"text": ...}` JSON, each message yielding a
//! final transcript directly (this backend has no partial phase). Any socket
//! close triggers an unconditional reconnect after one second, for the
//! lifetime of the session.

use crate::audio::{samples_to_le_bytes, AudioFrame};
use crate::error::Result;
use crate::stt::{Transcript, TranscriptEvent, TranscriptionBackend, DEFAULT_CONFIDENCE};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Samples per binary wire frame.
pub const WIRE_FRAME_SAMPLES: usize = 4096;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Transcript message sent by the inference server.
#[derive(Debug, Deserialize)]
struct ServerTranscript {
    text: String,
    confidence: Option<f32>,
}

/// Accumulates capture-sized sample batches and drains fixed-size wire
/// frames. Leftover samples stay buffered across pushes (and across
/// reconnects, so no audio is dropped on the frame boundary).
#[derive(Debug, Default)]
pub struct FrameChunker {
    buffer: Vec<i16>,
    frame_len: usize,
}

impl FrameChunker {
    pub fn new(frame_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            frame_len,
        }
    }

    pub fn push(&mut self, samples: &[i16]) {
        self.buffer.extend_from_slice(samples);
    }

    /// Remove and return the next complete frame, if one is buffered.
    pub fn pop_frame(&mut self) -> Option<Vec<i16>> {
        if self.buffer.len() < self.frame_len {
            return None;
        }
        Some(self.buffer.drain(..self.frame_len).collect())
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

pub struct SocketStreamBackend {
    url: String,
    task: Option<JoinHandle<()>>,
}

impl SocketStreamBackend {
    pub fn new(url: String) -> Self {
        Self { url, task: None }
    }
}

#[async_trait::async_trait]
impl TranscriptionBackend for SocketStreamBackend {
    async fn start(
        &mut self,
        mut audio: mpsc::Receiver<AudioFrame>,
    ) -> Result<mpsc::Receiver<TranscriptEvent>> {
        let (tx, rx) = mpsc::channel(64);
        let url = self.url.clone();

        let task = tokio::spawn(async move {
            let mut chunker = FrameChunker::new(WIRE_FRAME_SAMPLES);
            loop {
                match connect_async(url.as_str()).await {
                    Ok((stream, _)) => {
                        info!(url = %url, "inference server connected");
                        if tx.send(TranscriptEvent::Connected).await.is_err() {
                            return;
                        }
                        let reason = pump(stream, &mut audio, &mut chunker, &tx).await;
                        warn!(reason = %reason, "inference server connection lost");
                        if tx
                            .send(TranscriptEvent::Reconnecting { reason })
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(e) => {
                        if tx
                            .send(TranscriptEvent::Reconnecting {
                                reason: e.to_string(),
                            })
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
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
        "local-socket"
    }
}

/// Pump one live connection. Returns the close reason.
async fn pump(
    mut stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    audio: &mut mpsc::Receiver<AudioFrame>,
    chunker: &mut FrameChunker,
    events: &mpsc::Sender<TranscriptEvent>,
) -> String {
    let mut audio_open = true;
    loop {
        tokio::select! {
            frame = audio.recv(), if audio_open => {
                match frame {
                    Some(frame) => {
                        chunker.push(&frame.samples);
                        while let Some(wire) = chunker.pop_frame() {
                            let bytes = samples_to_le_bytes(&wire);
                            if let Err(e) = stream.send(Message::Binary(bytes)).await {
                                return e.to_string();
                            }
                        }
                    }
                    None => {
                        // Audio source released; keep the socket open so
                        // trailing results still arrive until teardown.
                        audio_open = false;
                    }
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(payload))) => {
                        match serde_json::from_str::<ServerTranscript>(&payload) {
                            Ok(t) if !t.text.is_empty() => {
                                let transcript = Transcript::final_with(
                                    t.text,
                                    t.confidence.unwrap_or(DEFAULT_CONFIDENCE),
                                );
                                if events
                                    .send(TranscriptEvent::Transcript(transcript))
                                    .await
                                    .is_err()
                                {
                                    return "event channel closed".to_string();
                                }
                            }
                            Ok(_) => {}
                            Err(e) => debug!(error = %e, "unparseable server message"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return "socket closed".to_string(),
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
    fn chunker_emits_fixed_frames() {
        let mut chunker = FrameChunker::new(4);
        chunker.push(&[1, 2, 3]);
        assert!(chunker.pop_frame().is_none());

        chunker.push(&[4, 5, 6, 7, 8, 9]);
        assert_eq!(chunker.pop_frame(), Some(vec![1, 2, 3, 4]));
        assert_eq!(chunker.pop_frame(), Some(vec![5, 6, 7, 8]));
        assert!(chunker.pop_frame().is_none());
        assert_eq!(chunker.buffered(), 1);
    }

    #[test]
    fn chunker_preserves_order_across_pushes() {
        let mut chunker = FrameChunker::new(2);
        for i in 0..6i16 {
            chunker.push(&[i]);
        }
        assert_eq!(chunker.pop_frame(), Some(vec![0, 1]));
        assert_eq!(chunker.pop_frame(), Some(vec![2, 3]));
        assert_eq!(chunker.pop_frame(), Some(vec![4, 5]));
    }

    #[test]
    fn server_transcript_parses_with_and_without_confidence() {
        let t: ServerTranscript = serde_json::from_str(r#"{"text":"hello"}"#).unwrap();
        assert_eq!(t.text, "hello");
        assert!(t.confidence.is_none());

        let t: ServerTranscript =
            serde_json::from_str(r#"{"text":"hi","confidence":0.8}"#).unwrap();
        assert_eq!(t.confidence, Some(0.8));
    }
}
