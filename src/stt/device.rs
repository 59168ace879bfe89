//! On-device backend: wraps a platform continuous-recognition facility.
//!
//! Some platforms end a recognition pass after silence or internal errors, so
//! the backend restarts passes immediately to keep the event stream
//! continuous. A transient network-class facility error gets one retry after
//! a fixed 500 ms delay; a second consecutive transient failure is fatal.

use crate::audio::AudioFrame;
use crate::error::{CaptionError, Result};
use crate::stt::{Transcript, TranscriptEvent, TranscriptionBackend};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const TRANSIENT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Platform speech-recognition boundary.
///
/// `run_pass` drives one continuous recognition pass: it consumes audio
/// frames and emits transcripts until the facility ends the stream, returning
/// `Ok(())` on a normal end-of-stream and an error otherwise. The facility is
/// expected to be already permission-checked; a facility that cannot exist on
/// the current platform is rejected by the factory before a backend is built.
#[async_trait::async_trait]
pub trait RecognitionFacility: Send {
    async fn run_pass(
        &mut self,
        audio: &mut mpsc::Receiver<AudioFrame>,
        transcripts: &mpsc::Sender<Transcript>,
    ) -> Result<()>;
}

pub struct OnDeviceBackend {
    facility: Option<Box<dyn RecognitionFacility>>,
    task: Option<JoinHandle<()>>,
}

impl OnDeviceBackend {
    pub fn new(facility: Box<dyn RecognitionFacility>) -> Self {
        Self {
            facility: Some(facility),
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl TranscriptionBackend for OnDeviceBackend {
    async fn start(
        &mut self,
        mut audio: mpsc::Receiver<AudioFrame>,
    ) -> Result<mpsc::Receiver<TranscriptEvent>> {
        let mut facility = self
            .facility
            .take()
            .ok_or_else(|| CaptionError::InvalidState {
                message: "on-device backend already started".to_string(),
            })?;

        let (tx, rx) = mpsc::channel(64);
        let (transcript_tx, mut transcript_rx) = mpsc::channel::<Transcript>(64);

        // Forward facility transcripts onto the event stream. Ends on its own
        // once the pass loop (and with it the sender) is gone.
        let forward_tx = tx.clone();
        tokio::spawn(async move {
            while let Some(transcript) = transcript_rx.recv().await {
                if forward_tx
                    .send(TranscriptEvent::Transcript(transcript))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        let task = tokio::spawn(async move {
            if tx.send(TranscriptEvent::Connected).await.is_err() {
                return;
            }

            let mut retried_after_transient = false;
            loop {
                match facility.run_pass(&mut audio, &transcript_tx).await {
                    Ok(()) => {
                        // End-of-stream: restart immediately to keep continuity.
                        debug!("recognition pass ended, restarting");
                        retried_after_transient = false;
                    }
                    Err(e) if e.is_transient() && !retried_after_transient => {
                        warn!(error = %e, "transient recognition error, retrying once");
                        retried_after_transient = true;
                        if tx
                            .send(TranscriptEvent::Reconnecting {
                                reason: e.to_string(),
                            })
                            .await
                            .is_err()
                        {
                            return;
                        }
                        tokio::time::sleep(TRANSIENT_RETRY_DELAY).await;
                        if tx.send(TranscriptEvent::Connected).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(TranscriptEvent::Fatal(e)).await;
                        return;
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
        "on-device"
    }
}
