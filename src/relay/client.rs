use super::messages::{PeerRole, RelayMessage};
use crate::caption::Caption;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Broadcaster-side relay attachment.
///
/// Publishes finalized captions to the relay on a background task. Every
/// failure path is silent: broadcast is best-effort and never session-fatal.
/// Messages that arrive while the relay is unreachable are dropped rather
/// than queued, keeping delivery at-most-once and memory bounded.
pub struct RelayPublisher {
    tx: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl RelayPublisher {
    pub fn start(url: String, session_id: String) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(url, session_id, rx));
        Self { tx, task }
    }

    /// Queue a caption for broadcast. Non-blocking; failures are dropped.
    pub fn publish_caption(&self, caption: &Caption) {
        let message = RelayMessage::Caption {
            is_final: caption.is_final,
            payload: match serde_json::to_value(caption) {
                Ok(payload) => payload,
                Err(_) => return,
            },
        };
        if let Ok(text) = serde_json::to_string(&message) {
            let _ = self.tx.send(text);
        }
    }
}

impl Drop for RelayPublisher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(url: String, session_id: String, mut rx: mpsc::UnboundedReceiver<String>) {
    loop {
        match connect_async(url.as_str()).await {
            Ok((mut stream, _)) => {
                let join = RelayMessage::Join {
                    session_id: session_id.clone(),
                    role: PeerRole::Broadcaster,
                };
                let joined = match serde_json::to_string(&join) {
                    Ok(payload) => stream.send(Message::Text(payload)).await.is_ok(),
                    Err(_) => false,
                };

                if joined {
                    debug!(url = %url, session_id = %session_id, "relay attached");
                    loop {
                        tokio::select! {
                            outgoing = rx.recv() => {
                                match outgoing {
                                    Some(text) => {
                                        if stream.send(Message::Text(text)).await.is_err() {
                                            break;
                                        }
                                    }
                                    // Publisher dropped: session over.
                                    None => return,
                                }
                            }
                            incoming = stream.next() => {
                                match incoming {
                                    // A broadcaster ignores fan-out traffic.
                                    Some(Ok(_)) => {}
                                    _ => break,
                                }
                            }
                        }
                    }
                    debug!("relay connection lost");
                }
            }
            Err(e) => {
                debug!(error = %e, "relay unreachable");
            }
        }

        // Drop anything queued while disconnected; stale captions are not
        // replayed to the audience.
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}
