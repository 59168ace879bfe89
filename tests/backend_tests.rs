// Tests for backend reconnect policies, run without a live network or
// microphone: the on-device variant is driven through a scripted recognition
// facility, and the streaming-socket variant against a local stub server.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::{routing::get, Router};
use livecaption::audio::AudioFrame;
use livecaption::error::CaptionError;
use livecaption::stt::{
    OnDeviceBackend, RecognitionFacility, SocketStreamBackend, Transcript, TranscriptEvent,
    TranscriptKind, TranscriptionBackend,
};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// On-device variant: scripted facility
// ============================================================================

enum PassOutcome {
    /// Emit one final transcript, then end the pass normally.
    Emit(&'static str),
    /// End the pass with no output (platform silence timeout).
    EndOfStream,
    /// Fail with a network-class error.
    Transient,
    /// Fail with a non-recoverable error.
    Fatal,
}

struct ScriptedFacility {
    script: VecDeque<PassOutcome>,
}

impl ScriptedFacility {
    fn new(script: Vec<PassOutcome>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

#[async_trait::async_trait]
impl RecognitionFacility for ScriptedFacility {
    async fn run_pass(
        &mut self,
        _audio: &mut mpsc::Receiver<AudioFrame>,
        transcripts: &mpsc::Sender<Transcript>,
    ) -> livecaption::Result<()> {
        match self.script.pop_front() {
            Some(PassOutcome::Emit(text)) => {
                transcripts
                    .send(Transcript::final_with(text, 0.9))
                    .await
                    .ok();
                Ok(())
            }
            Some(PassOutcome::EndOfStream) => Ok(()),
            Some(PassOutcome::Transient) => Err(CaptionError::TransientNetwork {
                message: "recognizer network hiccup".to_string(),
            }),
            Some(PassOutcome::Fatal) => Err(CaptionError::UnsupportedEnvironment {
                message: "recognizer gone".to_string(),
            }),
            None => {
                // Script exhausted: idle like a recognizer hearing silence.
                futures::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

async fn start_device(
    script: Vec<PassOutcome>,
) -> (OnDeviceBackend, mpsc::Receiver<TranscriptEvent>) {
    let mut backend = OnDeviceBackend::new(Box::new(ScriptedFacility::new(script)));
    let (_audio_tx, audio_rx) = mpsc::channel(8);
    let events = backend.start(audio_rx).await.unwrap();
    (backend, events)
}

async fn next_event(events: &mut mpsc::Receiver<TranscriptEvent>) -> TranscriptEvent {
    tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("timed out waiting for backend event")
        .expect("backend event stream ended")
}

async fn expect_quiet(events: &mut mpsc::Receiver<TranscriptEvent>) {
    let outcome = tokio::time::timeout(Duration::from_millis(200), events.recv()).await;
    assert!(outcome.is_err(), "expected no further events");
}

fn assert_final(event: TranscriptEvent, text: &str) {
    match event {
        TranscriptEvent::Transcript(t) => {
            assert_eq!(t.kind, TranscriptKind::Final);
            assert_eq!(t.text, text);
        }
        other => panic!("expected final transcript, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn passes_restart_immediately_on_end_of_stream() {
    let (_backend, mut events) = start_device(vec![
        PassOutcome::Emit("one"),
        PassOutcome::EndOfStream,
        PassOutcome::Emit("two"),
    ])
    .await;

    assert!(matches!(
        next_event(&mut events).await,
        TranscriptEvent::Connected
    ));
    assert_final(next_event(&mut events).await, "one");
    // The silent end-of-stream pass restarts without surfacing anything.
    assert_final(next_event(&mut events).await, "two");
    expect_quiet(&mut events).await;
}

#[tokio::test(start_paused = true)]
async fn transient_error_retries_once_after_delay() {
    let (_backend, mut events) =
        start_device(vec![PassOutcome::Transient, PassOutcome::Emit("after retry")]).await;

    assert!(matches!(
        next_event(&mut events).await,
        TranscriptEvent::Connected
    ));
    assert!(matches!(
        next_event(&mut events).await,
        TranscriptEvent::Reconnecting { .. }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        TranscriptEvent::Connected
    ));
    assert_final(next_event(&mut events).await, "after retry");
}

#[tokio::test(start_paused = true)]
async fn second_consecutive_transient_error_is_fatal() {
    let (_backend, mut events) =
        start_device(vec![PassOutcome::Transient, PassOutcome::Transient]).await;

    assert!(matches!(
        next_event(&mut events).await,
        TranscriptEvent::Connected
    ));
    assert!(matches!(
        next_event(&mut events).await,
        TranscriptEvent::Reconnecting { .. }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        TranscriptEvent::Connected
    ));
    assert!(matches!(
        next_event(&mut events).await,
        TranscriptEvent::Fatal(CaptionError::TransientNetwork { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn successful_pass_resets_the_retry_budget() {
    let (_backend, mut events) = start_device(vec![
        PassOutcome::Transient,
        PassOutcome::Emit("first"),
        PassOutcome::Transient,
        PassOutcome::Emit("second"),
    ])
    .await;

    assert!(matches!(
        next_event(&mut events).await,
        TranscriptEvent::Connected
    ));
    assert!(matches!(
        next_event(&mut events).await,
        TranscriptEvent::Reconnecting { .. }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        TranscriptEvent::Connected
    ));
    assert_final(next_event(&mut events).await, "first");

    // The healthy pass restored the single-retry budget.
    assert!(matches!(
        next_event(&mut events).await,
        TranscriptEvent::Reconnecting { .. }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        TranscriptEvent::Connected
    ));
    assert_final(next_event(&mut events).await, "second");
}

#[tokio::test(start_paused = true)]
async fn non_network_error_is_immediately_fatal() {
    let (_backend, mut events) = start_device(vec![PassOutcome::Fatal]).await;

    assert!(matches!(
        next_event(&mut events).await,
        TranscriptEvent::Connected
    ));
    assert!(matches!(
        next_event(&mut events).await,
        TranscriptEvent::Fatal(CaptionError::UnsupportedEnvironment { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent() {
    let (mut backend, _events) = start_device(vec![PassOutcome::EndOfStream]).await;
    backend.stop().await.unwrap();
    backend.stop().await.unwrap();
}

// ============================================================================
// Streaming-socket variant: local stub server
// ============================================================================

async fn spawn_stub(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });
    format!("ws://{}/ws", addr)
}

/// Sends one transcript message, then closes the connection.
async fn one_shot_stub(mut socket: WebSocket) {
    socket
        .send(WsMessage::Text(r#"{"text":"stub result"}"#.to_string()))
        .await
        .ok();
}

/// Answers each binary audio frame with its byte count.
async fn echo_stub(mut socket: WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        if let WsMessage::Binary(data) = message {
            let reply = format!(r#"{{"text":"got {} bytes"}}"#, data.len());
            if socket.send(WsMessage::Text(reply)).await.is_err() {
                break;
            }
        }
    }
}

#[tokio::test]
async fn socket_backend_finalizes_server_messages_and_reconnects() {
    let url = spawn_stub(Router::new().route(
        "/ws",
        get(|upgrade: WebSocketUpgrade| async move { upgrade.on_upgrade(one_shot_stub) }),
    ))
    .await;

    let mut backend = SocketStreamBackend::new(url);
    let (_audio_tx, audio_rx) = mpsc::channel(8);
    let mut events = backend.start(audio_rx).await.unwrap();

    assert!(matches!(
        next_event(&mut events).await,
        TranscriptEvent::Connected
    ));
    assert_final(next_event(&mut events).await, "stub result");

    // Server closed the socket: the backend reports the loss and, after the
    // fixed delay, reconnects unconditionally.
    assert!(matches!(
        next_event(&mut events).await,
        TranscriptEvent::Reconnecting { .. }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        TranscriptEvent::Connected
    ));
    assert_final(next_event(&mut events).await, "stub result");

    backend.stop().await.unwrap();
}

#[tokio::test]
async fn socket_backend_ships_fixed_size_binary_frames() {
    let url = spawn_stub(Router::new().route(
        "/ws",
        get(|upgrade: WebSocketUpgrade| async move { upgrade.on_upgrade(echo_stub) }),
    ))
    .await;

    let mut backend = SocketStreamBackend::new(url);
    let (audio_tx, audio_rx) = mpsc::channel(8);
    let mut events = backend.start(audio_rx).await.unwrap();

    assert!(matches!(
        next_event(&mut events).await,
        TranscriptEvent::Connected
    ));

    // 6000 samples: one complete 4096-sample wire frame, remainder buffered.
    audio_tx
        .send(AudioFrame {
            samples: vec![0i16; 6000],
            sample_rate: 16000,
            channels: 1,
            timestamp_ms: 0,
        })
        .await
        .unwrap();

    // 4096 samples * 2 bytes.
    assert_final(next_event(&mut events).await, "got 8192 bytes");

    // The buffered remainder completes the next frame.
    audio_tx
        .send(AudioFrame {
            samples: vec![0i16; 2192],
            sample_rate: 16000,
            channels: 1,
            timestamp_ms: 375,
        })
        .await
        .unwrap();
    assert_final(next_event(&mut events).await, "got 8192 bytes");

    backend.stop().await.unwrap();
}
