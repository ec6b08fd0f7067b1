//! Persistent sessions over WebSocket.
//!
//! Frames are JSON text `{"event": ..., "data": ...}` in both directions. All
//! outbound frames for a connection go through one unbounded channel drained
//! by a writer task, so synthesis sessions never wait on the socket.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::api::routes::AppState;
use crate::gateway::{Gateway, SessionKind, SynthesisRequest};
use crate::relay::{EventSink, SessionEvent};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    GetVoices,
    #[serde(rename = "generateTTS")]
    GenerateTts(SynthesisRequest),
    TextChunk(SynthesisRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    VoicesList(serde_json::Value),
    AudioChunk { chunk: String, seq: u64 },
    TtsResult(TtsResult),
    ChunkComplete(ChunkComplete),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsResult {
    pub message: String,
    pub translated_text: String,
    pub path: String,
    pub file_base64: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkComplete {
    pub message: String,
    pub seq: u64,
    pub translated_text: String,
    pub path: String,
}

/// Frame that closes a socket session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    /// `ttsResult` with the whole file inline.
    TtsResult,
    /// `chunkComplete` with the stored path only.
    ChunkComplete,
}

/// Turns session events into frames for one connection.
#[derive(Clone)]
pub struct SocketSink {
    tx: mpsc::UnboundedSender<ServerMessage>,
    completion: Completion,
}

impl EventSink for SocketSink {
    fn emit(&self, event: SessionEvent) -> bool {
        let message = match event {
            SessionEvent::Chunk(chunk) => ServerMessage::AudioChunk {
                chunk: BASE64.encode(&chunk.payload),
                seq: chunk.seq,
            },
            SessionEvent::Complete(summary) => match self.completion {
                Completion::TtsResult => ServerMessage::TtsResult(TtsResult {
                    message: "Audio saved locally".to_string(),
                    translated_text: summary.file.final_text,
                    path: summary.file.path.display().to_string(),
                    file_base64: BASE64.encode(&summary.audio),
                }),
                Completion::ChunkComplete => {
                    ServerMessage::ChunkComplete(ChunkComplete {
                        message: "done".to_string(),
                        seq: summary.chunk_count,
                        translated_text: summary.file.final_text,
                        path: summary.file.path.display().to_string(),
                    })
                }
            },
            SessionEvent::Failed(e) => ServerMessage::Error(e.client_message().to_string()),
        };

        self.tx.send(message).is_ok()
    }
}

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
    tracing::info!(connection_id, "client connected");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(connection_id, "Failed to encode frame: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = receiver.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(connection_id, "WebSocket read error: {}", e);
                break;
            }
        };

        match frame {
            Message::Text(text) => dispatch(&state.gateway, &tx, &text),
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Sessions still running keep accumulating; their frames are dropped.
    writer.abort();
    tracing::info!(connection_id, "client disconnected");
}

/// Handle one inbound frame. Work that touches a provider runs on its own task.
pub fn dispatch(gateway: &Gateway, tx: &mpsc::UnboundedSender<ServerMessage>, text: &str) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Unrecognised socket message: {}", e);
            let _ = tx.send(ServerMessage::Error("invalid message".to_string()));
            return;
        }
    };

    let (request, kind, completion) = match message {
        ClientMessage::GetVoices => {
            let gateway = gateway.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let reply = match gateway.list_voices().await {
                    Ok(voices) => ServerMessage::VoicesList(voices),
                    Err(e) => {
                        tracing::error!("Failed to fetch voices: {}", e);
                        ServerMessage::Error(e.client_message().to_string())
                    }
                };
                let _ = tx.send(reply);
            });
            return;
        }
        ClientMessage::GenerateTts(request) => {
            (request, SessionKind::GenerateTts, Completion::TtsResult)
        }
        ClientMessage::TextChunk(request) => {
            (request, SessionKind::TextChunk, Completion::ChunkComplete)
        }
    };

    match request.validate(kind) {
        Ok(request) => {
            tracing::debug!(voice_id = %request.voice_id, ?kind, "Socket synthesis requested");
            gateway.spawn_session(
                request,
                SocketSink {
                    tx: tx.clone(),
                    completion,
                },
            );
        }
        Err(e) => {
            tracing::warn!("Socket request rejected: {}", e);
            let _ = tx.send(ServerMessage::Error(e.client_message().to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::*;
    use crate::store::AudioStore;
    use std::sync::atomic::Ordering;

    fn setup(tts: FakeTts, dir: &std::path::Path) -> Gateway {
        let log = tts.log.clone();
        gateway(tts, translator("नमस्ते", log), AudioStore::new(dir).unwrap())
    }

    async fn collect_until_terminal(
        rx: &mut mpsc::UnboundedReceiver<ServerMessage>,
    ) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Some(message) = rx.recv().await {
            let terminal = !matches!(message, ServerMessage::AudioChunk { .. });
            messages.push(message);
            if terminal {
                break;
            }
        }
        messages
    }

    #[test]
    fn test_client_message_parsing() {
        let message: ClientMessage = serde_json::from_str(r#"{"event":"getVoices"}"#).unwrap();
        assert!(matches!(message, ClientMessage::GetVoices));

        let message: ClientMessage = serde_json::from_str(
            r#"{"event":"generateTTS","data":{"text":"Hi","voiceId":"v1","language":"hi"}}"#,
        )
        .unwrap();
        match message {
            ClientMessage::GenerateTts(request) => {
                assert_eq!(request.text.as_deref(), Some("Hi"));
                assert_eq!(request.language.as_deref(), Some("hi"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let message: ClientMessage =
            serde_json::from_str(r#"{"event":"textChunk","data":{"text":"Hi"}}"#).unwrap();
        assert!(matches!(message, ClientMessage::TextChunk(_)));
    }

    #[test]
    fn test_server_message_shape() {
        let frame = serde_json::to_value(ServerMessage::AudioChunk {
            chunk: "AAE=".into(),
            seq: 3,
        })
        .unwrap();
        assert_eq!(
            frame,
            serde_json::json!({"event": "audioChunk", "data": {"chunk": "AAE=", "seq": 3}})
        );

        let frame = serde_json::to_value(ServerMessage::Error("TTS generation failed".into())).unwrap();
        assert_eq!(
            frame,
            serde_json::json!({"event": "error", "data": "TTS generation failed"})
        );
    }

    #[tokio::test]
    async fn test_generate_tts_streams_then_reports() {
        let tmp = tempfile::tempdir().unwrap();
        let gateway = setup(FakeTts::new(&["ab", "cd", "ef"], CallLog::default()), tmp.path());
        let (tx, mut rx) = mpsc::unbounded_channel();

        dispatch(
            &gateway,
            &tx,
            r#"{"event":"generateTTS","data":{"text":"Hello","voiceId":"v1","language":"hi"}}"#,
        );
        let messages = collect_until_terminal(&mut rx).await;

        assert_eq!(messages.len(), 4);
        let mut streamed = Vec::new();
        for (i, message) in messages[..3].iter().enumerate() {
            match message {
                ServerMessage::AudioChunk { chunk, seq } => {
                    assert_eq!(*seq, i as u64);
                    streamed.extend(BASE64.decode(chunk).unwrap());
                }
                other => panic!("expected chunk, got {:?}", other),
            }
        }

        match &messages[3] {
            ServerMessage::TtsResult(result) => {
                assert_eq!(result.message, "Audio saved locally");
                assert_eq!(result.translated_text, "नमस्ते");
                assert_eq!(BASE64.decode(&result.file_base64).unwrap(), streamed);
                assert_eq!(std::fs::read(&result.path).unwrap(), b"abcdef");
            }
            other => panic!("expected ttsResult, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_text_chunk_completes_with_count() {
        let tmp = tempfile::tempdir().unwrap();
        let gateway = setup(FakeTts::new(&["ab", "cd"], CallLog::default()), tmp.path());
        let (tx, mut rx) = mpsc::unbounded_channel();

        dispatch(
            &gateway,
            &tx,
            r#"{"event":"textChunk","data":{"text":"Hello","voiceId":"v1"}}"#,
        );
        let messages = collect_until_terminal(&mut rx).await;

        match messages.last() {
            Some(ServerMessage::ChunkComplete(done)) => {
                assert_eq!(done.message, "done");
                assert_eq!(done.seq, 2);
                assert_eq!(done.translated_text, "Hello");
            }
            other => panic!("expected chunkComplete, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_voice_rejected_before_upstream() {
        let tmp = tempfile::tempdir().unwrap();
        let tts = FakeTts::new(&["ab"], CallLog::default());
        let calls = tts.calls.clone();
        let gateway = setup(tts, tmp.path());
        let (tx, mut rx) = mpsc::unbounded_channel();

        dispatch(&gateway, &tx, r#"{"event":"generateTTS","data":{"text":"Hello"}}"#);

        assert_eq!(
            rx.recv().await,
            Some(ServerMessage::Error("text and voiceId required".into()))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_text_rejected_before_upstream() {
        let tmp = tempfile::tempdir().unwrap();
        let tts = FakeTts::new(&["ab"], CallLog::default());
        let calls = tts.calls.clone();
        let gateway = setup(tts, tmp.path());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let frame = serde_json::json!({
            "event": "textChunk",
            "data": {"text": "a".repeat(2001), "voiceId": "v1"}
        });
        dispatch(&gateway, &tx, &frame.to_string());

        assert_eq!(
            rx.recv().await,
            Some(ServerMessage::Error("chunk too long".into()))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_get_voices() {
        let tmp = tempfile::tempdir().unwrap();
        let gateway = setup(FakeTts::new(&["ab"], CallLog::default()), tmp.path());
        let (tx, mut rx) = mpsc::unbounded_channel();

        dispatch(&gateway, &tx, r#"{"event":"getVoices"}"#);

        match rx.recv().await {
            Some(ServerMessage::VoicesList(voices)) => {
                assert_eq!(voices["voices"][0]["voice_id"], "v1")
            }
            other => panic!("expected voicesList, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_frame() {
        let tmp = tempfile::tempdir().unwrap();
        let gateway = setup(FakeTts::new(&["ab"], CallLog::default()), tmp.path());
        let (tx, mut rx) = mpsc::unbounded_channel();

        dispatch(&gateway, &tx, "not json");
        dispatch(&gateway, &tx, r#"{"event":"speak","data":{}}"#);

        assert_eq!(rx.recv().await, Some(ServerMessage::Error("invalid message".into())));
        assert_eq!(rx.recv().await, Some(ServerMessage::Error("invalid message".into())));
    }

    #[tokio::test]
    async fn test_session_failure_is_generic() {
        let tmp = tempfile::tempdir().unwrap();
        let mut tts = FakeTts::new(&["ab"], CallLog::default());
        tts.fail_synthesis = true;
        let gateway = setup(tts, tmp.path());
        let (tx, mut rx) = mpsc::unbounded_channel();

        dispatch(
            &gateway,
            &tx,
            r#"{"event":"generateTTS","data":{"text":"Hello","voiceId":"v1"}}"#,
        );

        assert_eq!(
            rx.recv().await,
            Some(ServerMessage::Error("TTS generation failed".into()))
        );
    }
}
