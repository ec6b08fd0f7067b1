//! Chunk relay: forwards upstream audio chunks to a client as they arrive and
//! accumulates them for the stored file.
//!
//! Delivery and accumulation are decoupled. The client sink never applies
//! backpressure to the upstream read, and a sink that has gone away only
//! stops delivery. The session keeps counting and buffering so the stored
//! file is complete whenever the upstream stream completes.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::store::{AudioStore, StoredAudioFile};
use crate::tts::{AudioFormat, AudioStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub seq: u64,
    pub payload: Bytes,
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub chunk_count: u64,
    pub file: StoredAudioFile,
    pub audio: Bytes,
}

#[derive(Debug)]
pub enum SessionEvent {
    Chunk(AudioChunk),
    Complete(SessionSummary),
    Failed(AppError),
}

/// Where a session's events go. Implementations must not block.
pub trait EventSink: Send + Sync {
    /// Returns `false` once nobody is listening any more.
    fn emit(&self, event: SessionEvent) -> bool;
}

impl EventSink for mpsc::UnboundedSender<SessionEvent> {
    fn emit(&self, event: SessionEvent) -> bool {
        self.send(event).is_ok()
    }
}

/// Sink for request/response callers that only want the final summary.
#[derive(Debug, Clone, Copy)]
pub struct NoClient;

impl EventSink for NoClient {
    fn emit(&self, _event: SessionEvent) -> bool {
        false
    }
}

/// State of one synthesis from first chunk to stored file.
pub struct AudioSession<S> {
    sink: S,
    format: AudioFormat,
    final_text: String,
    chunks: Vec<Bytes>,
    byte_len: usize,
    next_seq: u64,
    client_attached: bool,
}

impl<S: EventSink> AudioSession<S> {
    pub fn new(sink: S, final_text: String, format: AudioFormat) -> Self {
        Self {
            sink,
            format,
            final_text,
            chunks: Vec::new(),
            byte_len: 0,
            next_seq: 0,
            client_attached: true,
        }
    }

    /// Number a chunk, forward it and keep it. Empty payloads are dropped
    /// without using up a sequence number.
    pub fn push(&mut self, payload: Bytes) -> Option<u64> {
        if payload.is_empty() {
            return None;
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        if self.client_attached {
            let chunk = AudioChunk {
                seq,
                payload: payload.clone(),
            };
            if !self.sink.emit(SessionEvent::Chunk(chunk)) {
                self.client_attached = false;
                tracing::debug!(seq, "Client gone, accumulating without delivery");
            }
        }

        self.byte_len += payload.len();
        self.chunks.push(payload);
        Some(seq)
    }

    pub fn chunk_count(&self) -> u64 {
        self.next_seq
    }

    fn assemble(&mut self) -> Bytes {
        let mut audio = BytesMut::with_capacity(self.byte_len);
        for chunk in self.chunks.drain(..) {
            audio.extend_from_slice(&chunk);
        }
        audio.freeze()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkRelay {
    chunk_timeout: Duration,
}

impl ChunkRelay {
    pub fn new(chunk_timeout: Duration) -> Self {
        Self { chunk_timeout }
    }

    pub fn chunk_timeout(&self) -> Duration {
        self.chunk_timeout
    }

    /// Drain `upstream` into `session`, then persist the assembled audio and
    /// emit the single completion event.
    pub async fn run<S: EventSink>(
        &self,
        mut upstream: AudioStream,
        mut session: AudioSession<S>,
        store: &AudioStore,
    ) -> Result<SessionSummary, AppError> {
        loop {
            let next = tokio::time::timeout(self.chunk_timeout, upstream.next())
                .await
                .map_err(|_| {
                    AppError::StreamInterrupted(format!(
                        "no audio received for {:?} after chunk {}",
                        self.chunk_timeout,
                        session.chunk_count()
                    ))
                })?;

            match next {
                Some(Ok(payload)) => {
                    session.push(payload);
                }
                Some(Err(e)) => {
                    return Err(AppError::StreamInterrupted(format!(
                        "after chunk {}: {}",
                        session.chunk_count(),
                        e
                    )));
                }
                None => break,
            }
        }

        if session.chunk_count() == 0 {
            return Err(AppError::SynthesisFailed(
                "provider returned no audio".to_string(),
            ));
        }

        let audio = session.assemble();
        let file = store
            .persist(&audio, session.format, &session.final_text)
            .await?;

        let summary = SessionSummary {
            chunk_count: session.chunk_count(),
            file,
            audio,
        };

        tracing::info!(
            chunks = summary.chunk_count,
            bytes = summary.file.byte_length,
            path = %summary.file.path.display(),
            client_attached = session.client_attached,
            "Audio session complete"
        );

        session.sink.emit(SessionEvent::Complete(summary.clone()));
        Ok(summary)
    }
}
