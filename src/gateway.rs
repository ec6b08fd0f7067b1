use std::sync::Arc;

use serde::Deserialize;
use tokio::task::JoinHandle;

use crate::error::AppError;
use crate::relay::{AudioSession, ChunkRelay, EventSink, NoClient, SessionEvent, SessionSummary};
use crate::store::AudioStore;
use crate::translate::Translator;
use crate::tts::TtsProvider;

/// Longest text a streaming session accepts, in characters.
pub const MAX_STREAM_TEXT_CHARS: usize = 2000;

/// Requests in this language are translated before synthesis; every other
/// code is passed to the provider as-is.
pub const TRANSLATED_LANGUAGE: &str = "hi";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisRequest {
    pub text: Option<String>,
    #[serde(alias = "speaker")]
    pub voice_id: Option<String>,
    pub model_id: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// `POST /tts`, one response once the file is stored.
    Rest,
    /// `generateTTS` socket event: chunks, then a result carrying the whole file.
    GenerateTts,
    /// `textChunk` socket event: chunks, then a short completion notice.
    TextChunk,
}

impl SessionKind {
    pub fn default_model(self) -> &'static str {
        match self {
            SessionKind::Rest | SessionKind::TextChunk => "eleven_multilingual_v2",
            SessionKind::GenerateTts => "eleven_flash_v2_5",
        }
    }

    fn text_limit(self) -> Option<usize> {
        match self {
            SessionKind::Rest => None,
            SessionKind::GenerateTts | SessionKind::TextChunk => Some(MAX_STREAM_TEXT_CHARS),
        }
    }
}

/// A request that passed validation; nothing upstream has been called yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRequest {
    pub text: String,
    pub voice_id: String,
    pub model_id: String,
    pub language: Option<String>,
}

impl SynthesisRequest {
    pub fn validate(self, kind: SessionKind) -> Result<ValidRequest, AppError> {
        let text = self.text.filter(|t| !t.is_empty());
        let voice_id = self.voice_id.filter(|v| !v.is_empty());

        let (text, voice_id) = match (text, voice_id) {
            (Some(text), Some(voice_id)) => (text, voice_id),
            (None, _) => return Err(AppError::InvalidRequest("text is required".into())),
            (_, None) => return Err(AppError::InvalidRequest("voiceId is required".into())),
        };

        if let Some(max) = kind.text_limit() {
            let len = text.chars().count();
            if len > max {
                return Err(AppError::PayloadTooLarge { len, max });
            }
        }

        let model_id = self
            .model_id
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| kind.default_model().to_string());

        Ok(ValidRequest {
            text,
            voice_id,
            model_id,
            language: self.language,
        })
    }
}

/// Orchestrates translation, synthesis and relaying for every entry point.
/// Built once at startup and shared by handlers.
#[derive(Clone)]
pub struct Gateway {
    tts: Arc<dyn TtsProvider>,
    translator: Arc<dyn Translator>,
    store: Arc<AudioStore>,
    relay: ChunkRelay,
}

impl Gateway {
    pub fn new(
        tts: Arc<dyn TtsProvider>,
        translator: Arc<dyn Translator>,
        store: Arc<AudioStore>,
        relay: ChunkRelay,
    ) -> Self {
        Self {
            tts,
            translator,
            store,
            relay,
        }
    }

    pub fn store(&self) -> &AudioStore {
        &self.store
    }

    pub fn tts(&self) -> &dyn TtsProvider {
        self.tts.as_ref()
    }

    pub async fn list_voices(&self) -> Result<serde_json::Value, AppError> {
        self.tts
            .list_voices()
            .await
            .map_err(|e| AppError::CatalogUnavailable(e.to_string()))
    }

    /// Text the provider should speak.
    async fn final_text(&self, request: &ValidRequest) -> Result<String, AppError> {
        if request.language.as_deref() != Some(TRANSLATED_LANGUAGE) {
            return Ok(request.text.clone());
        }

        let result = self
            .translator
            .translate(&request.text, TRANSLATED_LANGUAGE)
            .await?;

        tracing::info!(
            source = %result.source_text,
            target = %result.target_text,
            "Translated to {}",
            result.target_language
        );

        Ok(result.target_text)
    }

    pub async fn synthesize<S: EventSink>(
        &self,
        request: ValidRequest,
        sink: S,
    ) -> Result<SessionSummary, AppError> {
        let final_text = self.final_text(&request).await?;

        tracing::info!(
            voice_id = %request.voice_id,
            model_id = %request.model_id,
            text_len = final_text.len(),
            "Starting synthesis"
        );

        // The provider may stall before the first byte as well as between chunks
        let timeout = self.relay.chunk_timeout();
        let upstream = tokio::time::timeout(
            timeout,
            self.tts
                .synthesize(&final_text, &request.voice_id, &request.model_id),
        )
        .await
        .map_err(|_| {
            AppError::SynthesisFailed(format!("provider did not respond within {:?}", timeout))
        })?
        .map_err(|e| AppError::SynthesisFailed(e.to_string()))?;

        let session = AudioSession::new(sink, final_text, self.tts.format());
        self.relay.run(upstream, session, &self.store).await
    }

    /// Run a session for a request/response caller. The session lives on its
    /// own task, so dropping the returned future (client hung up) leaves the
    /// synthesis and the stored file intact.
    pub async fn synthesize_detached(
        &self,
        request: ValidRequest,
    ) -> Result<SessionSummary, AppError> {
        let gateway = self.clone();
        tokio::spawn(async move { gateway.synthesize(request, NoClient).await })
            .await
            .map_err(|e| AppError::SynthesisFailed(format!("session task failed: {}", e)))?
    }

    /// Run a session on its own task. The task is not tied to the client
    /// connection and always runs to completion or failure.
    pub fn spawn_session<S>(&self, request: ValidRequest, sink: S) -> JoinHandle<()>
    where
        S: EventSink + Clone + 'static,
    {
        let gateway = self.clone();

        tokio::spawn(async move {
            let failure_sink = sink.clone();
            if let Err(e) = gateway.synthesize(request, sink).await {
                tracing::error!("TTS session failed: {} - {}", e.code(), e);
                failure_sink.emit(SessionEvent::Failed(e));
            }
        })
    }
}
