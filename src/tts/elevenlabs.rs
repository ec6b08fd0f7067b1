use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Url;
use serde::Serialize;

use super::{check_status, endpoint, AudioFormat, AudioStream, ProviderError, TtsProvider};

const API_KEY_HEADER: &str = "xi-api-key";

#[derive(Debug, Serialize)]
struct StreamRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

/// ElevenLabs streaming client. Audio arrives as MP3 frames, forwarded as the
/// HTTP body chunks come in.
pub struct ElevenLabsClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl ElevenLabsClient {
    pub fn new(http: reqwest::Client, base_url: Url, api_key: String) -> Self {
        Self {
            http,
            base_url,
            api_key,
        }
    }

    fn voices_url(&self) -> Url {
        endpoint(&self.base_url, &["v1", "voices"])
    }

    fn stream_url(&self, voice_id: &str) -> Url {
        endpoint(&self.base_url, &["v1", "text-to-speech", voice_id, "stream"])
    }
}

#[async_trait]
impl TtsProvider for ElevenLabsClient {
    fn format(&self) -> AudioFormat {
        AudioFormat::Mp3
    }

    async fn list_voices(&self) -> Result<serde_json::Value, ProviderError> {
        let response = self
            .http
            .get(self.voices_url())
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let voices = check_status(response).await?.json().await?;
        Ok(voices)
    }

    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        model_id: &str,
    ) -> Result<AudioStream, ProviderError> {
        tracing::debug!(voice_id, model_id, text_len = text.len(), "Starting ElevenLabs stream");

        let response = self
            .http
            .post(self.stream_url(voice_id))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&StreamRequest { text, model_id })
            .send()
            .await?;

        let stream = check_status(response)
            .await?
            .bytes_stream()
            .map(|chunk| chunk.map_err(ProviderError::from))
            .boxed();

        Ok(stream)
    }
}
