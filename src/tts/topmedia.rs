use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::{check_status, endpoint, AudioFormat, AudioStream, ProviderError, TtsProvider};

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Serialize)]
struct Text2SpeechRequest<'a> {
    text: &'a str,
    speaker: &'a str,
    emotion: &'a str,
}

#[derive(Debug, Deserialize)]
struct Text2SpeechResponse {
    data: Option<Text2SpeechData>,
}

#[derive(Debug, Deserialize)]
struct Text2SpeechData {
    oss_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavSummary {
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_secs: f32,
}

/// TopMediai client. Synthesis is not streamed: the API answers with a link
/// to a finished WAV which is downloaded and handed on as a single chunk.
pub struct TopMediaClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl TopMediaClient {
    pub fn new(http: reqwest::Client, base_url: Url, api_key: String) -> Self {
        Self {
            http,
            base_url,
            api_key,
        }
    }

    async fn download(&self, audio_url: &str) -> Result<Bytes, ProviderError> {
        let response = self.http.get(audio_url).send().await?;
        let audio = check_status(response).await?.bytes().await?;
        Ok(audio)
    }
}

#[async_trait]
impl TtsProvider for TopMediaClient {
    fn format(&self) -> AudioFormat {
        AudioFormat::Wav
    }

    async fn list_voices(&self) -> Result<serde_json::Value, ProviderError> {
        let response = self
            .http
            .get(endpoint(&self.base_url, &["v1", "voices_list"]))
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
        // TopMediai has a single model per speaker
        tracing::debug!(speaker = voice_id, ignored_model = model_id, "Requesting TopMediai synthesis");

        let response = self
            .http
            .post(endpoint(&self.base_url, &["v1", "text2speech"]))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&Text2SpeechRequest {
                text,
                speaker: voice_id,
                emotion: "Neutral",
            })
            .send()
            .await?;

        let body: Text2SpeechResponse = check_status(response).await?.json().await?;
        let audio_url = audio_url(body)?;

        let audio = self.download(&audio_url).await?;
        let summary = validate_wav(&audio)?;
        tracing::debug!(
            sample_rate = summary.sample_rate,
            channels = summary.channels,
            duration_secs = summary.duration_secs,
            bytes = audio.len(),
            "Downloaded TopMediai audio"
        );

        Ok(stream::iter([Ok(audio)]).boxed())
    }
}

fn audio_url(response: Text2SpeechResponse) -> Result<String, ProviderError> {
    response
        .data
        .and_then(|data| data.oss_url)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ProviderError::InvalidResponse("missing data.oss_url".to_string()))
}

/// Check the downloaded payload is a WAV file hound can read.
pub fn validate_wav(audio: &[u8]) -> Result<WavSummary, ProviderError> {
    let reader = hound::WavReader::new(Cursor::new(audio))
        .map_err(|e| ProviderError::InvalidResponse(format!("not a WAV file: {}", e)))?;

    let spec = reader.spec();
    let duration_secs = if spec.sample_rate > 0 {
        reader.duration() as f32 / spec.sample_rate as f32
    } else {
        0.0
    };

    Ok(WavSummary {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        duration_secs,
    })
}
