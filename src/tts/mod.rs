pub mod elevenlabs;
pub mod topmedia;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use reqwest::{StatusCode, Url};

use crate::config::ProviderConfig;

pub use elevenlabs::ElevenLabsClient;
pub use topmedia::TopMediaClient;

/// Lazy, finite and non-restartable sequence of audio bytes from a provider.
pub type AudioStream = BoxStream<'static, Result<Bytes, ProviderError>>;

#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
        }
    }
}

#[async_trait]
pub trait TtsProvider: Send + Sync {
    /// Container format of everything `synthesize` yields.
    fn format(&self) -> AudioFormat;

    /// Provider voice catalog, passed through untouched.
    async fn list_voices(&self) -> Result<serde_json::Value, ProviderError>;

    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        model_id: &str,
    ) -> Result<AudioStream, ProviderError>;
}

pub fn create_provider(config: &ProviderConfig, http: reqwest::Client) -> Arc<dyn TtsProvider> {
    match config {
        ProviderConfig::ElevenLabs { api_key, base_url } => Arc::new(ElevenLabsClient::new(
            http,
            base_url.clone(),
            api_key.clone(),
        )),
        ProviderConfig::TopMedia { api_key, base_url } => Arc::new(TopMediaClient::new(
            http,
            base_url.clone(),
            api_key.clone(),
        )),
    }
}

/// Append path segments to `base`, percent-encoding each one.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Turn a non-2xx response into `ProviderError::Status`, keeping the body for the log.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_appends_segments() {
        let base = Url::parse("https://api.elevenlabs.io").unwrap();
        let url = endpoint(&base, &["v1", "voices"]);
        assert_eq!(url.as_str(), "https://api.elevenlabs.io/v1/voices");
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let base = Url::parse("http://127.0.0.1:9000/proxy/").unwrap();
        let url = endpoint(&base, &["v1", "text2speech"]);
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/proxy/v1/text2speech");
    }

    #[test]
    fn test_endpoint_escapes_untrusted_segments() {
        let base = Url::parse("https://api.elevenlabs.io").unwrap();
        let url = endpoint(&base, &["v1", "text-to-speech", "../admin", "stream"]);
        assert_eq!(
            url.as_str(),
            "https://api.elevenlabs.io/v1/text-to-speech/..%2Fadmin/stream"
        );
    }

    #[test]
    fn test_audio_format() {
        assert_eq!(AudioFormat::Mp3.extension(), "mp3");
        assert_eq!(AudioFormat::Wav.extension(), "wav");
        assert_eq!(AudioFormat::Mp3.mime_type(), "audio/mpeg");
        assert_eq!(AudioFormat::Wav.mime_type(), "audio/wav");
    }
}
