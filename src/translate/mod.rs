pub mod google;

use async_trait::async_trait;
use reqwest::StatusCode;

pub use google::GoogleTranslator;

#[derive(thiserror::Error, Debug)]
pub enum TranslateError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Translator returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Unexpected translator response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationResult {
    pub source_text: String,
    pub target_text: String,
    pub target_language: String,
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        target_language: &str,
    ) -> Result<TranslationResult, TranslateError>;
}
