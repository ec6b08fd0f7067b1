use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

use super::{TranslateError, TranslationResult, Translator};
use crate::tts::endpoint;

/// Client for the keyless `translate_a/single` endpoint used by the Google
/// Translate web widget.
pub struct GoogleTranslator {
    http: reqwest::Client,
    base_url: Url,
}

impl GoogleTranslator {
    pub fn new(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(
        &self,
        text: &str,
        target_language: &str,
    ) -> Result<TranslationResult, TranslateError> {
        let response = self
            .http
            .get(endpoint(&self.base_url, &["translate_a", "single"]))
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target_language),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranslateError::Status { status, body });
        }

        let body: Value = response.json().await?;
        let target_text = parse_response(&body)?;

        Ok(TranslationResult {
            source_text: text.to_string(),
            target_text,
            target_language: target_language.to_string(),
        })
    }
}

/// The response is a nested array; element 0 holds one
/// `[translated, original, ...]` entry per sentence.
fn parse_response(body: &Value) -> Result<String, TranslateError> {
    let sentences = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslateError::InvalidResponse("missing sentence list".to_string()))?;

    let translated: String = sentences
        .iter()
        .filter_map(|sentence| sentence.get(0).and_then(Value::as_str))
        .collect();

    if translated.is_empty() {
        return Err(TranslateError::InvalidResponse(
            "empty translation".to_string(),
        ));
    }

    Ok(translated)
}
