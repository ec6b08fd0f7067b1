use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::translate::TranslateError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Text too long: {len} chars (max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Translation failed: {0}")]
    TranslationFailed(#[from] TranslateError),

    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("Voice catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Audio stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Failed to write audio file: {0}")]
    StorageWriteError(#[from] std::io::Error),

    #[error("Failed to read audio file: {0}")]
    StorageReadError(#[source] std::io::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl AppError {
    /// Short message safe to show to clients. Provider bodies and IO details
    /// stay in the server log.
    pub fn client_message(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "text and voiceId required",
            AppError::PayloadTooLarge { .. } => "chunk too long",
            AppError::CatalogUnavailable(_) => "Failed to fetch voices",
            _ => "TTS generation failed",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            AppError::TranslationFailed(_) => "TRANSLATION_FAILED",
            AppError::SynthesisFailed(_) => "SYNTHESIS_FAILED",
            AppError::CatalogUnavailable(_) => "CATALOG_UNAVAILABLE",
            AppError::StreamInterrupted(_) => "STREAM_INTERRUPTED",
            AppError::StorageWriteError(_) => "STORAGE_WRITE_ERROR",
            AppError::StorageReadError(_) => "STORAGE_READ_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();

        if self.status().is_server_error() {
            tracing::error!("Request failed: {} - {}", code, self);
        } else {
            tracing::warn!("Request rejected: {} - {}", code, self);
        }

        (
            self.status(),
            Json(ErrorResponse {
                error: self.client_message().to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_messages_hide_details() {
        let err = AppError::SynthesisFailed("provider returned 401: {\"detail\":\"bad key\"}".into());
        assert_eq!(err.client_message(), "TTS generation failed");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = AppError::StorageWriteError(std::io::Error::other("disk full"));
        assert_eq!(err.client_message(), "TTS generation failed");
    }

    #[test]
    fn test_validation_errors_are_client_errors() {
        let err = AppError::InvalidRequest("voiceId missing".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.client_message(), "text and voiceId required");

        let err = AppError::PayloadTooLarge { len: 2001, max: 2000 };
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.client_message(), "chunk too long");
    }

    #[test]
    fn test_catalog_message() {
        let err = AppError::CatalogUnavailable("timeout".into());
        assert_eq!(err.client_message(), "Failed to fetch voices");
        assert_eq!(err.code(), "CATALOG_UNAVAILABLE");
    }
}
