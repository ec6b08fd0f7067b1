use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::{HealthResponse, TtsResponse};
use crate::api::routes::AppState;
use crate::error::AppError;
use crate::gateway::{SessionKind, SynthesisRequest, ValidRequest};

pub async fn welcome() -> Json<&'static str> {
    Json("Welcome to TTS Api")
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

pub async fn list_voices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let voices = state.gateway.list_voices().await?;
    Ok(Json(voices))
}

pub async fn tts(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SynthesisRequest>, JsonRejection>,
) -> Result<Json<TtsResponse>, AppError> {
    let request = parse_request(payload)?;
    let summary = state.gateway.synthesize_detached(request).await?;

    Ok(Json(TtsResponse {
        message: "Audio saved locally".to_string(),
        translated_text: summary.file.final_text,
        path: summary.file.path.display().to_string(),
    }))
}

/// Same as `tts`, but answers with the stored audio itself.
pub async fn tts_audio(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SynthesisRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = parse_request(payload)?;
    let summary = state.gateway.synthesize_detached(request).await?;

    let audio = state.gateway.store().read(&summary.file).await?;
    let format = state.gateway.tts().format();

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, format.mime_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", summary.file.file_name),
            ),
        ],
        audio,
    )
        .into_response())
}

// Malformed bodies get the same 400 as missing fields.
fn parse_request(
    payload: Result<Json<SynthesisRequest>, JsonRejection>,
) -> Result<ValidRequest, AppError> {
    let Json(request) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    request.validate(SessionKind::Rest)
}
