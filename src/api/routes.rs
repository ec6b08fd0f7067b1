use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use super::{handlers, socket};
use crate::gateway::Gateway;

pub struct AppState {
    pub gateway: Gateway,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let audio_dir = state.gateway.store().dir().to_path_buf();

    Router::new()
        .route("/", get(handlers::welcome))
        .route("/health", get(handlers::health))
        .route("/voices", get(handlers::list_voices))
        .route("/tts", post(handlers::tts))
        .route("/tts/audio", post(handlers::tts_audio))
        .route("/ws", get(socket::upgrade))
        .nest_service("/audio", ServeDir::new(audio_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
