use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod error;
mod gateway;
mod relay;
mod store;
mod translate;
mod tts;

use api::routes::{create_router, AppState};
use config::Config;
use gateway::Gateway;
use relay::ChunkRelay;
use store::AudioStore;
use translate::GoogleTranslator;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Configuration from environment; nothing works without a provider key
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let addr = match config.socket_addr() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let store = match AudioStore::new(&config.audio_dir) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(
                "Cannot create audio directory {}: {}",
                config.audio_dir.display(),
                e
            );
            std::process::exit(1);
        }
    };

    tracing::info!("TTS Relay Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Starting server on http://{}", addr);
    tracing::info!("Provider: {}", config.provider.name());
    tracing::info!("Audio directory: {}", config.audio_dir.display());

    // Upstream clients share one connection pool
    let http = match reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Cannot build HTTP client: {}", e);
            std::process::exit(1);
        }
    };
    let tts = tts::create_provider(&config.provider, http.clone());
    let translator = Arc::new(GoogleTranslator::new(http, config.translate_base_url.clone()));

    let gateway = Gateway::new(
        tts,
        translator,
        Arc::new(store),
        ChunkRelay::new(config.chunk_timeout),
    );

    // Create app state
    let state = Arc::new(AppState { gateway });

    // Create router
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
