//! Web server setup and routing

use anyhow::Result;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use crate::api;
use crate::sse;
use crate::state::AppState;

/// Run the web server and the background discovery loop
pub async fn run(state: Arc<AppState>, bind: &str, web_root: &str) -> Result<()> {
    let app = Router::new()
        // API routes
        .route("/api/devices", get(api::list_devices).post(api::add_device))
        .route("/api/devices/{ip}", delete(api::remove_device))
        .route("/api/connect", post(api::connect))
        .route("/api/disconnect", post(api::disconnect))
        .route("/api/audio/stream/start", post(api::stream_start))
        .route("/api/audio/stream/data", post(api::stream_data))
        .route("/api/audio/stream/end", post(api::stream_end))
        .route("/api/audio/stop", post(api::stop_audio))
        .route("/api/status", get(api::status))
        // SSE for temperature telemetry
        .route("/api/temperature/events", get(sse::temperature_events))
        // Static frontend
        .fallback_service(ServeDir::new(web_root))
        // CORS
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        // State
        .with_state(state.clone());

    // Start discovery in background
    let engine = state.engine.clone();
    tokio::spawn(async move {
        engine.run().await;
    });

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %bind, "Starting web server");

    let shutdown_state = state.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            shutdown_state.engine.stop();
            shutdown_state.session.disconnect().await;
        })
        .await?;

    Ok(())
}
