//! REST API handlers

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use aria_discovery::DiscoveryError;
use aria_link::{protocol, LinkError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::info;

use crate::state::AppState;

/// API error response
#[derive(Serialize)]
struct ApiError {
    error: String,
}

impl ApiError {
    fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

fn discovery_error(err: DiscoveryError) -> (StatusCode, Json<ApiError>) {
    let status = match err {
        DiscoveryError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
        DiscoveryError::Unreachable(_) | DiscoveryError::NoReply(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(ApiError::new(err.to_string())))
}

fn link_error(err: LinkError) -> (StatusCode, Json<ApiError>) {
    let status = match err {
        LinkError::NotConnected => StatusCode::CONFLICT,
        LinkError::Connect(..) | LinkError::Io(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(ApiError::new(err.to_string())))
}

fn default_port() -> u16 {
    8080
}

/// List known devices, confirmed devices first
pub async fn list_devices(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let devices = state.engine.list_devices().await;
    Json(devices)
}

/// Manual add request body
#[derive(Deserialize)]
pub struct AddDeviceRequest {
    ip: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    name: String,
}

/// Manually add a device after a reachability check
pub async fn add_device(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddDeviceRequest>,
) -> impl IntoResponse {
    match state.engine.add_device(&req.ip, req.port, &req.name).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => discovery_error(e).into_response(),
    }
}

/// Remove a device from the registry
pub async fn remove_device(
    State(state): State<Arc<AppState>>,
    Path(ip): Path<String>,
) -> impl IntoResponse {
    let addr: IpAddr = match ip.parse() {
        Ok(addr) => addr,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiError::new("Invalid device address")),
            )
                .into_response()
        }
    };

    if state.engine.remove_device(addr).await {
        Json(serde_json::json!({
            "status": "removed",
            "ip": ip
        }))
        .into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ApiError::new("Device not found")),
        )
            .into_response()
    }
}

/// Connect request body
#[derive(Deserialize)]
pub struct ConnectRequest {
    ip: String,
    #[serde(default = "default_port")]
    port: u16,
}

/// Open a session to a peripheral, replacing any existing one
pub async fn connect(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConnectRequest>,
) -> impl IntoResponse {
    let addr: IpAddr = match req.ip.parse() {
        Ok(addr) => addr,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiError::new("Invalid device address")),
            )
                .into_response()
        }
    };

    match state.session.connect(addr, req.port).await {
        Ok(()) => Json(serde_json::json!({
            "status": "connected",
            "peer": format!("{}:{}", addr, req.port)
        }))
        .into_response(),
        Err(e) => link_error(e).into_response(),
    }
}

/// Close the current session; no-op without one
pub async fn disconnect(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.session.disconnect().await;
    Json(serde_json::json!({ "status": "disconnected" }))
}

/// Begin an audio stream
///
/// Scanning is paused first so the sweep does not contend with audio
/// transfer; a failed start resumes it immediately.
pub async fn stream_start(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.engine.pause().await;

    match state
        .session
        .send_command(protocol::AUDIO_STREAM_START, &[])
        .await
    {
        Ok(()) => {
            info!("Audio stream started");
            Json(serde_json::json!({ "status": "streaming" })).into_response()
        }
        Err(e) => {
            state.engine.resume().await;
            link_error(e).into_response()
        }
    }
}

/// Forward one chunk of audio data
pub async fn stream_data(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    match state
        .session
        .send_command(protocol::AUDIO_STREAM_DATA, &body)
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => link_error(e).into_response(),
    }
}

/// End the audio stream
///
/// Scanning resumes regardless of the send outcome, so a dead link still
/// converges back to a scanning state.
pub async fn stream_end(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let result = state
        .session
        .send_command(protocol::AUDIO_STREAM_END, &[])
        .await;
    state.engine.resume().await;

    match result {
        Ok(()) => {
            info!("Audio stream ended");
            Json(serde_json::json!({ "status": "ended" })).into_response()
        }
        Err(e) => link_error(e).into_response(),
    }
}

/// Stop audio playback
pub async fn stop_audio(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let result = state.session.send_command(protocol::STOP, &[]).await;
    state.engine.resume().await;

    match result {
        Ok(()) => {
            info!("Audio playback stopped");
            Json(serde_json::json!({ "status": "stopped" })).into_response()
        }
        Err(e) => link_error(e).into_response(),
    }
}

/// Connection status
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "connected": state.session.is_connected().await,
        "timestamp": Utc::now().timestamp()
    }))
}
