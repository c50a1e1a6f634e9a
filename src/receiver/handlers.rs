use crate::camera::CameraRegistry;
use crate::onvif::{classify, Notification};
use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::IntoResponse,
};
use bytes::Bytes;
use chrono::Utc;
use std::net::{IpAddr, SocketAddr};
use tracing::{debug, info};

use super::server::ServerState;

/// What became of one pushed notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    Dispatched(bool),
    UnknownCamera,
    Unrecognized,
    Malformed,
}

/// Route one notification body from `peer` to its camera
pub async fn handle_notification(
    registry: &CameraRegistry,
    peer: IpAddr,
    body: &[u8],
) -> NotificationOutcome {
    let Some(camera) = registry.find_by_ip(peer) else {
        info!("Received event from {} but it's not a registered camera", peer);
        return NotificationOutcome::UnknownCamera;
    };

    match classify(body) {
        Notification::Motion(active) => {
            camera.post_event(active).await;
            NotificationOutcome::Dispatched(active)
        }
        Notification::Unrecognized => {
            debug!("[{}] Unrecognized event message", camera.identity());
            NotificationOutcome::Unrecognized
        }
        Notification::Malformed => NotificationOutcome::Malformed,
    }
}

/// `POST /events`. Always answers 200; cameras expect no rejection semantics.
pub async fn events_handler(
    State(state): State<ServerState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> StatusCode {
    handle_notification(&state.registry, peer.ip(), &body).await;
    StatusCode::OK
}

/// Health check endpoint
pub async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let mut cameras = Vec::with_capacity(state.registry.len());
    for camera in state.registry.iter() {
        cameras.push(camera.status().await);
    }

    let health_info = serde_json::json!({
        "status": "healthy",
        "mode": state.mode.to_string(),
        "uptime_seconds": (Utc::now() - state.started_at).num_seconds(),
        "cameras": cameras,
    });

    (StatusCode::OK, axum::Json(health_info))
}
