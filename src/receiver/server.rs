use crate::{
    camera::CameraRegistry,
    config::{DeploymentMode, ServerConfig},
    error::ServerError,
};
use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers::{events_handler, health_handler};

/// Shared state for the Axum server
#[derive(Clone)]
pub struct ServerState {
    pub(crate) registry: CameraRegistry,
    pub(crate) mode: DeploymentMode,
    pub(crate) started_at: DateTime<Utc>,
}

/// HTTP endpoint cameras push their event notifications to.
///
/// Binding and serving are separate steps so a bind failure surfaces before
/// any camera is told to call back.
pub struct EventServer {
    listener: TcpListener,
    app: Router,
}

impl EventServer {
    pub async fn bind(
        config: &ServerConfig,
        registry: CameraRegistry,
        mode: DeploymentMode,
    ) -> Result<Self, ServerError> {
        let state = ServerState {
            registry,
            mode,
            started_at: Utc::now(),
        };

        let app = Router::new()
            .route("/events", post(events_handler))
            .route("/health", get(health_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let addr = format!("{}:{}", config.bind_ip, config.port);
        info!("Starting event server on {}", addr);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::BindFailed {
                address: addr.clone(),
                source: e,
            })?;

        Ok(Self { listener, app })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::Serve {
                details: e.to_string(),
            })
    }

    /// Serve until `shutdown` is cancelled, then drain in-flight requests
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), ServerError> {
        let addr = self.local_addr()?;
        info!("Event server listening on {}", addr);

        axum::serve(
            self.listener,
            self.app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ServerError::Serve {
            details: format!("Server error: {}", e),
        })?;

        info!("Event server stopped");
        Ok(())
    }
}
