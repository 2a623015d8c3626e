//! `LiveServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{FromRef, State};
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use scoreline_admission::{AdmissionGate, RequestFacts, Site, admission_layer, upgrade_rejection};
use serde_json::json;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::errors::{Result, ServerError};
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::Broadcaster;
use crate::websocket::heartbeat::HeartbeatMonitor;
use crate::websocket::hub::LiveHub;
use crate::websocket::session::run_session;

/// Shared state for handlers.
#[derive(Clone)]
pub struct AppState {
    /// Connection registry and subscriptions.
    pub hub: Arc<LiveHub>,
    /// Admission gate.
    pub gate: Arc<AdmissionGate>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
}

impl FromRef<AppState> for Arc<AdmissionGate> {
    fn from_ref(state: &AppState) -> Self {
        state.gate.clone()
    }
}

/// Background tasks started by [`LiveServer::listen`].
#[derive(Debug)]
pub struct ServerHandle {
    serve: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

impl ServerHandle {
    fn into_handles(self) -> Vec<JoinHandle<()>> {
        vec![self.serve, self.heartbeat]
    }
}

/// The live feed server.
pub struct LiveServer {
    config: Arc<ServerConfig>,
    hub: Arc<LiveHub>,
    gate: Arc<AdmissionGate>,
    broadcaster: Broadcaster,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl LiveServer {
    /// Create a server with its own hub.
    pub fn new(config: ServerConfig, gate: AdmissionGate) -> Self {
        let hub = Arc::new(LiveHub::new());
        Self {
            config: Arc::new(config),
            broadcaster: Broadcaster::new(hub.clone()),
            hub,
            gate: Arc::new(gate),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the router: the upgrade path, a gated root, and `/health`.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            gate: self.gate.clone(),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
        };

        let gated = admission_layer(
            Router::<AppState>::new().route("/", get(root_handler)),
            self.gate.clone(),
        );

        Router::new()
            .route(&self.config.ws_path, get(ws_handler))
            .route("/health", get(health_handler))
            .merge(gated)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind, start serving with peer addresses, and start the heartbeat.
    pub async fn listen(&self) -> Result<(SocketAddr, ServerHandle)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        let serve_token = self.shutdown.token();
        let serve = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { serve_token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server stopped with error");
            }
        });

        let monitor = HeartbeatMonitor::new(self.hub.clone(), self.config.heartbeat_interval);
        let heartbeat = tokio::spawn(monitor.run(self.shutdown.token()));

        info!(%local_addr, ws_path = %self.config.ws_path, gated = self.gate.is_enabled(), "live server listening");
        Ok((local_addr, ServerHandle { serve, heartbeat }))
    }

    /// Stop serving, stop the heartbeat and terminate every connection.
    /// Returns how many connections were closed.
    pub async fn stop(&self, handle: ServerHandle) -> usize {
        self.shutdown.shutdown();
        let closed = self.hub.close_all();
        info!(closed, "connections terminated");
        self.shutdown
            .graceful_shutdown(handle.into_handles(), Some(self.config.shutdown_timeout))
            .await;
        closed
    }

    /// The connection hub.
    pub fn hub(&self) -> &Arc<LiveHub> {
        &self.hub
    }

    /// Fan-out API for the data-write path.
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /
async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({ "message": "Scoreline live API" }))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.hub.connection_count(),
        state.hub.match_count(),
        state.shutdown.is_shutting_down(),
    ))
}

/// GET on the upgrade path. The upgrade policy is evaluated before the
/// handshake completes; refused sockets never reach the hub.
async fn ws_handler(State(state): State<AppState>, facts: RequestFacts, ws: WebSocketUpgrade) -> Response {
    if state.shutdown.is_shutting_down() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let outcome = state.gate.check(&facts, Site::Upgrade).await;
    if !outcome.is_allowed() {
        return upgrade_rejection(&outcome);
    }

    let hub = state.hub.clone();
    let capacity = state.config.send_queue_capacity;
    ws.max_message_size(state.config.max_message_size)
        .max_frame_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_session(socket, hub, capacity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::http::header::USER_AGENT;
    use tower::ServiceExt;

    const BROWSER: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0";

    fn open_server() -> LiveServer {
        LiveServer::new(ServerConfig::default(), AdmissionGate::disabled())
    }

    fn strict_server() -> LiveServer {
        LiveServer::new(
            ServerConfig::default(),
            AdmissionGate::from_settings(&scoreline_settings::AdmissionSettings::default()).unwrap(),
        )
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_counts() {
        let resp = open_server()
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
        assert_eq!(body["matches"], 0);
    }

    #[tokio::test]
    async fn health_is_not_gated() {
        let resp = strict_server()
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn root_is_gated() {
        let server = strict_server();
        let denied = server
            .router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        let allowed = server
            .router()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(USER_AGENT, BROWSER)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
        assert_eq!(body_json(allowed).await["message"], "Scoreline live API");
    }

    #[tokio::test]
    async fn plain_get_on_ws_path_is_not_upgraded() {
        let resp = open_server()
            .router()
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let resp = open_server()
            .router()
            .oneshot(Request::builder().uri("/nonexistent").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listen_and_stop() {
        let server = open_server();
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(server.stop(handle).await, 0);
        assert!(server.shutdown().is_shutting_down());
    }
}
