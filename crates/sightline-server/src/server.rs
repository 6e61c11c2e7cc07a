//! HTTP and WebSocket surface.
//!
//! | route | |
//! |---|---|
//! | `GET /stream` | push-mode WebSocket session |
//! | `GET /live` | pull-mode WebSocket session (503 unless capture is enabled) |
//! | `POST /detect` | one-shot detection on a base64 image |
//! | `GET /health` | liveness and counters |
//! | `GET /metrics` | Prometheus text |
//! | `GET /sessions` | live session summaries |

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, State};
use axum::extract::ws::{WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::json;
use sightline_core::FrameError;
use tokio::net::TcpListener;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::metrics::{
    DETECT_REQUESTS_TOTAL, WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE,
    WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL, WS_SESSIONS_REJECTED_TOTAL,
};
use crate::pipeline::FramePipeline;
use crate::registry::{SessionRegistry, SessionSummary};
use crate::response::FrameResponse;
use crate::session::{CaptureConfig, SessionMode, StreamSession};
use crate::shutdown::ShutdownCoordinator;
use crate::transport::{Payload, WsTransport};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Frame processor shared by all sessions.
    pub pipeline: Arc<FramePipeline>,
    /// Live sessions.
    pub registry: Arc<SessionRegistry>,
    /// Shutdown fan-out.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Free session slots; one permit per live WebSocket.
    pub slots: Arc<Semaphore>,
    /// Pull-mode capture, if enabled.
    pub capture: Option<CaptureConfig>,
    /// Max inbound WebSocket message size.
    pub max_message_size: usize,
    /// Prometheus renderer.
    pub metrics: PrometheusHandle,
    /// Server start time.
    pub start_time: Instant,
}

/// The Sightline server: owns the shared state and builds the router.
pub struct SightlineServer {
    config: ServerConfig,
    pipeline: Arc<FramePipeline>,
    registry: Arc<SessionRegistry>,
    shutdown: Arc<ShutdownCoordinator>,
    slots: Arc<Semaphore>,
    capture: Option<CaptureConfig>,
    metrics: PrometheusHandle,
    start_time: Instant,
}

impl SightlineServer {
    /// Create a server. `capture` enables `/live`.
    pub fn new(
        config: ServerConfig,
        pipeline: FramePipeline,
        capture: Option<CaptureConfig>,
        metrics: PrometheusHandle,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_connections));
        Self {
            config,
            pipeline: Arc::new(pipeline),
            registry: Arc::new(SessionRegistry::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            slots,
            capture,
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Build the router with all routes and layers.
    pub fn router(&self) -> Router {
        let body_limit = DefaultBodyLimit::max(self.config.max_message_size);
        let state = AppState {
            pipeline: Arc::clone(&self.pipeline),
            registry: Arc::clone(&self.registry),
            shutdown: Arc::clone(&self.shutdown),
            slots: Arc::clone(&self.slots),
            capture: self.capture.clone(),
            max_message_size: self.config.max_message_size,
            metrics: self.metrics.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/stream", get(stream_handler))
            .route("/live", get(live_handler))
            .route("/detect", post(detect_handler).layer(body_limit))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/sessions", get(sessions_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind and serve in a background task until shutdown.
    ///
    /// Returns the bound address (useful with port 0) and the server task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.listener_token();

        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = served {
                error!(error = %e, "server terminated");
            }
        });

        info!(%addr, "sightline server listening");
        Ok((addr, handle))
    }

    /// Cancel every session and wait for them to close.
    ///
    /// Returns `false` if the configured timeout elapsed first.
    pub async fn drain(&self) -> bool {
        self.shutdown.drain(self.config.shutdown_timeout()).await
    }

    /// Live session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Shared frame pipeline.
    pub fn pipeline(&self) -> &Arc<FramePipeline> {
        &self.pipeline
    }
}

// ─── WebSocket sessions ─────────────────────────────────────────────────────

async fn stream_handler(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match ws {
        Ok(ws) => start_session(ws, state, SessionMode::Push),
        Err(rejection) => rejection.into_response(),
    }
}

async fn live_handler(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(capture) = state.capture.clone() else {
        return unavailable("capture is disabled");
    };
    match ws {
        Ok(ws) => start_session(ws, state, SessionMode::Pull(capture)),
        Err(rejection) => rejection.into_response(),
    }
}

/// Claim a slot and upgrade, or refuse with 503 at the connection limit.
fn start_session(ws: WebSocketUpgrade, state: AppState, mode: SessionMode) -> Response {
    if state.shutdown.is_shutting_down() {
        return unavailable("server is shutting down");
    }
    let Ok(permit) = Arc::clone(&state.slots).try_acquire_owned() else {
        counter!(WS_SESSIONS_REJECTED_TOTAL).increment(1);
        warn!(
            live = state.registry.size(),
            "connection limit reached, refusing upgrade"
        );
        return unavailable("connection limit reached");
    };

    let shutdown = Arc::clone(&state.shutdown);
    ws.max_message_size(state.max_message_size)
        .on_failed_upgrade(|e| warn!(error = %e, "websocket handshake failed"))
        .on_upgrade(move |socket| shutdown.track(run_ws_session(socket, state, mode, permit)))
}

/// Run one WebSocket session to completion, with connection metrics.
#[instrument(skip_all, fields(mode = mode.kind().as_str()))]
async fn run_ws_session(
    socket: WebSocket,
    state: AppState,
    mode: SessionMode,
    _permit: OwnedSemaphorePermit,
) {
    let kind = mode.kind().as_str();
    counter!(WS_CONNECTIONS_TOTAL, "mode" => kind).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
    let connected_at = Instant::now();

    let session = StreamSession::new(
        WsTransport::new(socket),
        mode,
        Arc::clone(&state.pipeline),
        Arc::clone(&state.registry),
        state.shutdown.session_token(),
    );
    let reason = session.run().await;

    counter!(WS_DISCONNECTIONS_TOTAL, "reason" => reason.as_str()).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connected_at.elapsed().as_secs_f64());
}

// ─── HTTP handlers ──────────────────────────────────────────────────────────

/// Body of `POST /detect`.
#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    /// Base64 image, optionally with a data-URL prefix.
    pub image_base64: String,
}

async fn detect_handler(State(state): State<AppState>, Json(req): Json<DetectRequest>) -> Response {
    match state
        .pipeline
        .detect_payload(Payload::Text(req.image_base64))
        .await
    {
        Ok(detections) => {
            counter!(DETECT_REQUESTS_TOTAL, "status" => "ok").increment(1);
            Json(FrameResponse::detections_only(&detections)).into_response()
        }
        Err(e @ FrameError::Decode(_)) => {
            counter!(DETECT_REQUESTS_TOTAL, "status" => "bad_request").increment(1);
            warn!(error = %e, "detect request with undecodable image");
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
        Err(e) => {
            counter!(DETECT_REQUESTS_TOTAL, "status" => "error").increment(1);
            error!(error = %e, kind = e.kind(), "detect request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.registry.size(),
        state.capture.is_some(),
    ))
}

async fn metrics_handler(State(state): State<AppState>) -> String {
    crate::metrics::render(&state.metrics)
}

async fn sessions_handler(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.registry.snapshot())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn unavailable(message: &str) -> Response {
    error_response(StatusCode::SERVICE_UNAVAILABLE, message)
}
