use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use rostrum_session::{
    spawn_session_actor, BroadcastEngine, Outbox, SessionController, SessionHandle,
};
use rostrum_telemetry::{MetricsRecorder, RecentLogs, TelemetryGuard};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::client::{self, Channel, ClientRegistry};

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    /// Port 0 picks any free port.
    pub candidate_port: u16,
    pub interviewer_port: u16,
    pub max_send_queue: usize,
    pub heartbeat_secs: u64,
    pub client_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            candidate_port: 9009,
            interviewer_port: 9008,
            max_send_queue: 256,
            heartbeat_secs: 30,
            client_timeout_secs: 90,
        }
    }
}

/// Shared state passed to Axum handlers. One per listener.
#[derive(Clone)]
pub struct AppState {
    pub channel: Channel,
    pub client_registry: Arc<ClientRegistry>,
    pub session: SessionHandle,
    pub metrics: Arc<MetricsRecorder>,
    pub recent_logs: Arc<RecentLogs>,
    pub heartbeat: Duration,
}

/// Build the router for one channel: WebSocket at `/`, JSON health at `/health`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Spawn the session actor and both listeners. Returns once both ports are bound.
pub async fn start(
    config: ServerConfig,
    controller: SessionController,
    telemetry: &TelemetryGuard,
) -> Result<ServerHandle, std::io::Error> {
    let metrics = telemetry.metrics();
    let heartbeat = Duration::from_secs(config.heartbeat_secs.max(1));
    let client_registry = Arc::new(ClientRegistry::new(
        config.max_send_queue,
        Duration::from_secs(config.client_timeout_secs),
    ));

    let outbox: Arc<dyn Outbox> = client_registry.clone();
    let engine = BroadcastEngine::new(outbox).with_metrics(Arc::clone(&metrics));
    let (session, actor) = spawn_session_actor(controller, engine, Some(Arc::clone(&metrics)));

    let cleanup = client::start_cleanup_task(Arc::clone(&client_registry), heartbeat);

    let state_for = |channel| AppState {
        channel,
        client_registry: Arc::clone(&client_registry),
        session: session.clone(),
        metrics: Arc::clone(&metrics),
        recent_logs: telemetry.recent_logs(),
        heartbeat,
    };

    let (candidate_port, candidate_server) = serve(
        &config.host,
        config.candidate_port,
        build_router(state_for(Channel::Candidate)),
    )
    .await?;
    let (interviewer_port, interviewer_server) = serve(
        &config.host,
        config.interviewer_port,
        build_router(state_for(Channel::Interviewer)),
    )
    .await?;

    tracing::info!(candidate_port, interviewer_port, "rostrum server started");

    Ok(ServerHandle {
        candidate_port,
        interviewer_port,
        session,
        tasks: vec![actor, cleanup, candidate_server, interviewer_server],
    })
}

async fn serve(host: &str, port: u16, router: Router) -> Result<(u16, JoinHandle<()>), std::io::Error> {
    let listener = TcpListener::bind((host, port)).await?;
    let local_port = listener.local_addr()?.port();
    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(port = local_port, error = %e, "listener stopped");
        }
    });
    Ok((local_port, task))
}

/// Handle returned by `start()`. Keeps background tasks alive.
pub struct ServerHandle {
    pub candidate_port: u16,
    pub interviewer_port: u16,
    session: SessionHandle,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Stop listeners, the cleanup task and the session actor.
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a new WebSocket connection.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (conn_id, rx) = state.client_registry.register(state.channel);
    tracing::info!(conn_id = %conn_id, channel = state.channel.as_str(), "client connected");

    client::handle_ws_connection(
        socket,
        conn_id,
        state.channel,
        rx,
        state.client_registry,
        state.session,
        state.metrics,
        state.heartbeat,
    )
    .await;
}

/// Health check HTTP endpoint.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let Some(snapshot) = state.session.snapshot().await else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable" })),
        );
    };

    let body = json!({
        "status": "healthy",
        "state": snapshot.state,
        "preparing": snapshot.preparing,
        "queued": snapshot.queued,
        "finished": snapshot.finished,
        "interviewerAttached": snapshot.interviewer_attached,
        "currentQuestion": snapshot.current_question,
        "connections": {
            "candidate": state.client_registry.count_for(Channel::Candidate),
            "interviewer": state.client_registry.count_for(Channel::Interviewer),
        },
        "metrics": state.metrics.snapshot(),
        "recentWarnings": state.recent_logs.snapshot(),
    });
    (StatusCode::OK, Json(body))
}
