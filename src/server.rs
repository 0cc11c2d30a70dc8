//! HTTP boundary in front of the pipeline. Credentials stay in this process;
//! callers only ever see pipeline state.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::Engine;
use crate::pipeline::{PipelineState, Session, SessionSnapshot};

#[derive(Clone)]
pub struct AppState {
    engine: Arc<Engine>,
    session: Arc<Session>,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
            session: Arc::new(Session::new()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    query: String,
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    generation: u64,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/ask", post(ask))
        .route("/api/submit", post(submit))
        .route("/api/state", get(current_state))
        .with_state(state)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "server listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn healthz() -> &'static str {
    "ok"
}

async fn ask(State(state): State<AppState>, Json(req): Json<QueryRequest>) -> Json<PipelineState> {
    info!(query = %req.query, "http:ask");
    Json(state.engine.answer(&req.query).await)
}

async fn submit(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> (StatusCode, Json<SubmitResponse>) {
    info!(query = %req.query, "http:submit");
    let ticket = state
        .session
        .submit(Arc::clone(&state.engine), req.query);
    (
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            generation: ticket.generation(),
        }),
    )
}

async fn current_state(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot())
}
