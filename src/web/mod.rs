// src/web/mod.rs - operator HTTP API

pub mod handlers;

use crate::engine::AlarmEngine;
use crate::error::Result;
use axum::{
    routing::{get, post},
    serve, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AlarmEngine>,
    pub started: Instant,
}

impl AppState {
    pub fn new(engine: Arc<AlarmEngine>) -> Self {
        Self { engine, started: Instant::now() }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/alarms/active", get(handlers::list_active))
        .route(
            "/api/v1/alarms/definitions",
            get(handlers::list_definitions).post(handlers::create_definition),
        )
        .route("/api/v1/alarms/:id", get(handlers::get_alarm))
        .route("/api/v1/alarms/:id/ack", post(handlers::acknowledge))
        .route("/api/v1/alarms/:id/shelve", post(handlers::shelve))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(bind: &str, engine: Arc<AlarmEngine>) -> Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .map_err(|_| crate::error::AlarmError::Config(format!("invalid bind address '{}'", bind)))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Operator API listening on http://{}", addr);
    serve(listener, router(AppState::new(engine)).into_make_service()).await?;
    Ok(())
}
