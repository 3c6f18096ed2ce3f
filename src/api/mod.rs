//! Local control API for a running session.
//!
//! Provides HTTP endpoints for:
//! - Session status
//! - Stop, pause and resume requests
//! - Participant updates from an external observer

pub mod error;
pub mod routes;

use anyhow::{Context, Result};
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;

use crate::state_machine::MeetingStateMachine;

pub struct ApiServer {
    port: u16,
    machine: Arc<MeetingStateMachine>,
}

impl ApiServer {
    pub fn new(machine: Arc<MeetingStateMachine>, port: u16) -> Self {
        Self { port, machine }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(service_info))
            .merge(routes::session::router(self.machine.clone()))
            .layer(ServiceBuilder::new())
    }

    pub async fn start(self) -> Result<()> {
        let app = self.router();
        let addr = format!("127.0.0.1:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind API server to {}", addr))?;

        info!("API server listening on http://{}", addr);
        info!("Endpoints:");
        info!("  GET  /              - Service info");
        info!("  GET  /status        - Session status");
        info!("  POST /stop          - End the session");
        info!("  POST /pause         - Pause recording");
        info!("  POST /resume        - Resume recording");
        info!("  POST /participants  - Push participant state");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "service": "meetbot",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}
