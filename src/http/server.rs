//! HTTP server setup.
//!
//! # Responsibilities
//! - Create Axum Router with probe handlers
//! - Wire up middleware (tracing)
//! - Serve until the shutdown signal fires

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::app::AppContext;
use crate::availability::{AvailabilityGate, ServiceName, ServiceUnavailable};
use crate::lifecycle::ShutdownSignal;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: AvailabilityGate,
    pub readiness: Arc<[ServiceName]>,
}

impl AppState {
    pub fn from_context(ctx: &AppContext) -> Self {
        Self {
            gate: ctx.gate(),
            readiness: ctx.readiness_services().into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProbeStatus {
    pub status: &'static str,
}

/// Build the public router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(live))
        .route("/health/ready", get(ready))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn live() -> Json<ProbeStatus> {
    Json(ProbeStatus { status: "alive" })
}

async fn ready(State(state): State<AppState>) -> Result<Json<ProbeStatus>, ServiceUnavailable> {
    state.gate.check(&state.readiness)?;
    Ok(Json(ProbeStatus { status: "ready" }))
}

/// HTTP server for a prepared router.
pub struct HttpServer {
    name: &'static str,
    router: Router,
}

impl HttpServer {
    pub fn new(name: &'static str, router: Router) -> Self {
        Self { name, router }
    }

    /// Run the server, accepting connections until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(server = self.name, address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await?;

        tracing::info!(server = self.name, "HTTP server stopped");
        Ok(())
    }
}
