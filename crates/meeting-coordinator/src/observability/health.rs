//! Health endpoints for the Meeting Coordinator.
//!
//! - `GET /health` - liveness (process is running)
//! - `GET /ready` - readiness, with a small JSON load summary
//!
//! `/metrics` is merged onto the same router in `main` from the Prometheus
//! exporter handle.

use crate::actors::ActorMetrics;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Liveness and readiness flags.
///
/// `ready` is set once the signaling listener is bound and cleared when
/// shutdown begins so load balancers stop routing new connections.
#[derive(Debug)]
pub struct HealthState {
    live: AtomicBool,
    ready: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (live=true, ready=false).
    #[must_use]
    pub fn new() -> Self {
        Self {
            live: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        }
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct HealthContext {
    health: Arc<HealthState>,
    metrics: Arc<ActorMetrics>,
}

/// Readiness body.
#[derive(Debug, Serialize)]
struct ReadinessResponse {
    status: &'static str,
    meetings: usize,
    connections: usize,
    participants: usize,
}

/// Create the health router.
pub fn health_router(health_state: Arc<HealthState>, metrics: Arc<ActorMetrics>) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .with_state(HealthContext {
            health: health_state,
            metrics,
        })
}

async fn liveness_handler(State(ctx): State<HealthContext>) -> StatusCode {
    if ctx.health.is_live() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn readiness_handler(
    State(ctx): State<HealthContext>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let ready = ctx.health.is_ready();
    let snapshot = ctx.metrics.snapshot();
    let body = ReadinessResponse {
        status: if ready { "ready" } else { "not_ready" },
        meetings: snapshot.meetings,
        connections: snapshot.connections,
        participants: snapshot.participants,
    };
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}
