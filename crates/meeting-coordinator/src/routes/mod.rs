//! HTTP routes for the Meeting Coordinator.
//!
//! Defines the Axum router and application state.

use crate::actors::MeetingDirectory;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use crate::transport::{ws_handler, Heartbeat};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live meetings and memberships.
    pub directory: Arc<MeetingDirectory>,

    /// WebSocket liveness settings.
    pub heartbeat: Heartbeat,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/ws` - WebSocket signaling (public; callers identify by meeting id)
/// - `/api/create-meeting` - allocate a meeting id (authenticated)
/// - `/api/meeting/:meeting_id` - meeting summary (authenticated)
/// - `/api/ice-servers` - relay descriptors (authenticated)
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, auth_state: Arc<AuthState>) -> Router {
    let public_routes = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/create-meeting", post(handlers::create_meeting))
        .route("/api/meeting/:meeting_id", get(handlers::get_meeting))
        .route("/api/ice-servers", get(handlers::get_ice_servers))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
