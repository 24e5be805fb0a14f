//! Meeting Coordinator
//!
//! Signaling relay and authoritative meeting state for browser-based video
//! meetings.
//!
//! # Servers
//!
//! - HTTP server for the REST API and `/ws` signaling (default: 0.0.0.0:3000)
//! - HTTP server for health endpoints and `/metrics` (default: 0.0.0.0:8081)
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus metrics recorder
//! 3. Build the connection registry and meeting directory
//! 4. Start health HTTP server (liveness, readiness, metrics)
//! 5. Start the signaling server and mark ready
//! 6. Wait for shutdown signal, then end every live meeting

#![warn(clippy::pedantic)]
#![allow(clippy::too_many_lines)] // main.rs orchestrates startup, naturally longer

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use meeting_coordinator::actors::{ActorMetrics, ConnectionRegistry, MeetingDirectory};
use meeting_coordinator::config::Config;
use meeting_coordinator::meeting::build_ice_servers;
use meeting_coordinator::middleware::AuthState;
use meeting_coordinator::observability::{health_router, init_metrics_recorder, HealthState};
use meeting_coordinator::routes::{build_routes, AppState};
use meeting_coordinator::transport::Heartbeat;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Interval of the meeting supervision sweep.
const MEETING_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting Meeting Coordinator");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        health_bind_address = %config.health_bind_address,
        heartbeat_interval_seconds = config.heartbeat_interval.as_secs(),
        heartbeat_timeout_seconds = config.heartbeat_timeout.as_secs(),
        outbound_buffer = config.outbound_buffer,
        api_auth_enabled = config.api_token.is_some(),
        turn_configured = config.turn_server.is_some(),
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;
    info!("Prometheus metrics recorder initialized");

    let health_state = Arc::new(HealthState::new());
    let shutdown_token = CancellationToken::new();

    // Actor system
    let actor_metrics = ActorMetrics::new();
    let connections = Arc::new(ConnectionRegistry::new(
        config.outbound_buffer,
        shutdown_token.child_token(),
        Arc::clone(&actor_metrics),
    ));
    let directory = Arc::new(MeetingDirectory::new(
        connections,
        build_ice_servers(config.turn_server.as_ref()),
        config.auto_spotlight_threshold,
        Arc::clone(&actor_metrics),
        shutdown_token.child_token(),
    ));
    let health_check_handle = directory.spawn_health_check(MEETING_HEALTH_CHECK_INTERVAL);
    info!("Actor system initialized");

    // Health server (MUST succeed - fail startup if it doesn't)
    let health_addr: SocketAddr = config.health_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.health_bind_address, "Invalid health bind address");
        format!("Invalid health bind address: {e}")
    })?;

    let metrics_router = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );
    let health_app =
        health_router(Arc::clone(&health_state), Arc::clone(&actor_metrics)).merge(metrics_router);

    // Bind listener BEFORE spawning to fail fast on bind errors
    let health_listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %health_addr, "Failed to bind health server");
            format!("Failed to bind health server to {health_addr}: {e}")
        })?;

    let health_shutdown_token = shutdown_token.child_token();
    let health_server = tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(health_listener, health_app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    // Signaling server
    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.bind_address, "Invalid bind address");
        format!("Invalid bind address: {e}")
    })?;

    let app_state = Arc::new(AppState {
        directory: Arc::clone(&directory),
        heartbeat: Heartbeat {
            interval: config.heartbeat_interval,
            timeout: config.heartbeat_timeout,
        },
    });
    let auth_state = Arc::new(AuthState {
        api_token: config.api_token.clone(),
    });
    let app = build_routes(app_state, auth_state);

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(error = %e, addr = %addr, "Failed to bind signaling server");
        format!("Failed to bind signaling server to {addr}: {e}")
    })?;
    info!(addr = %addr, "Meeting Coordinator listening");

    health_state.set_ready();

    let server_shutdown_token = shutdown_token.clone();
    let server_health_state = Arc::clone(&health_state);
    let server_directory = Arc::clone(&directory);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, initiating graceful shutdown...");

        // Mark as not ready immediately so k8s stops sending traffic
        server_health_state.set_not_ready();

        // Meetings end before connections close so members still receive
        // meeting-ended from their writer's final flush.
        server_directory.shutdown().await;
        server_shutdown_token.cancel();
    });

    let serve_result = server.await;

    shutdown_token.cancel();
    health_check_handle.abort();
    let _ = health_server.await;

    if let Err(e) = serve_result {
        error!(error = %e, "Signaling server failed");
        return Err(e.into());
    }

    info!("Meeting Coordinator shutdown complete");
    Ok(())
}

/// Console output by default; `COORD_LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "meeting_coordinator=debug,tower_http=debug".into());
    let json = std::env::var("COORD_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
