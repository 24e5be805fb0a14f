//! Middleware for the Meeting Coordinator HTTP surface.
//!
//! # Components
//!
//! - `auth` - bearer token check for the REST API
//! - `http_metrics` - request counters and latency for every response

pub mod auth;
pub mod http_metrics;

pub use auth::{require_auth, AuthState};
pub use http_metrics::http_metrics_middleware;
