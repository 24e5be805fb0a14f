//! Observability for the Meeting Coordinator.
//!
//! # Privacy
//!
//! Instrumented functions use `#[instrument(skip_all)]` with an explicit
//! field allow-list. Display names, SDP and ICE payloads are never logged.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `coord_meetings_active` | Gauge | none | Live meetings |
//! | `coord_connections_active` | Gauge | none | Open signaling connections |
//! | `coord_participants_active` | Gauge | none | Participants across meetings |
//! | `coord_events_total` | Counter | `event` | Handled signaling events |
//! | `coord_event_latency_seconds` | Histogram | `event` | Event processing time |
//! | `coord_action_errors_total` | Counter | `kind` | Rejected actions |
//! | `coord_messages_dropped_total` | Counter | `actor_type` | Best-effort delivery drops |
//! | `coord_actor_mailbox_depth` | Gauge | `actor_type` | Backpressure indicator |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::init_metrics_recorder;
