//! Meeting Coordinator Service Library
//!
//! Signaling relay and authoritative in-memory state for browser-based
//! video meetings:
//!
//! - Meeting lifecycle (host creates, participants join and leave)
//! - Opaque relay of SDP offers/answers and ICE candidates between peers
//! - Host controls (lock, permissions, kick, co-hosts, spotlight)
//! - Meeting-wide broadcasts (chat, reactions, raised hands, media state)
//!
//! # Architecture
//!
//! ```text
//! MeetingDirectory (singleton)
//! ├── supervises N MeetingActors (one per live meeting, owns its state)
//! └── ConnectionRegistry
//!     └── one outbound queue per WebSocket, drained by its writer task
//! ```
//!
//! # Modules
//!
//! - [`meeting`] - Meeting state and the rules for mutating it
//! - [`protocol`] - Wire format and event handlers
//! - [`actors`] - Per-meeting actors, connections and supervision
//! - [`transport`] - WebSocket sessions with heartbeat
//! - [`handlers`] / [`routes`] - REST API
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with appropriate error codes

pub mod actors;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod meeting;
pub mod middleware;
pub mod observability;
pub mod protocol;
pub mod routes;
pub mod transport;
