//! Signaling protocol.
//!
//! - [`messages`] - closed inbound/outbound event types and their wire form
//! - [`handler`] - meeting-scoped event handling as pure functions
//! - [`session`] - per-connection routing of inbound events

pub mod handler;
pub mod messages;
pub mod session;

pub use handler::Outcome;
pub use messages::{ClientEvent, Notification, ServerEvent, SpotlightReason};
