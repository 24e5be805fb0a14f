//! Client transports.
//!
//! Signaling runs over WebSocket text frames (see [`crate::protocol::messages`]
//! for the frame format).

pub mod ws;

pub use ws::{handle_socket, ws_handler, Heartbeat};
