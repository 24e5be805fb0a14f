//! HTTP request handlers for the Meeting Coordinator.

pub mod meetings;

pub use meetings::{create_meeting, get_ice_servers, get_meeting};
