//! Meeting domain model.
//!
//! - [`participant`]: per-connection participant record
//! - [`state`]: authoritative meeting state and its invariants
//! - [`ice`]: ICE relay descriptors handed to clients

pub mod ice;
pub mod participant;
pub mod state;

pub use ice::{build_ice_servers, IceServer};
pub use participant::{ConnectionState, Participant};
pub use state::{generate_meeting_id, Meeting, Permissions, PermissionsUpdate, ScreenShare};
