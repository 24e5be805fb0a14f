//! Participant record held by a meeting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Peer-connection state reported by a client.
///
/// Mirrors `RTCPeerConnection.connectionState` plus the coordinator's own
/// `ready` marker. Stored last-write-wins across all of a participant's peer links.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    New,
    Ready,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    /// Returns the wire name of the state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::New => "new",
            ConnectionState::Ready => "ready",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Failed => "failed",
            ConnectionState::Closed => "closed",
        }
    }
}

/// A participant in a meeting, keyed by its connection identifier.
///
/// `is_host` is fixed at creation. `is_co_host` is granted and revoked by the
/// host only and is always false for the host itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Connection identifier (primary key).
    #[serde(rename = "socketId")]
    pub connection_id: String,
    /// Display name, set at join time.
    pub name: String,
    pub is_host: bool,
    pub is_co_host: bool,
    pub is_muted: bool,
    pub is_camera_off: bool,
    pub is_spotlighted: bool,
    pub is_screen_sharing: bool,
    /// Last reported audio level in [0, 1].
    pub audio_level: f32,
    pub joined_at: DateTime<Utc>,
    /// Set once the client is ready for peer-connection setup.
    pub is_ready: bool,
    pub hand_raised: bool,
    pub connection_state: ConnectionState,
}

impl Participant {
    /// Create a participant with default flags.
    #[must_use]
    pub fn new(connection_id: impl Into<String>, name: impl Into<String>, is_host: bool) -> Self {
        Self {
            connection_id: connection_id.into(),
            name: name.into(),
            is_host,
            is_co_host: false,
            is_muted: false,
            is_camera_off: false,
            is_spotlighted: false,
            is_screen_sharing: false,
            audio_level: 0.0,
            joined_at: Utc::now(),
            is_ready: false,
            hand_raised: false,
            connection_state: ConnectionState::New,
        }
    }

    /// Whether this participant may perform host-level actions.
    #[must_use]
    pub fn has_elevated_privilege(&self) -> bool {
        self.is_host || self.is_co_host
    }
}
