//! Message types for the meeting actor.
//!
//! Request-reply messages carry a `tokio::sync::oneshot` sender. Dispatch
//! may be fire-and-forget, in which case the actor reports failures to the
//! requesting connection itself.

use crate::errors::CoordinatorError;
use crate::meeting::{Participant, Permissions, ScreenShare};
use crate::protocol::ClientEvent;
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

/// Messages handled by a `MeetingActor`.
#[derive(Debug)]
pub enum MeetingMessage {
    /// A meeting-scoped action from a member.
    ///
    /// With `respond_to: None` an error is turned into a notification to
    /// `connection_id`; with `Some` it is returned to the caller instead.
    Dispatch {
        connection_id: String,
        event: ClientEvent,
        respond_to: Option<oneshot::Sender<Result<(), CoordinatorError>>>,
    },

    /// Admit a connection to the meeting.
    Join {
        connection_id: String,
        name: String,
        respond_to: oneshot::Sender<Result<Participant, CoordinatorError>>,
    },

    /// Remove a connection (explicit leave or disconnect).
    Leave {
        connection_id: String,
        respond_to: oneshot::Sender<LeaveResult>,
    },

    /// Snapshot the meeting.
    GetState {
        respond_to: oneshot::Sender<MeetingState>,
    },
}

/// What a leave did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveResult {
    /// The connection was not a member.
    NotMember,
    /// The participant left; the meeting continues.
    Left,
    /// The host left and the meeting is over.
    MeetingEnded,
}

/// Point-in-time copy of a meeting.
#[derive(Debug, Clone)]
pub struct MeetingState {
    pub meeting_id: String,
    pub host_connection_id: String,
    pub host_name: String,
    pub created_at: DateTime<Utc>,
    /// Participants in join order.
    pub participants: Vec<Participant>,
    pub co_hosts: Vec<String>,
    pub spotlighted: Option<String>,
    pub manual_spotlight: bool,
    pub screen_shares: Vec<(String, ScreenShare)>,
    pub raised_hands: Vec<String>,
    pub is_locked: bool,
    pub permissions: Permissions,
    pub mailbox_depth: usize,
}

impl MeetingState {
    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    #[must_use]
    pub fn participant(&self, connection_id: &str) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.connection_id == connection_id)
    }
}
