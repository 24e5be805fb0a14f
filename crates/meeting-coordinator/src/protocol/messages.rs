//! Signaling channel message types.
//!
//! Every frame is a JSON text frame of the form
//! `{"event": "<kebab-case-name>", "data": {...}}`. Events without a payload
//! may omit `data`. Payload fields are camelCase.

use crate::errors::CoordinatorError;
use crate::meeting::{
    ConnectionState, IceServer, Participant, Permissions, PermissionsUpdate, ScreenShare,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client-to-server actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Create a meeting and join it as host.
    #[serde(rename_all = "camelCase")]
    JoinAsHost {
        #[serde(default)]
        meeting_id: Option<String>,
        host_name: String,
    },
    #[serde(rename_all = "camelCase")]
    JoinMeeting {
        meeting_id: String,
        participant_name: String,
    },
    /// Leave the current meeting without closing the connection.
    LeaveMeeting,
    #[serde(rename_all = "camelCase")]
    ToggleMeetingLock { is_locked: bool },
    UpdateMeetingPermissions { permissions: PermissionsUpdate },
    ParticipantReady,
    #[serde(rename_all = "camelCase")]
    ConnectionStateChange {
        target_socket_id: String,
        state: ConnectionState,
    },
    Offer { target: String, offer: Value },
    Answer { target: String, answer: Value },
    IceCandidate { target: String, candidate: Value },
    #[serde(rename_all = "camelCase")]
    ConnectionFailed { target_socket_id: String },
    AudioLevel { level: f32 },
    SendReaction {
        emoji: String,
        #[serde(default)]
        timestamp: Option<Value>,
    },
    RaiseHand,
    LowerHand,
    #[serde(rename_all = "camelCase")]
    StartScreenShare { stream_id: String },
    StopScreenShare,
    #[serde(rename_all = "camelCase")]
    SpotlightParticipant { target_socket_id: String },
    RemoveSpotlight,
    #[serde(rename_all = "camelCase")]
    PinParticipant { target_socket_id: String },
    #[serde(rename_all = "camelCase")]
    MuteParticipant { target_socket_id: String },
    #[serde(rename_all = "camelCase")]
    MakeCohost { target_socket_id: String },
    #[serde(rename_all = "camelCase")]
    RemoveCohost { target_socket_id: String },
    #[serde(rename_all = "camelCase")]
    KickParticipant { target_socket_id: String },
    #[serde(rename_all = "camelCase")]
    ToggleMic { is_muted: bool },
    #[serde(rename_all = "camelCase")]
    ToggleCamera { is_camera_off: bool },
}

impl ClientEvent {
    /// Parse a text frame.
    ///
    /// An empty `data` object is treated like an absent one so payload-less
    /// events sent as `{"event":"raise-hand","data":{}}` are accepted.
    pub fn from_frame(text: &str) -> Result<Self, serde_json::Error> {
        let mut value: Value = serde_json::from_str(text)?;
        if let Some(obj) = value.as_object_mut() {
            let empty_data = match obj.get("data") {
                Some(Value::Object(data)) => data.is_empty(),
                Some(Value::Null) => true,
                _ => false,
            };
            if empty_data {
                obj.remove("data");
            }
        }
        serde_json::from_value(value)
    }

    /// Wire name of the event, used for logs and metrics labels.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinAsHost { .. } => "join-as-host",
            ClientEvent::JoinMeeting { .. } => "join-meeting",
            ClientEvent::LeaveMeeting => "leave-meeting",
            ClientEvent::ToggleMeetingLock { .. } => "toggle-meeting-lock",
            ClientEvent::UpdateMeetingPermissions { .. } => "update-meeting-permissions",
            ClientEvent::ParticipantReady => "participant-ready",
            ClientEvent::ConnectionStateChange { .. } => "connection-state-change",
            ClientEvent::Offer { .. } => "offer",
            ClientEvent::Answer { .. } => "answer",
            ClientEvent::IceCandidate { .. } => "ice-candidate",
            ClientEvent::ConnectionFailed { .. } => "connection-failed",
            ClientEvent::AudioLevel { .. } => "audio-level",
            ClientEvent::SendReaction { .. } => "send-reaction",
            ClientEvent::RaiseHand => "raise-hand",
            ClientEvent::LowerHand => "lower-hand",
            ClientEvent::StartScreenShare { .. } => "start-screen-share",
            ClientEvent::StopScreenShare => "stop-screen-share",
            ClientEvent::SpotlightParticipant { .. } => "spotlight-participant",
            ClientEvent::RemoveSpotlight => "remove-spotlight",
            ClientEvent::PinParticipant { .. } => "pin-participant",
            ClientEvent::MuteParticipant { .. } => "mute-participant",
            ClientEvent::MakeCohost { .. } => "make-cohost",
            ClientEvent::RemoveCohost { .. } => "remove-cohost",
            ClientEvent::KickParticipant { .. } => "kick-participant",
            ClientEvent::ToggleMic { .. } => "toggle-mic",
            ClientEvent::ToggleCamera { .. } => "toggle-camera",
        }
    }
}

/// Why the spotlight moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpotlightReason {
    Manual,
    AudioActivity,
}

/// Server-to-client notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// First frame on every connection.
    #[serde(rename_all = "camelCase")]
    Connected { socket_id: String },
    #[serde(rename_all = "camelCase")]
    JoinedMeeting {
        meeting_id: String,
        is_host: bool,
        participants: Vec<Participant>,
        spotlighted_participant: Option<String>,
        screen_shares: Vec<(String, ScreenShare)>,
        raised_hands: Vec<String>,
        ice_servers: Vec<IceServer>,
        is_locked: bool,
        permissions: Permissions,
    },
    ParticipantJoined {
        participant: Participant,
        participants: Vec<Participant>,
    },
    MeetingError { message: String },
    #[serde(rename_all = "camelCase")]
    MeetingLocked { message: String, meeting_id: String },
    ActionError { message: String },
    #[serde(rename_all = "camelCase")]
    MeetingLockChanged { is_locked: bool, changed_by: String },
    #[serde(rename_all = "camelCase")]
    MeetingPermissionsUpdated {
        permissions: Permissions,
        changed_by: String,
    },
    #[serde(rename_all = "camelCase")]
    InitiateConnection {
        target_socket_id: String,
        should_create_offer: bool,
        ice_servers: Vec<IceServer>,
    },
    #[serde(rename_all = "camelCase")]
    PeerConnectionState {
        from_socket_id: String,
        state: ConnectionState,
    },
    Offer { offer: Value, sender: String },
    Answer { answer: Value, sender: String },
    IceCandidate { candidate: Value, sender: String },
    #[serde(rename_all = "camelCase")]
    RestartConnection { target_socket_id: String },
    #[serde(rename_all = "camelCase")]
    ParticipantSpotlighted {
        spotlighted_participant: String,
        participants: Vec<Participant>,
        reason: SpotlightReason,
    },
    SpotlightRemoved { participants: Vec<Participant> },
    #[serde(rename_all = "camelCase")]
    ReactionReceived {
        emoji: String,
        participant_name: String,
        socket_id: String,
        timestamp: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    HandRaised {
        socket_id: String,
        participant_name: String,
        raised_hands: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    HandLowered {
        socket_id: String,
        participant_name: String,
        raised_hands: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    ScreenShareStarted {
        participant_id: String,
        stream_id: String,
        participant_name: String,
    },
    #[serde(rename_all = "camelCase")]
    ScreenShareStopped { participant_id: String },
    #[serde(rename_all = "camelCase")]
    ParticipantPinned { pinned_participant: String },
    #[serde(rename_all = "camelCase")]
    ForceMute { is_muted: bool },
    #[serde(rename_all = "camelCase")]
    ParticipantMuted {
        target_socket_id: String,
        is_muted: bool,
        participants: Vec<Participant>,
    },
    MadeCohost,
    #[serde(rename_all = "camelCase")]
    CohostAssigned {
        target_socket_id: String,
        participants: Vec<Participant>,
    },
    RemovedCohost,
    #[serde(rename_all = "camelCase")]
    CohostRemoved {
        target_socket_id: String,
        participants: Vec<Participant>,
    },
    KickedFromMeeting,
    #[serde(rename_all = "camelCase")]
    ParticipantKicked {
        target_socket_id: String,
        participants: Vec<Participant>,
    },
    #[serde(rename_all = "camelCase")]
    ParticipantAudioChanged {
        socket_id: String,
        is_muted: bool,
        participants: Vec<Participant>,
    },
    #[serde(rename_all = "camelCase")]
    ParticipantVideoChanged {
        socket_id: String,
        is_camera_off: bool,
        participants: Vec<Participant>,
    },
    MeetingEnded,
    #[serde(rename_all = "camelCase")]
    ParticipantLeft {
        socket_id: String,
        participant_name: String,
        participants: Vec<Participant>,
    },
}

impl ServerEvent {
    /// Map an error to the notification sent back to the requester.
    ///
    /// Returns `None` for stale references, which are dropped silently.
    #[must_use]
    pub fn from_error(err: &CoordinatorError) -> Option<Self> {
        match err {
            CoordinatorError::StaleReference(_) => None,
            CoordinatorError::Locked(meeting_id) => Some(ServerEvent::MeetingLocked {
                message: err.client_message(),
                meeting_id: meeting_id.clone(),
            }),
            CoordinatorError::MeetingNotFound(_) | CoordinatorError::Conflict(_) => {
                Some(ServerEvent::MeetingError {
                    message: err.client_message(),
                })
            }
            _ => Some(ServerEvent::ActionError {
                message: err.client_message(),
            }),
        }
    }

    /// Wire name of the event, used for logs and metrics labels.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::JoinedMeeting { .. } => "joined-meeting",
            ServerEvent::ParticipantJoined { .. } => "participant-joined",
            ServerEvent::MeetingError { .. } => "meeting-error",
            ServerEvent::MeetingLocked { .. } => "meeting-locked",
            ServerEvent::ActionError { .. } => "action-error",
            ServerEvent::MeetingLockChanged { .. } => "meeting-lock-changed",
            ServerEvent::MeetingPermissionsUpdated { .. } => "meeting-permissions-updated",
            ServerEvent::InitiateConnection { .. } => "initiate-connection",
            ServerEvent::PeerConnectionState { .. } => "peer-connection-state",
            ServerEvent::Offer { .. } => "offer",
            ServerEvent::Answer { .. } => "answer",
            ServerEvent::IceCandidate { .. } => "ice-candidate",
            ServerEvent::RestartConnection { .. } => "restart-connection",
            ServerEvent::ParticipantSpotlighted { .. } => "participant-spotlighted",
            ServerEvent::SpotlightRemoved { .. } => "spotlight-removed",
            ServerEvent::ReactionReceived { .. } => "reaction-received",
            ServerEvent::HandRaised { .. } => "hand-raised",
            ServerEvent::HandLowered { .. } => "hand-lowered",
            ServerEvent::ScreenShareStarted { .. } => "screen-share-started",
            ServerEvent::ScreenShareStopped { .. } => "screen-share-stopped",
            ServerEvent::ParticipantPinned { .. } => "participant-pinned",
            ServerEvent::ForceMute { .. } => "force-mute",
            ServerEvent::ParticipantMuted { .. } => "participant-muted",
            ServerEvent::MadeCohost => "made-cohost",
            ServerEvent::CohostAssigned { .. } => "cohost-assigned",
            ServerEvent::RemovedCohost => "removed-cohost",
            ServerEvent::CohostRemoved { .. } => "cohost-removed",
            ServerEvent::KickedFromMeeting => "kicked-from-meeting",
            ServerEvent::ParticipantKicked { .. } => "participant-kicked",
            ServerEvent::ParticipantAudioChanged { .. } => "participant-audio-changed",
            ServerEvent::ParticipantVideoChanged { .. } => "participant-video-changed",
            ServerEvent::MeetingEnded => "meeting-ended",
            ServerEvent::ParticipantLeft { .. } => "participant-left",
        }
    }
}

/// A server event addressed to a resolved set of connections.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub recipients: Vec<String>,
    pub event: ServerEvent,
}

impl Notification {
    #[must_use]
    pub fn to_one(connection_id: impl Into<String>, event: ServerEvent) -> Self {
        Self {
            recipients: vec![connection_id.into()],
            event,
        }
    }

    #[must_use]
    pub fn to_many(recipients: Vec<String>, event: ServerEvent) -> Self {
        Self { recipients, event }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_join_as_host_without_meeting_id() {
        let event =
            ClientEvent::from_frame(r#"{"event":"join-as-host","data":{"hostName":"Alice"}}"#)
                .unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinAsHost {
                meeting_id: None,
                host_name: "Alice".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_payloadless_events() {
        for frame in [
            r#"{"event":"raise-hand"}"#,
            r#"{"event":"raise-hand","data":null}"#,
            r#"{"event":"raise-hand","data":{}}"#,
        ] {
            assert_eq!(ClientEvent::from_frame(frame).unwrap(), ClientEvent::RaiseHand);
        }
    }

    #[test]
    fn test_parse_reaction_accepts_any_timestamp() {
        for timestamp in [json!(1_700_000_000_000_i64), json!(1.7e12), json!("2026-10-19T12:00:00Z")] {
            let frame = json!({
                "event": "send-reaction",
                "data": { "emoji": "👍", "timestamp": timestamp.clone() }
            });
            assert_eq!(
                ClientEvent::from_frame(&frame.to_string()).unwrap(),
                ClientEvent::SendReaction {
                    emoji: "👍".to_string(),
                    timestamp: Some(timestamp),
                }
            );
        }
    }

    #[test]
    fn test_parse_relay_keeps_payload_opaque() {
        let frame = json!({
            "event": "offer",
            "data": { "target": "conn-2", "offer": { "type": "offer", "sdp": "v=0\r\n" } }
        });
        let event = ClientEvent::from_frame(&frame.to_string()).unwrap();
        match event {
            ClientEvent::Offer { target, offer } => {
                assert_eq!(target, "conn-2");
                assert_eq!(offer["sdp"], "v=0\r\n");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_parse_partial_permissions() {
        let event = ClientEvent::from_frame(
            r#"{"event":"update-meeting-permissions","data":{"permissions":{"emojiReactions":false}}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::UpdateMeetingPermissions {
                permissions: PermissionsUpdate {
                    emoji_reactions: Some(false),
                    ..PermissionsUpdate::default()
                }
            }
        );
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        assert!(ClientEvent::from_frame(r#"{"event":"self-destruct"}"#).is_err());
        assert!(ClientEvent::from_frame("not json").is_err());
        assert!(ClientEvent::from_frame(r#"{"event":"join-meeting","data":{}}"#).is_err());
    }

    #[test]
    fn test_server_event_shape() {
        let json = serde_json::to_value(ServerEvent::InitiateConnection {
            target_socket_id: "conn-1".to_string(),
            should_create_offer: true,
            ice_servers: vec![],
        })
        .unwrap();
        assert_eq!(json["event"], "initiate-connection");
        assert_eq!(json["data"]["targetSocketId"], "conn-1");
        assert_eq!(json["data"]["shouldCreateOffer"], true);

        let json = serde_json::to_value(ServerEvent::MeetingEnded).unwrap();
        assert_eq!(json, json!({ "event": "meeting-ended" }));
    }

    #[test]
    fn test_spotlight_reason_wire_names() {
        assert_eq!(
            serde_json::to_value(SpotlightReason::AudioActivity).unwrap(),
            "audio-activity"
        );
        assert_eq!(serde_json::to_value(SpotlightReason::Manual).unwrap(), "manual");
    }

    #[test]
    fn test_event_names_match_wire_tags() {
        let event = ServerEvent::ParticipantAudioChanged {
            socket_id: "c".to_string(),
            is_muted: true,
            participants: vec![],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], event.name());

        let event = ClientEvent::ConnectionStateChange {
            target_socket_id: "c".to_string(),
            state: ConnectionState::Failed,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], event.name());
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            ServerEvent::from_error(&CoordinatorError::StaleReference("x".into())),
            None
        );
        assert!(matches!(
            ServerEvent::from_error(&CoordinatorError::Locked("ABCD1234".into())),
            Some(ServerEvent::MeetingLocked { meeting_id, .. }) if meeting_id == "ABCD1234"
        ));
        assert!(matches!(
            ServerEvent::from_error(&CoordinatorError::MeetingNotFound("x".into())),
            Some(ServerEvent::MeetingError { .. })
        ));
        assert_eq!(
            ServerEvent::from_error(&CoordinatorError::Forbidden("Only host".into())),
            Some(ServerEvent::ActionError {
                message: "Only host".to_string()
            })
        );
    }
}
