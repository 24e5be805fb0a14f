//! Meeting-scoped event handling.
//!
//! Pure functions over `&mut Meeting`: authorize, mutate, and return the
//! notifications to deliver plus any membership side effects. No I/O happens
//! here; the owning meeting actor applies the [`Outcome`].

use super::messages::{ClientEvent, Notification, ServerEvent, SpotlightReason};
use crate::errors::CoordinatorError;
use crate::meeting::{Meeting, Participant};

/// Result of handling one event against a meeting.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Outcome {
    pub notifications: Vec<Notification>,
    /// Connections whose membership in this meeting ended.
    pub departed: Vec<String>,
    /// Connections whose transport must be closed after delivery.
    pub evicted: Vec<String>,
    /// The meeting is over and its actor should stop.
    pub meeting_ended: bool,
}

impl Outcome {
    fn notify(mut self, notification: Notification) -> Self {
        self.notifications.push(notification);
        self
    }

    fn with_notifications(notifications: Vec<Notification>) -> Self {
        Self {
            notifications,
            ..Self::default()
        }
    }
}

/// Build the `joined-meeting` event for a member.
#[must_use]
pub fn joined_meeting(meeting: &Meeting, connection_id: &str) -> ServerEvent {
    ServerEvent::JoinedMeeting {
        meeting_id: meeting.id().to_string(),
        is_host: connection_id == meeting.host_connection_id(),
        participants: meeting.participants(),
        spotlighted_participant: meeting.spotlighted().map(str::to_string),
        screen_shares: meeting.screen_shares(),
        raised_hands: meeting.raised_hands(),
        ice_servers: meeting.ice_servers().to_vec(),
        is_locked: meeting.is_locked(),
        permissions: meeting.permissions(),
    }
}

/// Greeting for the host of a freshly created meeting.
#[must_use]
pub fn host_joined(meeting: &Meeting) -> Outcome {
    let host = meeting.host_connection_id();
    Outcome::default().notify(Notification::to_one(host, joined_meeting(meeting, host)))
}

/// Admit a connection.
///
/// # Errors
///
/// `Locked` when the meeting is locked and the connection is not already a member.
pub fn join(
    meeting: &mut Meeting,
    connection_id: &str,
    name: &str,
) -> Result<(Participant, Outcome), CoordinatorError> {
    if !meeting.is_participant_allowed(connection_id) {
        return Err(CoordinatorError::Locked(meeting.id().to_string()));
    }

    let rejoining = meeting.contains(connection_id);
    let participant = meeting.add_participant(connection_id, name);

    let mut outcome = Outcome::default().notify(Notification::to_one(
        connection_id,
        joined_meeting(meeting, connection_id),
    ));

    if !rejoining {
        outcome = outcome.notify(Notification::to_many(
            meeting.connection_ids_except(connection_id),
            ServerEvent::ParticipantJoined {
                participant: participant.clone(),
                participants: meeting.participants(),
            },
        ));
    }

    Ok((participant, outcome))
}

/// Remove a departing connection. Host departure ends the meeting.
///
/// Unknown connections produce an empty outcome.
#[must_use]
pub fn leave(meeting: &mut Meeting, connection_id: &str) -> Outcome {
    let Some(participant) = meeting.remove_participant(connection_id) else {
        return Outcome::default();
    };

    if participant.is_host {
        let remaining = meeting.connection_ids();
        for id in &remaining {
            meeting.remove_participant(id);
        }
        let mut departed = remaining.clone();
        departed.push(connection_id.to_string());

        return Outcome {
            notifications: vec![Notification::to_many(remaining, ServerEvent::MeetingEnded)],
            departed,
            evicted: Vec::new(),
            meeting_ended: true,
        };
    }

    Outcome {
        notifications: vec![Notification::to_many(
            meeting.connection_ids(),
            ServerEvent::ParticipantLeft {
                socket_id: connection_id.to_string(),
                participant_name: participant.name,
                participants: meeting.participants(),
            },
        )],
        departed: vec![connection_id.to_string()],
        evicted: Vec::new(),
        meeting_ended: false,
    }
}

/// Remove a participant at the host's request.
///
/// # Errors
///
/// - `StaleReference` if the requester is no longer a member
/// - `Forbidden` unless the requester is host and the target is a
///   different, non-co-host participant
/// - `ParticipantNotFound` if the target is not a member
pub fn kick(
    meeting: &mut Meeting,
    requester: &str,
    target: &str,
) -> Result<Outcome, CoordinatorError> {
    let requester_is_host = meeting
        .participant(requester)
        .ok_or_else(|| CoordinatorError::StaleReference(requester.to_string()))?
        .is_host;

    let target_is_co_host = meeting
        .participant(target)
        .ok_or_else(|| CoordinatorError::ParticipantNotFound(target.to_string()))?
        .is_co_host;

    if !requester_is_host || target_is_co_host || requester == target {
        return Err(forbidden("Cannot kick this participant"));
    }

    meeting.remove_participant(target);

    Ok(Outcome {
        notifications: vec![
            Notification::to_one(target, ServerEvent::KickedFromMeeting),
            Notification::to_many(
                meeting.connection_ids(),
                ServerEvent::ParticipantKicked {
                    target_socket_id: target.to_string(),
                    participants: meeting.participants(),
                },
            ),
        ],
        departed: vec![target.to_string()],
        evicted: vec![target.to_string()],
        meeting_ended: false,
    })
}

/// Handle a meeting-scoped action from a member.
///
/// Session-level events (join, leave, relay) are routed elsewhere and
/// produce an empty outcome here.
///
/// # Errors
///
/// `StaleReference` if `from` is no longer a member; otherwise the
/// authorization or lookup failure for the specific action.
pub fn dispatch(
    meeting: &mut Meeting,
    from: &str,
    event: ClientEvent,
) -> Result<Outcome, CoordinatorError> {
    let requester_name = meeting
        .participant(from)
        .map(|p| p.name.clone())
        .ok_or_else(|| CoordinatorError::StaleReference(from.to_string()))?;

    let outcome = match event {
        ClientEvent::ToggleMeetingLock { is_locked } => {
            require_host_action(meeting, from, "Only host can lock/unlock the meeting")?;
            meeting.set_locked(is_locked);
            broadcast(
                meeting,
                ServerEvent::MeetingLockChanged {
                    is_locked: meeting.is_locked(),
                    changed_by: requester_name,
                },
            )
        }

        ClientEvent::UpdateMeetingPermissions { permissions } => {
            require_host_action(meeting, from, "Only host can update meeting permissions")?;
            let permissions = meeting.update_permissions(permissions);
            broadcast(
                meeting,
                ServerEvent::MeetingPermissionsUpdated {
                    permissions,
                    changed_by: requester_name,
                },
            )
        }

        ClientEvent::ParticipantReady => participant_ready(meeting, from),

        ClientEvent::ConnectionStateChange {
            target_socket_id,
            state,
        } => {
            meeting.update_connection_state(from, state);
            if meeting.contains(&target_socket_id) {
                Outcome::default().notify(Notification::to_one(
                    target_socket_id,
                    ServerEvent::PeerConnectionState {
                        from_socket_id: from.to_string(),
                        state,
                    },
                ))
            } else {
                Outcome::default()
            }
        }

        ClientEvent::ConnectionFailed { target_socket_id } => {
            if !meeting.contains(&target_socket_id) {
                return Err(CoordinatorError::ParticipantNotFound(target_socket_id));
            }
            Outcome::with_notifications(vec![
                Notification::to_one(
                    from,
                    ServerEvent::RestartConnection {
                        target_socket_id: target_socket_id.clone(),
                    },
                ),
                Notification::to_one(
                    target_socket_id,
                    ServerEvent::RestartConnection {
                        target_socket_id: from.to_string(),
                    },
                ),
            ])
        }

        ClientEvent::AudioLevel { level } => {
            if meeting.handle_audio_activity(from, level) {
                broadcast(
                    meeting,
                    ServerEvent::ParticipantSpotlighted {
                        spotlighted_participant: from.to_string(),
                        participants: meeting.participants(),
                        reason: SpotlightReason::AudioActivity,
                    },
                )
            } else {
                Outcome::default()
            }
        }

        ClientEvent::SendReaction { emoji, timestamp } => {
            if !meeting.permissions().emoji_reactions {
                return Err(forbidden("Emoji reactions are disabled by the host"));
            }
            broadcast(
                meeting,
                ServerEvent::ReactionReceived {
                    emoji,
                    participant_name: requester_name,
                    socket_id: from.to_string(),
                    timestamp,
                },
            )
        }

        ClientEvent::RaiseHand => {
            if !meeting.permissions().emoji_reactions {
                return Err(forbidden("Hand raising is disabled by the host"));
            }
            meeting.raise_hand(from);
            broadcast(
                meeting,
                ServerEvent::HandRaised {
                    socket_id: from.to_string(),
                    participant_name: requester_name,
                    raised_hands: meeting.raised_hands(),
                },
            )
        }

        ClientEvent::LowerHand => {
            meeting.lower_hand(from);
            broadcast(
                meeting,
                ServerEvent::HandLowered {
                    socket_id: from.to_string(),
                    participant_name: requester_name,
                    raised_hands: meeting.raised_hands(),
                },
            )
        }

        ClientEvent::StartScreenShare { stream_id } => {
            meeting.add_screen_share(from, &stream_id);
            to_others(
                meeting,
                from,
                ServerEvent::ScreenShareStarted {
                    participant_id: from.to_string(),
                    stream_id,
                    participant_name: requester_name,
                },
            )
        }

        ClientEvent::StopScreenShare => {
            if meeting.remove_screen_share(from) {
                to_others(
                    meeting,
                    from,
                    ServerEvent::ScreenShareStopped {
                        participant_id: from.to_string(),
                    },
                )
            } else {
                Outcome::default()
            }
        }

        ClientEvent::SpotlightParticipant { target_socket_id } => {
            require_host_action(meeting, from, "Insufficient permissions")?;
            if !meeting.spotlight_participant(&target_socket_id) {
                return Err(CoordinatorError::ParticipantNotFound(target_socket_id));
            }
            broadcast(
                meeting,
                ServerEvent::ParticipantSpotlighted {
                    spotlighted_participant: target_socket_id,
                    participants: meeting.participants(),
                    reason: SpotlightReason::Manual,
                },
            )
        }

        ClientEvent::RemoveSpotlight => {
            require_host_action(meeting, from, "Insufficient permissions")?;
            meeting.remove_spotlight();
            broadcast(
                meeting,
                ServerEvent::SpotlightRemoved {
                    participants: meeting.participants(),
                },
            )
        }

        // Pinning is a client-side view choice; the server only echoes it.
        ClientEvent::PinParticipant { target_socket_id } => Outcome::default().notify(
            Notification::to_one(
                from,
                ServerEvent::ParticipantPinned {
                    pinned_participant: target_socket_id,
                },
            ),
        ),

        ClientEvent::MuteParticipant { target_socket_id } => {
            require_host_action(meeting, from, "Insufficient permissions")?;
            let is_muted = meeting
                .toggle_mute(&target_socket_id)
                .ok_or_else(|| CoordinatorError::ParticipantNotFound(target_socket_id.clone()))?;
            Outcome::with_notifications(vec![
                Notification::to_one(target_socket_id.clone(), ServerEvent::ForceMute { is_muted }),
                Notification::to_many(
                    meeting.connection_ids(),
                    ServerEvent::ParticipantMuted {
                        target_socket_id,
                        is_muted,
                        participants: meeting.participants(),
                    },
                ),
            ])
        }

        ClientEvent::MakeCohost { target_socket_id } => {
            if !meeting.can_make_co_host(from) {
                return Err(forbidden("Only host can make co-hosts"));
            }
            if !meeting.contains(&target_socket_id) {
                return Err(CoordinatorError::ParticipantNotFound(target_socket_id));
            }
            if !meeting.make_co_host(&target_socket_id) {
                return Err(CoordinatorError::BadRequest(
                    "The host cannot be made a co-host".to_string(),
                ));
            }
            Outcome::with_notifications(vec![
                Notification::to_one(target_socket_id.clone(), ServerEvent::MadeCohost),
                Notification::to_many(
                    meeting.connection_ids(),
                    ServerEvent::CohostAssigned {
                        target_socket_id,
                        participants: meeting.participants(),
                    },
                ),
            ])
        }

        ClientEvent::RemoveCohost { target_socket_id } => {
            if !meeting.can_make_co_host(from) {
                return Err(forbidden("Only host can remove co-hosts"));
            }
            if !meeting.contains(&target_socket_id) {
                return Err(CoordinatorError::ParticipantNotFound(target_socket_id));
            }
            if !meeting.remove_co_host(&target_socket_id) {
                return Err(CoordinatorError::BadRequest(
                    "Participant is not a co-host".to_string(),
                ));
            }
            Outcome::with_notifications(vec![
                Notification::to_one(target_socket_id.clone(), ServerEvent::RemovedCohost),
                Notification::to_many(
                    meeting.connection_ids(),
                    ServerEvent::CohostRemoved {
                        target_socket_id,
                        participants: meeting.participants(),
                    },
                ),
            ])
        }

        ClientEvent::KickParticipant { target_socket_id } => {
            kick(meeting, from, &target_socket_id)?
        }

        ClientEvent::ToggleMic { is_muted } => {
            meeting.set_muted(from, is_muted);
            to_others(
                meeting,
                from,
                ServerEvent::ParticipantAudioChanged {
                    socket_id: from.to_string(),
                    is_muted,
                    participants: meeting.participants(),
                },
            )
        }

        ClientEvent::ToggleCamera { is_camera_off } => {
            meeting.set_camera_off(from, is_camera_off);
            to_others(
                meeting,
                from,
                ServerEvent::ParticipantVideoChanged {
                    socket_id: from.to_string(),
                    is_camera_off,
                    participants: meeting.participants(),
                },
            )
        }

        // Routed by the session layer through the directory.
        ClientEvent::JoinAsHost { .. }
        | ClientEvent::JoinMeeting { .. }
        | ClientEvent::LeaveMeeting
        | ClientEvent::Offer { .. }
        | ClientEvent::Answer { .. }
        | ClientEvent::IceCandidate { .. } => Outcome::default(),
    };

    Ok(outcome)
}

/// Pair a newly ready participant with every other ready participant.
///
/// Previously ready peers create the offer; the newcomer waits for it. A
/// participant that was already ready produces no pairs.
fn participant_ready(meeting: &mut Meeting, from: &str) -> Outcome {
    if !meeting.set_ready(from) {
        return Outcome::default();
    }

    let ice_servers = meeting.ice_servers().to_vec();
    let mut notifications = Vec::new();

    for peer in meeting.ready_participants() {
        if peer.connection_id == from {
            continue;
        }
        notifications.push(Notification::to_one(
            peer.connection_id.clone(),
            ServerEvent::InitiateConnection {
                target_socket_id: from.to_string(),
                should_create_offer: true,
                ice_servers: ice_servers.clone(),
            },
        ));
        notifications.push(Notification::to_one(
            from,
            ServerEvent::InitiateConnection {
                target_socket_id: peer.connection_id,
                should_create_offer: false,
                ice_servers: ice_servers.clone(),
            },
        ));
    }

    Outcome::with_notifications(notifications)
}

fn require_host_action(
    meeting: &Meeting,
    connection_id: &str,
    message: &str,
) -> Result<(), CoordinatorError> {
    if meeting.can_perform_host_action(connection_id) {
        Ok(())
    } else {
        Err(forbidden(message))
    }
}

fn forbidden(message: &str) -> CoordinatorError {
    CoordinatorError::Forbidden(message.to_string())
}

fn broadcast(meeting: &Meeting, event: ServerEvent) -> Outcome {
    Outcome::default().notify(Notification::to_many(meeting.connection_ids(), event))
}

fn to_others(meeting: &Meeting, from: &str, event: ServerEvent) -> Outcome {
    Outcome::default().notify(Notification::to_many(
        meeting.connection_ids_except(from),
        event,
    ))
}
