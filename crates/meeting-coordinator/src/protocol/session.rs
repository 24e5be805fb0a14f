//! Per-connection routing of inbound events.
//!
//! Session-level events (join, leave, kick, signaling relay) go through the
//! [`MeetingDirectory`]; everything else is forwarded to the actor of the
//! sender's meeting. Events from a connection with no meeting are dropped.

use super::messages::{ClientEvent, ServerEvent};
use crate::actors::MeetingDirectory;
use crate::errors::CoordinatorError;
use crate::observability::metrics as prom;
use std::time::Instant;
use tracing::{debug, instrument};

/// Handle one event from `connection_id`.
#[instrument(skip_all, fields(connection_id = %connection_id, event = event.name()))]
pub async fn route(directory: &MeetingDirectory, connection_id: &str, event: ClientEvent) {
    let name = event.name();
    let start = Instant::now();

    let result = match event {
        ClientEvent::JoinAsHost {
            meeting_id,
            host_name,
        } => directory
            .create_meeting(connection_id, &host_name, meeting_id.as_deref())
            .map(|_| ()),

        ClientEvent::JoinMeeting {
            meeting_id,
            participant_name,
        } => directory
            .join(connection_id, &meeting_id, &participant_name)
            .await
            .map(|_| ()),

        ClientEvent::LeaveMeeting => {
            directory.leave(connection_id).await;
            Ok(())
        }

        ClientEvent::KickParticipant { target_socket_id } => {
            directory.kick(connection_id, &target_socket_id).await
        }

        ClientEvent::Offer { target, offer } => relay(
            directory,
            connection_id,
            &target,
            ServerEvent::Offer {
                offer,
                sender: connection_id.to_string(),
            },
        ),
        ClientEvent::Answer { target, answer } => relay(
            directory,
            connection_id,
            &target,
            ServerEvent::Answer {
                answer,
                sender: connection_id.to_string(),
            },
        ),
        ClientEvent::IceCandidate { target, candidate } => relay(
            directory,
            connection_id,
            &target,
            ServerEvent::IceCandidate {
                candidate,
                sender: connection_id.to_string(),
            },
        ),

        event => match directory.meeting_for(connection_id) {
            // The actor reports its own errors and metrics.
            Some(meeting) => {
                if let Err(e) = meeting.dispatch(connection_id.to_string(), event).await {
                    debug!(
                        target: "coord.session",
                        connection_id = %connection_id,
                        error = %e,
                        "Meeting stopped before the action was queued"
                    );
                }
                return;
            }
            None => Err(CoordinatorError::StaleReference(connection_id.to_string())),
        },
    };

    prom::record_event(name, start.elapsed());
    if let Err(e) = result {
        report_error(directory, connection_id, name, &e);
    }
}

/// Reply to an unparseable frame.
pub fn reject_frame(directory: &MeetingDirectory, connection_id: &str) {
    report_error(
        directory,
        connection_id,
        "invalid-frame",
        &CoordinatorError::BadRequest("Invalid message".to_string()),
    );
}

/// Forward a signaling payload to `target` unchanged.
///
/// The sender must be in a meeting; the target is not checked against it.
fn relay(
    directory: &MeetingDirectory,
    connection_id: &str,
    target: &str,
    event: ServerEvent,
) -> Result<(), CoordinatorError> {
    if directory.membership(connection_id).is_none() {
        return Err(CoordinatorError::StaleReference(connection_id.to_string()));
    }
    if !directory.connections().send(target, &event) {
        debug!(
            target: "coord.session",
            connection_id = %connection_id,
            event = event.name(),
            "Relay target unavailable"
        );
    }
    Ok(())
}

fn report_error(
    directory: &MeetingDirectory,
    connection_id: &str,
    event: &'static str,
    err: &CoordinatorError,
) {
    if let CoordinatorError::StaleReference(_) = err {
        debug!(
            target: "coord.session",
            connection_id = %connection_id,
            event,
            "Dropping action from connection without a meeting"
        );
        return;
    }

    prom::record_action_error(err.kind());
    debug!(
        target: "coord.session",
        connection_id = %connection_id,
        event,
        error = %err,
        "Action rejected"
    );
    if let Some(notification) = ServerEvent::from_error(err) {
        directory.connections().send(connection_id, &notification);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::actors::{ActorMetrics, ConnectionOutbox, ConnectionRegistry};
    use serde_json::json;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn directory() -> MeetingDirectory {
        let metrics = ActorMetrics::new();
        let root = CancellationToken::new();
        let registry = Arc::new(ConnectionRegistry::new(
            64,
            root.clone(),
            Arc::clone(&metrics),
        ));
        MeetingDirectory::new(registry, Vec::new(), 0.3, metrics, root)
    }

    fn connect(directory: &MeetingDirectory) -> (String, ConnectionOutbox) {
        let (handle, outbox) = directory.connections().register();
        (handle.connection_id().to_string(), outbox)
    }

    fn drain(outbox: &mut ConnectionOutbox) -> Vec<ServerEvent> {
        std::iter::from_fn(|| outbox.try_recv())
            .map(|frame| serde_json::from_str(&frame).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_relay_requires_membership() {
        let directory = directory();
        let (alice, mut alice_out) = connect(&directory);
        let (bob, mut bob_out) = connect(&directory);

        route(
            &directory,
            &alice,
            ClientEvent::Offer {
                target: bob.clone(),
                offer: json!({"type": "offer", "sdp": "v=0"}),
            },
        )
        .await;

        assert!(drain(&mut bob_out).is_empty());
        assert!(drain(&mut alice_out).is_empty());
    }

    #[tokio::test]
    async fn test_relay_forwards_payload_verbatim() {
        let directory = directory();
        let (alice, _alice_out) = connect(&directory);
        let (bob, mut bob_out) = connect(&directory);

        route(
            &directory,
            &alice,
            ClientEvent::JoinAsHost {
                meeting_id: None,
                host_name: "Alice".to_string(),
            },
        )
        .await;

        let candidate = json!({"candidate": "candidate:1 1 UDP 2122252543 10.0.0.1 50000 typ host", "sdpMLineIndex": 0});
        route(
            &directory,
            &alice,
            ClientEvent::IceCandidate {
                target: bob.clone(),
                candidate: candidate.clone(),
            },
        )
        .await;

        assert_eq!(
            drain(&mut bob_out),
            vec![ServerEvent::IceCandidate {
                candidate,
                sender: alice.clone(),
            }]
        );
    }

    #[tokio::test]
    async fn test_meeting_action_without_membership_is_dropped() {
        let directory = directory();
        let (alice, mut alice_out) = connect(&directory);

        route(&directory, &alice, ClientEvent::RaiseHand).await;
        assert!(drain(&mut alice_out).is_empty());
    }

    #[tokio::test]
    async fn test_join_unknown_meeting_reports_meeting_error() {
        let directory = directory();
        let (bob, mut bob_out) = connect(&directory);

        route(
            &directory,
            &bob,
            ClientEvent::JoinMeeting {
                meeting_id: "NOPE1234".to_string(),
                participant_name: "Bob".to_string(),
            },
        )
        .await;

        assert_eq!(
            drain(&mut bob_out),
            vec![ServerEvent::MeetingError {
                message: "Meeting not found".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_reject_frame_sends_action_error() {
        let directory = directory();
        let (alice, mut alice_out) = connect(&directory);

        reject_frame(&directory, &alice);
        assert_eq!(
            drain(&mut alice_out),
            vec![ServerEvent::ActionError {
                message: "Invalid message".to_string(),
            }]
        );
    }
}
