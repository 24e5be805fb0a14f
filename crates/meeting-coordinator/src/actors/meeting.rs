//! `MeetingActor` - per-meeting actor that owns meeting state.
//!
//! Every action for a meeting is a message to its actor, so read-modify-write
//! sequences on one meeting never interleave while different meetings run in
//! parallel. The actor:
//!
//! - runs the pure handlers in [`crate::protocol::handler`]
//! - delivers the resulting notifications without blocking
//!   (see [`ConnectionRegistry`])
//! - retires memberships of departed connections and closes evicted ones
//! - stops when the host leaves

use super::connection::ConnectionRegistry;
use super::membership::MembershipTable;
use super::messages::{LeaveResult, MeetingMessage, MeetingState};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use crate::errors::CoordinatorError;
use crate::meeting::{Meeting, Participant};
use crate::observability::metrics as prom;
use crate::protocol::{handler, ClientEvent, Notification, Outcome, ServerEvent};

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default channel buffer size for meeting actor mailbox.
const MEETING_CHANNEL_BUFFER: usize = 500;

/// Handle to a `MeetingActor`.
#[derive(Clone, Debug)]
pub struct MeetingActorHandle {
    sender: mpsc::Sender<MeetingMessage>,
    cancel_token: CancellationToken,
    meeting_id: String,
    mailbox: Arc<MailboxMonitor>,
}

impl MeetingActorHandle {
    #[must_use]
    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }

    /// Queue an action. Failures are reported to `connection_id` by the actor.
    ///
    /// # Errors
    ///
    /// `StaleReference` if the meeting has already stopped.
    pub async fn dispatch(
        &self,
        connection_id: String,
        event: ClientEvent,
    ) -> Result<(), CoordinatorError> {
        self.send(MeetingMessage::Dispatch {
            connection_id,
            event,
            respond_to: None,
        })
        .await
        .map_err(|()| CoordinatorError::StaleReference(self.meeting_id.clone()))
    }

    /// Run an action and return its result to the caller instead of the
    /// requesting connection.
    ///
    /// # Errors
    ///
    /// The action's own failure, or `StaleReference` if the meeting stopped.
    pub async fn dispatch_and_wait(
        &self,
        connection_id: String,
        event: ClientEvent,
    ) -> Result<(), CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.send(MeetingMessage::Dispatch {
            connection_id,
            event,
            respond_to: Some(tx),
        })
        .await
        .map_err(|()| CoordinatorError::StaleReference(self.meeting_id.clone()))?;

        rx.await
            .map_err(|_| CoordinatorError::StaleReference(self.meeting_id.clone()))?
    }

    /// Admit a connection.
    ///
    /// # Errors
    ///
    /// `Locked` for a new connection while the meeting is locked, or
    /// `MeetingNotFound` if the meeting stopped.
    pub async fn join(
        &self,
        connection_id: String,
        name: String,
    ) -> Result<Participant, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.send(MeetingMessage::Join {
            connection_id,
            name,
            respond_to: tx,
        })
        .await
        .map_err(|()| CoordinatorError::MeetingNotFound(self.meeting_id.clone()))?;

        rx.await
            .map_err(|_| CoordinatorError::MeetingNotFound(self.meeting_id.clone()))?
    }

    /// Remove a connection from the meeting.
    ///
    /// # Errors
    ///
    /// `StaleReference` if the meeting has already stopped.
    pub async fn leave(&self, connection_id: String) -> Result<LeaveResult, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.send(MeetingMessage::Leave {
            connection_id,
            respond_to: tx,
        })
        .await
        .map_err(|()| CoordinatorError::StaleReference(self.meeting_id.clone()))?;

        rx.await
            .map_err(|_| CoordinatorError::StaleReference(self.meeting_id.clone()))
    }

    /// Get current meeting state.
    ///
    /// # Errors
    ///
    /// `MeetingNotFound` if the meeting has stopped.
    pub async fn get_state(&self) -> Result<MeetingState, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.send(MeetingMessage::GetState { respond_to: tx })
            .await
            .map_err(|()| CoordinatorError::MeetingNotFound(self.meeting_id.clone()))?;

        rx.await
            .map_err(|_| CoordinatorError::MeetingNotFound(self.meeting_id.clone()))
    }

    /// Messages queued but not yet handled.
    #[must_use]
    pub fn mailbox_depth(&self) -> usize {
        self.mailbox.current_depth()
    }

    /// Cancel the actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn send(&self, message: MeetingMessage) -> Result<(), ()> {
        // Counted before sending so the actor's dequeue never runs first.
        self.mailbox.record_enqueue();
        if self.sender.send(message).await.is_err() {
            self.mailbox.record_dequeue();
            return Err(());
        }
        Ok(())
    }
}

/// The `MeetingActor` implementation.
pub struct MeetingActor {
    meeting: Meeting,
    receiver: mpsc::Receiver<MeetingMessage>,
    cancel_token: CancellationToken,
    connections: Arc<ConnectionRegistry>,
    memberships: Arc<MembershipTable>,
    metrics: Arc<ActorMetrics>,
    mailbox: Arc<MailboxMonitor>,
}

impl MeetingActor {
    /// Spawn an actor that owns `meeting`.
    ///
    /// The host receives `joined-meeting` as the actor's first action. The
    /// host's membership is recorded by the caller.
    pub fn spawn(
        meeting: Meeting,
        cancel_token: CancellationToken,
        connections: Arc<ConnectionRegistry>,
        memberships: Arc<MembershipTable>,
        metrics: Arc<ActorMetrics>,
    ) -> (MeetingActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(MEETING_CHANNEL_BUFFER);
        let meeting_id = meeting.id().to_string();
        let mailbox = Arc::new(MailboxMonitor::new(ActorType::Meeting, &meeting_id));

        metrics.meeting_created();
        metrics.participants_joined(meeting.participant_count());

        let actor = Self {
            meeting,
            receiver,
            cancel_token: cancel_token.clone(),
            connections,
            memberships,
            metrics,
            mailbox: Arc::clone(&mailbox),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = MeetingActorHandle {
            sender,
            cancel_token,
            meeting_id,
            mailbox,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "coord.actor.meeting", fields(meeting_id = %self.meeting.id()))]
    async fn run(mut self) {
        info!(
            target: "coord.actor.meeting",
            meeting_id = %self.meeting.id(),
            "MeetingActor started"
        );

        let greeting = handler::host_joined(&self.meeting);
        self.apply(greeting);

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "coord.actor.meeting",
                        meeting_id = %self.meeting.id(),
                        "MeetingActor received cancellation signal"
                    );
                    self.end_meeting();
                    break;
                }

                msg = self.receiver.recv() => {
                    let Some(message) = msg else {
                        info!(
                            target: "coord.actor.meeting",
                            meeting_id = %self.meeting.id(),
                            "MeetingActor channel closed, exiting"
                        );
                        break;
                    };

                    let ended = self.handle_message(message);
                    self.mailbox.record_dequeue();
                    if ended {
                        break;
                    }
                }
            }
        }

        self.metrics
            .participants_left(self.meeting.participant_count());
        self.metrics.meeting_removed();

        info!(
            target: "coord.actor.meeting",
            meeting_id = %self.meeting.id(),
            participants = self.meeting.participant_count(),
            messages_processed = self.mailbox.delivered(),
            "MeetingActor stopped"
        );
    }

    /// Handle a single message. Returns true once the meeting is over.
    fn handle_message(&mut self, message: MeetingMessage) -> bool {
        match message {
            MeetingMessage::Dispatch {
                connection_id,
                event,
                respond_to,
            } => {
                let name = event.name();
                let start = Instant::now();
                let result = handler::dispatch(&mut self.meeting, &connection_id, event);
                prom::record_event(name, start.elapsed());

                let (ended, result) = match result {
                    Ok(outcome) => (self.apply(outcome), Ok(())),
                    Err(e) => (false, Err(e)),
                };

                match (respond_to, result) {
                    (Some(tx), result) => {
                        let _ = tx.send(result);
                    }
                    (None, Err(e)) => self.report_error(&connection_id, name, &e),
                    (None, Ok(())) => {}
                }
                ended
            }

            MeetingMessage::Join {
                connection_id,
                name,
                respond_to,
            } => {
                let start = Instant::now();
                let result = self.handle_join(&connection_id, &name);
                prom::record_event("join-meeting", start.elapsed());
                let _ = respond_to.send(result);
                false
            }

            MeetingMessage::Leave {
                connection_id,
                respond_to,
            } => {
                let start = Instant::now();
                let outcome = handler::leave(&mut self.meeting, &connection_id);
                prom::record_event("leave-meeting", start.elapsed());

                let result = if outcome.meeting_ended {
                    LeaveResult::MeetingEnded
                } else if outcome.departed.is_empty() {
                    LeaveResult::NotMember
                } else {
                    LeaveResult::Left
                };
                let ended = self.apply(outcome);
                let _ = respond_to.send(result);
                ended
            }

            MeetingMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.get_state());
                false
            }
        }
    }

    fn handle_join(
        &mut self,
        connection_id: &str,
        name: &str,
    ) -> Result<Participant, CoordinatorError> {
        let rejoining = self.meeting.contains(connection_id);
        let (participant, outcome) = handler::join(&mut self.meeting, connection_id, name)?;

        if rejoining {
            debug!(
                target: "coord.actor.meeting",
                meeting_id = %self.meeting.id(),
                connection_id = %connection_id,
                "Connection re-joined"
            );
        } else {
            self.metrics.participants_joined(1);
            info!(
                target: "coord.actor.meeting",
                meeting_id = %self.meeting.id(),
                connection_id = %connection_id,
                participants = self.meeting.participant_count(),
                "Participant joined"
            );
        }

        self.apply(outcome);
        Ok(participant)
    }

    /// Deliver notifications and apply membership effects.
    ///
    /// Evicted connections are closed after their notifications are queued,
    /// so the writer still flushes them. Returns true if the meeting ended.
    fn apply(&self, outcome: Outcome) -> bool {
        for notification in &outcome.notifications {
            self.connections.deliver(notification);
        }

        for connection_id in &outcome.departed {
            self.memberships
                .remove_if_in(connection_id, self.meeting.id());
        }
        if !outcome.departed.is_empty() {
            self.metrics.participants_left(outcome.departed.len());
        }

        for connection_id in &outcome.evicted {
            self.connections.close(connection_id);
            info!(
                target: "coord.actor.meeting",
                meeting_id = %self.meeting.id(),
                connection_id = %connection_id,
                "Participant removed from meeting"
            );
        }

        if outcome.meeting_ended {
            info!(
                target: "coord.actor.meeting",
                meeting_id = %self.meeting.id(),
                "Host left, meeting ended"
            );
        }
        outcome.meeting_ended
    }

    /// Tell the requester why its action failed.
    fn report_error(&self, connection_id: &str, event: &'static str, err: &CoordinatorError) {
        if let CoordinatorError::StaleReference(_) = err {
            debug!(
                target: "coord.actor.meeting",
                meeting_id = %self.meeting.id(),
                connection_id = %connection_id,
                event,
                "Dropping action from departed connection"
            );
            return;
        }

        prom::record_action_error(err.kind());
        debug!(
            target: "coord.actor.meeting",
            meeting_id = %self.meeting.id(),
            connection_id = %connection_id,
            event,
            error = %err,
            "Action rejected"
        );
        if let Some(notification) = ServerEvent::from_error(err) {
            self.connections
                .deliver(&Notification::to_one(connection_id, notification));
        }
    }

    /// Shutdown path: tell everyone the meeting is over.
    fn end_meeting(&mut self) {
        let members = self.meeting.connection_ids();
        if members.is_empty() {
            return;
        }
        warn!(
            target: "coord.actor.meeting",
            meeting_id = %self.meeting.id(),
            participants = members.len(),
            "Ending meeting on shutdown"
        );
        self.connections
            .deliver(&Notification::to_many(members.clone(), ServerEvent::MeetingEnded));
        for id in &members {
            self.meeting.remove_participant(id);
            self.memberships.remove_if_in(id, self.meeting.id());
        }
        self.metrics.participants_left(members.len());
    }

    fn get_state(&self) -> MeetingState {
        MeetingState {
            meeting_id: self.meeting.id().to_string(),
            host_connection_id: self.meeting.host_connection_id().to_string(),
            host_name: self.meeting.host_name().to_string(),
            created_at: self.meeting.created_at(),
            participants: self.meeting.participants(),
            co_hosts: self.meeting.co_hosts(),
            spotlighted: self.meeting.spotlighted().map(str::to_string),
            manual_spotlight: self.meeting.manual_spotlight(),
            screen_shares: self.meeting.screen_shares(),
            raised_hands: self.meeting.raised_hands(),
            is_locked: self.meeting.is_locked(),
            permissions: self.meeting.permissions(),
            mailbox_depth: self.mailbox.current_depth(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::actors::connection::ConnectionOutbox;
    use crate::actors::membership::Membership;
    use std::time::Duration;

    struct Harness {
        registry: Arc<ConnectionRegistry>,
        memberships: Arc<MembershipTable>,
        metrics: Arc<ActorMetrics>,
    }

    impl Harness {
        fn new() -> Self {
            let metrics = ActorMetrics::new();
            Self {
                registry: Arc::new(ConnectionRegistry::new(
                    64,
                    CancellationToken::new(),
                    Arc::clone(&metrics),
                )),
                memberships: Arc::new(MembershipTable::new()),
                metrics,
            }
        }

        fn connect(&self) -> (String, ConnectionOutbox) {
            let (handle, outbox) = self.registry.register();
            (handle.connection_id().to_string(), outbox)
        }

        fn spawn(&self, host: &str) -> (MeetingActorHandle, JoinHandle<()>) {
            self.memberships
                .try_insert(host, Membership::host("TESTMEET"))
                .unwrap();
            let meeting = Meeting::new("TESTMEET", host, "Alice", Vec::new(), 0.3);
            MeetingActor::spawn(
                meeting,
                CancellationToken::new(),
                Arc::clone(&self.registry),
                Arc::clone(&self.memberships),
                Arc::clone(&self.metrics),
            )
        }
    }

    async fn next_event(outbox: &mut ConnectionOutbox) -> ServerEvent {
        let frame = tokio::time::timeout(Duration::from_secs(1), outbox.recv())
            .await
            .expect("timed out waiting for event")
            .expect("outbox closed");
        serde_json::from_str(&frame).unwrap()
    }

    #[tokio::test]
    async fn test_meeting_actor_spawn_greets_host() {
        let harness = Harness::new();
        let (host, mut host_out) = harness.connect();
        let (handle, _task) = harness.spawn(&host);

        assert_eq!(handle.meeting_id(), "TESTMEET");
        assert!(!handle.is_cancelled());

        match next_event(&mut host_out).await {
            ServerEvent::JoinedMeeting {
                meeting_id,
                is_host,
                participants,
                ..
            } => {
                assert_eq!(meeting_id, "TESTMEET");
                assert!(is_host);
                assert_eq!(participants.len(), 1);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_meeting_actor_join_notifies_others() {
        let harness = Harness::new();
        let (host, mut host_out) = harness.connect();
        let (bob, mut bob_out) = harness.connect();
        let (handle, _task) = harness.spawn(&host);
        next_event(&mut host_out).await;

        let participant = handle.join(bob.clone(), "Bob".to_string()).await.unwrap();
        assert_eq!(participant.name, "Bob");
        assert!(!participant.is_host);

        assert!(matches!(
            next_event(&mut bob_out).await,
            ServerEvent::JoinedMeeting { is_host: false, .. }
        ));
        match next_event(&mut host_out).await {
            ServerEvent::ParticipantJoined { participants, .. } => {
                assert_eq!(participants.len(), 2);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(harness.metrics.participant_count(), 2);

        handle.cancel();
    }

    #[tokio::test]
    async fn test_meeting_actor_get_state() {
        let harness = Harness::new();
        let (host, _host_out) = harness.connect();
        let (handle, _task) = harness.spawn(&host);

        let state = handle.get_state().await.unwrap();
        assert_eq!(state.meeting_id, "TESTMEET");
        assert_eq!(state.host_name, "Alice");
        assert_eq!(state.host_connection_id, host);
        assert_eq!(state.participant_count(), 1);
        assert!(!state.is_locked);
        assert!(state.permissions.emoji_reactions);

        handle.cancel();
    }

    #[tokio::test]
    async fn test_fire_and_forget_error_goes_to_requester() {
        let harness = Harness::new();
        let (host, mut host_out) = harness.connect();
        let (bob, mut bob_out) = harness.connect();
        let (handle, _task) = harness.spawn(&host);
        next_event(&mut host_out).await;
        handle.join(bob.clone(), "Bob".to_string()).await.unwrap();
        next_event(&mut bob_out).await;

        handle
            .dispatch(bob.clone(), ClientEvent::ToggleMeetingLock { is_locked: true })
            .await
            .unwrap();

        match next_event(&mut bob_out).await {
            ServerEvent::ActionError { message } => {
                assert_eq!(message, "Only host can lock/unlock the meeting");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(!handle.get_state().await.unwrap().is_locked);

        handle.cancel();
    }

    #[tokio::test]
    async fn test_dispatch_and_wait_returns_error_to_caller() {
        let harness = Harness::new();
        let (host, _host_out) = harness.connect();
        let (handle, _task) = harness.spawn(&host);

        let result = handle
            .dispatch_and_wait(
                host.clone(),
                ClientEvent::KickParticipant {
                    target_socket_id: "nobody".to_string(),
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(CoordinatorError::ParticipantNotFound(_))
        ));

        handle.cancel();
    }

    #[tokio::test]
    async fn test_kick_closes_target_and_retires_membership() {
        let harness = Harness::new();
        let (host, _host_out) = harness.connect();
        let (bob, mut bob_out) = harness.connect();
        let (handle, _task) = harness.spawn(&host);
        harness
            .memberships
            .try_insert(&bob, Membership::participant("TESTMEET"))
            .unwrap();
        handle.join(bob.clone(), "Bob".to_string()).await.unwrap();
        next_event(&mut bob_out).await;

        handle
            .dispatch_and_wait(
                host.clone(),
                ClientEvent::KickParticipant {
                    target_socket_id: bob.clone(),
                },
            )
            .await
            .unwrap();

        assert_eq!(next_event(&mut bob_out).await, ServerEvent::KickedFromMeeting);
        assert!(bob_out.cancel_token().is_cancelled());
        assert!(harness.memberships.get(&bob).is_none());
        assert!(harness.memberships.get(&host).is_some());

        handle.cancel();
    }

    #[tokio::test]
    async fn test_host_leave_stops_actor() {
        let harness = Harness::new();
        let (host, _host_out) = harness.connect();
        let (bob, mut bob_out) = harness.connect();
        let (handle, task) = harness.spawn(&host);
        harness
            .memberships
            .try_insert(&bob, Membership::participant("TESTMEET"))
            .unwrap();
        handle.join(bob.clone(), "Bob".to_string()).await.unwrap();
        next_event(&mut bob_out).await;

        let result = handle.leave(host.clone()).await.unwrap();
        assert_eq!(result, LeaveResult::MeetingEnded);
        assert_eq!(next_event(&mut bob_out).await, ServerEvent::MeetingEnded);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(harness.memberships.is_empty());
        assert_eq!(harness.metrics.meeting_count(), 0);
        assert_eq!(harness.metrics.participant_count(), 0);

        assert!(handle.get_state().await.is_err());
        assert!(matches!(
            handle.leave(bob).await,
            Err(CoordinatorError::StaleReference(_))
        ));
    }

    #[tokio::test]
    async fn test_leave_of_non_member_is_noop() {
        let harness = Harness::new();
        let (host, _host_out) = harness.connect();
        let (handle, _task) = harness.spawn(&host);

        let result = handle.leave("stranger".to_string()).await.unwrap();
        assert_eq!(result, LeaveResult::NotMember);
        assert_eq!(handle.get_state().await.unwrap().participant_count(), 1);

        handle.cancel();
    }

    #[tokio::test]
    async fn test_cancel_ends_meeting_for_members() {
        let harness = Harness::new();
        let (host, mut host_out) = harness.connect();
        let (handle, task) = harness.spawn(&host);
        next_event(&mut host_out).await;

        handle.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(next_event(&mut host_out).await, ServerEvent::MeetingEnded);
        assert!(harness.memberships.is_empty());
        assert_eq!(harness.metrics.meeting_count(), 0);
    }
}
