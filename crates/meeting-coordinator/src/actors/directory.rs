//! `MeetingDirectory` - process-wide registry of live meetings.
//!
//! Holds two independently locked maps:
//!
//! - meeting id -> actor handle (insert on create, delete on host leave)
//! - connection id -> membership (see [`MembershipTable`])
//!
//! Per-meeting state lives in each `MeetingActor`; the directory only routes
//! to it, so operations on different meetings never contend beyond the brief
//! map lookups. Locks are never held across an `.await`.
//!
//! The directory also supervises its actors: [`MeetingDirectory::check_meeting_health`]
//! reaps finished tasks and detects panics via their `JoinHandle`.

use super::connection::ConnectionRegistry;
use super::meeting::{MeetingActor, MeetingActorHandle};
use super::membership::{Membership, MembershipTable};
use super::messages::{LeaveResult, MeetingState};
use super::metrics::{ActorMetrics, ActorType};
use crate::errors::CoordinatorError;
use crate::meeting::{generate_meeting_id, IceServer, Meeting, Participant};
use crate::observability::metrics as prom;
use crate::protocol::{ClientEvent, Notification, ServerEvent};

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Longest accepted client-chosen meeting id.
pub const MAX_MEETING_ID_LENGTH: usize = 64;

/// Attempts at drawing an unused generated id before giving up.
const ID_GENERATION_ATTEMPTS: usize = 16;

/// How long shutdown waits for each meeting actor.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

struct ManagedMeeting {
    handle: MeetingActorHandle,
    task_handle: JoinHandle<()>,
}

pub struct MeetingDirectory {
    meetings: RwLock<HashMap<String, ManagedMeeting>>,
    memberships: Arc<MembershipTable>,
    connections: Arc<ConnectionRegistry>,
    ice_servers: Vec<IceServer>,
    auto_spotlight_threshold: f32,
    metrics: Arc<ActorMetrics>,
    cancel_token: CancellationToken,
}

impl MeetingDirectory {
    /// Create an empty directory.
    ///
    /// Meeting actors get child tokens of `cancel_token`.
    #[must_use]
    pub fn new(
        connections: Arc<ConnectionRegistry>,
        ice_servers: Vec<IceServer>,
        auto_spotlight_threshold: f32,
        metrics: Arc<ActorMetrics>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            meetings: RwLock::new(HashMap::new()),
            memberships: Arc::new(MembershipTable::new()),
            connections,
            ice_servers,
            auto_spotlight_threshold,
            metrics,
            cancel_token,
        }
    }

    #[must_use]
    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.connections
    }

    #[must_use]
    pub fn ice_servers(&self) -> &[IceServer] {
        &self.ice_servers
    }

    /// Create a meeting hosted by `host_connection_id`.
    ///
    /// Uses `requested_id` when given, otherwise generates one. The host
    /// receives `joined-meeting` from the new actor.
    ///
    /// # Errors
    ///
    /// - `BadRequest` for an empty host name or a malformed requested id
    /// - `Conflict` if the id is taken or the connection is already in a meeting
    #[instrument(skip_all, fields(connection_id = %host_connection_id))]
    pub fn create_meeting(
        &self,
        host_connection_id: &str,
        host_name: &str,
        requested_id: Option<&str>,
    ) -> Result<String, CoordinatorError> {
        let host_name = host_name.trim();
        if host_name.is_empty() {
            return Err(CoordinatorError::BadRequest(
                "Host name is required".to_string(),
            ));
        }
        let requested_id = requested_id.map(str::trim).filter(|id| !id.is_empty());
        if let Some(id) = requested_id {
            validate_meeting_id(id)?;
        }

        let mut meetings = self.meetings.write().unwrap_or_else(PoisonError::into_inner);

        let meeting_id = match requested_id {
            Some(id) if meetings.contains_key(id) => {
                return Err(CoordinatorError::Conflict(
                    "Meeting ID already in use".to_string(),
                ));
            }
            Some(id) => id.to_string(),
            None => std::iter::repeat_with(generate_meeting_id)
                .take(ID_GENERATION_ATTEMPTS)
                .find(|id| !meetings.contains_key(id))
                .ok_or_else(|| {
                    CoordinatorError::Internal("could not allocate a meeting id".to_string())
                })?,
        };

        if self
            .memberships
            .try_insert(host_connection_id, Membership::host(&meeting_id))
            .is_err()
        {
            return Err(CoordinatorError::Conflict(
                "Already in a meeting".to_string(),
            ));
        }

        let meeting = Meeting::new(
            &meeting_id,
            host_connection_id,
            host_name,
            self.ice_servers.clone(),
            self.auto_spotlight_threshold,
        );
        let (handle, task_handle) = MeetingActor::spawn(
            meeting,
            self.cancel_token.child_token(),
            Arc::clone(&self.connections),
            Arc::clone(&self.memberships),
            Arc::clone(&self.metrics),
        );
        meetings.insert(
            meeting_id.clone(),
            ManagedMeeting {
                handle,
                task_handle,
            },
        );

        info!(
            target: "coord.directory",
            meeting_id = %meeting_id,
            connection_id = %host_connection_id,
            meetings = meetings.len(),
            "Meeting created"
        );
        Ok(meeting_id)
    }

    /// Find a live meeting. Ids are matched exactly, then upper-cased.
    #[must_use]
    pub fn lookup(&self, meeting_id: &str) -> Option<MeetingActorHandle> {
        let meetings = self.meetings.read().unwrap_or_else(PoisonError::into_inner);
        meetings
            .get(meeting_id)
            .or_else(|| meetings.get(&meeting_id.to_ascii_uppercase()))
            .filter(|managed| !managed.handle.is_closed())
            .map(|managed| managed.handle.clone())
    }

    #[must_use]
    pub fn membership(&self, connection_id: &str) -> Option<Membership> {
        self.memberships.get(connection_id)
    }

    /// The meeting a connection currently belongs to.
    #[must_use]
    pub fn meeting_for(&self, connection_id: &str) -> Option<MeetingActorHandle> {
        self.memberships
            .get(connection_id)
            .and_then(|membership| self.lookup(&membership.meeting_id))
    }

    /// Admit a connection to a meeting.
    ///
    /// Re-joining the same meeting is allowed (even while locked) and
    /// returns the existing participant record.
    ///
    /// # Errors
    ///
    /// - `BadRequest` for an empty name
    /// - `MeetingNotFound` if the meeting does not exist
    /// - `Conflict` if the connection is in a different meeting
    /// - `Locked` if the meeting is locked
    #[instrument(skip_all, fields(connection_id = %connection_id, meeting_id = %meeting_id))]
    pub async fn join(
        &self,
        connection_id: &str,
        meeting_id: &str,
        name: &str,
    ) -> Result<Participant, CoordinatorError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoordinatorError::BadRequest(
                "Participant name is required".to_string(),
            ));
        }
        let handle = self
            .lookup(meeting_id)
            .ok_or_else(|| CoordinatorError::MeetingNotFound(meeting_id.to_string()))?;
        let meeting_id = handle.meeting_id().to_string();

        let inserted = match self
            .memberships
            .try_insert(connection_id, Membership::participant(&meeting_id))
        {
            Ok(()) => true,
            Err(existing) if existing.meeting_id == meeting_id => false,
            Err(_) => {
                return Err(CoordinatorError::Conflict(
                    "Already in a meeting".to_string(),
                ));
            }
        };

        match handle
            .join(connection_id.to_string(), name.to_string())
            .await
        {
            Ok(participant) => Ok(participant),
            Err(e) => {
                if inserted {
                    self.memberships.remove_if_in(connection_id, &meeting_id);
                }
                Err(e)
            }
        }
    }

    /// Remove a connection from its meeting, ending it if the connection
    /// hosts it.
    ///
    /// Idempotent: a connection without a membership is a no-op, so an
    /// explicit leave, a kick and a disconnect may race freely.
    #[instrument(skip_all, fields(connection_id = %connection_id))]
    pub async fn leave(&self, connection_id: &str) -> LeaveResult {
        let Some(membership) = self.memberships.remove(connection_id) else {
            return LeaveResult::NotMember;
        };

        // The host's departure makes the meeting unreachable before the
        // actor has even processed it.
        let handle = if membership.is_host {
            self.meetings
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&membership.meeting_id)
                .map(|managed| managed.handle)
        } else {
            self.lookup(&membership.meeting_id)
        };

        let Some(handle) = handle else {
            return LeaveResult::NotMember;
        };

        match handle.leave(connection_id.to_string()).await {
            Ok(result) => {
                if result == LeaveResult::MeetingEnded {
                    info!(
                        target: "coord.directory",
                        meeting_id = %membership.meeting_id,
                        "Meeting removed after host left"
                    );
                }
                result
            }
            Err(e) => {
                debug!(
                    target: "coord.directory",
                    meeting_id = %membership.meeting_id,
                    error = %e,
                    "Leave raced meeting shutdown"
                );
                LeaveResult::NotMember
            }
        }
    }

    /// Remove `target` from the requester's meeting.
    ///
    /// A target that already left is a no-op.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the requester hosts the meeting and the target is
    /// a different, non-co-host participant.
    #[instrument(skip_all, fields(connection_id = %requester))]
    pub async fn kick(&self, requester: &str, target: &str) -> Result<(), CoordinatorError> {
        let Some(handle) = self.meeting_for(requester) else {
            debug!(
                target: "coord.directory",
                connection_id = %requester,
                "Dropping kick from connection without a meeting"
            );
            return Ok(());
        };

        let result = handle
            .dispatch_and_wait(
                requester.to_string(),
                ClientEvent::KickParticipant {
                    target_socket_id: target.to_string(),
                },
            )
            .await;

        match result {
            Err(CoordinatorError::ParticipantNotFound(_) | CoordinatorError::StaleReference(_)) => {
                debug!(
                    target: "coord.directory",
                    meeting_id = %handle.meeting_id(),
                    "Kick target already gone"
                );
                Ok(())
            }
            other => other,
        }
    }

    /// Snapshot a meeting.
    ///
    /// # Errors
    ///
    /// `MeetingNotFound` if no such meeting is live.
    pub async fn meeting_info(&self, meeting_id: &str) -> Result<MeetingState, CoordinatorError> {
        self.lookup(meeting_id)
            .ok_or_else(|| CoordinatorError::MeetingNotFound(meeting_id.to_string()))?
            .get_state()
            .await
    }

    #[must_use]
    pub fn meeting_count(&self) -> usize {
        self.meetings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Reap finished meeting actors.
    ///
    /// A panicked actor leaves memberships behind; its members are told the
    /// meeting ended and released.
    pub async fn check_meeting_health(&self) {
        let (finished, mailbox_depth) = {
            let mut meetings = self.meetings.write().unwrap_or_else(PoisonError::into_inner);
            let finished_ids: Vec<String> = meetings
                .iter()
                .filter(|(_, managed)| managed.task_handle.is_finished())
                .map(|(id, _)| id.clone())
                .collect();
            let finished: Vec<(String, ManagedMeeting)> = finished_ids
                .into_iter()
                .filter_map(|id| meetings.remove(&id).map(|managed| (id, managed)))
                .collect();
            let depth: usize = meetings
                .values()
                .map(|managed| managed.handle.mailbox_depth())
                .sum();
            (finished, depth)
        };
        prom::set_actor_mailbox_depth(ActorType::Meeting.as_str(), mailbox_depth);

        for (meeting_id, managed) in finished {
            match managed.task_handle.await {
                Ok(()) => {
                    debug!(
                        target: "coord.directory",
                        meeting_id = %meeting_id,
                        "Meeting actor exited cleanly"
                    );
                }
                Err(join_error) => {
                    if join_error.is_panic() {
                        error!(
                            target: "coord.directory",
                            meeting_id = %meeting_id,
                            error = ?join_error,
                            "Meeting actor panicked"
                        );
                        self.metrics.record_panic(ActorType::Meeting);
                        self.metrics.meeting_removed();
                    }
                    let orphaned = self.memberships.remove_meeting(&meeting_id);
                    if !orphaned.is_empty() {
                        self.metrics.participants_left(orphaned.len());
                        self.connections
                            .deliver(&Notification::to_many(orphaned, ServerEvent::MeetingEnded));
                    }
                }
            }
        }
    }

    /// Periodically run [`Self::check_meeting_health`] until cancelled.
    pub fn spawn_health_check(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let directory = Arc::clone(self);
        let cancel_token = self.cancel_token.child_token();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    () = cancel_token.cancelled() => break,
                    _ = ticker.tick() => directory.check_meeting_health().await,
                }
            }
        })
    }

    /// Cancel every meeting actor and wait for them to stop.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();
        let meetings: Vec<(String, ManagedMeeting)> = self
            .meetings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();

        info!(
            target: "coord.directory",
            meeting_count = meetings.len(),
            "Shutting down meetings"
        );

        for (meeting_id, managed) in meetings {
            managed.handle.cancel();
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, managed.task_handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        target: "coord.directory",
                        meeting_id = %meeting_id,
                        error = ?e,
                        "Meeting actor task failed during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "coord.directory",
                        meeting_id = %meeting_id,
                        "Meeting actor shutdown timed out"
                    );
                }
            }
        }
    }
}

/// Client-chosen ids must be short and URL-safe.
fn validate_meeting_id(id: &str) -> Result<(), CoordinatorError> {
    let valid = id.len() <= MAX_MEETING_ID_LENGTH
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CoordinatorError::BadRequest(
            "Invalid meeting ID".to_string(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::actors::connection::ConnectionOutbox;
    use crate::meeting::state::MEETING_ID_LENGTH;

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

    #[tokio::test]
    async fn test_create_meeting_generates_id() {
        let directory = directory();
        let (host, _out) = connect(&directory);

        let id = directory.create_meeting(&host, "Alice", None).unwrap();
        assert_eq!(id.len(), MEETING_ID_LENGTH);
        assert!(directory.lookup(&id).is_some());
        assert_eq!(directory.membership(&host), Some(Membership::host(&id)));
        assert_eq!(directory.meeting_count(), 1);
    }

    #[tokio::test]
    async fn test_create_meeting_with_requested_id() {
        let directory = directory();
        let (host, _out) = connect(&directory);
        let (other, _other_out) = connect(&directory);

        let id = directory
            .create_meeting(&host, "Alice", Some("team-sync"))
            .unwrap();
        assert_eq!(id, "team-sync");

        let err = directory
            .create_meeting(&other, "Mallory", Some("team-sync"))
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Conflict(_)));
        assert!(directory.membership(&other).is_none());
    }

    #[tokio::test]
    async fn test_create_meeting_rejects_bad_input() {
        let directory = directory();
        let (host, _out) = connect(&directory);

        assert!(matches!(
            directory.create_meeting(&host, "   ", None),
            Err(CoordinatorError::BadRequest(_))
        ));
        assert!(matches!(
            directory.create_meeting(&host, "Alice", Some("../etc")),
            Err(CoordinatorError::BadRequest(_))
        ));
        assert_eq!(directory.meeting_count(), 0);
    }

    #[tokio::test]
    async fn test_connection_cannot_host_twice() {
        let directory = directory();
        let (host, _out) = connect(&directory);

        directory.create_meeting(&host, "Alice", None).unwrap();
        assert!(matches!(
            directory.create_meeting(&host, "Alice", None),
            Err(CoordinatorError::Conflict(_))
        ));
        assert_eq!(directory.meeting_count(), 1);
    }

    #[tokio::test]
    async fn test_join_unknown_meeting() {
        let directory = directory();
        let (bob, _out) = connect(&directory);

        let err = directory.join(&bob, "NOPE1234", "Bob").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::MeetingNotFound(_)));
        assert!(directory.membership(&bob).is_none());
    }

    #[tokio::test]
    async fn test_join_is_case_insensitive_for_generated_ids() {
        let directory = directory();
        let (host, _host_out) = connect(&directory);
        let (bob, _bob_out) = connect(&directory);

        let id = directory.create_meeting(&host, "Alice", None).unwrap();
        directory
            .join(&bob, &id.to_ascii_lowercase(), "Bob")
            .await
            .unwrap();
        assert_eq!(directory.membership(&bob).unwrap().meeting_id, id);
    }

    #[tokio::test]
    async fn test_locked_join_rolls_back_membership() {
        let directory = directory();
        let (host, _host_out) = connect(&directory);
        let (carol, _carol_out) = connect(&directory);

        let id = directory.create_meeting(&host, "Alice", None).unwrap();
        directory
            .lookup(&id)
            .unwrap()
            .dispatch_and_wait(host.clone(), ClientEvent::ToggleMeetingLock { is_locked: true })
            .await
            .unwrap();

        let err = directory.join(&carol, &id, "Carol").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Locked(_)));
        assert!(directory.membership(&carol).is_none());
        assert_eq!(directory.meeting_info(&id).await.unwrap().participant_count(), 1);
    }

    #[tokio::test]
    async fn test_join_second_meeting_conflicts() {
        let directory = directory();
        let (alice, _a) = connect(&directory);
        let (dave, _d) = connect(&directory);
        let (bob, _b) = connect(&directory);

        let first = directory.create_meeting(&alice, "Alice", None).unwrap();
        let second = directory.create_meeting(&dave, "Dave", None).unwrap();

        directory.join(&bob, &first, "Bob").await.unwrap();
        // Same meeting again is a re-join.
        directory.join(&bob, &first, "Bob").await.unwrap();
        assert!(matches!(
            directory.join(&bob, &second, "Bob").await,
            Err(CoordinatorError::Conflict(_))
        ));
        assert_eq!(directory.membership(&bob).unwrap().meeting_id, first);
    }

    #[tokio::test]
    async fn test_host_leave_removes_meeting() {
        let directory = directory();
        let (host, _host_out) = connect(&directory);
        let (bob, _bob_out) = connect(&directory);

        let id = directory.create_meeting(&host, "Alice", None).unwrap();
        directory.join(&bob, &id, "Bob").await.unwrap();

        assert_eq!(directory.leave(&host).await, LeaveResult::MeetingEnded);
        assert!(directory.lookup(&id).is_none());
        assert!(matches!(
            directory.meeting_info(&id).await,
            Err(CoordinatorError::MeetingNotFound(_))
        ));
        assert!(directory.membership(&bob).is_none());

        // Bob's disconnect afterwards is a no-op.
        assert_eq!(directory.leave(&bob).await, LeaveResult::NotMember);
    }

    #[tokio::test]
    async fn test_leave_is_idempotent() {
        let directory = directory();
        let (host, _host_out) = connect(&directory);
        let (bob, _bob_out) = connect(&directory);

        let id = directory.create_meeting(&host, "Alice", None).unwrap();
        directory.join(&bob, &id, "Bob").await.unwrap();

        assert_eq!(directory.leave(&bob).await, LeaveResult::Left);
        assert_eq!(directory.leave(&bob).await, LeaveResult::NotMember);
        assert_eq!(directory.meeting_info(&id).await.unwrap().participant_count(), 1);
    }

    #[tokio::test]
    async fn test_kick_then_disconnect_is_noop() {
        let directory = directory();
        let (host, _host_out) = connect(&directory);
        let (bob, _bob_out) = connect(&directory);

        let id = directory.create_meeting(&host, "Alice", None).unwrap();
        directory.join(&bob, &id, "Bob").await.unwrap();

        directory.kick(&host, &bob).await.unwrap();
        assert!(directory.membership(&bob).is_none());
        assert_eq!(directory.leave(&bob).await, LeaveResult::NotMember);

        // Kicking again after the target is gone is also a no-op.
        directory.kick(&host, &bob).await.unwrap();
    }

    #[tokio::test]
    async fn test_kick_by_non_host_is_forbidden() {
        let directory = directory();
        let (host, _host_out) = connect(&directory);
        let (bob, _bob_out) = connect(&directory);

        let id = directory.create_meeting(&host, "Alice", None).unwrap();
        directory.join(&bob, &id, "Bob").await.unwrap();

        assert!(matches!(
            directory.kick(&bob, &host).await,
            Err(CoordinatorError::Forbidden(_))
        ));
        assert_eq!(directory.meeting_info(&id).await.unwrap().participant_count(), 2);
    }

    #[tokio::test]
    async fn test_health_check_reaps_finished_meeting() {
        let directory = directory();
        let (host, _host_out) = connect(&directory);
        let (bob, mut bob_out) = connect(&directory);

        let id = directory.create_meeting(&host, "Alice", None).unwrap();
        directory.join(&bob, &id, "Bob").await.unwrap();
        while bob_out.try_recv().is_some() {}

        // The actor stops on its own; the directory still holds its entry.
        directory.lookup(&id).unwrap().cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(directory.meeting_count(), 1);

        directory.check_meeting_health().await;
        assert_eq!(directory.meeting_count(), 0);
        assert!(directory.membership(&bob).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_health_check_reaps_on_interval() {
        let directory = Arc::new(directory());
        let (host, _host_out) = connect(&directory);
        let id = directory.create_meeting(&host, "Alice", None).unwrap();

        let checker = directory.spawn_health_check(Duration::from_secs(5));
        directory.lookup(&id).unwrap().cancel();

        // Paused clock: the sleep jumps straight to the next tick.
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(directory.meeting_count(), 0);
        assert!(directory.membership(&host).is_none());

        checker.abort();
    }

    #[tokio::test]
    async fn test_shutdown_stops_meetings() {
        let directory = directory();
        let (host, _host_out) = connect(&directory);
        directory.create_meeting(&host, "Alice", None).unwrap();

        directory.shutdown().await;
        assert_eq!(directory.meeting_count(), 0);
        assert!(directory.membership(&host).is_none());
    }

    #[test]
    fn test_validate_meeting_id() {
        assert!(validate_meeting_id("ABCD1234").is_ok());
        assert!(validate_meeting_id("team_sync-2").is_ok());
        assert!(validate_meeting_id("has space").is_err());
        assert!(validate_meeting_id(&"x".repeat(MAX_MEETING_ID_LENGTH + 1)).is_err());
    }
}
