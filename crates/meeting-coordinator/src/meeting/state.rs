//! Authoritative per-meeting state.
//!
//! `Meeting` owns the roster and every derived collection (co-hosts,
//! spotlight, screen shares, raised hands). All mutation goes through its
//! methods so the derived collections never reference a connection that is
//! no longer a participant.
//!
//! The type is plain data with no interior locking. The owning
//! [`crate::actors::MeetingActor`] serializes access.

use super::ice::IceServer;
use super::participant::{ConnectionState, Participant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Length of generated meeting identifiers.
pub const MEETING_ID_LENGTH: usize = 8;

/// Feature toggles the host controls for the whole meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub chat_enabled: bool,
    pub file_sharing: bool,
    pub emoji_reactions: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            chat_enabled: true,
            file_sharing: true,
            emoji_reactions: true,
        }
    }
}

/// Partial permissions update. Absent fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_sharing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji_reactions: Option<bool>,
}

/// An active screen share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenShare {
    pub stream_id: String,
    pub started_at: DateTime<Utc>,
}

/// Generate a fresh meeting identifier: 8 uppercase hex characters.
///
/// Callers check the result against live meetings and retry on collision.
#[must_use]
pub fn generate_meeting_id() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(MEETING_ID_LENGTH)
        .collect::<String>()
        .to_uppercase()
}

/// Authoritative state of one meeting.
#[derive(Debug, Clone)]
pub struct Meeting {
    id: String,
    host_connection_id: String,
    host_name: String,
    created_at: DateTime<Utc>,
    participants: HashMap<String, Participant>,
    /// Join order of `participants`, used for roster snapshots.
    roster: Vec<String>,
    co_hosts: HashSet<String>,
    spotlighted: Option<String>,
    manual_spotlight: bool,
    auto_spotlight_enabled: bool,
    auto_spotlight_threshold: f32,
    screen_shares: HashMap<String, ScreenShare>,
    /// Raise order, no duplicates.
    raised_hands: Vec<String>,
    is_locked: bool,
    permissions: Permissions,
    ice_servers: Vec<IceServer>,
}

impl Meeting {
    /// Create a meeting with the host as its first participant.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        host_connection_id: impl Into<String>,
        host_name: impl Into<String>,
        ice_servers: Vec<IceServer>,
        auto_spotlight_threshold: f32,
    ) -> Self {
        let host_connection_id = host_connection_id.into();
        let host_name = host_name.into();

        let mut meeting = Self {
            id: id.into(),
            host_connection_id: host_connection_id.clone(),
            host_name: host_name.clone(),
            created_at: Utc::now(),
            participants: HashMap::new(),
            roster: Vec::new(),
            co_hosts: HashSet::new(),
            spotlighted: None,
            manual_spotlight: false,
            auto_spotlight_enabled: true,
            auto_spotlight_threshold,
            screen_shares: HashMap::new(),
            raised_hands: Vec::new(),
            is_locked: false,
            permissions: Permissions::default(),
            ice_servers,
        };
        meeting.add_participant(&host_connection_id, &host_name);
        meeting
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn host_connection_id(&self) -> &str {
        &self.host_connection_id
    }

    #[must_use]
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn ice_servers(&self) -> &[IceServer] {
        &self.ice_servers
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.is_locked
    }

    #[must_use]
    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    #[must_use]
    pub fn spotlighted(&self) -> Option<&str> {
        self.spotlighted.as_deref()
    }

    #[must_use]
    pub fn manual_spotlight(&self) -> bool {
        self.manual_spotlight
    }

    #[must_use]
    pub fn auto_spotlight_enabled(&self) -> bool {
        self.auto_spotlight_enabled
    }

    pub fn set_auto_spotlight_enabled(&mut self, enabled: bool) {
        self.auto_spotlight_enabled = enabled;
    }

    #[must_use]
    pub fn participant(&self, connection_id: &str) -> Option<&Participant> {
        self.participants.get(connection_id)
    }

    #[must_use]
    pub fn contains(&self, connection_id: &str) -> bool {
        self.participants.contains_key(connection_id)
    }

    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Roster snapshot in join order.
    #[must_use]
    pub fn participants(&self) -> Vec<Participant> {
        self.roster
            .iter()
            .filter_map(|id| self.participants.get(id))
            .cloned()
            .collect()
    }

    /// Connection ids of every participant, in join order.
    #[must_use]
    pub fn connection_ids(&self) -> Vec<String> {
        self.roster.clone()
    }

    /// Connection ids of every participant except `excluded`.
    #[must_use]
    pub fn connection_ids_except(&self, excluded: &str) -> Vec<String> {
        self.roster
            .iter()
            .filter(|id| id.as_str() != excluded)
            .cloned()
            .collect()
    }

    /// Co-host connection ids in join order.
    #[must_use]
    pub fn co_hosts(&self) -> Vec<String> {
        self.roster
            .iter()
            .filter(|id| self.co_hosts.contains(id.as_str()))
            .cloned()
            .collect()
    }

    /// Raised hands in the order they were raised.
    #[must_use]
    pub fn raised_hands(&self) -> Vec<String> {
        self.raised_hands.clone()
    }

    /// Active screen shares in join order of the sharer.
    #[must_use]
    pub fn screen_shares(&self) -> Vec<(String, ScreenShare)> {
        self.roster
            .iter()
            .filter_map(|id| {
                self.screen_shares
                    .get(id)
                    .map(|share| (id.clone(), share.clone()))
            })
            .collect()
    }

    /// Participants marked ready, in join order.
    #[must_use]
    pub fn ready_participants(&self) -> Vec<Participant> {
        self.roster
            .iter()
            .filter_map(|id| self.participants.get(id))
            .filter(|p| p.is_ready)
            .cloned()
            .collect()
    }

    /// Add a participant.
    ///
    /// Re-adding an existing connection returns its current record unchanged.
    /// The first participant of an un-spotlighted meeting is spotlighted.
    pub fn add_participant(&mut self, connection_id: &str, name: &str) -> Participant {
        if let Some(existing) = self.participants.get(connection_id) {
            return existing.clone();
        }

        let is_host = connection_id == self.host_connection_id;
        let participant = Participant::new(connection_id, name, is_host);
        self.participants
            .insert(connection_id.to_string(), participant);
        self.roster.push(connection_id.to_string());

        if self.participants.len() == 1 && self.spotlighted.is_none() {
            self.spotlight_participant(connection_id);
        }

        self.participants
            .get(connection_id)
            .cloned()
            .unwrap_or_else(|| Participant::new(connection_id, name, is_host))
    }

    /// Remove a participant and everything that references it.
    pub fn remove_participant(&mut self, connection_id: &str) -> Option<Participant> {
        let removed = self.participants.remove(connection_id)?;
        self.roster.retain(|id| id != connection_id);
        self.co_hosts.remove(connection_id);
        self.screen_shares.remove(connection_id);
        self.raised_hands.retain(|id| id != connection_id);

        if self.spotlighted.as_deref() == Some(connection_id) {
            self.spotlighted = None;
            self.manual_spotlight = false;
        }

        Some(removed)
    }

    /// Mark a participant ready. Returns false if unknown or already ready.
    pub fn set_ready(&mut self, connection_id: &str) -> bool {
        match self.participants.get_mut(connection_id) {
            Some(p) if !p.is_ready => {
                p.is_ready = true;
                p.connection_state = ConnectionState::Ready;
                true
            }
            _ => false,
        }
    }

    /// Record a reported peer-connection state.
    pub fn update_connection_state(&mut self, connection_id: &str, state: ConnectionState) -> bool {
        match self.participants.get_mut(connection_id) {
            Some(p) => {
                p.connection_state = state;
                true
            }
            None => false,
        }
    }

    /// Any participant who is host or co-host.
    #[must_use]
    pub fn can_perform_host_action(&self, connection_id: &str) -> bool {
        self.participants
            .get(connection_id)
            .is_some_and(Participant::has_elevated_privilege)
    }

    /// Only the host may grant or revoke co-host.
    #[must_use]
    pub fn can_make_co_host(&self, connection_id: &str) -> bool {
        self.participants
            .get(connection_id)
            .is_some_and(|p| p.is_host)
    }

    /// Whether a connection may (re-)enter the meeting.
    #[must_use]
    pub fn is_participant_allowed(&self, connection_id: &str) -> bool {
        !self.is_locked || self.participants.contains_key(connection_id)
    }

    /// Grant co-host. Fails for the host and for unknown connections.
    pub fn make_co_host(&mut self, connection_id: &str) -> bool {
        match self.participants.get_mut(connection_id) {
            Some(p) if !p.is_host => {
                p.is_co_host = true;
                self.co_hosts.insert(connection_id.to_string());
                true
            }
            _ => false,
        }
    }

    /// Revoke co-host. Returns false if the connection was not a co-host.
    pub fn remove_co_host(&mut self, connection_id: &str) -> bool {
        if !self.co_hosts.remove(connection_id) {
            return false;
        }
        if let Some(p) = self.participants.get_mut(connection_id) {
            p.is_co_host = false;
        }
        true
    }

    /// Manually spotlight a participant, replacing any current spotlight.
    pub fn spotlight_participant(&mut self, connection_id: &str) -> bool {
        if !self.participants.contains_key(connection_id) {
            return false;
        }
        self.set_spotlight(connection_id);
        self.manual_spotlight = true;
        true
    }

    /// Clear the spotlight and return to automatic mode.
    pub fn remove_spotlight(&mut self) {
        if let Some(previous) = self.spotlighted.take() {
            if let Some(p) = self.participants.get_mut(&previous) {
                p.is_spotlighted = false;
            }
        }
        self.manual_spotlight = false;
    }

    /// Record an audio level and apply automatic spotlight.
    ///
    /// Returns true when the spotlight moved to the speaker. An automatic
    /// move leaves `manual_spotlight` false so later speech can move it again.
    pub fn handle_audio_activity(&mut self, connection_id: &str, level: f32) -> bool {
        let level = if level.is_finite() {
            level.clamp(0.0, 1.0)
        } else {
            0.0
        };

        match self.participants.get_mut(connection_id) {
            Some(p) => p.audio_level = level,
            None => return false,
        }

        if self.manual_spotlight
            || !self.auto_spotlight_enabled
            || level <= self.auto_spotlight_threshold
            || self.spotlighted.as_deref() == Some(connection_id)
        {
            return false;
        }

        self.set_spotlight(connection_id);
        self.manual_spotlight = false;
        true
    }

    /// Start a screen share. Replaces any share already owned by the connection.
    pub fn add_screen_share(&mut self, connection_id: &str, stream_id: &str) -> bool {
        match self.participants.get_mut(connection_id) {
            Some(p) => {
                p.is_screen_sharing = true;
                self.screen_shares.insert(
                    connection_id.to_string(),
                    ScreenShare {
                        stream_id: stream_id.to_string(),
                        started_at: Utc::now(),
                    },
                );
                true
            }
            None => false,
        }
    }

    /// Stop a screen share. Returns false if none was active.
    pub fn remove_screen_share(&mut self, connection_id: &str) -> bool {
        if self.screen_shares.remove(connection_id).is_none() {
            return false;
        }
        if let Some(p) = self.participants.get_mut(connection_id) {
            p.is_screen_sharing = false;
        }
        true
    }

    pub fn raise_hand(&mut self, connection_id: &str) -> bool {
        match self.participants.get_mut(connection_id) {
            Some(p) => {
                p.hand_raised = true;
                if !self.raised_hands.iter().any(|id| id == connection_id) {
                    self.raised_hands.push(connection_id.to_string());
                }
                true
            }
            None => false,
        }
    }

    pub fn lower_hand(&mut self, connection_id: &str) -> bool {
        match self.participants.get_mut(connection_id) {
            Some(p) => {
                p.hand_raised = false;
                self.raised_hands.retain(|id| id != connection_id);
                true
            }
            None => false,
        }
    }

    pub fn set_muted(&mut self, connection_id: &str, is_muted: bool) -> bool {
        match self.participants.get_mut(connection_id) {
            Some(p) => {
                p.is_muted = is_muted;
                true
            }
            None => false,
        }
    }

    /// Flip a participant's mute flag and return the new value.
    pub fn toggle_mute(&mut self, connection_id: &str) -> Option<bool> {
        let p = self.participants.get_mut(connection_id)?;
        p.is_muted = !p.is_muted;
        Some(p.is_muted)
    }

    pub fn set_camera_off(&mut self, connection_id: &str, is_camera_off: bool) -> bool {
        match self.participants.get_mut(connection_id) {
            Some(p) => {
                p.is_camera_off = is_camera_off;
                true
            }
            None => false,
        }
    }

    pub fn set_locked(&mut self, is_locked: bool) {
        self.is_locked = is_locked;
    }

    /// Shallow-merge a permissions update and return the result.
    pub fn update_permissions(&mut self, update: PermissionsUpdate) -> Permissions {
        if let Some(v) = update.chat_enabled {
            self.permissions.chat_enabled = v;
        }
        if let Some(v) = update.file_sharing {
            self.permissions.file_sharing = v;
        }
        if let Some(v) = update.emoji_reactions {
            self.permissions.emoji_reactions = v;
        }
        self.permissions
    }

    fn set_spotlight(&mut self, connection_id: &str) {
        if let Some(previous) = self.spotlighted.take() {
            if let Some(p) = self.participants.get_mut(&previous) {
                p.is_spotlighted = false;
            }
        }
        if let Some(p) = self.participants.get_mut(connection_id) {
            p.is_spotlighted = true;
        }
        self.spotlighted = Some(connection_id.to_string());
    }

    /// Panics if any derived collection disagrees with the roster.
    #[cfg(test)]
    #[allow(clippy::panic)]
    pub(crate) fn assert_consistent(&self) {
        assert_eq!(self.roster.len(), self.participants.len());
        for id in &self.roster {
            assert!(self.participants.contains_key(id), "roster entry {id} missing");
        }
        for id in &self.co_hosts {
            let p = self
                .participants
                .get(id)
                .unwrap_or_else(|| panic!("co-host {id} not a participant"));
            assert!(p.is_co_host && !p.is_host);
        }
        for id in self.screen_shares.keys() {
            let p = self
                .participants
                .get(id)
                .unwrap_or_else(|| panic!("screen share {id} not a participant"));
            assert!(p.is_screen_sharing);
        }
        for id in &self.raised_hands {
            let p = self
                .participants
                .get(id)
                .unwrap_or_else(|| panic!("raised hand {id} not a participant"));
            assert!(p.hand_raised);
        }
        if let Some(id) = &self.spotlighted {
            assert!(self.participants.contains_key(id), "spotlight {id} dangling");
        }
        for p in self.participants.values() {
            assert_eq!(p.is_co_host, self.co_hosts.contains(&p.connection_id));
            assert_eq!(
                p.is_screen_sharing,
                self.screen_shares.contains_key(&p.connection_id)
            );
            assert_eq!(p.hand_raised, self.raised_hands.contains(&p.connection_id));
            assert_eq!(
                p.is_spotlighted,
                self.spotlighted.as_deref() == Some(p.connection_id.as_str())
            );
        }
        let hosts = self.participants.values().filter(|p| p.is_host).count();
        assert!(hosts <= 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const THRESHOLD: f32 = 0.3;

    fn meeting() -> Meeting {
        Meeting::new("ABCD1234", "host", "Alice", Vec::new(), THRESHOLD)
    }

    #[test]
    fn test_generate_meeting_id_shape() {
        let id = generate_meeting_id();
        assert_eq!(id.len(), MEETING_ID_LENGTH);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_ne!(generate_meeting_id(), generate_meeting_id());
    }

    #[test]
    fn test_new_meeting_has_spotlighted_host() {
        let m = meeting();
        assert_eq!(m.participant_count(), 1);
        let host = m.participant("host").unwrap();
        assert!(host.is_host);
        assert!(host.is_spotlighted);
        assert_eq!(m.spotlighted(), Some("host"));
        assert!(m.manual_spotlight());
        assert_eq!(m.permissions(), Permissions::default());
        assert!(!m.is_locked());
        m.assert_consistent();
    }

    #[test]
    fn test_roster_preserves_join_order() {
        let mut m = meeting();
        m.add_participant("b", "Bob");
        m.add_participant("c", "Carol");
        let names: Vec<_> = m.participants().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Alice", "Bob", "Carol"]);
        assert_eq!(m.connection_ids_except("b"), vec!["host", "c"]);
    }

    #[test]
    fn test_re_adding_existing_connection_is_idempotent() {
        let mut m = meeting();
        m.add_participant("b", "Bob");
        m.make_co_host("b");
        let again = m.add_participant("b", "Someone Else");
        assert_eq!(again.name, "Bob");
        assert!(again.is_co_host);
        assert_eq!(m.participant_count(), 2);
        m.assert_consistent();
    }

    #[test]
    fn test_remove_participant_cascades() {
        let mut m = meeting();
        m.add_participant("b", "Bob");
        m.make_co_host("b");
        m.add_screen_share("b", "stream-1");
        m.raise_hand("b");
        m.spotlight_participant("b");

        let removed = m.remove_participant("b").unwrap();
        assert_eq!(removed.name, "Bob");
        assert!(m.co_hosts().is_empty());
        assert!(m.screen_shares().is_empty());
        assert!(m.raised_hands().is_empty());
        assert_eq!(m.spotlighted(), None);
        assert!(!m.manual_spotlight());
        m.assert_consistent();

        assert!(m.remove_participant("b").is_none());
    }

    #[test]
    fn test_make_co_host_rules() {
        let mut m = meeting();
        m.add_participant("b", "Bob");
        assert!(!m.make_co_host("host"));
        assert!(!m.make_co_host("ghost"));
        assert!(m.make_co_host("b"));
        assert!(m.can_perform_host_action("b"));
        assert!(!m.can_make_co_host("b"));
        assert!(m.can_make_co_host("host"));

        assert!(m.remove_co_host("b"));
        assert!(!m.remove_co_host("b"));
        assert!(!m.can_perform_host_action("b"));
        m.assert_consistent();
    }

    #[test]
    fn test_lock_allows_existing_members_only() {
        let mut m = meeting();
        m.add_participant("b", "Bob");
        m.set_locked(true);
        assert!(m.is_participant_allowed("b"));
        assert!(!m.is_participant_allowed("c"));
        m.set_locked(false);
        assert!(m.is_participant_allowed("c"));
    }

    #[test]
    fn test_set_ready_only_once() {
        let mut m = meeting();
        assert!(m.set_ready("host"));
        assert!(!m.set_ready("host"));
        assert!(!m.set_ready("ghost"));
        let host = m.participant("host").unwrap();
        assert_eq!(host.connection_state, ConnectionState::Ready);
        assert_eq!(m.ready_participants().len(), 1);
    }

    #[test]
    fn test_spotlight_at_most_one() {
        let mut m = meeting();
        m.add_participant("b", "Bob");
        assert!(m.spotlight_participant("b"));
        assert!(!m.participant("host").unwrap().is_spotlighted);
        assert!(m.participant("b").unwrap().is_spotlighted);
        assert!(!m.spotlight_participant("ghost"));
        assert_eq!(m.spotlighted(), Some("b"));
        m.assert_consistent();
    }

    #[test]
    fn test_audio_activity_respects_manual_spotlight() {
        let mut m = meeting();
        m.add_participant("b", "Bob");
        // The host's first-participant spotlight is manual.
        assert!(!m.handle_audio_activity("b", 0.9));
        assert_eq!(m.spotlighted(), Some("host"));
        assert!((m.participant("b").unwrap().audio_level - 0.9).abs() < f32::EPSILON);

        m.remove_spotlight();
        assert!(m.handle_audio_activity("b", 0.9));
        assert_eq!(m.spotlighted(), Some("b"));
        assert!(!m.manual_spotlight());

        // Automatic spotlight can move again.
        assert!(m.handle_audio_activity("host", 0.5));
        assert_eq!(m.spotlighted(), Some("host"));
        m.assert_consistent();
    }

    #[test]
    fn test_audio_activity_threshold_and_disabled() {
        let mut m = meeting();
        m.add_participant("b", "Bob");
        m.remove_spotlight();

        assert!(!m.handle_audio_activity("b", THRESHOLD));
        assert!(!m.handle_audio_activity("b", 0.1));

        m.set_auto_spotlight_enabled(false);
        assert!(!m.handle_audio_activity("b", 0.9));
        assert_eq!(m.spotlighted(), None);

        m.set_auto_spotlight_enabled(true);
        assert!(m.handle_audio_activity("b", 0.9));
        assert!(!m.handle_audio_activity("b", 0.95));
    }

    #[test]
    fn test_audio_level_is_clamped() {
        let mut m = meeting();
        m.handle_audio_activity("host", 7.0);
        assert!((m.participant("host").unwrap().audio_level - 1.0).abs() < f32::EPSILON);
        m.handle_audio_activity("host", f32::NAN);
        assert!(m.participant("host").unwrap().audio_level.abs() < f32::EPSILON);
    }

    #[test]
    fn test_screen_share_lifecycle() {
        let mut m = meeting();
        assert!(m.add_screen_share("host", "s1"));
        assert!(!m.add_screen_share("ghost", "s2"));
        let shares = m.screen_shares();
        assert_eq!(shares.len(), 1);
        assert_eq!(shares.first().unwrap().1.stream_id, "s1");
        assert!(m.remove_screen_share("host"));
        assert!(!m.remove_screen_share("host"));
        m.assert_consistent();
    }

    #[test]
    fn test_hands_keep_raise_order_without_duplicates() {
        let mut m = meeting();
        m.add_participant("b", "Bob");
        assert!(m.raise_hand("b"));
        assert!(m.raise_hand("host"));
        assert!(m.raise_hand("b"));
        assert_eq!(m.raised_hands(), vec!["b", "host"]);
        assert!(m.lower_hand("b"));
        assert_eq!(m.raised_hands(), vec!["host"]);
        assert!(!m.raise_hand("ghost"));
        m.assert_consistent();
    }

    #[test]
    fn test_toggle_mute() {
        let mut m = meeting();
        assert_eq!(m.toggle_mute("host"), Some(true));
        assert_eq!(m.toggle_mute("host"), Some(false));
        assert_eq!(m.toggle_mute("ghost"), None);
    }

    #[test]
    fn test_permissions_shallow_merge() {
        let mut m = meeting();
        let result = m.update_permissions(PermissionsUpdate {
            chat_enabled: Some(false),
            ..PermissionsUpdate::default()
        });
        assert_eq!(
            result,
            Permissions {
                chat_enabled: false,
                file_sharing: true,
                emoji_reactions: true,
            }
        );

        let result = m.update_permissions(PermissionsUpdate {
            emoji_reactions: Some(false),
            ..PermissionsUpdate::default()
        });
        assert!(!result.chat_enabled);
        assert!(!result.emoji_reactions);
        assert!(result.file_sharing);
    }

    /// Drives a pseudo-random mix of operations and checks the cascade
    /// invariants after every step.
    #[test]
    fn test_random_operations_keep_state_consistent() {
        let ids = ["host", "a", "b", "c", "d"];
        let mut m = meeting();
        let mut seed: u64 = 0x5eed_1234_abcd_0001;

        for _ in 0..2_000 {
            seed = seed
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let op = (seed >> 33) % 12;
            let idx = usize::try_from((seed >> 17) % ids.len() as u64).unwrap();
            let id = ids.get(idx).copied().unwrap();

            match op {
                0 | 1 => {
                    if id != "host" {
                        m.add_participant(id, id);
                    }
                }
                2 => {
                    if id != "host" {
                        m.remove_participant(id);
                    }
                }
                3 => {
                    m.make_co_host(id);
                }
                4 => {
                    m.remove_co_host(id);
                }
                5 => {
                    m.spotlight_participant(id);
                }
                6 => m.remove_spotlight(),
                7 => {
                    m.handle_audio_activity(id, 0.8);
                }
                8 => {
                    m.add_screen_share(id, "stream");
                }
                9 => {
                    m.remove_screen_share(id);
                }
                10 => {
                    m.raise_hand(id);
                }
                _ => {
                    m.lower_hand(id);
                }
            }
            m.assert_consistent();
        }
    }
}
