//! Connection to meeting membership.
//!
//! Shared by the directory (which admits connections) and meeting actors
//! (which retire them when a participant leaves, is kicked, or the meeting
//! ends). Guarded independently of the meeting map; the lock is never held
//! across an `.await`.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// The meeting a connection belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub meeting_id: String,
    pub is_host: bool,
}

impl Membership {
    #[must_use]
    pub fn host(meeting_id: impl Into<String>) -> Self {
        Self {
            meeting_id: meeting_id.into(),
            is_host: true,
        }
    }

    #[must_use]
    pub fn participant(meeting_id: impl Into<String>) -> Self {
        Self {
            meeting_id: meeting_id.into(),
            is_host: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct MembershipTable {
    entries: RwLock<HashMap<String, Membership>>,
}

impl MembershipTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, connection_id: &str) -> Option<Membership> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(connection_id)
            .cloned()
    }

    /// Insert unless the connection already has a membership.
    ///
    /// Returns the existing membership on conflict.
    pub fn try_insert(&self, connection_id: &str, membership: Membership) -> Result<(), Membership> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = entries.get(connection_id) {
            return Err(existing.clone());
        }
        entries.insert(connection_id.to_string(), membership);
        Ok(())
    }

    pub fn remove(&self, connection_id: &str) -> Option<Membership> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(connection_id)
    }

    /// Remove only if the connection still belongs to `meeting_id`.
    pub fn remove_if_in(&self, connection_id: &str, meeting_id: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let matches = entries
            .get(connection_id)
            .is_some_and(|m| m.meeting_id == meeting_id);
        if matches {
            entries.remove(connection_id);
        }
        matches
    }

    /// Remove every membership of a meeting. Returns the removed connections.
    pub fn remove_meeting(&self, meeting_id: &str) -> Vec<String> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let members: Vec<String> = entries
            .iter()
            .filter(|(_, m)| m.meeting_id == meeting_id)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &members {
            entries.remove(id);
        }
        members
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
