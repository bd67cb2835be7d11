use dashmap::DashMap;
use std::sync::Arc;
use studymesh_core::{Participant, PeerId};

/// Outcome of [`Roster::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterUpdate {
    Missing,
    Unchanged,
    Changed(Participant),
}

/// The remote participants of a session, keyed by peer id.
///
/// Handles read it concurrently; only the session task writes to it.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    participants: Arc<DashMap<PeerId, Participant>>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.participants.contains_key(peer_id)
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<Participant> {
        self.participants.get(peer_id).map(|p| p.value().clone())
    }

    /// All participants, ordered by peer id.
    pub fn snapshot(&self) -> Vec<Participant> {
        let mut all: Vec<_> = self
            .participants
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        all
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub(crate) fn insert(&self, participant: Participant) {
        self.participants
            .insert(participant.peer_id.clone(), participant);
    }

    /// Runs `change` on the participant; it returns whether anything changed.
    pub(crate) fn update<F>(&self, peer_id: &PeerId, change: F) -> RosterUpdate
    where
        F: FnOnce(&mut Participant) -> bool,
    {
        let Some(mut entry) = self.participants.get_mut(peer_id) else {
            return RosterUpdate::Missing;
        };
        if change(entry.value_mut()) {
            RosterUpdate::Changed(entry.value().clone())
        } else {
            RosterUpdate::Unchanged
        }
    }

    pub(crate) fn remove(&self, peer_id: &PeerId) -> Option<Participant> {
        self.participants.remove(peer_id).map(|(_, p)| p)
    }

    /// Empties the roster and returns what it held, ordered by peer id.
    pub(crate) fn drain(&self) -> Vec<Participant> {
        let all = self.snapshot();
        for participant in &all {
            self.participants.remove(&participant.peer_id);
        }
        all
    }
}
