use std::collections::{HashMap, VecDeque};
use studymesh_core::{IceCandidate, PeerId};

/// Remote ICE candidates that arrived before the remote description of
/// their peer was applied. Kept per peer, in arrival order.
#[derive(Debug, Default)]
pub struct CandidateQueue {
    pending: HashMap<PeerId, VecDeque<IceCandidate>>,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `candidate` and returns how many are now waiting for `peer_id`.
    pub fn push(&mut self, peer_id: PeerId, candidate: IceCandidate) -> usize {
        let queue = self.pending.entry(peer_id).or_default();
        queue.push_back(candidate);
        queue.len()
    }

    /// Removes and returns everything queued for `peer_id`, oldest first.
    pub fn take(&mut self, peer_id: &PeerId) -> Vec<IceCandidate> {
        self.pending
            .remove(peer_id)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Forgets the candidates of a peer whose negotiation was abandoned.
    pub fn discard(&mut self, peer_id: &PeerId) -> usize {
        self.pending.remove(peer_id).map_or(0, |q| q.len())
    }

    pub fn len(&self, peer_id: &PeerId) -> usize {
        self.pending.get(peer_id).map_or(0, VecDeque::len)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
