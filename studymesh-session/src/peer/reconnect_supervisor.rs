use std::collections::HashMap;
use std::time::Duration;
use studymesh_core::PeerId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A fired retry timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectDue {
    pub peer_id: PeerId,
    ticket: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// A retry will fire after the backoff. `attempt` starts at 1.
    Scheduled { attempt: u32 },
    AlreadyPending,
    /// The attempt limit is reached; nothing was scheduled.
    Exhausted { attempts: u32 },
}

/// Schedules delayed re-offers to peers whose link was lost.
///
/// At most one attempt is pending per peer. A fired timer only reports
/// itself on `due_tx`; the owner must call [`ReconnectSupervisor::take_due`]
/// before acting on it, so that a retry cancelled in the meantime is a no-op.
pub struct ReconnectSupervisor {
    backoff: Duration,
    max_attempts: Option<u32>,
    due_tx: mpsc::UnboundedSender<ReconnectDue>,
    pending: HashMap<PeerId, (u64, JoinHandle<()>)>,
    attempts: HashMap<PeerId, u32>,
    next_ticket: u64,
}

impl ReconnectSupervisor {
    pub fn new(
        backoff: Duration,
        max_attempts: Option<u32>,
        due_tx: mpsc::UnboundedSender<ReconnectDue>,
    ) -> Self {
        Self {
            backoff,
            max_attempts,
            due_tx,
            pending: HashMap::new(),
            attempts: HashMap::new(),
            next_ticket: 0,
        }
    }

    pub fn schedule(&mut self, peer_id: &PeerId) -> ReconnectDecision {
        if self.pending.contains_key(peer_id) {
            return ReconnectDecision::AlreadyPending;
        }

        let made = self.attempts.get(peer_id).copied().unwrap_or(0);
        if self.max_attempts.is_some_and(|max| made >= max) {
            info!("Reconnect attempts to {} exhausted ({})", peer_id, made);
            return ReconnectDecision::Exhausted { attempts: made };
        }

        let attempt = made + 1;
        self.attempts.insert(peer_id.clone(), attempt);

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let backoff = self.backoff;
        let due_tx = self.due_tx.clone();
        let due = ReconnectDue {
            peer_id: peer_id.clone(),
            ticket,
        };
        let handle = tokio::spawn(async move {
            tokio::time::sleep(backoff).await;
            let _ = due_tx.send(due);
        });
        self.pending.insert(peer_id.clone(), (ticket, handle));

        debug!(
            "Reconnect attempt {} to {} scheduled in {:?}",
            attempt, peer_id, backoff
        );
        ReconnectDecision::Scheduled { attempt }
    }

    /// Claims a fired retry. Returns `false` if it was cancelled since.
    pub fn take_due(&mut self, due: &ReconnectDue) -> bool {
        match self.pending.get(&due.peer_id) {
            Some((ticket, _)) if *ticket == due.ticket => {
                self.pending.remove(&due.peer_id);
                true
            }
            _ => false,
        }
    }

    /// Drops the pending retry of a peer, if any.
    pub fn cancel(&mut self, peer_id: &PeerId) -> bool {
        match self.pending.remove(peer_id) {
            Some((_, handle)) => {
                handle.abort();
                debug!("Reconnect to {} cancelled", peer_id);
                true
            }
            None => false,
        }
    }

    /// The peer is reachable again: cancel its retry and reset its budget.
    pub fn connected(&mut self, peer_id: &PeerId) {
        self.cancel(peer_id);
        self.attempts.remove(peer_id);
    }

    /// The peer left: forget it entirely.
    pub fn forget(&mut self, peer_id: &PeerId) {
        self.connected(peer_id);
    }

    pub fn cancel_all(&mut self) {
        for (_, (_, handle)) in self.pending.drain() {
            handle.abort();
        }
        self.attempts.clear();
    }

    pub fn is_pending(&self, peer_id: &PeerId) -> bool {
        self.pending.contains_key(peer_id)
    }

    pub fn attempts(&self, peer_id: &PeerId) -> u32 {
        self.attempts.get(peer_id).copied().unwrap_or(0)
    }
}

impl Drop for ReconnectSupervisor {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
