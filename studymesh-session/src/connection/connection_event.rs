use studymesh_core::{ConnectionState, IceCandidate, PeerId, RemoteTrack};
use tokio::sync::mpsc;
use tracing::trace;

/// What a connection reports back to the session that owns it.
#[derive(Debug, Clone)]
pub enum ConnectionEventKind {
    /// A local ICE candidate was gathered and must be sent to the remote peer.
    IceCandidate(IceCandidate),
    /// The remote peer started sending a track.
    Track(RemoteTrack),
    StateChanged(ConnectionState),
}

/// A connection callback, tagged with the link it came from.
#[derive(Debug, Clone)]
pub struct ConnectionEvent {
    pub peer_id: PeerId,
    /// Generation of the peer link; events of replaced links are stale.
    pub epoch: u64,
    pub kind: ConnectionEventKind,
}

/// Callback sink handed to a connection when it is created.
#[derive(Debug, Clone)]
pub struct ConnectionEvents {
    peer_id: PeerId,
    epoch: u64,
    tx: mpsc::UnboundedSender<ConnectionEvent>,
}

impl ConnectionEvents {
    pub fn new(peer_id: PeerId, epoch: u64, tx: mpsc::UnboundedSender<ConnectionEvent>) -> Self {
        Self { peer_id, epoch, tx }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn ice_candidate(&self, candidate: IceCandidate) {
        self.send(ConnectionEventKind::IceCandidate(candidate));
    }

    pub fn track(&self, track: RemoteTrack) {
        self.send(ConnectionEventKind::Track(track));
    }

    pub fn state_changed(&self, state: ConnectionState) {
        self.send(ConnectionEventKind::StateChanged(state));
    }

    fn send(&self, kind: ConnectionEventKind) {
        let event = ConnectionEvent {
            peer_id: self.peer_id.clone(),
            epoch: self.epoch,
            kind,
        };
        if self.tx.send(event).is_err() {
            trace!("Connection event for {} dropped, session is gone", self.peer_id);
        }
    }
}
