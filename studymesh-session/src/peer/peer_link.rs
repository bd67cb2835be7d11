use crate::connection::{PeerConnection, SignalingState};
use studymesh_core::{IceCandidate, PeerId, SessionDescription};
use tracing::debug;

/// Which side started the offer/answer exchange of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    Offerer,
    Answerer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Offer sent or answer pending; media not flowing yet.
    Linking,
    Linked,
    Closed,
}

/// The session's connection to one remote peer.
pub struct PeerLink {
    peer_id: PeerId,
    epoch: u64,
    role: LinkRole,
    state: LinkState,
    connection: Box<dyn PeerConnection>,
    remote_description_set: bool,
    /// ICE username fragment of the applied remote description.
    remote_ufrag: Option<String>,
}

impl PeerLink {
    pub fn new(
        peer_id: PeerId,
        epoch: u64,
        role: LinkRole,
        connection: Box<dyn PeerConnection>,
    ) -> Self {
        Self {
            peer_id,
            epoch,
            role,
            state: LinkState::Linking,
            connection,
            remote_description_set: false,
            remote_ufrag: None,
        }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn role(&self) -> LinkRole {
        self.role
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn connection(&self) -> &dyn PeerConnection {
        self.connection.as_ref()
    }

    pub fn remote_description_set(&self) -> bool {
        self.remote_description_set
    }

    /// An answer only applies while our own offer is outstanding.
    pub fn awaiting_answer(&self) -> bool {
        self.connection.signaling_state() == SignalingState::HaveLocalOffer
    }

    /// Whether `candidate` can be applied now. Candidates tagged with another
    /// ufrag belong to a newer session of the peer and have to wait for it.
    pub fn accepts_candidate(&self, candidate: &IceCandidate) -> bool {
        if !self.remote_description_set {
            return false;
        }
        match (&self.remote_ufrag, &candidate.username_fragment) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => true,
        }
    }

    pub(crate) fn remote_description_applied(&mut self, desc: &SessionDescription) {
        self.remote_ufrag = desc.ice_ufrag().map(str::to_owned);
        self.remote_description_set = true;
    }

    pub(crate) fn mark_linked(&mut self) {
        if self.state == LinkState::Linking {
            self.state = LinkState::Linked;
        }
    }

    pub async fn close(&mut self) {
        if self.state == LinkState::Closed {
            return;
        }
        self.state = LinkState::Closed;
        if let Err(e) = self.connection.close().await {
            debug!("Closing link to {} failed: {}", self.peer_id, e);
        }
    }
}
