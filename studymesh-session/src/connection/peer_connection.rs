use crate::connection::ConnectionEvents;
use crate::error::ConnectionError;
use crate::media::LocalTrack;
use async_trait::async_trait;
use studymesh_core::{IceCandidate, IceServerConfig, PeerId, SessionDescription};

/// Offer/answer position of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    Closed,
}

/// Everything needed to open a connection towards one remote peer.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    pub peer_id: PeerId,
    pub ice_servers: Vec<IceServerConfig>,
}

/// Factory for the platform's peer connection primitive.
#[async_trait]
pub trait PeerConnector: Send + Sync + 'static {
    /// Opens a connection. Its callbacks must be reported through `events`.
    async fn connect(
        &self,
        params: ConnectionParams,
        events: ConnectionEvents,
    ) -> Result<Box<dyn PeerConnection>, ConnectionError>;
}

/// One direct connection to a remote peer.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn add_track(&self, track: &LocalTrack) -> Result<(), ConnectionError>;

    /// Swaps the outgoing video track in place, without renegotiation.
    /// Returns `false` if the connection has no video sender to swap.
    async fn replace_video_track(&self, track: Option<&LocalTrack>)
    -> Result<bool, ConnectionError>;

    async fn create_offer(&self) -> Result<SessionDescription, ConnectionError>;

    async fn create_answer(&self) -> Result<SessionDescription, ConnectionError>;

    async fn set_local_description(&self, desc: SessionDescription)
    -> Result<(), ConnectionError>;

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), ConnectionError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), ConnectionError>;

    fn signaling_state(&self) -> SignalingState;

    async fn close(&self) -> Result<(), ConnectionError>;
}
