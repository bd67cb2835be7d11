use crate::room::SessionState;
use studymesh_core::PeerId;
use thiserror::Error;

/// Failures of the local capture primitive. None of them is fatal to a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaAccessError {
    #[error("no capture capability is available on this platform")]
    CapabilityUnavailable,

    #[error("the user declined access to capture devices")]
    PermissionDenied,

    #[error("neither audio nor video capture was requested")]
    NothingRequested,

    #[error("capture device error: {0}")]
    Device(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("subscription to room {room} failed: {reason}")]
    Subscribe { room: String, reason: String },

    #[error("transport is not subscribed to any room")]
    NotSubscribed,

    #[error("transport channel is closed")]
    Closed,

    #[error("failed to deliver signal: {0}")]
    Delivery(String),
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection is closed")]
    Closed,

    #[error("invalid session description: {0}")]
    InvalidDescription(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot {operation} while the session is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error(transparent)]
    Media(#[from] MediaAccessError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("negotiation with peer {peer_id} failed: {source}")]
    Negotiation {
        peer_id: PeerId,
        #[source]
        source: ConnectionError,
    },

    #[error("gave up reconnecting to peer {peer_id} after {attempts} attempts")]
    ReconnectExhausted { peer_id: PeerId, attempts: u32 },

    #[error("room session task has stopped")]
    SessionClosed,
}
