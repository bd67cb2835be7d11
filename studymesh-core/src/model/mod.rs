mod connection;
mod media;
mod participant;
mod peer;
mod room;
mod signaling;

pub use connection::ConnectionState;
pub use media::{MediaSettings, RemoteStream, RemoteTrack, TrackKind};
pub use participant::Participant;
pub use peer::{PeerId, PeerIdError};
pub use room::{PresenceDescriptor, RoomId, RoomIdentity};
pub use signaling::{
    EnvelopeError, IceCandidate, IceServerConfig, SdpType, SessionDescription, SignalEnvelope,
    SignalKind, SignalPayload,
};
