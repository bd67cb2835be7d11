use crate::error::TransportError;
use async_trait::async_trait;
use studymesh_core::{PeerId, PresenceDescriptor, RoomId, SignalEnvelope};
use tokio::sync::mpsc;

/// Inbound traffic of a room channel.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Envelope(SignalEnvelope),
    PresenceJoined(PresenceDescriptor),
    PresenceLeft(PeerId),
}

pub type TransportEvents = mpsc::UnboundedReceiver<TransportEvent>;

/// Room-scoped pub/sub channel with presence, implemented outside the session core.
///
/// Delivery is at-least-once and unordered. Broadcasts reach every other
/// subscriber of the room, never the sender itself.
#[async_trait]
pub trait SignalingTransport: Send + Sync + 'static {
    /// Subscribes to the room channel. Resolves once the subscription is
    /// ready; subscribing again replaces the previous event stream.
    async fn subscribe(&self, room_id: &RoomId) -> Result<TransportEvents, TransportError>;

    async fn broadcast(&self, envelope: SignalEnvelope) -> Result<(), TransportError>;

    /// Publishes the local member through presence. Other members observe
    /// a single `PresenceJoined` for it.
    async fn track_presence(&self, descriptor: PresenceDescriptor) -> Result<(), TransportError>;

    /// Leaves the channel. No events are delivered after this returns.
    async fn unsubscribe(&self);
}
