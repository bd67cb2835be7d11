use crate::error::TransportError;
use crate::signaling::{SignalingTransport, TransportEvent, TransportEvents};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use studymesh_core::{PeerId, PresenceDescriptor, RoomId, SignalEnvelope};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct Member {
    tx: mpsc::UnboundedSender<TransportEvent>,
    presence: Option<PresenceDescriptor>,
}

type RoomMembers = DashMap<PeerId, Member>;

/// In-process pub/sub with presence. Each participant talks to the hub
/// through its own [`LocalTransport`] endpoint.
#[derive(Clone, Default)]
pub struct LocalSignalingHub {
    rooms: Arc<DashMap<RoomId, Arc<RoomMembers>>>,
}

impl LocalSignalingHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(&self, peer_id: PeerId) -> LocalTransport {
        LocalTransport {
            hub: self.clone(),
            peer_id,
            room: Mutex::new(None),
        }
    }

    /// Ids of the members currently subscribed to `room_id`.
    pub fn members(&self, room_id: &RoomId) -> Vec<PeerId> {
        self.rooms
            .get(room_id)
            .map(|room| room.iter().map(|entry| entry.key().clone()).collect())
            .unwrap_or_default()
    }

    fn room(&self, room_id: &RoomId) -> Arc<RoomMembers> {
        self.rooms
            .entry(room_id.clone())
            .or_insert_with(|| Arc::new(DashMap::new()))
            .clone()
    }

    fn fan_out(&self, room: &RoomMembers, except: &PeerId, event: TransportEvent) {
        // Collect first so the map guard is not held while sending.
        let targets: Vec<_> = room
            .iter()
            .filter(|entry| entry.key() != except)
            .map(|entry| (entry.key().clone(), entry.value().tx.clone()))
            .collect();

        for (peer_id, tx) in targets {
            if tx.send(event.clone()).is_err() {
                debug!("Dropping event for detached member {}", peer_id);
            }
        }
    }
}

/// One member's endpoint on a [`LocalSignalingHub`].
pub struct LocalTransport {
    hub: LocalSignalingHub,
    peer_id: PeerId,
    room: Mutex<Option<RoomId>>,
}

impl LocalTransport {
    fn current_room(&self) -> Option<RoomId> {
        self.room.lock().ok().and_then(|room| room.clone())
    }

    fn set_room(&self, room_id: Option<RoomId>) {
        if let Ok(mut room) = self.room.lock() {
            *room = room_id;
        }
    }
}

#[async_trait]
impl SignalingTransport for LocalTransport {
    async fn subscribe(&self, room_id: &RoomId) -> Result<TransportEvents, TransportError> {
        if let Some(previous) = self.current_room() {
            if &previous != room_id {
                self.unsubscribe().await;
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let room = self.hub.room(room_id);
        let presence = room
            .remove(&self.peer_id)
            .and_then(|(_, member)| member.presence);
        room.insert(self.peer_id.clone(), Member { tx, presence });
        self.set_room(Some(room_id.clone()));

        info!("{} subscribed to room '{}'", self.peer_id, room_id);
        Ok(rx)
    }

    async fn broadcast(&self, envelope: SignalEnvelope) -> Result<(), TransportError> {
        let room_id = self.current_room().ok_or(TransportError::NotSubscribed)?;
        let room = self.hub.room(&room_id);
        self.hub
            .fan_out(&room, &self.peer_id, TransportEvent::Envelope(envelope));
        Ok(())
    }

    async fn track_presence(&self, descriptor: PresenceDescriptor) -> Result<(), TransportError> {
        let room_id = self.current_room().ok_or(TransportError::NotSubscribed)?;
        let room = self.hub.room(&room_id);

        let first_track = {
            let Some(mut member) = room.get_mut(&self.peer_id) else {
                return Err(TransportError::NotSubscribed);
            };
            let first = member.presence.is_none();
            member.presence = Some(descriptor.clone());
            first
        };

        if first_track {
            self.hub
                .fan_out(&room, &self.peer_id, TransportEvent::PresenceJoined(descriptor));
        }
        Ok(())
    }

    async fn unsubscribe(&self) {
        let Some(room_id) = self.current_room() else {
            return;
        };
        self.set_room(None);

        let room = self.hub.room(&room_id);
        let Some((_, member)) = room.remove(&self.peer_id) else {
            warn!("{} was not a member of room '{}'", self.peer_id, room_id);
            return;
        };

        if member.presence.is_some() {
            self.hub.fan_out(
                &room,
                &self.peer_id,
                TransportEvent::PresenceLeft(self.peer_id.clone()),
            );
        }
        info!("{} unsubscribed from room '{}'", self.peer_id, room_id);
    }
}
