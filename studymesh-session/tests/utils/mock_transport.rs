use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use studymesh_core::{PresenceDescriptor, RoomId, SignalEnvelope, SignalKind};
use studymesh_session::{SignalingTransport, TransportError, TransportEvent, TransportEvents};
use tokio::sync::mpsc;

#[derive(Default)]
struct MockState {
    inbound: Option<mpsc::UnboundedSender<TransportEvent>>,
    sent: Vec<SignalEnvelope>,
    presence: Option<PresenceDescriptor>,
    fail_subscribe: bool,
    subscriptions: usize,
    unsubscribed: usize,
}

/// Transport that records everything the session sends and lets the test
/// play the rest of the room.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let transport = Self::default();
        transport.state.lock().unwrap().fail_subscribe = true;
        transport
    }

    /// Delivers an event as if it came from the room. Returns `false` when
    /// the session is not subscribed.
    pub fn inject(&self, event: TransportEvent) -> bool {
        let state = self.state.lock().unwrap();
        match &state.inbound {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    pub fn deliver(&self, envelope: SignalEnvelope) -> bool {
        self.inject(TransportEvent::Envelope(envelope))
    }

    pub fn sent(&self) -> Vec<SignalEnvelope> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_of(&self, kind: SignalKind) -> Vec<SignalEnvelope> {
        self.sent().into_iter().filter(|e| e.kind() == kind).collect()
    }

    pub fn clear_sent(&self) {
        self.state.lock().unwrap().sent.clear();
    }

    pub fn presence(&self) -> Option<PresenceDescriptor> {
        self.state.lock().unwrap().presence.clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.state.lock().unwrap().inbound.is_some()
    }

    pub fn subscriptions(&self) -> usize {
        self.state.lock().unwrap().subscriptions
    }

    pub fn unsubscribed(&self) -> usize {
        self.state.lock().unwrap().unsubscribed
    }
}

#[async_trait]
impl SignalingTransport for MockTransport {
    async fn subscribe(&self, room_id: &RoomId) -> Result<TransportEvents, TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_subscribe {
            return Err(TransportError::Subscribe {
                room: room_id.to_string(),
                reason: "channel rejected".into(),
            });
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.inbound = Some(tx);
        state.subscriptions += 1;
        Ok(rx)
    }

    async fn broadcast(&self, envelope: SignalEnvelope) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.inbound.is_none() {
            return Err(TransportError::NotSubscribed);
        }
        state.sent.push(envelope);
        Ok(())
    }

    async fn track_presence(&self, descriptor: PresenceDescriptor) -> Result<(), TransportError> {
        self.state.lock().unwrap().presence = Some(descriptor);
        Ok(())
    }

    async fn unsubscribe(&self) {
        let mut state = self.state.lock().unwrap();
        state.inbound = None;
        state.presence = None;
        state.unsubscribed += 1;
    }
}
