use crate::error::SessionError;
use crate::media::MediaStream;
use studymesh_core::{ConnectionState, MediaSettings, Participant, PeerId, RemoteStream};
use tokio::sync::mpsc;
use tracing::trace;

/// Everything a room session reports to its consumer.
#[derive(Debug)]
pub enum SessionEvent {
    LocalStreamReady(MediaStream),
    LocalMediaChanged(MediaSettings),
    ParticipantJoined(Participant),
    ParticipantLeft(Participant),
    ParticipantUpdated(Participant),
    StreamReceived {
        peer_id: PeerId,
        stream: RemoteStream,
    },
    StreamRemoved {
        peer_id: PeerId,
        stream: Option<RemoteStream>,
    },
    ConnectionStateChanged {
        peer_id: PeerId,
        state: ConnectionState,
    },
    Error(SessionError),
}

pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

/// Sending half of the session event stream.
#[derive(Clone)]
pub struct EventEmitter {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, SessionEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: SessionEvent) {
        if let Err(e) = self.tx.send(event) {
            trace!("Session event dropped, consumer is gone: {:?}", e.0);
        }
    }
}
