use crate::config::SessionConfig;
use crate::connection::PeerConnector;
use crate::error::SessionError;
use crate::events::{EventEmitter, SessionEvents};
use crate::media::{MediaDevices, MediaStream};
use crate::room::session_actor::{ActorParts, SessionActor};
use crate::room::{Reply, Roster, SessionCommand, SessionState};
use crate::signaling::SignalingTransport;
use std::sync::Arc;
use studymesh_core::{MediaSettings, Participant, PeerId, RoomIdentity};
use tokio::sync::{mpsc, oneshot, watch};

/// Platform capabilities a session is built on.
#[derive(Clone)]
pub struct SessionDeps {
    pub transport: Arc<dyn SignalingTransport>,
    pub connector: Arc<dyn PeerConnector>,
    pub devices: Arc<dyn MediaDevices>,
}

/// Handle to one participant's membership in a study room.
///
/// Cloning is cheap; all clones drive the same session. The session task
/// runs until the last handle is dropped, leaving the room if needed.
#[derive(Clone)]
pub struct RoomSession {
    identity: Arc<RoomIdentity>,
    commands: mpsc::Sender<SessionCommand>,
    roster: Roster,
    state: watch::Receiver<SessionState>,
    media: watch::Receiver<MediaSettings>,
}

impl RoomSession {
    /// Spawns the session task on the current tokio runtime.
    pub fn new(
        identity: RoomIdentity,
        config: SessionConfig,
        deps: SessionDeps,
    ) -> (Self, SessionEvents) {
        let (events, event_rx) = EventEmitter::new();
        let (commands, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let (state_tx, state) = watch::channel(SessionState::Idle);
        let (media_tx, media) = watch::channel(MediaSettings::default());
        let roster = Roster::new();

        let actor = SessionActor::new(ActorParts {
            identity: identity.clone(),
            config,
            transport: deps.transport,
            connector: deps.connector,
            devices: deps.devices,
            roster: roster.clone(),
            events,
            state_tx,
            media_tx,
            command_rx,
        });
        tokio::spawn(actor.run());

        let session = Self {
            identity: Arc::new(identity),
            commands,
            roster,
            state,
            media,
        };
        (session, event_rx)
    }

    /// Captures the requested media and enters the room. Capture failures
    /// only downgrade the session to receive-only; they are reported on the
    /// event stream.
    pub async fn join(&self, settings: MediaSettings) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Join { settings, reply })
            .await?
    }

    pub async fn leave(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Leave { reply }).await?
    }

    /// Returns the new microphone state, `false` if there is no microphone.
    pub async fn toggle_audio(&self) -> bool {
        self.request(|reply| SessionCommand::ToggleAudio { reply })
            .await
            .unwrap_or(false)
    }

    /// Returns the new camera state, `false` if there is no camera.
    pub async fn toggle_video(&self) -> bool {
        self.request(|reply| SessionCommand::ToggleVideo { reply })
            .await
            .unwrap_or(false)
    }

    pub async fn start_screen_share(&self) -> Option<MediaStream> {
        self.request(|reply| SessionCommand::StartScreenShare { reply })
            .await
            .ok()
            .flatten()
    }

    /// Returns whether a share was running.
    pub async fn stop_screen_share(&self) -> bool {
        self.request(|reply| SessionCommand::StopScreenShare { reply })
            .await
            .unwrap_or(false)
    }

    pub async fn set_speaking(&self, peer_id: PeerId, speaking: bool) -> Result<(), SessionError> {
        self.commands
            .send(SessionCommand::SetSpeaking { peer_id, speaking })
            .await
            .map_err(|_| SessionError::SessionClosed)
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub async fn wait_for_state(&self, target: SessionState) -> Result<(), SessionError> {
        let mut state = self.state.clone();
        state
            .wait_for(|current| *current == target)
            .await
            .map(|_| ())
            .map_err(|_| SessionError::SessionClosed)
    }

    /// Local flags, as derived from the live tracks.
    pub fn media_settings(&self) -> MediaSettings {
        *self.media.borrow()
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.roster.snapshot()
    }

    pub fn participant(&self, peer_id: &PeerId) -> Option<Participant> {
        self.roster.get(peer_id)
    }

    pub fn identity(&self) -> &RoomIdentity {
        &self.identity
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| SessionError::SessionClosed)?;
        response.await.map_err(|_| SessionError::SessionClosed)
    }
}
