use crate::config::SessionConfig;
use crate::connection::{ConnectionEvent, PeerConnector};
use crate::error::SessionError;
use crate::events::{EventEmitter, SessionEvent};
use crate::media::{MediaController, MediaDevices, MediaStream};
use crate::peer::{LinkUpdate, PeerSessionManager, ReconnectDecision, ReconnectDue, ReconnectSupervisor};
use crate::room::{Roster, RosterUpdate, SessionCommand, SessionState};
use crate::signaling::{SignalingTransport, TransportEvent, TransportEvents};
use std::sync::Arc;
use studymesh_core::{
    MediaSettings, PeerId, PresenceDescriptor, RoomIdentity, SignalEnvelope, SignalPayload,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// The task behind a [`crate::RoomSession`]. Owns every piece of protocol
/// state and handles one command or event at a time.
pub(crate) struct SessionActor {
    identity: RoomIdentity,
    transport: Arc<dyn SignalingTransport>,
    media: MediaController,
    peers: PeerSessionManager,
    reconnect: ReconnectSupervisor,
    roster: Roster,
    events: EventEmitter,

    state_tx: watch::Sender<SessionState>,
    media_tx: watch::Sender<MediaSettings>,

    command_rx: mpsc::Receiver<SessionCommand>,
    /// Present only while subscribed to the room.
    transport_rx: Option<TransportEvents>,
    connection_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
    due_rx: mpsc::UnboundedReceiver<ReconnectDue>,

    /// Fired with the stream id when a screen capture ends on its own.
    screen_ended_tx: mpsc::UnboundedSender<String>,
    screen_ended_rx: mpsc::UnboundedReceiver<String>,
    screen_hook: Option<JoinHandle<()>>,
}

pub(crate) struct ActorParts {
    pub identity: RoomIdentity,
    pub config: SessionConfig,
    pub transport: Arc<dyn SignalingTransport>,
    pub connector: Arc<dyn PeerConnector>,
    pub devices: Arc<dyn MediaDevices>,
    pub roster: Roster,
    pub events: EventEmitter,
    pub state_tx: watch::Sender<SessionState>,
    pub media_tx: watch::Sender<MediaSettings>,
    pub command_rx: mpsc::Receiver<SessionCommand>,
}

impl SessionActor {
    pub(crate) fn new(parts: ActorParts) -> Self {
        let ActorParts {
            identity,
            config,
            transport,
            connector,
            devices,
            roster,
            events,
            state_tx,
            media_tx,
            command_rx,
        } = parts;

        // Internal channels: connection callbacks, reconnect timers and the screen hook
        let (connection_tx, connection_rx) = mpsc::unbounded_channel();
        let (due_tx, due_rx) = mpsc::unbounded_channel();
        let (screen_ended_tx, screen_ended_rx) = mpsc::unbounded_channel();

        let peers = PeerSessionManager::new(
            identity.presence(),
            config.ice_servers.clone(),
            transport.clone(),
            connector,
            events.clone(),
            connection_tx,
        );
        let reconnect = ReconnectSupervisor::new(
            config.reconnect_backoff(),
            config.max_reconnect_attempts,
            due_tx,
        );

        Self {
            identity,
            transport,
            media: MediaController::new(devices),
            peers,
            reconnect,
            roster,
            events,
            state_tx,
            media_tx,
            command_rx,
            transport_rx: None,
            connection_rx,
            due_rx,
            screen_ended_tx,
            screen_ended_rx,
            screen_hook: None,
        }
    }

    /// Main loop. Ends once every handle is dropped, leaving the room first
    /// if still joined.
    pub(crate) async fn run(mut self) {
        info!(
            "Session task for {} in room '{}' started",
            self.identity.local_peer_id, self.identity.room_id
        );

        loop {
            tokio::select! {
                // Commands from RoomSession handles
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => {
                            info!("All session handles dropped");
                            break;
                        }
                    }
                }

                // Signals and presence of the room; pending while not subscribed
                event = next_transport_event(&mut self.transport_rx) => {
                    match event {
                        Some(event) => self.handle_transport_event(event).await,
                        None => {
                            warn!("Signaling channel of room '{}' closed", self.identity.room_id);
                            self.transport_rx = None;
                        }
                    }
                }

                // Peer connection callbacks, tagged with their link epoch
                Some(event) = self.connection_rx.recv() => {
                    self.handle_connection_event(event).await;
                }

                // Reconnect backoff elapsed
                Some(due) = self.due_rx.recv() => {
                    self.handle_reconnect_due(due).await;
                }

                // Screen capture stopped from outside the session
                Some(stream_id) = self.screen_ended_rx.recv() => {
                    self.handle_screen_ended(stream_id).await;
                }
            }
        }

        if self.state() == SessionState::Joined {
            self.leave_room().await;
        }
        self.media.release_all();
        info!("Session task for {} finished", self.identity.local_peer_id);
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Join { settings, reply } => {
                let result = self.join(settings).await;
                let _ = reply.send(result);
            }

            SessionCommand::Leave { reply } => {
                let result = match self.state() {
                    SessionState::Joined => {
                        self.leave_room().await;
                        Ok(())
                    }
                    state => Err(SessionError::InvalidState {
                        operation: "leave",
                        state,
                    }),
                };
                let _ = reply.send(result);
            }

            SessionCommand::ToggleAudio { reply } => {
                let enabled = self.media.toggle_audio();
                self.media_changed().await;
                let _ = reply.send(enabled);
            }

            SessionCommand::ToggleVideo { reply } => {
                let enabled = self.media.toggle_video();
                self.media_changed().await;
                let _ = reply.send(enabled);
            }

            SessionCommand::StartScreenShare { reply } => {
                let stream = self.start_screen_share().await;
                let _ = reply.send(stream);
            }

            SessionCommand::StopScreenShare { reply } => {
                let stopped = self.stop_screen_share().await;
                let _ = reply.send(stopped);
            }

            SessionCommand::SetSpeaking { peer_id, speaking } => {
                self.set_speaking(&peer_id, speaking);
            }
        }
    }

    async fn join(&mut self, settings: MediaSettings) -> Result<(), SessionError> {
        let state = self.state();
        if state != SessionState::Idle {
            return Err(SessionError::InvalidState {
                operation: "join",
                state,
            });
        }

        self.set_state(SessionState::Joining);
        info!(
            "{} joining room '{}'",
            self.identity.display_name, self.identity.room_id
        );

        if settings.wants_capture() {
            match self.media.acquire_local(settings).await {
                Ok(stream) => self.events.emit(SessionEvent::LocalStreamReady(stream)),
                Err(e) => {
                    warn!("Local capture unavailable, joining receive-only: {}", e);
                    self.events.emit(SessionEvent::Error(e.into()));
                }
            }
            self.media_changed().await;
        }

        let transport_rx = match self.transport.subscribe(&self.identity.room_id).await {
            Ok(rx) => rx,
            Err(e) => {
                error!("Failed to subscribe to room '{}': {}", self.identity.room_id, e);
                self.media.release_all();
                self.media_changed().await;
                self.set_state(SessionState::Idle);
                self.events
                    .emit(SessionEvent::Error(SessionError::Transport(e.clone())));
                return Err(e.into());
            }
        };
        self.transport_rx = Some(transport_rx);

        if let Err(e) = self.transport.track_presence(self.identity.presence()).await {
            warn!("Presence tracking failed, relying on join announcements: {}", e);
        }

        // Explicit join as well as presence, whichever reaches peers first
        self.set_state(SessionState::Joined);
        self.peers.broadcast(SignalPayload::Join).await;
        self.announce_media().await;

        info!("Joined room '{}'", self.identity.room_id);
        Ok(())
    }

    /// Tears everything down and returns to `Idle`. After it returns no
    /// remote event of this membership is processed.
    async fn leave_room(&mut self) {
        self.set_state(SessionState::Leaving);
        info!("Leaving room '{}'", self.identity.room_id);

        self.peers.broadcast(SignalPayload::Leave).await;
        self.reconnect.cancel_all();
        self.peers.close_all().await;

        for participant in self.roster.drain() {
            if let Some(stream) = participant.stream.clone() {
                self.events.emit(SessionEvent::StreamRemoved {
                    peer_id: participant.peer_id.clone(),
                    stream: Some(stream),
                });
            }
            self.events
                .emit(SessionEvent::ParticipantLeft(participant));
        }

        self.disarm_screen_hook();
        self.media.release_all();
        self.media_changed().await;

        self.transport.unsubscribe().await;
        self.transport_rx = None;

        // Anything still queued belongs to links that no longer exist.
        while self.connection_rx.try_recv().is_ok() {}
        while self.due_rx.try_recv().is_ok() {}
        while self.screen_ended_rx.try_recv().is_ok() {}

        self.set_state(SessionState::Idle);
        info!("Left room '{}'", self.identity.room_id);
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        if self.state() != SessionState::Joined {
            trace!("Transport event outside of a membership dropped");
            return;
        }

        match event {
            TransportEvent::Envelope(envelope) => self.handle_envelope(envelope).await,
            TransportEvent::PresenceJoined(descriptor) => {
                if descriptor.peer_id != self.identity.local_peer_id {
                    self.peer_discovered(descriptor).await;
                }
            }
            TransportEvent::PresenceLeft(peer_id) => {
                if peer_id != self.identity.local_peer_id {
                    self.remote_left(&peer_id).await;
                }
            }
        }
    }

    async fn handle_envelope(&mut self, envelope: SignalEnvelope) {
        if !envelope.is_for(&self.identity.local_peer_id) {
            trace!("{:?} envelope not addressed to us", envelope.kind());
            return;
        }

        let sender = envelope.sender();
        match envelope.payload {
            SignalPayload::Join => self.peer_discovered(sender).await,
            SignalPayload::Offer(offer) => {
                let tracks = self.media.outgoing_tracks();
                self.peers
                    .handle_offer(&self.roster, sender, offer, &tracks)
                    .await;
            }
            SignalPayload::Answer(answer) => {
                self.peers.handle_answer(&sender.peer_id, answer).await;
            }
            SignalPayload::IceCandidate(candidate) => {
                self.peers
                    .handle_ice_candidate(&sender.peer_id, candidate)
                    .await;
            }
            SignalPayload::MediaState(settings) => {
                self.peers
                    .handle_media_state(&self.roster, &sender.peer_id, settings);
            }
            SignalPayload::Leave => self.remote_left(&sender.peer_id).await,
        }
    }

    async fn peer_discovered(&mut self, descriptor: PresenceDescriptor) {
        let peer_id = descriptor.peer_id.clone();
        if !self.peers.has_link(&peer_id) {
            self.reconnect.cancel(&peer_id);
        }

        let tracks = self.media.outgoing_tracks();
        let is_new = self
            .peers
            .peer_discovered(&self.roster, descriptor, &tracks)
            .await;
        if is_new {
            self.announce_media().await;
        }
    }

    async fn remote_left(&mut self, peer_id: &PeerId) {
        self.reconnect.forget(peer_id);
        self.peers.handle_remote_leave(&self.roster, peer_id).await;
    }

    async fn handle_connection_event(&mut self, event: ConnectionEvent) {
        if self.state() != SessionState::Joined {
            return;
        }

        match self.peers.handle_connection_event(&self.roster, event).await {
            LinkUpdate::Connected(peer_id) => {
                info!("Link to {} established", peer_id);
                self.reconnect.connected(&peer_id);
            }
            LinkUpdate::Lost(peer_id) => self.schedule_reconnect(&peer_id),
            LinkUpdate::Unchanged => {}
        }
    }

    fn schedule_reconnect(&mut self, peer_id: &PeerId) {
        match self.reconnect.schedule(peer_id) {
            ReconnectDecision::Scheduled { attempt } => {
                info!("Will reconnect to {} (attempt {})", peer_id, attempt);
            }
            ReconnectDecision::AlreadyPending => {
                debug!("Reconnect to {} already pending", peer_id);
            }
            ReconnectDecision::Exhausted { attempts } => {
                error!("Giving up on {} after {} attempts", peer_id, attempts);
                self.events
                    .emit(SessionEvent::Error(SessionError::ReconnectExhausted {
                        peer_id: peer_id.clone(),
                        attempts,
                    }));
            }
        }
    }

    async fn handle_reconnect_due(&mut self, due: ReconnectDue) {
        if !self.reconnect.take_due(&due) {
            debug!("Cancelled reconnect to {} ignored", due.peer_id);
            return;
        }
        if self.state() != SessionState::Joined {
            return;
        }

        let peer_id = due.peer_id;
        if !self.roster.contains(&peer_id) {
            debug!("Peer {} left before reconnecting", peer_id);
            return;
        }
        if self.peers.has_link(&peer_id) {
            debug!("Peer {} relinked on its own", peer_id);
            return;
        }

        info!("Reconnecting to {}", peer_id);
        let tracks = self.media.outgoing_tracks();
        if !self.peers.offer_to(&peer_id, &tracks).await {
            self.schedule_reconnect(&peer_id);
        }
    }

    async fn start_screen_share(&mut self) -> Option<MediaStream> {
        let already_sharing = self.media.is_sharing_screen();
        let stream = self.media.start_screen_share().await?;
        if already_sharing {
            return Some(stream);
        }

        let video = self.media.outgoing_video();
        let replaced = self.peers.replace_outgoing_video(video.as_ref()).await;
        debug!("Screen share sent on {} links", replaced);

        self.arm_screen_hook(&stream);
        self.media_changed().await;
        Some(stream)
    }

    async fn stop_screen_share(&mut self) -> bool {
        self.disarm_screen_hook();
        if !self.media.stop_screen_share() {
            return false;
        }

        let video = self.media.outgoing_video();
        let replaced = self.peers.replace_outgoing_video(video.as_ref()).await;
        debug!("Camera restored on {} links", replaced);

        self.media_changed().await;
        true
    }

    async fn handle_screen_ended(&mut self, stream_id: String) {
        let current = self
            .media
            .screen_stream()
            .is_some_and(|stream| stream.id() == stream_id);
        if current {
            info!("Screen capture ended outside the session");
            self.stop_screen_share().await;
        }
    }

    fn arm_screen_hook(&mut self, stream: &MediaStream) {
        self.disarm_screen_hook();
        let Some(track) = stream.video_track().cloned() else {
            return;
        };

        let tx = self.screen_ended_tx.clone();
        let stream_id = stream.id().to_string();
        self.screen_hook = Some(tokio::spawn(async move {
            track.ended().await;
            let _ = tx.send(stream_id);
        }));
    }

    fn disarm_screen_hook(&mut self) {
        if let Some(hook) = self.screen_hook.take() {
            hook.abort();
        }
    }

    fn set_speaking(&self, peer_id: &PeerId, speaking: bool) {
        let update = self.roster.update(peer_id, |p| {
            let changed = p.is_speaking != speaking;
            p.is_speaking = speaking;
            changed
        });
        if let RosterUpdate::Changed(participant) = update {
            self.events
                .emit(SessionEvent::ParticipantUpdated(participant));
        }
    }

    /// Publishes the flags derived from the live tracks, broadcasting them
    /// when they moved during a membership.
    async fn media_changed(&mut self) {
        let settings = self.media.settings();
        let changed = self.media_tx.send_if_modified(|current| {
            let moved = *current != settings;
            *current = settings;
            moved
        });
        if !changed {
            return;
        }

        self.events
            .emit(SessionEvent::LocalMediaChanged(settings));
        if self.state() == SessionState::Joined {
            self.peers
                .broadcast(SignalPayload::MediaState(settings))
                .await;
        }
    }

    async fn announce_media(&self) {
        self.peers
            .broadcast(SignalPayload::MediaState(self.media.settings()))
            .await;
    }

    fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: SessionState) {
        debug!("Session state -> {}", state);
        self.state_tx.send_replace(state);
    }
}

impl Drop for SessionActor {
    fn drop(&mut self) {
        self.disarm_screen_hook();
    }
}

async fn next_transport_event(rx: &mut Option<TransportEvents>) -> Option<TransportEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
