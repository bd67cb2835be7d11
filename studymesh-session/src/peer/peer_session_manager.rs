use crate::connection::{
    ConnectionEvent, ConnectionEventKind, ConnectionEvents, ConnectionParams, PeerConnector,
};
use crate::error::{ConnectionError, SessionError};
use crate::events::{EventEmitter, SessionEvent};
use crate::media::LocalTrack;
use crate::peer::{CandidateQueue, LinkRole, PeerLink};
use crate::room::{Roster, RosterUpdate};
use crate::signaling::SignalingTransport;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use studymesh_core::{
    ConnectionState, IceCandidate, IceServerConfig, MediaSettings, Participant, PeerId,
    PresenceDescriptor, RemoteStream, RemoteTrack, SdpType, SessionDescription, SignalEnvelope,
    SignalPayload,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// What a connection event meant for the link it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkUpdate {
    Unchanged,
    Connected(PeerId),
    /// The link failed and was discarded.
    Lost(PeerId),
}

/// Owns every peer link of a session and runs the offer/answer/ICE
/// exchange for each of them.
///
/// Creation is first-writer-wins: at most one link exists per peer id, so
/// a second announcement of the same peer (presence and explicit join,
/// duplicated deliveries) never opens a second connection.
pub struct PeerSessionManager {
    local: PresenceDescriptor,
    ice_servers: Vec<IceServerConfig>,
    transport: Arc<dyn SignalingTransport>,
    connector: Arc<dyn PeerConnector>,
    connection_tx: mpsc::UnboundedSender<ConnectionEvent>,
    events: EventEmitter,
    links: HashMap<PeerId, PeerLink>,
    candidates: CandidateQueue,
    /// Every remote offer SDP seen per peer, across link replacements.
    seen_offers: HashMap<PeerId, HashSet<String>>,
    early_media: HashMap<PeerId, MediaSettings>,
    departed: HashSet<PeerId>,
    next_epoch: u64,
}

impl PeerSessionManager {
    pub fn new(
        local: PresenceDescriptor,
        ice_servers: Vec<IceServerConfig>,
        transport: Arc<dyn SignalingTransport>,
        connector: Arc<dyn PeerConnector>,
        events: EventEmitter,
        connection_tx: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self {
        Self {
            local,
            ice_servers,
            transport,
            connector,
            connection_tx,
            events,
            links: HashMap::new(),
            candidates: CandidateQueue::new(),
            seen_offers: HashMap::new(),
            early_media: HashMap::new(),
            departed: HashSet::new(),
            next_epoch: 0,
        }
    }

    pub fn has_link(&self, peer_id: &PeerId) -> bool {
        self.links.contains_key(peer_id)
    }

    /// A remote peer announced itself (presence or explicit join).
    /// Returns whether its participant entry is new.
    pub async fn peer_discovered(
        &mut self,
        roster: &Roster,
        descriptor: PresenceDescriptor,
        tracks: &[LocalTrack],
    ) -> bool {
        let peer_id = descriptor.peer_id.clone();
        self.departed.remove(&peer_id);
        let is_new = self.ensure_participant(roster, descriptor);

        if self.links.contains_key(&peer_id) {
            debug!("Peer {} already linked, announcement ignored", peer_id);
            return is_new;
        }
        self.offer_to(&peer_id, tracks).await;
        is_new
    }

    /// Opens a link as the offering side. Returns whether the offer went out.
    pub async fn offer_to(&mut self, peer_id: &PeerId, tracks: &[LocalTrack]) -> bool {
        if self.links.contains_key(peer_id) {
            return true;
        }

        let mut link = match self.open_link(peer_id, LinkRole::Offerer, tracks).await {
            Ok(link) => link,
            Err(e) => {
                report_failure(&self.events, peer_id, e);
                return false;
            }
        };

        let offer = match create_local_offer(&link).await {
            Ok(offer) => offer,
            Err(e) => {
                link.close().await;
                report_failure(&self.events, peer_id, e);
                return false;
            }
        };

        self.links.insert(peer_id.clone(), link);
        info!("Sending offer to {}", peer_id);
        self.send(Some(peer_id.clone()), SignalPayload::Offer(offer))
            .await;
        true
    }

    pub async fn handle_offer(
        &mut self,
        roster: &Roster,
        sender: PresenceDescriptor,
        offer: SessionDescription,
        tracks: &[LocalTrack],
    ) {
        let peer_id = sender.peer_id.clone();
        if self.departed.contains(&peer_id) {
            debug!("Offer from departed peer {} dropped", peer_id);
            return;
        }
        if offer.sdp_type != SdpType::Offer {
            warn!("Offer envelope from {} carries an {:?}", peer_id, offer.sdp_type);
            return;
        }
        // Redelivered offers, including ones lost to glare or made for a
        // link that was replaced since, must never restart a settled link.
        let first_seen = self
            .seen_offers
            .entry(peer_id.clone())
            .or_default()
            .insert(offer.sdp.clone());
        if !first_seen {
            debug!("Duplicate offer from {} dropped", peer_id);
            return;
        }
        self.ensure_participant(roster, sender);

        if let Some(link) = self.links.get(&peer_id) {
            // Both sides offered: the greater id keeps its offer
            if link.awaiting_answer() && self.local.peer_id > peer_id {
                debug!("Glare with {}: keeping our own offer", peer_id);
                return;
            }
            if let Some(mut old) = self.links.remove(&peer_id) {
                info!(
                    "Replacing {:?} link to {} ({:?}) to accept its new offer",
                    old.role(),
                    peer_id,
                    old.state()
                );
                old.close().await;
            }
        }

        let mut link = match self.open_link(&peer_id, LinkRole::Answerer, tracks).await {
            Ok(link) => link,
            Err(e) => {
                report_failure(&self.events, &peer_id, e);
                return;
            }
        };

        if let Err(e) = link.connection().set_remote_description(offer.clone()).await {
            link.close().await;
            report_failure(&self.events, &peer_id, e);
            return;
        }
        link.remote_description_applied(&offer);
        // Candidates that overtook the offer
        apply_candidates(&link, self.candidates.take(&peer_id)).await;

        let answer = match create_local_answer(&link).await {
            Ok(answer) => answer,
            Err(e) => {
                link.close().await;
                report_failure(&self.events, &peer_id, e);
                return;
            }
        };

        self.links.insert(peer_id.clone(), link);
        info!("Answering offer from {}", peer_id);
        self.send(Some(peer_id), SignalPayload::Answer(answer)).await;
    }

    pub async fn handle_answer(&mut self, peer_id: &PeerId, answer: SessionDescription) {
        if answer.sdp_type != SdpType::Answer {
            warn!("Answer envelope from {} carries an {:?}", peer_id, answer.sdp_type);
            return;
        }
        let Some(link) = self.links.get_mut(peer_id) else {
            debug!("Stale answer from {} dropped: no link", peer_id);
            return;
        };
        if !link.awaiting_answer() {
            debug!("Stale answer from {} dropped: no offer outstanding", peer_id);
            return;
        }

        let applied = link
            .connection()
            .set_remote_description(answer.clone())
            .await;
        if let Err(e) = applied {
            report_failure(&self.events, peer_id, e);
            return;
        }
        link.remote_description_applied(&answer);
        apply_candidates(link, self.candidates.take(peer_id)).await;
        debug!("Answer from {} applied", peer_id);
    }

    pub async fn handle_ice_candidate(&mut self, peer_id: &PeerId, candidate: IceCandidate) {
        if self.departed.contains(peer_id) {
            debug!("ICE candidate from departed peer {} dropped", peer_id);
            return;
        }

        // A candidate for a newer session of the peer waits for the link
        // that will replace the current one.
        match self.links.get(peer_id) {
            Some(link) if link.accepts_candidate(&candidate) => {
                apply_candidates(link, vec![candidate]).await;
            }
            _ => {
                let queued = self.candidates.push(peer_id.clone(), candidate);
                debug!("Queued ICE candidate from {} ({} pending)", peer_id, queued);
            }
        }
    }

    pub fn handle_media_state(&mut self, roster: &Roster, peer_id: &PeerId, settings: MediaSettings) {
        if self.departed.contains(peer_id) {
            return;
        }

        match roster.update(peer_id, |p| p.apply_media(settings)) {
            RosterUpdate::Changed(participant) => {
                self.events
                    .emit(SessionEvent::ParticipantUpdated(participant));
            }
            RosterUpdate::Unchanged => {}
            RosterUpdate::Missing => {
                debug!("Media state from unknown peer {} kept for later", peer_id);
                self.early_media.insert(peer_id.clone(), settings);
            }
        }
    }

    /// The remote peer left, by explicit leave or presence. Safe to call
    /// repeatedly and for peers whose negotiation never finished.
    pub async fn handle_remote_leave(&mut self, roster: &Roster, peer_id: &PeerId) -> bool {
        self.departed.insert(peer_id.clone());
        self.seen_offers.remove(peer_id);
        self.early_media.remove(peer_id);
        let dropped = self.candidates.discard(peer_id);
        if dropped > 0 {
            debug!("Dropped {} queued candidates of departed peer {}", dropped, peer_id);
        }

        if let Some(mut link) = self.links.remove(peer_id) {
            link.close().await;
        }

        let Some(participant) = roster.remove(peer_id) else {
            return false;
        };
        if let Some(stream) = participant.stream.clone() {
            self.events.emit(SessionEvent::StreamRemoved {
                peer_id: peer_id.clone(),
                stream: Some(stream),
            });
        }
        info!("Peer {} left the room", peer_id);
        self.events
            .emit(SessionEvent::ParticipantLeft(participant));
        true
    }

    pub async fn handle_connection_event(
        &mut self,
        roster: &Roster,
        event: ConnectionEvent,
    ) -> LinkUpdate {
        let ConnectionEvent {
            peer_id,
            epoch,
            kind,
        } = event;

        let current = self
            .links
            .get(&peer_id)
            .is_some_and(|link| link.epoch() == epoch);
        if !current {
            debug!("Stale connection event for {} (epoch {}) ignored", peer_id, epoch);
            return LinkUpdate::Unchanged;
        }

        match kind {
            ConnectionEventKind::IceCandidate(candidate) => {
                self.send(Some(peer_id), SignalPayload::IceCandidate(candidate))
                    .await;
                LinkUpdate::Unchanged
            }
            ConnectionEventKind::Track(track) => {
                self.attach_remote_track(roster, &peer_id, track);
                LinkUpdate::Unchanged
            }
            ConnectionEventKind::StateChanged(state) => {
                self.events.emit(SessionEvent::ConnectionStateChanged {
                    peer_id: peer_id.clone(),
                    state,
                });
                match state {
                    ConnectionState::Connected => {
                        if let Some(link) = self.links.get_mut(&peer_id) {
                            link.mark_linked();
                        }
                        LinkUpdate::Connected(peer_id)
                    }
                    state if state.is_lost() => {
                        warn!("Link to {} is {:?}, discarding it", peer_id, state);
                        self.discard_lost_link(roster, &peer_id).await;
                        LinkUpdate::Lost(peer_id)
                    }
                    _ => LinkUpdate::Unchanged,
                }
            }
        }
    }

    /// Swaps the outgoing video on every link in place. No offer is sent.
    /// Returns how many links were updated.
    pub async fn replace_outgoing_video(&self, track: Option<&LocalTrack>) -> usize {
        let mut replaced = 0;
        for link in self.links.values() {
            match link.connection().replace_video_track(track).await {
                Ok(true) => replaced += 1,
                Ok(false) => {}
                Err(e) => warn!("Failed to replace video towards {}: {}", link.peer_id(), e),
            }
        }
        replaced
    }

    /// Sends a non-directed envelope from the local participant.
    pub async fn broadcast(&self, payload: SignalPayload) {
        self.send(None, payload).await;
    }

    /// Closes every link and forgets all per-peer negotiation state.
    pub async fn close_all(&mut self) {
        for (peer_id, mut link) in self.links.drain() {
            debug!("Closing link to {}", peer_id);
            link.close().await;
        }
        self.candidates.clear();
        self.seen_offers.clear();
        self.early_media.clear();
        self.departed.clear();
    }

    fn ensure_participant(&mut self, roster: &Roster, descriptor: PresenceDescriptor) -> bool {
        if roster.contains(&descriptor.peer_id) {
            return false;
        }

        let mut participant = Participant::placeholder(descriptor);
        if let Some(settings) = self.early_media.remove(&participant.peer_id) {
            participant.apply_media(settings);
        }
        roster.insert(participant.clone());
        info!("Participant {} ({}) joined", participant.name, participant.peer_id);
        self.events
            .emit(SessionEvent::ParticipantJoined(participant));
        true
    }

    async fn open_link(
        &mut self,
        peer_id: &PeerId,
        role: LinkRole,
        tracks: &[LocalTrack],
    ) -> Result<PeerLink, ConnectionError> {
        self.next_epoch += 1;
        let epoch = self.next_epoch;

        let events = ConnectionEvents::new(peer_id.clone(), epoch, self.connection_tx.clone());
        let params = ConnectionParams {
            peer_id: peer_id.clone(),
            ice_servers: self.ice_servers.clone(),
        };
        let connection = self.connector.connect(params, events).await?;

        let mut link = PeerLink::new(peer_id.clone(), epoch, role, connection);
        for track in tracks {
            if let Err(e) = link.connection().add_track(track).await {
                link.close().await;
                return Err(e);
            }
        }
        Ok(link)
    }

    fn attach_remote_track(&self, roster: &Roster, peer_id: &PeerId, track: RemoteTrack) {
        let update = roster.update(peer_id, |p| {
            if let Some(stream) = p.stream.as_mut() {
                return stream.add_track(track);
            }
            p.stream = Some(RemoteStream::from_track(track));
            true
        });

        if let RosterUpdate::Changed(Participant {
            stream: Some(stream),
            ..
        }) = update
        {
            self.events.emit(SessionEvent::StreamReceived {
                peer_id: peer_id.clone(),
                stream,
            });
        }
    }

    async fn discard_lost_link(&mut self, roster: &Roster, peer_id: &PeerId) {
        if let Some(mut link) = self.links.remove(peer_id) {
            link.close().await;
        }
        self.candidates.discard(peer_id);

        let mut removed = None;
        roster.update(peer_id, |p| {
            removed = p.stream.take();
            removed.is_some()
        });
        if let Some(stream) = removed {
            self.events.emit(SessionEvent::StreamRemoved {
                peer_id: peer_id.clone(),
                stream: Some(stream),
            });
        }
    }

    async fn send(&self, to: Option<PeerId>, payload: SignalPayload) {
        let envelope = match to {
            Some(to) => SignalEnvelope::directed(&self.local, to, payload),
            None => SignalEnvelope::broadcast(&self.local, payload),
        };
        let kind = envelope.kind();
        if let Err(e) = self.transport.broadcast(envelope).await {
            warn!("Failed to send {:?} signal: {}", kind, e);
        }
    }
}

async fn create_local_offer(link: &PeerLink) -> Result<SessionDescription, ConnectionError> {
    let offer = link.connection().create_offer().await?;
    link.connection()
        .set_local_description(offer.clone())
        .await?;
    Ok(offer)
}

async fn create_local_answer(link: &PeerLink) -> Result<SessionDescription, ConnectionError> {
    let answer = link.connection().create_answer().await?;
    link.connection()
        .set_local_description(answer.clone())
        .await?;
    Ok(answer)
}

async fn apply_candidates(link: &PeerLink, candidates: Vec<IceCandidate>) {
    for candidate in candidates {
        if !link.accepts_candidate(&candidate) {
            debug!(
                "Dropping ICE candidate for {} from another ICE session (ufrag {:?})",
                link.peer_id(),
                candidate.username_fragment
            );
            continue;
        }
        if let Err(e) = link.connection().add_ice_candidate(candidate).await {
            warn!("Failed to add ICE candidate for {}: {}", link.peer_id(), e);
        }
    }
}

fn report_failure(events: &EventEmitter, peer_id: &PeerId, source: ConnectionError) {
    error!("Negotiation with {} failed: {}", peer_id, source);
    events.emit(SessionEvent::Error(SessionError::Negotiation {
        peer_id: peer_id.clone(),
        source,
    }));
}
