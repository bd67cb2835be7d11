use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use studymesh_core::{
    ConnectionState, IceCandidate, PeerId, RemoteTrack, SdpType, SessionDescription, TrackKind,
};
use studymesh_session::{
    ConnectionError, ConnectionEvents, ConnectionParams, LocalTrack, PeerConnection,
    PeerConnector, SignalingState,
};

static SDP_SEQ: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct LinkLog {
    signaling: Option<SignalingState>,
    local_set: bool,
    remote_set: bool,
    remote_kinds: Vec<TrackKind>,
    tracks: Vec<TrackKind>,
    offers_created: usize,
    applied_candidates: Vec<String>,
    replaced_video: Vec<Option<String>>,
    connected: bool,
    closed: bool,
}

/// One connection created by a [`LoopbackConnector`], inspectable by tests.
#[derive(Clone)]
pub struct LoopbackLink {
    pub remote: PeerId,
    events: ConnectionEvents,
    owner: String,
    log: Arc<Mutex<LinkLog>>,
}

impl LoopbackLink {
    /// Simulates the network dropping under this connection.
    pub fn fail(&self) {
        self.events.state_changed(ConnectionState::Failed);
    }

    /// Emits a locally gathered candidate towards the remote peer.
    pub fn gather(&self, candidate: &str) {
        self.events.ice_candidate(IceCandidate::new(candidate));
    }

    pub fn applied_candidates(&self) -> Vec<String> {
        self.log.lock().unwrap().applied_candidates.clone()
    }

    pub fn replaced_video(&self) -> Vec<Option<String>> {
        self.log.lock().unwrap().replaced_video.clone()
    }

    pub fn offers_created(&self) -> usize {
        self.log.lock().unwrap().offers_created
    }

    pub fn tracks(&self) -> Vec<TrackKind> {
        self.log.lock().unwrap().tracks.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.log.lock().unwrap().connected
    }

    pub fn is_closed(&self) -> bool {
        self.log.lock().unwrap().closed
    }
}

/// Connection primitive that needs no network: it reports `connected` as
/// soon as both descriptions are applied, and announces the tracks the
/// remote side listed in its description.
#[derive(Clone, Default)]
pub struct LoopbackConnector {
    links: Arc<Mutex<Vec<LoopbackLink>>>,
}

impl LoopbackConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn links(&self) -> Vec<LoopbackLink> {
        self.links.lock().unwrap().clone()
    }

    pub fn links_to(&self, peer_id: &PeerId) -> Vec<LoopbackLink> {
        self.links()
            .into_iter()
            .filter(|link| &link.remote == peer_id)
            .collect()
    }

    pub fn open_links_to(&self, peer_id: &PeerId) -> Vec<LoopbackLink> {
        self.links_to(peer_id)
            .into_iter()
            .filter(|link| !link.is_closed())
            .collect()
    }

    pub fn latest_to(&self, peer_id: &PeerId) -> Option<LoopbackLink> {
        self.links_to(peer_id).pop()
    }
}

#[async_trait]
impl PeerConnector for LoopbackConnector {
    async fn connect(
        &self,
        params: ConnectionParams,
        events: ConnectionEvents,
    ) -> Result<Box<dyn PeerConnection>, ConnectionError> {
        let link = LoopbackLink {
            remote: params.peer_id.clone(),
            owner: format!("to-{}", params.peer_id),
            events,
            log: Arc::new(Mutex::new(LinkLog {
                signaling: Some(SignalingState::Stable),
                ..LinkLog::default()
            })),
        };
        self.links.lock().unwrap().push(link.clone());
        Ok(Box::new(LoopbackConnection { link }))
    }
}

struct LoopbackConnection {
    link: LoopbackLink,
}

impl LoopbackConnection {
    fn describe(&self, log: &LinkLog) -> String {
        let kinds: Vec<&str> = log
            .tracks
            .iter()
            .map(|kind| match kind {
                TrackKind::Audio => "audio",
                TrackKind::Video => "video",
            })
            .collect();
        format!(
            "v=0\r\no={} {}\r\na=tracks:{}\r\n",
            self.link.owner,
            SDP_SEQ.fetch_add(1, Ordering::SeqCst),
            kinds.join(",")
        )
    }

    /// Reports the link up once both sides are described.
    fn settle(&self) {
        let remote_kinds = {
            let mut log = self.link.log.lock().unwrap();
            if log.connected || !log.local_set || !log.remote_set {
                return;
            }
            if log.signaling != Some(SignalingState::Stable) {
                return;
            }
            log.connected = true;
            log.remote_kinds.clone()
        };

        let events = &self.link.events;
        events.state_changed(ConnectionState::Connecting);
        events.state_changed(ConnectionState::Connected);
        for (i, kind) in remote_kinds.into_iter().enumerate() {
            events.track(RemoteTrack {
                id: format!("remote-{}-{}", events.peer_id(), i),
                stream_id: format!("stream-{}", events.peer_id()),
                kind,
            });
        }
    }
}

fn parse_kinds(sdp: &str) -> Vec<TrackKind> {
    sdp.lines()
        .find_map(|line| line.strip_prefix("a=tracks:"))
        .map(|list| {
            list.split(',')
                .filter_map(|kind| match kind {
                    "audio" => Some(TrackKind::Audio),
                    "video" => Some(TrackKind::Video),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl PeerConnection for LoopbackConnection {
    async fn add_track(&self, track: &LocalTrack) -> Result<(), ConnectionError> {
        self.link.log.lock().unwrap().tracks.push(track.kind());
        Ok(())
    }

    async fn replace_video_track(
        &self,
        track: Option<&LocalTrack>,
    ) -> Result<bool, ConnectionError> {
        let mut log = self.link.log.lock().unwrap();
        if !log.tracks.contains(&TrackKind::Video) {
            return Ok(false);
        }
        log.replaced_video
            .push(track.map(|t| t.label().to_string()));
        Ok(true)
    }

    async fn create_offer(&self) -> Result<SessionDescription, ConnectionError> {
        let mut log = self.link.log.lock().unwrap();
        if log.closed {
            return Err(ConnectionError::Closed);
        }
        log.offers_created += 1;
        Ok(SessionDescription::offer(self.describe(&log)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, ConnectionError> {
        let log = self.link.log.lock().unwrap();
        if log.signaling != Some(SignalingState::HaveRemoteOffer) {
            return Err(ConnectionError::InvalidDescription(
                "no remote offer to answer".into(),
            ));
        }
        Ok(SessionDescription::answer(self.describe(&log)))
    }

    async fn set_local_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), ConnectionError> {
        {
            let mut log = self.link.log.lock().unwrap();
            log.signaling = Some(match desc.sdp_type {
                SdpType::Offer => SignalingState::HaveLocalOffer,
                SdpType::Answer => SignalingState::Stable,
            });
            log.local_set = true;
        }
        self.link.gather(&format!("candidate:{} 1 udp 1 127.0.0.1 9 typ host", self.link.owner));
        self.settle();
        Ok(())
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), ConnectionError> {
        {
            let mut log = self.link.log.lock().unwrap();
            if log.closed {
                return Err(ConnectionError::Closed);
            }
            let next = match desc.sdp_type {
                SdpType::Offer => SignalingState::HaveRemoteOffer,
                SdpType::Answer if log.signaling == Some(SignalingState::HaveLocalOffer) => {
                    SignalingState::Stable
                }
                SdpType::Answer => {
                    return Err(ConnectionError::InvalidDescription(
                        "answer without a local offer".into(),
                    ));
                }
            };
            log.signaling = Some(next);
            log.remote_set = true;
            log.remote_kinds = parse_kinds(&desc.sdp);
        }
        self.settle();
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), ConnectionError> {
        let mut log = self.link.log.lock().unwrap();
        if !log.remote_set {
            return Err(ConnectionError::InvalidDescription(
                "candidate before remote description".into(),
            ));
        }
        log.applied_candidates.push(candidate.candidate);
        Ok(())
    }

    fn signaling_state(&self) -> SignalingState {
        let log = self.link.log.lock().unwrap();
        if log.closed {
            return SignalingState::Closed;
        }
        log.signaling.unwrap_or(SignalingState::Stable)
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        let mut log = self.link.log.lock().unwrap();
        log.closed = true;
        log.signaling = Some(SignalingState::Closed);
        Ok(())
    }
}
