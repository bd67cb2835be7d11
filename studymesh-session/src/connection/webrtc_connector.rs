use crate::connection::{
    ConnectionEvents, ConnectionParams, PeerConnection, PeerConnector, SignalingState,
};
use crate::error::ConnectionError;
use crate::media::LocalTrack;
use anyhow::Context;
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use studymesh_core::utils::sdp_ice_ufrag;
use studymesh_core::{
    ConnectionState, IceCandidate, IceServerConfig, PeerId, RemoteTrack, SdpType,
    SessionDescription, TrackKind,
};
use tokio::sync::Mutex;
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

const LOCAL_STREAM_ID: &str = "studymesh-local";

/// Connection primitive backed by webrtc-rs.
///
/// Local tracks are published as sample tracks; feeding them with encoded
/// media is up to the capture pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebRtcConnector;

#[async_trait]
impl PeerConnector for WebRtcConnector {
    async fn connect(
        &self,
        params: ConnectionParams,
        events: ConnectionEvents,
    ) -> Result<Box<dyn PeerConnection>, ConnectionError> {
        let link = WebRtcConnection::new(params, events).await?;
        Ok(Box::new(link))
    }
}

pub struct WebRtcConnection {
    peer_id: PeerId,
    peer_connection: Arc<RTCPeerConnection>,
    video_sender: Mutex<Option<Arc<RTCRtpSender>>>,
}

impl WebRtcConnection {
    pub async fn new(
        params: ConnectionParams,
        events: ConnectionEvents,
    ) -> Result<Self, ConnectionError> {
        // Codecs first, the interceptor registry depends on them
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .context("failed to register default codecs")?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .context("failed to register interceptors")?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        // ICE servers from the session config
        let rtc_config = RTCConfiguration {
            ice_servers: params.ice_servers.iter().map(to_rtc_ice_server).collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("failed to create peer connection")?,
        );

        // Connection state: forwarded so the session can spot lost links
        let state_events = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let events = state_events.clone();
                Box::pin(async move {
                    let Some(state) = from_rtc_state(s) else {
                        return;
                    };
                    info!("Peer connection to {} is now {:?}", events.peer_id(), state);
                    events.state_changed(state);
                })
            },
        ));

        // Trickle ICE: every gathered candidate goes to the remote peer,
        // tagged with our ufrag so it lands on the right session there
        let ice_events = events.clone();
        let ice_pc: Weak<RTCPeerConnection> = Arc::downgrade(&peer_connection);
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let events = ice_events.clone();
            let pc = ice_pc.clone();
            Box::pin(async move {
                // None marks the end of gathering
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let username_fragment = match (init.username_fragment, pc.upgrade()) {
                    (Some(ufrag), _) => Some(ufrag),
                    (None, Some(pc)) => local_ufrag(&pc).await,
                    (None, None) => None,
                };
                events.ice_candidate(IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                    username_fragment,
                });
            })
        }));

        // Remote media: announced once per track, grouped by stream id later
        let track_events = events;
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let events = track_events.clone();
                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => TrackKind::Audio,
                        RTPCodecType::Video => TrackKind::Video,
                        _ => return,
                    };
                    debug!("Remote {:?} track from {}", kind, events.peer_id());
                    events.track(RemoteTrack {
                        id: track.id(),
                        stream_id: track.stream_id(),
                        kind,
                    });
                })
            },
        ));

        Ok(Self {
            peer_id: params.peer_id,
            peer_connection,
            video_sender: Mutex::new(None),
        })
    }
}

#[async_trait]
impl PeerConnection for WebRtcConnection {
    async fn add_track(&self, track: &LocalTrack) -> Result<(), ConnectionError> {
        let local = sample_track(track);
        let sender = self
            .peer_connection
            .add_track(local)
            .await
            .context("failed to add local track")?;

        // RTCP has to be drained for interceptors (NACK, reports) to work.
        let rtcp_sender = Arc::clone(&sender);
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while rtcp_sender.read(&mut rtcp_buf).await.is_ok() {}
        });

        if track.kind() == TrackKind::Video {
            *self.video_sender.lock().await = Some(sender);
        }
        Ok(())
    }

    async fn replace_video_track(
        &self,
        track: Option<&LocalTrack>,
    ) -> Result<bool, ConnectionError> {
        let guard = self.video_sender.lock().await;
        let Some(sender) = guard.as_ref() else {
            debug!("No video sender towards {}, nothing to replace", self.peer_id);
            return Ok(false);
        };

        sender
            .replace_track(track.map(sample_track))
            .await
            .context("failed to replace video track")?;
        Ok(true)
    }

    async fn create_offer(&self) -> Result<SessionDescription, ConnectionError> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .context("failed to create offer")?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription, ConnectionError> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .context("failed to create answer")?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), ConnectionError> {
        self.peer_connection
            .set_local_description(to_rtc_description(desc)?)
            .await
            .context("failed to set local description")?;
        Ok(())
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), ConnectionError> {
        self.peer_connection
            .set_remote_description(to_rtc_description(desc)?)
            .await
            .context("failed to set remote description")?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), ConnectionError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .context("failed to add ICE candidate")?;
        Ok(())
    }

    fn signaling_state(&self) -> SignalingState {
        match self.peer_connection.signaling_state() {
            RTCSignalingState::HaveLocalOffer | RTCSignalingState::HaveLocalPranswer => {
                SignalingState::HaveLocalOffer
            }
            RTCSignalingState::HaveRemoteOffer | RTCSignalingState::HaveRemotePranswer => {
                SignalingState::HaveRemoteOffer
            }
            RTCSignalingState::Closed => SignalingState::Closed,
            _ => SignalingState::Stable,
        }
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        self.peer_connection
            .close()
            .await
            .context("failed to close peer connection")?;
        Ok(())
    }
}

async fn local_ufrag(pc: &RTCPeerConnection) -> Option<String> {
    let local = pc.local_description().await?;
    sdp_ice_ufrag(&local.sdp).map(str::to_owned)
}

fn to_rtc_ice_server(config: &IceServerConfig) -> RTCIceServer {
    RTCIceServer {
        urls: config.urls.clone(),
        username: config.username.clone().unwrap_or_default(),
        credential: config.credential.clone().unwrap_or_default(),
        ..Default::default()
    }
}

fn to_rtc_description(desc: SessionDescription) -> Result<RTCSessionDescription, ConnectionError> {
    let parsed = match desc.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp),
    };
    parsed.map_err(|e| ConnectionError::InvalidDescription(e.to_string()))
}

fn from_rtc_state(state: RTCPeerConnectionState) -> Option<ConnectionState> {
    match state {
        RTCPeerConnectionState::New => Some(ConnectionState::New),
        RTCPeerConnectionState::Connecting => Some(ConnectionState::Connecting),
        RTCPeerConnectionState::Connected => Some(ConnectionState::Connected),
        RTCPeerConnectionState::Disconnected => Some(ConnectionState::Disconnected),
        RTCPeerConnectionState::Failed => Some(ConnectionState::Failed),
        RTCPeerConnectionState::Closed => Some(ConnectionState::Closed),
        _ => None,
    }
}

fn sample_track(track: &LocalTrack) -> Arc<dyn TrackLocal + Send + Sync> {
    let capability = match track.kind() {
        TrackKind::Audio => RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            clock_rate: 48_000,
            channels: 2,
            ..Default::default()
        },
        TrackKind::Video => RTCRtpCodecCapability {
            mime_type: MIME_TYPE_VP8.to_owned(),
            clock_rate: 90_000,
            ..Default::default()
        },
    };

    Arc::new(TrackLocalStaticSample::new(
        capability,
        track.id().to_owned(),
        LOCAL_STREAM_ID.to_owned(),
    ))
}
