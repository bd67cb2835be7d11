use crate::model::media::MediaSettings;
use crate::model::peer::PeerId;
use crate::model::room::PresenceDescriptor;
use crate::utils::sdp_ice_ufrag;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }

    pub fn ice_ufrag(&self) -> Option<&str> {
        sdp_ice_ufrag(&self.sdp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default)]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }

    pub fn with_ufrag(mut self, ufrag: impl Into<String>) -> Self {
        self.username_fragment = Some(ufrag.into());
        self
    }
}

/// Discriminant of a signal envelope, the `type` field on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
    MediaState,
    Join,
    Leave,
}

/// Envelope body, with the payload type bound to the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalPayload {
    Offer(SessionDescription),
    Answer(SessionDescription),
    IceCandidate(IceCandidate),
    MediaState(MediaSettings),
    Join,
    Leave,
}

impl SignalPayload {
    pub fn kind(&self) -> SignalKind {
        match self {
            Self::Offer(_) => SignalKind::Offer,
            Self::Answer(_) => SignalKind::Answer,
            Self::IceCandidate(_) => SignalKind::IceCandidate,
            Self::MediaState(_) => SignalKind::MediaState,
            Self::Join => SignalKind::Join,
            Self::Leave => SignalKind::Leave,
        }
    }
}

/// A coordination message carried by the room's signaling channel.
///
/// `to == None` means the envelope is meant for every member of the room.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "WireEnvelope")]
pub struct SignalEnvelope {
    pub from: PeerId,
    pub from_name: String,
    pub from_avatar_ref: Option<String>,
    pub to: Option<PeerId>,
    pub payload: SignalPayload,
}

impl SignalEnvelope {
    pub fn broadcast(sender: &PresenceDescriptor, payload: SignalPayload) -> Self {
        Self {
            from: sender.peer_id.clone(),
            from_name: sender.name.clone(),
            from_avatar_ref: sender.avatar_ref.clone(),
            to: None,
            payload,
        }
    }

    pub fn directed(sender: &PresenceDescriptor, to: PeerId, payload: SignalPayload) -> Self {
        Self {
            to: Some(to),
            ..Self::broadcast(sender, payload)
        }
    }

    pub fn kind(&self) -> SignalKind {
        self.payload.kind()
    }

    /// Whether a member with id `local` should process this envelope.
    pub fn is_for(&self, local: &PeerId) -> bool {
        &self.from != local && self.to.as_ref().is_none_or(|to| to == local)
    }

    pub fn sender(&self) -> PresenceDescriptor {
        PresenceDescriptor {
            peer_id: self.from.clone(),
            name: self.from_name.clone(),
            avatar_ref: self.from_avatar_ref.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("{0:?} envelope is missing its data")]
    MissingData(SignalKind),

    #[error("{kind:?} envelope carries malformed data: {source}")]
    InvalidData {
        kind: SignalKind,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    #[serde(rename = "type")]
    kind: SignalKind,
    from: PeerId,
    #[serde(default)]
    from_name: String,
    #[serde(default)]
    from_avatar_ref: Option<String>,
    #[serde(default)]
    to: Option<PeerId>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

impl TryFrom<WireEnvelope> for SignalEnvelope {
    type Error = EnvelopeError;

    fn try_from(wire: WireEnvelope) -> Result<Self, Self::Error> {
        let kind = wire.kind;
        let data = || -> Result<serde_json::Value, EnvelopeError> {
            match &wire.data {
                Some(serde_json::Value::Null) | None => Err(EnvelopeError::MissingData(kind)),
                Some(value) => Ok(value.clone()),
            }
        };
        let invalid = |source| EnvelopeError::InvalidData { kind, source };

        let payload = match kind {
            SignalKind::Offer => {
                SignalPayload::Offer(serde_json::from_value(data()?).map_err(invalid)?)
            }
            SignalKind::Answer => {
                SignalPayload::Answer(serde_json::from_value(data()?).map_err(invalid)?)
            }
            SignalKind::IceCandidate => {
                SignalPayload::IceCandidate(serde_json::from_value(data()?).map_err(invalid)?)
            }
            SignalKind::MediaState => {
                SignalPayload::MediaState(serde_json::from_value(data()?).map_err(invalid)?)
            }
            SignalKind::Join => SignalPayload::Join,
            SignalKind::Leave => SignalPayload::Leave,
        };

        Ok(Self {
            from: wire.from,
            from_name: wire.from_name,
            from_avatar_ref: wire.from_avatar_ref,
            to: wire.to,
            payload,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelopeRef<'a> {
    #[serde(rename = "type")]
    kind: SignalKind,
    from: &'a PeerId,
    from_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    from_avatar_ref: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<&'a PeerId>,
    data: Option<WireData<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireData<'a> {
    Description(&'a SessionDescription),
    Candidate(&'a IceCandidate),
    Media(&'a MediaSettings),
}

impl Serialize for SignalEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let data = match &self.payload {
            SignalPayload::Offer(desc) | SignalPayload::Answer(desc) => {
                Some(WireData::Description(desc))
            }
            SignalPayload::IceCandidate(candidate) => Some(WireData::Candidate(candidate)),
            SignalPayload::MediaState(settings) => Some(WireData::Media(settings)),
            SignalPayload::Join | SignalPayload::Leave => None,
        };

        WireEnvelopeRef {
            kind: self.kind(),
            from: &self.from,
            from_name: &self.from_name,
            from_avatar_ref: self.from_avatar_ref.as_deref(),
            to: self.to.as_ref(),
            data,
        }
        .serialize(serializer)
    }
}
