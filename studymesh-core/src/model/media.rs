use serde::{Deserialize, Serialize};

/// Local media flags. Always derived from the live local tracks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSettings {
    pub audio: bool,
    pub video: bool,
    pub screen_share: bool,
}

impl MediaSettings {
    pub fn new(audio: bool, video: bool) -> Self {
        Self {
            audio,
            video,
            screen_share: false,
        }
    }

    /// Whether any camera/microphone capture is requested.
    pub fn wants_capture(&self) -> bool {
        self.audio || self.video
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// A track received from a remote peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTrack {
    pub id: String,
    pub stream_id: String,
    pub kind: TrackKind,
}

/// The remote media of one participant, grouped by stream id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStream {
    pub id: String,
    pub tracks: Vec<RemoteTrack>,
}

impl RemoteStream {
    pub fn from_track(track: RemoteTrack) -> Self {
        Self {
            id: track.stream_id.clone(),
            tracks: vec![track],
        }
    }

    /// Adds `track` unless a track with the same id is already present.
    /// Returns whether the stream changed.
    pub fn add_track(&mut self, track: RemoteTrack) -> bool {
        if self.tracks.iter().any(|t| t.id == track.id) {
            return false;
        }
        self.tracks.push(track);
        true
    }

    pub fn has_kind(&self, kind: TrackKind) -> bool {
        self.tracks.iter().any(|t| t.kind == kind)
    }
}
