use crate::model::media::{MediaSettings, RemoteStream};
use crate::model::peer::PeerId;
use crate::model::room::PresenceDescriptor;
use serde::{Deserialize, Serialize};

/// A remote member of the room as seen by the local session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub peer_id: PeerId,
    pub name: String,
    pub avatar_ref: Option<String>,
    pub stream: Option<RemoteStream>,
    pub is_audio_on: bool,
    pub is_video_on: bool,
    pub is_screen_sharing: bool,
    pub is_speaking: bool,
}

impl Participant {
    /// Placeholder created on first sight of a peer, before any media-state arrives.
    pub fn placeholder(descriptor: PresenceDescriptor) -> Self {
        Self {
            peer_id: descriptor.peer_id,
            name: descriptor.name,
            avatar_ref: descriptor.avatar_ref,
            stream: None,
            is_audio_on: false,
            is_video_on: false,
            is_screen_sharing: false,
            is_speaking: false,
        }
    }

    /// Applies a remote media-state. Returns whether any flag changed.
    pub fn apply_media(&mut self, settings: MediaSettings) -> bool {
        let changed = self.is_audio_on != settings.audio
            || self.is_video_on != settings.video
            || self.is_screen_sharing != settings.screen_share;
        self.is_audio_on = settings.audio;
        self.is_video_on = settings.video;
        self.is_screen_sharing = settings.screen_share;
        changed
    }
}
