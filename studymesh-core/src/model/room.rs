use crate::model::peer::PeerId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a study room; also the signaling channel topic.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who the local participant is for the lifetime of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomIdentity {
    pub room_id: RoomId,
    pub local_peer_id: PeerId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_ref: Option<String>,
}

impl RoomIdentity {
    pub fn new(room_id: RoomId, display_name: impl Into<String>) -> Self {
        Self {
            room_id,
            local_peer_id: PeerId::new(),
            display_name: display_name.into(),
            avatar_ref: None,
        }
    }

    pub fn with_avatar(mut self, avatar_ref: impl Into<String>) -> Self {
        self.avatar_ref = Some(avatar_ref.into());
        self
    }

    pub fn presence(&self) -> PresenceDescriptor {
        PresenceDescriptor {
            peer_id: self.local_peer_id.clone(),
            name: self.display_name.clone(),
            avatar_ref: self.avatar_ref.clone(),
        }
    }
}

/// What a member publishes through presence tracking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceDescriptor {
    pub peer_id: PeerId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_ref: Option<String>,
}
