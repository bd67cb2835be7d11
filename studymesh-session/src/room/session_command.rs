use crate::error::SessionError;
use crate::media::MediaStream;
use studymesh_core::{MediaSettings, PeerId};
use tokio::sync::oneshot;

pub type Reply<T> = oneshot::Sender<T>;

/// Requests a [`crate::RoomSession`] handle sends to its session task.
#[derive(Debug)]
pub enum SessionCommand {
    Join {
        settings: MediaSettings,
        reply: Reply<Result<(), SessionError>>,
    },

    Leave {
        reply: Reply<Result<(), SessionError>>,
    },

    ToggleAudio { reply: Reply<bool> },

    ToggleVideo { reply: Reply<bool> },

    StartScreenShare { reply: Reply<Option<MediaStream>> },

    StopScreenShare { reply: Reply<bool> },

    /// Result of an audio-level detector running outside the session.
    SetSpeaking { peer_id: PeerId, speaking: bool },
}
