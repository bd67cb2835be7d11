use crate::error::MediaAccessError;
use crate::media::MediaStream;
use async_trait::async_trait;
use studymesh_core::MediaSettings;

/// Which capture modalities to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    pub audio: bool,
    pub video: bool,
}

impl From<MediaSettings> for CaptureRequest {
    fn from(settings: MediaSettings) -> Self {
        Self {
            audio: settings.audio,
            video: settings.video,
        }
    }
}

/// Platform capture primitive.
#[async_trait]
pub trait MediaDevices: Send + Sync + 'static {
    /// Captures only the requested modalities.
    async fn request_capture(&self, request: CaptureRequest)
    -> Result<MediaStream, MediaAccessError>;

    /// Captures the display. `None` when the user cancels or the platform
    /// cannot share its screen.
    async fn request_display_capture(&self) -> Option<MediaStream>;
}

/// Capture primitive of a platform without any capture API; sessions using
/// it observe the room receive-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableDevices;

#[async_trait]
impl MediaDevices for UnavailableDevices {
    async fn request_capture(
        &self,
        _request: CaptureRequest,
    ) -> Result<MediaStream, MediaAccessError> {
        Err(MediaAccessError::CapabilityUnavailable)
    }

    async fn request_display_capture(&self) -> Option<MediaStream> {
        None
    }
}
