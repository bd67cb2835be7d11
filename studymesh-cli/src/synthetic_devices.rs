use async_trait::async_trait;
use studymesh::model::TrackKind;
use studymesh::session::{CaptureRequest, LocalTrack, MediaAccessError, MediaDevices, MediaStream};

/// Capture primitive for headless runs: hands out tracks that carry no media.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticDevices;

#[async_trait]
impl MediaDevices for SyntheticDevices {
    async fn request_capture(
        &self,
        request: CaptureRequest,
    ) -> Result<MediaStream, MediaAccessError> {
        let mut tracks = Vec::new();
        if request.audio {
            tracks.push(LocalTrack::new(TrackKind::Audio, "synthetic microphone"));
        }
        if request.video {
            tracks.push(LocalTrack::new(TrackKind::Video, "synthetic camera"));
        }
        Ok(MediaStream::new(tracks))
    }

    async fn request_display_capture(&self) -> Option<MediaStream> {
        Some(MediaStream::new(vec![LocalTrack::new(
            TrackKind::Video,
            "synthetic screen",
        )]))
    }
}
