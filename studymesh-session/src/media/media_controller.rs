use crate::error::MediaAccessError;
use crate::media::{LocalTrack, MediaDevices, MediaStream};
use std::sync::Arc;
use studymesh_core::{MediaSettings, TrackKind};
use tracing::{debug, info};

/// Owns the local capture of one session: at most one camera/microphone
/// stream and at most one screen capture.
///
/// Only this type changes local tracks. Peer links read them through
/// [`MediaController::outgoing_tracks`] and never mutate them.
pub struct MediaController {
    devices: Arc<dyn MediaDevices>,
    camera: Option<MediaStream>,
    screen: Option<MediaStream>,
}

impl MediaController {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            devices,
            camera: None,
            screen: None,
        }
    }

    /// Captures the modalities enabled in `settings`, replacing any previous
    /// local stream.
    pub async fn acquire_local(
        &mut self,
        settings: MediaSettings,
    ) -> Result<MediaStream, MediaAccessError> {
        if !settings.wants_capture() {
            return Err(MediaAccessError::NothingRequested);
        }

        let stream = self.devices.request_capture(settings.into()).await?;
        if let Some(previous) = self.camera.replace(stream.clone()) {
            previous.stop_all();
        }

        info!(
            "Local capture acquired ({} tracks, audio={}, video={})",
            stream.tracks().len(),
            stream.audio_track().is_some(),
            stream.video_track().is_some()
        );
        Ok(stream)
    }

    pub fn local_stream(&self) -> Option<&MediaStream> {
        self.camera.as_ref()
    }

    pub fn screen_stream(&self) -> Option<&MediaStream> {
        self.screen.as_ref()
    }

    pub fn toggle_audio(&mut self) -> bool {
        self.toggle(TrackKind::Audio)
    }

    pub fn toggle_video(&mut self) -> bool {
        self.toggle(TrackKind::Video)
    }

    fn toggle(&self, kind: TrackKind) -> bool {
        let track = self.camera.as_ref().and_then(|stream| match kind {
            TrackKind::Audio => stream.audio_track(),
            TrackKind::Video => stream.video_track(),
        });
        let Some(track) = track else {
            debug!("Toggle {:?} ignored: no local track", kind);
            return false;
        };

        let enabled = !track.is_enabled();
        track.set_enabled(enabled);
        enabled
    }

    /// Current flags, read from the live tracks.
    pub fn settings(&self) -> MediaSettings {
        let camera_live = |kind: TrackKind| {
            self.camera
                .as_ref()
                .and_then(|stream| match kind {
                    TrackKind::Audio => stream.audio_track(),
                    TrackKind::Video => stream.video_track(),
                })
                .is_some_and(LocalTrack::is_live)
        };

        MediaSettings {
            audio: camera_live(TrackKind::Audio),
            video: camera_live(TrackKind::Video),
            screen_share: self.is_sharing_screen(),
        }
    }

    pub fn is_sharing_screen(&self) -> bool {
        self.screen
            .as_ref()
            .and_then(MediaStream::video_track)
            .is_some_and(|track| !track.is_ended())
    }

    /// The video track peers should currently receive: the screen while
    /// sharing, the camera otherwise.
    pub fn outgoing_video(&self) -> Option<LocalTrack> {
        if self.is_sharing_screen() {
            return self
                .screen
                .as_ref()
                .and_then(MediaStream::video_track)
                .cloned();
        }
        self.camera
            .as_ref()
            .and_then(MediaStream::video_track)
            .cloned()
    }

    /// Tracks attached to a newly created peer link.
    pub fn outgoing_tracks(&self) -> Vec<LocalTrack> {
        let audio = self
            .camera
            .as_ref()
            .and_then(MediaStream::audio_track)
            .cloned();
        audio.into_iter().chain(self.outgoing_video()).collect()
    }

    /// Starts display capture. Returns the already running share if there is one.
    pub async fn start_screen_share(&mut self) -> Option<MediaStream> {
        if self.is_sharing_screen() {
            return self.screen.clone();
        }

        let stream = self.devices.request_display_capture().await?;
        if stream.video_track().is_none() {
            debug!("Display capture returned no video track");
            stream.stop_all();
            return None;
        }

        info!("Screen share started");
        self.screen = Some(stream.clone());
        Some(stream)
    }

    /// Releases the screen capture. Returns whether a share was active.
    pub fn stop_screen_share(&mut self) -> bool {
        let Some(stream) = self.screen.take() else {
            return false;
        };
        stream.stop_all();
        info!("Screen share stopped");
        true
    }

    /// Stops every local track, camera and screen alike.
    pub fn release_all(&mut self) {
        if let Some(stream) = self.camera.take() {
            stream.stop_all();
        }
        if let Some(stream) = self.screen.take() {
            stream.stop_all();
        }
    }
}

impl Drop for MediaController {
    fn drop(&mut self) {
        self.release_all();
    }
}
