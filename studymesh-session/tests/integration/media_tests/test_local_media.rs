use studymesh_core::{MediaSettings, SignalKind};
use studymesh_session::{CaptureRequest, SessionEvent};

use crate::integration::{av, init_tracing, mock_member, test_config};
use crate::utils::{FakeDevices, settle};

#[tokio::test]
async fn test_join_requests_only_enabled_modalities() {
    init_tracing();

    let (mut member, _transport) = mock_member(FakeDevices::new(), test_config());
    member
        .session
        .join(MediaSettings::new(true, false))
        .await
        .expect("join failed");

    assert_eq!(
        member.devices.requests(),
        vec![CaptureRequest {
            audio: true,
            video: false
        }]
    );
    assert_eq!(member.session.media_settings(), MediaSettings::new(true, false));
    assert!(
        member
            .events
            .wait_for(1000, |e| matches!(e, SessionEvent::LocalStreamReady(s) if s.tracks().len() == 1))
            .await
            .is_some()
    );
}

#[tokio::test]
async fn test_toggles_flip_live_tracks() {
    init_tracing();

    let (member, transport) = mock_member(FakeDevices::new(), test_config());
    member.session.join(av()).await.expect("join failed");
    transport.clear_sent();

    assert!(!member.session.toggle_video().await);
    assert_eq!(member.session.media_settings(), MediaSettings::new(true, false));
    assert!(member.session.toggle_video().await);
    assert_eq!(member.session.media_settings(), av());

    // Toggling never re-requests capture.
    assert_eq!(member.devices.requests().len(), 1);
    assert_eq!(transport.sent_of(SignalKind::MediaState).len(), 2);
}

#[tokio::test]
async fn test_toggles_without_stream_return_false() {
    init_tracing();

    let (member, transport) = mock_member(FakeDevices::new(), test_config());
    member
        .session
        .join(MediaSettings::default())
        .await
        .expect("join failed");
    transport.clear_sent();

    assert!(!member.session.toggle_audio().await);
    assert!(!member.session.toggle_video().await);
    settle().await;
    assert_eq!(member.session.media_settings(), MediaSettings::default());
    assert!(transport.sent_of(SignalKind::MediaState).is_empty());
}

#[tokio::test]
async fn test_leave_releases_local_tracks() {
    init_tracing();

    let (member, _transport) = mock_member(FakeDevices::new(), test_config());
    member.session.join(av()).await.expect("join failed");
    member.session.start_screen_share().await.expect("no screen");

    member.session.leave().await.expect("leave failed");

    let issued = member.devices.issued();
    assert_eq!(issued.len(), 2);
    assert!(
        issued
            .iter()
            .flat_map(|s| s.tracks().to_vec())
            .all(|t| t.is_ended())
    );
    assert_eq!(member.session.media_settings(), MediaSettings::default());
}
