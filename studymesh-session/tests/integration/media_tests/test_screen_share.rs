use studymesh_core::{SignalKind, SignalPayload};
use studymesh_session::SessionEvent;

use crate::integration::{TestMember, av, init_tracing, is_connected_to, mock_member, test_config};
use crate::utils::{
    FakeDevices, LoopbackLink, MockTransport, REMOTE_SDP, RemotePeer, eventually, settle,
};

async fn linked_member() -> (TestMember, MockTransport, LoopbackLink) {
    let (mut member, transport) = mock_member(FakeDevices::new(), test_config());
    member.session.join(av()).await.expect("join failed");
    let local = member.session.identity().local_peer_id.clone();

    let sam = RemotePeer::new("Sam");
    transport.deliver(sam.join());
    transport.deliver(sam.answer(&local, REMOTE_SDP));
    assert!(
        member
            .events
            .wait_for(1000, |e| is_connected_to(e, &sam.id()))
            .await
            .is_some()
    );
    let link = member.connector.links_to(&sam.id()).remove(0);
    (member, transport, link)
}

#[tokio::test]
async fn test_screen_share_replaces_video_in_place() {
    init_tracing();

    let (member, transport, link) = linked_member().await;
    transport.clear_sent();

    let screen = member
        .session
        .start_screen_share()
        .await
        .expect("no screen share");
    assert!(member.session.media_settings().screen_share);
    assert_eq!(link.replaced_video(), vec![Some("fake screen".to_string())]);

    // Starting again keeps the running share.
    let again = member.session.start_screen_share().await.expect("share vanished");
    assert_eq!(again.id(), screen.id());
    assert_eq!(link.replaced_video().len(), 1);

    assert!(member.session.stop_screen_share().await);
    assert!(!member.session.media_settings().screen_share);
    assert_eq!(
        link.replaced_video(),
        vec![Some("fake screen".to_string()), Some("fake camera".to_string())]
    );
    assert!(screen.tracks().iter().all(|t| t.is_ended()));
    assert!(!member.session.stop_screen_share().await);

    // No renegotiation happened, only flag updates went out.
    settle().await;
    assert_eq!(link.offers_created(), 1);
    assert_eq!(member.connector.links().len(), 1);
    assert!(transport.sent_of(SignalKind::Offer).is_empty());
    assert!(transport.sent_of(SignalKind::Answer).is_empty());

    let flags: Vec<bool> = transport
        .sent_of(SignalKind::MediaState)
        .into_iter()
        .filter_map(|e| match e.payload {
            SignalPayload::MediaState(settings) => Some(settings.screen_share),
            _ => None,
        })
        .collect();
    assert_eq!(flags, vec![true, false]);
}

#[tokio::test]
async fn test_screen_share_stops_when_capture_ends() {
    init_tracing();

    let (mut member, _transport, link) = linked_member().await;

    let screen = member
        .session
        .start_screen_share()
        .await
        .expect("no screen share");
    member.events.clear();

    // The user ends the share from the platform's own controls.
    screen.video_track().expect("no video").stop();

    let stopped = member
        .events
        .wait_for(1000, |e| matches!(e, SessionEvent::LocalMediaChanged(s) if !s.screen_share))
        .await;
    assert!(stopped.is_some());
    assert!(!member.session.media_settings().screen_share);
    assert!(
        eventually(1000, || link.replaced_video().last()
            == Some(&Some("fake camera".to_string())))
        .await
    );
}

#[tokio::test]
async fn test_screen_share_cancelled_by_user() {
    init_tracing();

    let (member, transport) = mock_member(FakeDevices::new().without_display(), test_config());
    member.session.join(av()).await.expect("join failed");
    transport.clear_sent();

    assert!(member.session.start_screen_share().await.is_none());
    assert!(!member.session.media_settings().screen_share);
    assert!(transport.sent().is_empty());
}
