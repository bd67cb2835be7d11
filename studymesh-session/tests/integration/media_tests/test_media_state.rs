use studymesh_core::{MediaSettings, SignalKind, SignalPayload};
use studymesh_session::{LocalSignalingHub, SessionEvent};

use crate::integration::{av, hub_member, init_tracing, is_connected_to, mock_member, test_config};
use crate::utils::{FakeDevices, RemotePeer, eventually, settle};

#[tokio::test]
async fn test_muting_updates_remote_participant() {
    init_tracing();

    let hub = LocalSignalingHub::new();
    let mut alice = hub_member(&hub, "history", "Alice");
    let mut bob = hub_member(&hub, "history", "Bob");
    let alice_id = alice.session.identity().local_peer_id.clone();
    let bob_id = bob.session.identity().local_peer_id.clone();

    alice.session.join(av()).await.expect("Alice failed to join");
    bob.session.join(av()).await.expect("Bob failed to join");
    assert!(alice.events.wait_for(2000, |e| is_connected_to(e, &bob_id)).await.is_some());
    assert!(bob.events.wait_for(2000, |e| is_connected_to(e, &alice_id)).await.is_some());
    assert!(
        eventually(2000, || bob
            .session
            .participant(&alice_id)
            .is_some_and(|p| p.is_audio_on && p.is_video_on))
        .await
    );
    bob.events.clear();

    assert!(!alice.session.toggle_audio().await);
    assert!(!alice.session.media_settings().audio);

    let updated = bob
        .events
        .wait_for(2000, |e| {
            matches!(e, SessionEvent::ParticipantUpdated(p) if p.peer_id == alice_id && !p.is_audio_on)
        })
        .await;
    assert!(updated.is_some(), "Bob never saw Alice mute");

    let alice_seen_by_bob = bob.session.participant(&alice_id).expect("Alice missing");
    assert!(!alice_seen_by_bob.is_audio_on);
    assert!(alice_seen_by_bob.is_video_on);

    // The connection is untouched.
    settle().await;
    assert_eq!(
        bob.events
            .count(|e| matches!(e, SessionEvent::ConnectionStateChanged { .. })),
        0
    );
    assert_eq!(bob.connector.links_to(&alice_id).len(), 1);
    assert_eq!(alice.connector.links_to(&bob_id)[0].offers_created(), 1);
}

#[tokio::test]
async fn test_media_state_before_join_is_applied_later() {
    init_tracing();

    let (mut member, transport) = mock_member(FakeDevices::new(), test_config());
    member.session.join(av()).await.expect("join failed");

    let pia = RemotePeer::new("Pia");
    transport.deliver(pia.media_state(MediaSettings {
        audio: true,
        video: false,
        screen_share: true,
    }));
    settle().await;
    assert!(member.session.participant(&pia.id()).is_none());

    transport.deliver(pia.join());
    let joined = member
        .events
        .wait_for(1000, |e| matches!(e, SessionEvent::ParticipantJoined(p) if p.peer_id == pia.id()))
        .await;
    match joined {
        Some(SessionEvent::ParticipantJoined(p)) => {
            assert!(p.is_audio_on);
            assert!(!p.is_video_on);
            assert!(p.is_screen_sharing);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_local_media_is_announced_to_newcomers() {
    init_tracing();

    let (member, transport) = mock_member(FakeDevices::new(), test_config());
    member
        .session
        .join(MediaSettings::new(true, false))
        .await
        .expect("join failed");

    let on_join = transport.sent_of(SignalKind::MediaState);
    assert_eq!(on_join.len(), 1);
    assert_eq!(
        on_join[0].payload,
        SignalPayload::MediaState(MediaSettings::new(true, false))
    );

    let quinn = RemotePeer::new("Quinn");
    transport.deliver(quinn.join());
    assert!(eventually(1000, || transport.sent_of(SignalKind::MediaState).len() == 2).await);
}

#[tokio::test]
async fn test_set_speaking_updates_participant() {
    init_tracing();

    let (mut member, transport) = mock_member(FakeDevices::new(), test_config());
    member.session.join(av()).await.expect("join failed");

    let rosa = RemotePeer::new("Rosa");
    transport.deliver(rosa.join());
    assert!(eventually(1000, || member.session.participant(&rosa.id()).is_some()).await);

    member
        .session
        .set_speaking(rosa.id(), true)
        .await
        .expect("session closed");
    assert!(
        member
            .events
            .wait_for(1000, |e| matches!(e, SessionEvent::ParticipantUpdated(p) if p.is_speaking))
            .await
            .is_some()
    );

    member
        .session
        .set_speaking(rosa.id(), true)
        .await
        .expect("session closed");
    settle().await;
    assert_eq!(
        member
            .events
            .count(|e| matches!(e, SessionEvent::ParticipantUpdated(p) if p.is_speaking)),
        1
    );
}
