use studymesh_core::{SignalKind, SignalPayload};
use studymesh_session::{SessionEvent, SessionState, TransportEvent};

use crate::integration::{av, init_tracing, mock_member, test_config};
use crate::utils::{FakeDevices, REMOTE_SDP, RemotePeer, eventually, settle};

#[tokio::test]
async fn test_remote_leave_is_idempotent() {
    init_tracing();

    let (mut member, transport) = mock_member(FakeDevices::new(), test_config());
    member.session.join(av()).await.expect("join failed");
    let local = member.session.identity().local_peer_id.clone();

    let dave = RemotePeer::new("Dave");
    transport.deliver(dave.join());
    assert!(eventually(1000, || member.connector.links_to(&dave.id()).len() == 1).await);
    transport.deliver(dave.answer(&local, REMOTE_SDP));

    transport.deliver(dave.leave());
    transport.deliver(dave.leave());
    transport.inject(TransportEvent::PresenceLeft(dave.id()));
    settle().await;

    assert!(member.session.participants().is_empty());
    assert!(member.connector.open_links_to(&dave.id()).is_empty());
    assert_eq!(
        member
            .events
            .count(|e| matches!(e, SessionEvent::ParticipantLeft(p) if p.peer_id == dave.id())),
        1
    );
    assert_eq!(member.events.count(|e| matches!(e, SessionEvent::Error(_))), 0);
}

#[tokio::test]
async fn test_remote_leave_mid_negotiation() {
    init_tracing();

    let (mut member, transport) = mock_member(FakeDevices::new(), test_config());
    member.session.join(av()).await.expect("join failed");
    let local = member.session.identity().local_peer_id.clone();

    // Eve leaves before answering our offer; her candidate is still in flight.
    let eve = RemotePeer::new("Eve");
    transport.deliver(eve.join());
    transport.deliver(eve.candidate(&local, "candidate:eve 1 udp 1 10.0.0.5 9 typ host"));
    transport.deliver(eve.leave());
    settle().await;

    assert!(member.session.participant(&eve.id()).is_none());
    assert!(member.connector.open_links_to(&eve.id()).is_empty());

    // A late answer cannot revive her.
    transport.deliver(eve.answer(&local, REMOTE_SDP));
    transport.deliver(eve.offer(&local, REMOTE_SDP));
    settle().await;
    assert!(member.session.participant(&eve.id()).is_none());
    assert_eq!(member.connector.links_to(&eve.id()).len(), 1);
    assert!(transport.sent_of(SignalKind::Answer).is_empty());
    assert_eq!(member.events.count(|e| matches!(e, SessionEvent::Error(_))), 0);
}

#[tokio::test]
async fn test_local_leave_tears_everything_down() {
    init_tracing();

    let (mut member, transport) = mock_member(FakeDevices::new(), test_config());
    member.session.join(av()).await.expect("join failed");

    let frank = RemotePeer::new("Frank");
    let grace = RemotePeer::new("Grace");
    transport.deliver(frank.join());
    transport.deliver(grace.join());
    assert!(eventually(1000, || member.session.participants().len() == 2).await);

    member.session.leave().await.expect("leave failed");

    assert_eq!(member.session.state(), SessionState::Idle);
    assert!(member.session.participants().is_empty());
    assert!(member.connector.links().iter().all(|link| link.is_closed()));
    assert_eq!(transport.unsubscribed(), 1);
    assert!(!transport.is_subscribed());

    let leaves = transport.sent_of(SignalKind::Leave);
    assert_eq!(leaves.len(), 1);
    assert!(leaves[0].to.is_none());
    assert_eq!(leaves[0].payload, SignalPayload::Leave);

    assert_eq!(
        member
            .events
            .count(|e| matches!(e, SessionEvent::ParticipantLeft(_))),
        2
    );
    assert!(
        member
            .devices
            .issued()
            .iter()
            .flat_map(|s| s.tracks().to_vec())
            .all(|t| t.is_ended())
    );

    // Nothing from the old membership is processed any more.
    assert!(!transport.deliver(frank.join()));
}

#[tokio::test]
async fn test_dropping_the_last_handle_leaves_the_room() {
    init_tracing();

    let (member, transport) = mock_member(FakeDevices::new(), test_config());
    member.session.join(av()).await.expect("join failed");

    let devices = member.devices.clone();
    drop(member);

    assert!(eventually(1000, || transport.unsubscribed() == 1).await);
    assert_eq!(transport.sent_of(SignalKind::Leave).len(), 1);
    assert!(devices.issued()[0].tracks().iter().all(|t| t.is_ended()));
}
