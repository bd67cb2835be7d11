
use std::sync::Arc;
use studymesh_core::{MediaSettings, RoomId, RoomIdentity};
use studymesh_session::{LocalSignalingHub, RoomSession, SessionConfig, SessionDeps, SessionEvent};
use tracing::Level;

use crate::utils::{EventRecorder, FakeDevices, LoopbackConnector, MockTransport};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn test_config() -> SessionConfig {
    SessionConfig {
        ice_servers: Vec::new(),
        reconnect_backoff_ms: 200,
        ..SessionConfig::default()
    }
}

pub fn av() -> MediaSettings {
    MediaSettings::new(true, true)
}

/// A session wired to fakes, plus handles to inspect them.
pub struct TestMember {
    pub session: RoomSession,
    pub events: EventRecorder,
    pub connector: LoopbackConnector,
    pub devices: FakeDevices,
}

/// A member of `room` talking through the in-process hub.
pub fn hub_member(hub: &LocalSignalingHub, room: &str, name: &str) -> TestMember {
    let identity = RoomIdentity::new(RoomId::new(room), name);
    let transport = hub.endpoint(identity.local_peer_id.clone());
    build_member(identity, Arc::new(transport), FakeDevices::new(), test_config())
}

/// A lone session whose room is played by the returned [`MockTransport`].
pub fn mock_member(devices: FakeDevices, config: SessionConfig) -> (TestMember, MockTransport) {
    let transport = MockTransport::new();
    let identity = RoomIdentity::new(RoomId::new("mock-room"), "local");
    let member = build_member(identity, Arc::new(transport.clone()), devices, config);
    (member, transport)
}

pub fn build_member(
    identity: RoomIdentity,
    transport: Arc<dyn studymesh_session::SignalingTransport>,
    devices: FakeDevices,
    config: SessionConfig,
) -> TestMember {
    let connector = LoopbackConnector::new();
    let (session, events) = RoomSession::new(
        identity,
        config,
        SessionDeps {
            transport,
            connector: Arc::new(connector.clone()),
            devices: Arc::new(devices.clone()),
        },
    );
    TestMember {
        session,
        events: EventRecorder::new(events),
        connector,
        devices,
    }
}

pub fn is_connected_to(event: &SessionEvent, peer: &studymesh_core::PeerId) -> bool {
    matches!(
        event,
        SessionEvent::ConnectionStateChanged { peer_id, state }
            if peer_id == peer && *state == studymesh_core::ConnectionState::Connected
    )
}
