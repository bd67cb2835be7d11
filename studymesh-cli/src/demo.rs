use crate::synthetic_devices::SyntheticDevices;
use anyhow::{Context, Result, ensure};
use colored::*;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use studymesh::model::{MediaSettings, RoomId, RoomIdentity};
use studymesh::session::{
    LocalSignalingHub, RoomSession, SessionConfig, SessionDeps, SessionEvent, SessionEvents,
    WebRtcConnector,
};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};

const NAMES: [&str; 6] = ["Ada", "Grace", "Alan", "Edsger", "Barbara", "Donald"];
const COLORS: [Color; 5] = [
    Color::Cyan,
    Color::Magenta,
    Color::Yellow,
    Color::Blue,
    Color::Green,
];

pub struct DemoOptions {
    pub peers: usize,
    pub room: String,
    pub config: SessionConfig,
    pub linger: u64,
    pub screen_share: bool,
}

pub async fn run(options: DemoOptions) -> Result<()> {
    ensure!(options.peers >= 2, "a study room needs at least two participants");

    println!(
        "{} {} with {} participants",
        "📚 Opening room".green().bold(),
        options.room.bold(),
        options.peers
    );

    let hub = LocalSignalingHub::new();
    let room_id = RoomId::new(options.room.clone());
    let mut sessions = Vec::with_capacity(options.peers);
    let mut printers = Vec::with_capacity(options.peers);

    for i in 0..options.peers {
        let name = participant_name(i);
        let identity = RoomIdentity::new(room_id.clone(), name.clone());
        let deps = SessionDeps {
            transport: Arc::new(hub.endpoint(identity.local_peer_id.clone())),
            connector: Arc::new(WebRtcConnector),
            devices: Arc::new(SyntheticDevices),
        };

        let (session, events) = RoomSession::new(identity, options.config.clone(), deps);
        printers.push(spawn_printer(name, COLORS[i % COLORS.len()], events));
        sessions.push(session);
    }

    for session in &sessions {
        session
            .join(MediaSettings::new(true, true))
            .await
            .with_context(|| format!("{} failed to join", session.identity().display_name))?;
    }

    let meshed = wait_for_mesh(&sessions, Duration::from_secs(15)).await;
    if meshed {
        println!("{}", "✨ Every participant sees everyone else".green().bold());
    } else {
        println!("{}", "⚠️  Mesh incomplete after 15s".yellow().bold());
    }
    print_rosters(&sessions);

    let presenter = &sessions[0];
    let muted = !presenter.toggle_audio().await;
    println!(
        "🎙️  {} {} the microphone",
        presenter.identity().display_name.bold(),
        if muted { "muted" } else { "unmuted" }
    );

    let half = Duration::from_secs(options.linger) / 2;
    if options.screen_share && presenter.start_screen_share().await.is_some() {
        println!("🖥️  {} is sharing a screen", presenter.identity().display_name.bold());
    }
    sleep(half).await;

    if options.screen_share && presenter.stop_screen_share().await {
        println!("🖥️  {} stopped sharing", presenter.identity().display_name.bold());
    }
    sleep(half).await;
    print_rosters(&sessions);

    println!("{}", "👋 Everyone leaves".cyan());
    let results = join_all(sessions.iter().map(|s| s.leave())).await;
    for (session, result) in sessions.iter().zip(results) {
        if let Err(e) = result {
            println!("   {} {}: {}", "✗".red(), session.identity().display_name, e);
        }
    }

    drop(sessions);
    for printer in printers {
        let _ = printer.await;
    }
    println!("{}", "✅ Room closed".green().bold());
    Ok(())
}

fn participant_name(index: usize) -> String {
    match NAMES.get(index) {
        Some(name) => (*name).to_string(),
        None => format!("Student {}", index + 1),
    }
}

async fn wait_for_mesh(sessions: &[RoomSession], timeout: Duration) -> bool {
    let expected = sessions.len() - 1;
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if sessions.iter().all(|s| s.participants().len() == expected) {
            return true;
        }
        sleep(Duration::from_millis(100)).await;
    }
    false
}

fn print_rosters(sessions: &[RoomSession]) {
    for session in sessions {
        let seen: Vec<String> = session
            .participants()
            .iter()
            .map(|p| {
                let mut flags = String::new();
                flags.push(if p.is_audio_on { '🎙' } else { '·' });
                flags.push(if p.is_video_on { '📷' } else { '·' });
                if p.is_screen_sharing {
                    flags.push('🖥');
                }
                format!("{} {}", p.name, flags)
            })
            .collect();
        println!(
            "   {} sees [{}]",
            session.identity().display_name.bold(),
            seen.join(", ")
        );
    }
}

fn spawn_printer(name: String, color: Color, mut events: SessionEvents) -> JoinHandle<()> {
    tokio::spawn(async move {
        let tag = format!("[{}]", name).color(color).bold();
        while let Some(event) = events.recv().await {
            println!("{} {}", tag, describe(&event));
        }
    })
}

fn describe(event: &SessionEvent) -> String {
    match event {
        SessionEvent::LocalStreamReady(stream) => {
            format!("local stream ready ({} tracks)", stream.tracks().len())
        }
        SessionEvent::LocalMediaChanged(settings) => format!(
            "local media audio={} video={} screen={}",
            settings.audio, settings.video, settings.screen_share
        ),
        SessionEvent::ParticipantJoined(p) => format!("{} {}", "joined:".green(), p.name),
        SessionEvent::ParticipantLeft(p) => format!("{} {}", "left:".red(), p.name),
        SessionEvent::ParticipantUpdated(p) => format!(
            "updated: {} audio={} video={} screen={} speaking={}",
            p.name, p.is_audio_on, p.is_video_on, p.is_screen_sharing, p.is_speaking
        ),
        SessionEvent::StreamReceived { peer_id, stream } => {
            format!("stream from {} ({} tracks)", short(peer_id), stream.tracks.len())
        }
        SessionEvent::StreamRemoved { peer_id, .. } => {
            format!("stream from {} removed", short(peer_id))
        }
        SessionEvent::ConnectionStateChanged { peer_id, state } => {
            format!("link to {} is {:?}", short(peer_id), state)
        }
        SessionEvent::Error(e) => format!("{} {}", "error:".red().bold(), e),
    }
}

fn short(peer_id: &studymesh::PeerId) -> String {
    peer_id.to_string().chars().take(8).collect()
}
