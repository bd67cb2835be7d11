mod demo;
mod synthetic_devices;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use studymesh::session::SessionConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "studymesh")]
#[command(about = "Full-mesh study room sessions", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs a room of in-process participants over real WebRTC connections.
    Demo {
        #[arg(short, long, default_value_t = 3)]
        peers: usize,

        #[arg(short, long, default_value = "study-hall")]
        room: String,

        /// JSON session config; defaults apply to missing fields.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seconds to keep the room open once everyone joined.
        #[arg(long, default_value_t = 5)]
        linger: u64,

        /// Let the first participant share its screen halfway through.
        #[arg(long)]
        screen_share: bool,
    },

    /// Prints the effective session config as JSON.
    Config {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Demo {
            peers,
            room,
            config,
            linger,
            screen_share,
        } => {
            let config = load_config(config.as_ref())?;
            demo::run(demo::DemoOptions {
                peers,
                room,
                config,
                linger,
                screen_share,
            })
            .await
        }
        Commands::Config { config } => {
            let config = load_config(config.as_ref())?;
            println!("{}", config.to_json_pretty()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<SessionConfig> {
    let Some(path) = path else {
        return Ok(SessionConfig::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    SessionConfig::from_json_str(&raw)
        .with_context(|| format!("Invalid session config in {}", path.display()))
}
