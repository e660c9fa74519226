//! Demo entry point for the lobby session client
//!
//! Runs a scripted two-client session against the in-memory directory: one
//! client creates and hosts a lobby, a second joins via the shared code,
//! both timers run, the host rotates the map and kicks the guest, and the
//! guest's poll discovers the eviction.

use anyhow::Result;
use clap::Parser;
use lobby_session::config::AppConfig;
use lobby_session::directory::{CreateLobbyOptions, InMemoryDirectory};
use lobby_session::identity::{IdentityProvider, SessionIdentity};
use lobby_session::query::QueryOptions;
use lobby_session::session::LobbyCoordinator;
use lobby_session::types::{MetadataMap, MetadataValue};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::info;

/// Lobby Session Demo - scripted host/guest run against a local directory
#[derive(Parser)]
#[command(
    name = "lobby-session",
    version,
    about = "Client-side lobby session coordinator demo",
    long_about = "Drives the lobby session coordinator end to end against the in-memory \
                 reference directory: create, share code, join, heartbeat, poll refresh, \
                 metadata update, kick, delete."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Heartbeat interval override in seconds
    #[arg(long, value_name = "SECONDS")]
    heartbeat_interval: Option<u64>,

    /// Poll interval override in milliseconds
    #[arg(long, value_name = "MS")]
    poll_interval_ms: Option<u64>,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env()?,
    };
    if let Some(log_level) = args.log_level {
        config.service.log_level = log_level;
    }
    if let Some(interval) = args.heartbeat_interval {
        config.session.heartbeat_interval_seconds = interval;
    }
    if let Some(interval) = args.poll_interval_ms {
        config.session.poll_interval_ms = interval;
    }
    config.validate()?;

    init_logging(&config.service.log_level)?;
    info!("Starting {} v{}", config.service.name, lobby_session::VERSION);

    let directory = Arc::new(InMemoryDirectory::with_code_length(
        config.session.join_code_length,
    ));

    // host client
    let host_identity = Arc::new(SessionIdentity::new());
    host_identity.sign_in();
    let host = LobbyCoordinator::new(
        directory.clone(),
        host_identity.clone(),
        config.session.clone(),
    );
    let host_heartbeat = host.start_heartbeat();
    let host_poll = host.start_poll();

    let mut lobby_metadata = MetadataMap::new();
    lobby_metadata.insert("mode".to_string(), MetadataValue::public("ranked"));
    lobby_metadata.insert("map".to_string(), MetadataValue::public("canyon"));
    let mut host_metadata = MetadataMap::new();
    host_metadata.insert("display_name".to_string(), MetadataValue::public("Ada"));

    let created = host
        .create_lobby(CreateLobbyOptions {
            name: "Arena".to_string(),
            max_players: 4,
            is_private: false,
            metadata: lobby_metadata,
            host_metadata,
        })
        .await?;
    println!("{}", serde_json::to_string_pretty(&created)?);

    let open = host.query_lobbies(QueryOptions::open_lobbies()).await?;
    info!("Query found {} open lobbies", open.len());

    // guest client joins with the shared code
    let guest_identity = Arc::new(SessionIdentity::new());
    guest_identity.sign_in();
    let guest = LobbyCoordinator::new(
        directory.clone(),
        guest_identity.clone(),
        config.session.clone(),
    );
    let guest_poll = guest.start_poll();

    let mut guest_metadata = MetadataMap::new();
    guest_metadata.insert("display_name".to_string(), MetadataValue::public("Grace"));
    guest.join_by_code(&created.code, guest_metadata).await?;
    info!("Guest joined via code {}", created.code);

    // let one heartbeat cycle and a few polls run
    sleep(config.session.heartbeat_interval() + config.session.poll_interval()).await;
    info!(
        "Directory recorded {} heartbeats; host sees {} players",
        directory.total_heartbeats(),
        host.joined_lobby().map(|l| l.players.len()).unwrap_or(0)
    );

    // rotate the map; the guest's poll picks it up
    let mut update = MetadataMap::new();
    update.insert("map".to_string(), MetadataValue::public("glacier"));
    host.update_lobby_metadata(update).await?;
    sleep(config.session.poll_interval() * 2).await;
    if let Some(lobby) = guest.joined_lobby() {
        info!("Guest sees map '{}'", lobby.metadata["map"].value);
    }

    // kick the guest; their next poll discovers the eviction
    let guest_id = guest_identity.current_player_id();
    host.kick_player(&guest_id).await?;
    sleep(config.session.poll_interval() * 2).await;
    info!("Guest session status after kick: {:?}", guest.status());

    host.delete_lobby().await?;
    info!("Host session status after delete: {:?}", host.status());

    host_heartbeat.shutdown();
    host_poll.shutdown();
    guest_poll.shutdown();
    Ok(())
}
