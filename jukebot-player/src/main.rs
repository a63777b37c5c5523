//! jukebot-player - local playback exerciser
//!
//! Resolves the song references given on the command line, queues them in a
//! single playback session, and streams the decoded PCM to stdout. Pipe the
//! output into a player to hear it:
//!
//! ```text
//! jukebot-player song.flac | aplay -f S16_LE -c 2 -r 48000
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jukebot_common::PlayMode;
use jukebot_player::audio::StdoutSink;
use jukebot_player::playback::{LogStatusSink, SessionKey, SessionRegistry};
use jukebot_player::resolve::ResolverChain;
use jukebot_player::Config;

/// Command-line arguments for jukebot-player
#[derive(Parser, Debug)]
#[command(name = "jukebot-player")]
#[command(about = "Queue-driven playback engine, streaming raw PCM to stdout")]
#[command(version)]
struct Args {
    /// Song references: file paths, direct URLs, or YouTube links
    #[arg(required = true)]
    references: Vec<String>,

    /// Path to a TOML configuration file
    #[arg(short, long, env = "JUKEBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Playback volume (0.0 - 1.0)
    #[arg(long)]
    volume: Option<f32>,

    /// Keep songs in the list and wrap around instead of consuming them
    #[arg(long)]
    playlist: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;

    // PCM goes to stdout, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting jukebot player");

    let config = Arc::new(config);
    let resolvers = Arc::new(ResolverChain::standard(&config.resolver));
    let registry = SessionRegistry::new(Arc::clone(&config), Arc::clone(&resolvers));

    let session = registry
        .get_or_create(SessionKey(0), Arc::new(LogStatusSink::new()))
        .await;
    let orchestrator = session.orchestrator();

    if args.playlist {
        orchestrator.set_play_mode(PlayMode::Playlist).await;
    }
    if let Some(volume) = args.volume {
        orchestrator.set_volume(volume).await;
    }

    for reference in &args.references {
        match resolvers.resolve(reference).await {
            Ok(song) => {
                info!(song = %song.name, "queued");
                orchestrator.queue_song(song).await;
            }
            Err(e) => warn!(reference, "could not resolve: {}", e),
        }
    }

    if orchestrator.song_list().await.is_empty() {
        anyhow::bail!("nothing to play");
    }

    orchestrator
        .play(Arc::new(StdoutSink::new()))
        .await
        .context("Failed to start playback")?;

    tokio::select! {
        _ = orchestrator.wait_idle() => {
            info!("queue drained");
        }
        _ = shutdown_signal() => {
            info!("interrupted, stopping playback");
            registry.stop(SessionKey(0)).await;
        }
    }

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                warn!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
