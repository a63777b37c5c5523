//! Status sink contract and the periodic progress reporter task
//!
//! While a song is loading or playing, a background task pushes a progress
//! snapshot to the status collaborator every few seconds. The task stops as
//! soon as the current song reference changes or playback stops, and it
//! tolerates its message having been deleted out from under it.

use crate::error::Result;
use crate::playback::player::Player;
use crate::playback::state::PlayerState;
use async_trait::async_trait;
use jukebot_common::human_time::format_progress;
use jukebot_common::Song;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// Opaque handle to a status message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle(pub u64);

/// Where progress snapshots and user-facing notifications go
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn send_message(&self, content: &str) -> Result<MessageHandle>;
    async fn update_message(&self, handle: &MessageHandle, content: &str) -> Result<()>;
    async fn delete_message(&self, handle: &MessageHandle) -> Result<()>;
}

/// Status sink that writes to the log. Used by the CLI exerciser and as a
/// harmless default.
#[derive(Default)]
pub struct LogStatusSink {
    next_id: AtomicU64,
}

impl LogStatusSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusSink for LogStatusSink {
    async fn send_message(&self, content: &str) -> Result<MessageHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        info!("status: {}", content);
        Ok(MessageHandle(id))
    }

    async fn update_message(&self, _handle: &MessageHandle, content: &str) -> Result<()> {
        info!("status: {}", content);
        Ok(())
    }

    async fn delete_message(&self, handle: &MessageHandle) -> Result<()> {
        debug!("status message {} dropped", handle.0);
        Ok(())
    }
}

/// Render one progress line for the status message
pub(crate) fn progress_line(song: &Song, state: PlayerState) -> String {
    let position_ms = song.timing.position_ms.unwrap_or(0);
    match state {
        PlayerState::Playing => format!(
            "Now playing: {} [{}]",
            song.name,
            format_progress(position_ms, song.timing.length_ms)
        ),
        PlayerState::Paused => format!(
            "Paused: {} [{}]",
            song.name,
            format_progress(position_ms, song.timing.length_ms)
        ),
        PlayerState::Stopped => format!("Loading: {}", song.name),
    }
}

/// Spawn the progress reporter for the song currently occupying
/// `current_song`.
///
/// The task exits when the current song reference changes, when playback
/// stops after having played, or when the session scope is cancelled.
pub(crate) fn spawn_progress_reporter(
    status: Arc<dyn StatusSink>,
    player: Player,
    current_song: Arc<RwLock<Option<Song>>>,
    song_id: Uuid,
    interval: Duration,
    session_scope: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut handle: Option<MessageHandle> = None;
        let mut seen_playing = false;

        loop {
            tokio::select! {
                _ = session_scope.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // reference changed or loop moved on: stop reporting
            let Some(snapshot) = current_song.read().await.clone() else {
                break;
            };
            if snapshot.id != song_id {
                break;
            }

            let state = player.state().await;
            if state == PlayerState::Stopped && seen_playing {
                break;
            }
            if state == PlayerState::Playing {
                seen_playing = true;
            }

            // prefer the player's copy: it carries the live position
            let song = match player.current_song().await {
                Some(song) if song.id == song_id => song,
                _ => snapshot,
            };
            publish(&status, &mut handle, &progress_line(&song, state)).await;
        }

        if let Some(handle) = handle {
            let _ = status.delete_message(&handle).await;
        }
    })
}

/// Send or update the status message, re-sending when the previous message
/// disappeared (e.g. deleted by a user).
async fn publish(status: &Arc<dyn StatusSink>, handle: &mut Option<MessageHandle>, content: &str) {
    match handle {
        Some(existing) => {
            if let Err(e) = status.update_message(existing, content).await {
                debug!("status update failed ({}), sending a new message", e);
                *handle = status.send_message(content).await.ok();
            }
        }
        None => {
            *handle = status.send_message(content).await.ok();
        }
    }
}
