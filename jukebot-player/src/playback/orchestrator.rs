//! Per-session playback loop and queue bookkeeping
//!
//! One long-running loop task per session feeds songs from the queue into
//! the player, one at a time, in queue order. The loop resolves each song's
//! stream locator just before playback (a resolution failure skips that
//! song, never the session), awaits the completion message, and applies the
//! play-mode policy: Queue removes the finished entry, Playlist advances
//! the index and wraps. A completion caused by a pause leaves the loop
//! parked and the index untouched, so the same song resumes next.

use crate::audio::AudioSink;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::playback::monitor::{self, StatusSink};
use crate::playback::player::{FinishReason, Player, SongFinished};
use crate::playback::queue::SongQueue;
use crate::playback::state::PlayerState;
use crate::resolve::ResolverChain;
use jukebot_common::{PlayMode, PlayerEvent, Song};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct OrchestratorInner {
    config: Arc<Config>,
    queue: SongQueue,
    play_mode: RwLock<PlayMode>,
    /// Index of the entry the loop is (about to be) playing. Only the loop
    /// advances it; external removal ahead of it shifts it down.
    index: AtomicUsize,
    player: Player,
    resolvers: Arc<ResolverChain>,
    status: Arc<dyn StatusSink>,
    sink: RwLock<Option<Arc<dyn AudioSink>>>,
    /// Snapshot of the song the loop is working on (single-writer: the loop)
    current_song: Arc<RwLock<Option<Song>>>,
    last_song: RwLock<Option<Song>>,
    session_scope: CancellationToken,
    finished_rx: Mutex<Option<mpsc::UnboundedReceiver<SongFinished>>>,
    loop_task: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<PlayerEvent>,
}

/// Owns the ordered song list and the playback loop for one session
#[derive(Clone)]
pub struct QueueOrchestrator {
    inner: Arc<OrchestratorInner>,
}

impl QueueOrchestrator {
    pub fn new(
        config: Arc<Config>,
        resolvers: Arc<ResolverChain>,
        status: Arc<dyn StatusSink>,
        session_scope: CancellationToken,
    ) -> Self {
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        let player = Player::new(Arc::clone(&config), session_scope.clone(), finished_tx);
        let (events, _) = broadcast::channel(100);
        Self {
            inner: Arc::new(OrchestratorInner {
                config,
                queue: SongQueue::new(),
                play_mode: RwLock::new(PlayMode::default()),
                index: AtomicUsize::new(0),
                player,
                resolvers,
                status,
                sink: RwLock::new(None),
                current_song: Arc::new(RwLock::new(None)),
                last_song: RwLock::new(None),
                session_scope,
                finished_rx: Mutex::new(Some(finished_rx)),
                loop_task: Mutex::new(None),
                events,
            }),
        }
    }

    /// Append a song to the queue. No side effect on current playback.
    pub async fn queue_song(&self, song: Song) {
        self.inner.queue.push(song).await;
        let queue_len = self.inner.queue.len().await;
        emit(
            &self.inner,
            PlayerEvent::QueueChanged {
                queue_len,
                timestamp: PlayerEvent::now(),
            },
        );
    }

    /// Start the playback loop with the given output sink, or resume a
    /// paused song.
    pub async fn play(&self, sink: Arc<dyn AudioSink>) -> Result<()> {
        let inner = &self.inner;
        if inner.session_scope.is_cancelled() {
            return Err(Error::InvalidState("session is stopped".to_string()));
        }
        *inner.sink.write().await = Some(Arc::clone(&sink));

        // resume goes straight to the state machine; the parked loop picks
        // up the eventual completion
        if inner.player.state().await == PlayerState::Paused {
            let index = inner.index.load(Ordering::SeqCst);
            let queued = inner.queue.get(index).await;
            let paused = inner.player.current_song().await;
            let song = match (queued, paused) {
                // the queue entry carries the persisted resume offset
                (Some(q), Some(p)) if q.id == p.id => q,
                (_, Some(p)) => p,
                (Some(q), None) => q,
                (None, None) => {
                    return Err(Error::InvalidState(
                        "paused with no current song".to_string(),
                    ))
                }
            };
            inner.player.play(sink, song).await?;
            emit(
                inner,
                PlayerEvent::PlaybackStateChanged {
                    state: PlayerState::Playing,
                    timestamp: PlayerEvent::now(),
                },
            );
            return Ok(());
        }

        let mut guard = inner.loop_task.lock().await;
        let running = guard.as_ref().map(|h| !h.is_finished()).unwrap_or(false);
        if running {
            debug!("playback loop already active");
            return Ok(());
        }
        let loop_inner = Arc::clone(inner);
        *guard = Some(tokio::spawn(playback_loop(loop_inner)));
        Ok(())
    }

    /// Clear the queue and tear the session down. Returns whether anything
    /// was actually playing or paused (false when already idle).
    pub async fn stop(&self) -> bool {
        let inner = &self.inner;
        let loop_running = {
            let guard = inner.loop_task.lock().await;
            guard.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
        };
        let was_active = loop_running || inner.player.state().await != PlayerState::Stopped;
        inner.queue.clear().await;
        inner.session_scope.cancel();
        inner.player.stop().await;
        emit(
            inner,
            PlayerEvent::QueueChanged {
                queue_len: 0,
                timestamp: PlayerEvent::now(),
            },
        );
        was_active
    }

    /// Pause the current song. Returns false when nothing is playing.
    pub async fn pause(&self) -> bool {
        let paused = self.inner.player.pause().await;
        if paused {
            emit(
                &self.inner,
                PlayerEvent::PlaybackStateChanged {
                    state: PlayerState::Paused,
                    timestamp: PlayerEvent::now(),
                },
            );
        }
        paused
    }

    /// Skip the current song; the loop advances as if it ended naturally.
    pub async fn skip(&self) -> bool {
        self.inner.player.skip().await
    }

    /// Remove the song at `index`. Removing the entry that is currently
    /// playing (or paused) stops the player; the loop then proceeds with
    /// the next queue head. Out-of-bounds indices return None and leave the
    /// queue unchanged.
    pub async fn remove_song(&self, index: usize) -> Option<Song> {
        let inner = &self.inner;
        let current_id = inner.current_song.read().await.as_ref().map(|s| s.id);
        let entry_id = inner.queue.get(index).await.map(|s| s.id);
        let removed = inner.queue.remove(index).await?;

        let is_current = entry_id.is_some() && entry_id == current_id;
        if is_current && inner.player.state().await != PlayerState::Stopped {
            inner.player.stop().await;
        } else {
            let current_index = inner.index.load(Ordering::SeqCst);
            if index < current_index {
                inner.index.store(current_index - 1, Ordering::SeqCst);
            }
        }

        let queue_len = inner.queue.len().await;
        emit(
            inner,
            PlayerEvent::QueueChanged {
                queue_len,
                timestamp: PlayerEvent::now(),
            },
        );
        Some(removed)
    }

    /// Drop every queued song. The current song keeps playing; the loop
    /// ends after it finishes.
    pub async fn clear_queue(&self) {
        self.inner.queue.clear().await;
        emit(
            &self.inner,
            PlayerEvent::QueueChanged {
                queue_len: 0,
                timestamp: PlayerEvent::now(),
            },
        );
    }

    pub async fn volume(&self) -> f32 {
        self.inner.player.volume().await
    }

    pub async fn set_volume(&self, volume: f32) {
        self.inner.player.set_volume(volume).await;
        let volume = self.inner.player.volume().await;
        emit(
            &self.inner,
            PlayerEvent::VolumeChanged {
                volume,
                timestamp: PlayerEvent::now(),
            },
        );
    }

    pub async fn play_mode(&self) -> PlayMode {
        *self.inner.play_mode.read().await
    }

    pub async fn set_play_mode(&self, mode: PlayMode) {
        *self.inner.play_mode.write().await = mode;
    }

    /// The song currently playing or loading, with its live position
    pub async fn current_song(&self) -> Option<Song> {
        if let Some(song) = self.inner.player.current_song().await {
            return Some(song);
        }
        self.inner.current_song.read().await.clone()
    }

    /// The most recently finished song
    pub async fn last_song(&self) -> Option<Song> {
        self.inner.last_song.read().await.clone()
    }

    pub async fn song_list(&self) -> Vec<Song> {
        self.inner.queue.snapshot().await
    }

    pub async fn state(&self) -> PlayerState {
        self.inner.player.state().await
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.inner.events.subscribe()
    }

    /// Wait for the playback loop to drain. Used by the CLI exerciser.
    pub async fn wait_idle(&self) {
        loop {
            let finished = {
                let guard = self.inner.loop_task.lock().await;
                guard.as_ref().map(|h| h.is_finished()).unwrap_or(true)
            };
            if finished {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

fn emit(inner: &OrchestratorInner, event: PlayerEvent) {
    // no receivers is fine
    let _ = inner.events.send(event);
}

/// The session's long-running playback loop
async fn playback_loop(inner: Arc<OrchestratorInner>) {
    info!("playback loop started");
    let mut finished_rx = match inner.finished_rx.lock().await.take() {
        Some(rx) => rx,
        None => {
            warn!("completion channel already taken; refusing to run a second loop");
            return;
        }
    };

    while !inner.session_scope.is_cancelled() {
        let len = inner.queue.len().await;
        if len == 0 {
            break;
        }
        let mut index = inner.index.load(Ordering::SeqCst);
        if index >= len {
            index = 0;
            inner.index.store(0, Ordering::SeqCst);
        }
        let Some(mut song) = inner.queue.get(index).await else {
            // queue shrank between the length check and the read
            continue;
        };

        // publish the snapshot first so status can report "loading"
        *inner.current_song.write().await = Some(song.clone());
        let _reporter = monitor::spawn_progress_reporter(
            Arc::clone(&inner.status),
            inner.player.clone(),
            Arc::clone(&inner.current_song),
            song.id,
            Duration::from_secs(inner.config.playback.status_interval_secs),
            inner.session_scope.clone(),
        );

        // resolve the stream locator; failure skips this song only
        if !song.is_resolved() {
            match inner.resolvers.resolve_stream_url(&mut song).await {
                Ok(()) => {
                    inner.queue.update(index, song.clone()).await;
                    *inner.current_song.write().await = Some(song.clone());
                }
                Err(e) => {
                    warn!(song = %song.name, "could not resolve stream: {}", e);
                    notify_failure(&inner, &song).await;
                    *inner.current_song.write().await = None;
                    advance(&inner, index, song.id).await;
                    continue;
                }
            }
        }

        let Some(sink) = inner.sink.read().await.clone() else {
            warn!("no output sink attached; stopping playback loop");
            *inner.current_song.write().await = None;
            break;
        };

        emit(
            &inner,
            PlayerEvent::SongStarted {
                song_id: song.id,
                name: song.name.clone(),
                timestamp: PlayerEvent::now(),
            },
        );
        if let Err(e) = inner.player.play(sink, song.clone()).await {
            warn!(song = %song.name, "failed to start playback: {}", e);
            notify_failure(&inner, &song).await;
            *inner.current_song.write().await = None;
            advance(&inner, index, song.id).await;
            continue;
        }
        emit(
            &inner,
            PlayerEvent::PlaybackStateChanged {
                state: PlayerState::Playing,
                timestamp: PlayerEvent::now(),
            },
        );

        // wait out the song; a pause parks us right here
        let finished = loop {
            let message = tokio::select! {
                _ = inner.session_scope.cancelled() => None,
                message = finished_rx.recv() => message,
            };
            match message {
                None => break None,
                Some(f) if f.reason == FinishReason::Paused => {
                    // persist the resume offset back into the queue entry
                    inner.queue.update(index, f.song.clone()).await;
                    continue;
                }
                Some(f) => break Some(f),
            }
        };
        let Some(finished) = finished else {
            // session cancelled
            break;
        };

        *inner.last_song.write().await = Some(finished.song.clone());
        *inner.current_song.write().await = None;
        emit(
            &inner,
            PlayerEvent::SongFinished {
                song_id: finished.song.id,
                name: finished.song.name.clone(),
                completed: finished.reason == FinishReason::Natural,
                timestamp: PlayerEvent::now(),
            },
        );

        match &finished.reason {
            FinishReason::Stopped => {
                if inner.session_scope.is_cancelled() {
                    break;
                }
                // the current entry was removed externally; the index
                // already points at the next song
                continue;
            }
            FinishReason::Failed(e) => {
                debug!(song = %finished.song.name, "song failed: {}", e);
                notify_failure(&inner, &finished.song).await;
                advance(&inner, index, finished.song.id).await;
            }
            FinishReason::Natural | FinishReason::Skipped => {
                advance(&inner, index, finished.song.id).await;
            }
            // pauses never leave the inner wait loop
            FinishReason::Paused => {}
        }
    }

    // teardown: queue drained, session stopped, or sink gone
    *inner.current_song.write().await = None;
    inner.player.stop().await;
    let sink = inner.sink.write().await.take();
    if let Some(sink) = sink {
        if let Err(e) = sink.flush().await {
            debug!("sink flush on teardown failed: {}", e);
        }
        sink.disconnect().await;
    }
    *inner.finished_rx.lock().await = Some(finished_rx);
    emit(
        &inner,
        PlayerEvent::PlaybackStateChanged {
            state: PlayerState::Stopped,
            timestamp: PlayerEvent::now(),
        },
    );
    info!("playback loop finished");
}

/// Apply the play-mode policy after a song is done (finished, skipped,
/// failed, or unresolvable).
async fn advance(inner: &OrchestratorInner, index: usize, song_id: uuid::Uuid) {
    match *inner.play_mode.read().await {
        PlayMode::Queue => {
            // remove the completed entry unless something already displaced it
            if inner.queue.get(index).await.map(|s| s.id) == Some(song_id) {
                inner.queue.remove(index).await;
            }
            let queue_len = inner.queue.len().await;
            emit(
                inner,
                PlayerEvent::QueueChanged {
                    queue_len,
                    timestamp: PlayerEvent::now(),
                },
            );
        }
        PlayMode::Playlist => {
            let len = inner.queue.len().await;
            let next = if len == 0 { 0 } else { (index + 1) % len };
            inner.index.store(next, Ordering::SeqCst);
        }
    }
}

/// Single, generic user-facing failure notification; details stay in the log
async fn notify_failure(inner: &OrchestratorInner, song: &Song) {
    let text = format!("Could not play: {}", song.name);
    if let Err(e) = inner.status.send_message(&text).await {
        debug!("failure notification failed: {}", e);
    }
}
