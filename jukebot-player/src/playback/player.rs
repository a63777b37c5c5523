//! The per-session player: state machine plus the single decode/stream task
//!
//! One song at a time. `play` launches a decode/stream task for the song;
//! pause/stop/skip cancel that task through a song-scoped cancellation
//! token (a child of the session scope, so a session stop always takes the
//! song down with it). Every way a song can stop producing audio funnels
//! into exactly one `SongFinished` message on the completion channel the
//! orchestration loop awaits.
//!
//! Pause cannot suspend the external decoder mid-stream; it records the
//! current position and the next `play` relaunches the decoder with that
//! offset as a seek argument. Resume accuracy is therefore bounded by the
//! frame granularity plus the decoder's seek precision. This is an
//! accepted approximation, not a defect.

use crate::audio::{bytes_to_ms, AudioSink, DecoderInput, StreamingDecoder};
use crate::config::{Config, StallConfig};
use crate::error::{Error, Result};
use crate::playback::state::{transition, PlayerAction, PlayerState};
use crate::playback::volume::scale_pcm;
use jukebot_common::Song;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why a song stopped producing audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// End of stream (or the near-end heuristic fired)
    Natural,
    /// Unrecoverable decode or sink failure
    Failed(String),
    /// Skip requested; the loop advances as if the song ended naturally
    Skipped,
    /// Pause requested; the recorded position becomes the resume offset
    Paused,
    /// Player stopped (session stop or removal of the current song)
    Stopped,
}

/// Completion notification sent by the decode/stream task
#[derive(Debug, Clone)]
pub struct SongFinished {
    /// The song, carrying its final timing (resume offset when paused)
    pub song: Song,
    pub reason: FinishReason,
}

struct PlayerInner {
    config: Arc<Config>,
    state: RwLock<PlayerState>,
    volume: RwLock<f32>,
    /// Song currently owned by the player; its position is updated live by
    /// the streaming task and kept across a pause for resume
    current: RwLock<Option<Song>>,
    sink: RwLock<Option<Arc<dyn AudioSink>>>,
    /// Cancellation scope of the running decode/stream task
    song_scope: Mutex<Option<CancellationToken>>,
    /// Reason recorded by pause/stop/skip before cancelling, read by the
    /// task when it observes the cancellation
    pending_reason: Mutex<Option<FinishReason>>,
    finished_tx: mpsc::UnboundedSender<SongFinished>,
    session_scope: CancellationToken,
}

/// Playback state machine driving one song's decode-and-stream lifecycle
#[derive(Clone)]
pub struct Player {
    inner: Arc<PlayerInner>,
}

impl Player {
    /// Create a player bound to a session cancellation scope and a
    /// completion channel.
    pub fn new(
        config: Arc<Config>,
        session_scope: CancellationToken,
        finished_tx: mpsc::UnboundedSender<SongFinished>,
    ) -> Self {
        let volume = config.playback.default_volume.clamp(0.0, 1.0);
        Self {
            inner: Arc::new(PlayerInner {
                config,
                state: RwLock::new(PlayerState::Stopped),
                volume: RwLock::new(volume),
                current: RwLock::new(None),
                sink: RwLock::new(None),
                song_scope: Mutex::new(None),
                pending_reason: Mutex::new(None),
                finished_tx,
                session_scope,
            }),
        }
    }

    pub async fn state(&self) -> PlayerState {
        *self.inner.state.read().await
    }

    pub async fn volume(&self) -> f32 {
        *self.inner.volume.read().await
    }

    /// Clamp and store a new gain, applied to the next frame written.
    /// Valid in every state.
    pub async fn set_volume(&self, volume: f32) {
        let state = *self.inner.state.read().await;
        debug_assert_eq!(transition(state, PlayerAction::ChangeVolume), Some(state));
        *self.inner.volume.write().await = volume.clamp(0.0, 1.0);
    }

    /// Snapshot of the song the player currently owns, with its live
    /// position.
    pub async fn current_song(&self) -> Option<Song> {
        self.inner.current.read().await.clone()
    }

    /// Start (from Stopped) or resume (from Paused) playback of `song`.
    ///
    /// From Paused the song's start offset is set to its last recorded
    /// position before the decoder is relaunched. Ignored while already
    /// Playing.
    pub async fn play(&self, sink: Arc<dyn AudioSink>, mut song: Song) -> Result<()> {
        let inner = &self.inner;
        let previous = *inner.state.read().await;
        let Some(next) = transition(previous, PlayerAction::Play) else {
            debug!(state = %previous, "play ignored");
            return Ok(());
        };

        if previous == PlayerState::Paused && song.timing.start_offset_ms.is_none() {
            // resume: fall back to the position the player recorded
            if let Some(current) = inner.current.read().await.as_ref() {
                if current.id == song.id {
                    song.timing.start_offset_ms = current.timing.position_ms;
                }
            }
        }

        let scope = inner.session_scope.child_token();
        *inner.song_scope.lock().await = Some(scope.clone());
        *inner.pending_reason.lock().await = None;
        *inner.sink.write().await = Some(sink.clone());
        *inner.current.write().await = Some(song.clone());
        *inner.state.write().await = next;

        info!(
            song = %song.name,
            offset_ms = ?song.timing.start_offset_ms,
            "starting playback"
        );

        let task_inner = Arc::clone(inner);
        tokio::spawn(async move {
            run_stream_task(task_inner, sink, song, scope).await;
        });
        Ok(())
    }

    /// Pause the current song: cancel the decode task, keep the recorded
    /// position for resume, release an exclusive sink. No-op unless
    /// Playing.
    pub async fn pause(&self) -> bool {
        let inner = &self.inner;
        let state = *inner.state.read().await;
        let Some(next) = transition(state, PlayerAction::Pause) else {
            return false;
        };
        *inner.pending_reason.lock().await = Some(FinishReason::Paused);
        *inner.state.write().await = next;
        if let Some(scope) = inner.song_scope.lock().await.take() {
            scope.cancel();
        }
        let sink = inner.sink.write().await.take();
        if let Some(sink) = sink {
            if sink.exclusive() {
                sink.disconnect().await;
            }
        }
        true
    }

    /// Stop playback and reset the recorded position. No-op when already
    /// Stopped; returns whether anything was actually playing or paused.
    pub async fn stop(&self) -> bool {
        let inner = &self.inner;
        let state = *inner.state.read().await;
        let Some(next) = transition(state, PlayerAction::Stop) else {
            return false;
        };
        *inner.state.write().await = next;
        match state {
            PlayerState::Playing => {
                *inner.pending_reason.lock().await = Some(FinishReason::Stopped);
                if let Some(scope) = inner.song_scope.lock().await.take() {
                    scope.cancel();
                }
            }
            PlayerState::Paused => {
                // no task is running; report the completion ourselves
                let song = inner.current.write().await.take();
                if let Some(mut song) = song {
                    song.timing.reset();
                    let _ = inner.finished_tx.send(SongFinished {
                        song,
                        reason: FinishReason::Stopped,
                    });
                }
            }
            PlayerState::Stopped => {}
        }
        *inner.sink.write().await = None;
        true
    }

    /// Signal completion of the current song so the loop advances as if it
    /// ended naturally. Works from Playing and Paused.
    pub async fn skip(&self) -> bool {
        let inner = &self.inner;
        let state = *inner.state.read().await;
        match state {
            PlayerState::Playing => {
                *inner.pending_reason.lock().await = Some(FinishReason::Skipped);
                if let Some(scope) = inner.song_scope.lock().await.take() {
                    scope.cancel();
                }
                true
            }
            PlayerState::Paused => {
                *inner.state.write().await = PlayerState::Stopped;
                let song = inner.current.write().await.take();
                if let Some(mut song) = song {
                    song.timing.reset();
                    let _ = inner.finished_tx.send(SongFinished {
                        song,
                        reason: FinishReason::Skipped,
                    });
                }
                true
            }
            PlayerState::Stopped => false,
        }
    }
}

enum StreamOutcome {
    Completed,
    Cancelled,
}

/// Run one song's decode/stream loop to completion and report it.
///
/// Every error is caught here and converted into a completion message; the
/// task never lets one escape.
async fn run_stream_task(
    inner: Arc<PlayerInner>,
    sink: Arc<dyn AudioSink>,
    mut song: Song,
    scope: CancellationToken,
) {
    let outcome = stream_song(&inner, sink.as_ref(), &mut song, &scope).await;
    let reason = match outcome {
        Ok(StreamOutcome::Completed) => FinishReason::Natural,
        Ok(StreamOutcome::Cancelled) => inner
            .pending_reason
            .lock()
            .await
            .take()
            .unwrap_or(FinishReason::Stopped),
        Err(e) => {
            warn!(song = %song.name, "song failed: {}", e);
            FinishReason::Failed(e.to_string())
        }
    };

    match reason {
        FinishReason::Paused => song.timing.persist_position_as_offset(),
        _ => song.timing.reset(),
    }

    if !matches!(reason, FinishReason::Paused) {
        // pause/stop moved the state themselves before cancelling
        let mut state = inner.state.write().await;
        if let Some(next) = transition(*state, PlayerAction::SongFinished) {
            *state = next;
        }
    }

    {
        let mut current = inner.current.write().await;
        match reason {
            // keep the paused song around so resume can find its offset
            FinishReason::Paused => *current = Some(song.clone()),
            _ => {
                if current.as_ref().map(|c| c.id) == Some(song.id) {
                    *current = None;
                }
            }
        }
    }

    debug!(song = %song.name, reason = ?reason, "song finished");
    let _ = inner.finished_tx.send(SongFinished { song, reason });
}

/// Decode `song` and push volume-scaled PCM frames to the sink until the
/// stream ends, the song scope is cancelled, or an unrecoverable error.
async fn stream_song(
    inner: &PlayerInner,
    sink: &dyn AudioSink,
    song: &mut Song,
    scope: &CancellationToken,
) -> Result<StreamOutcome> {
    let locator = song
        .stream_url
        .clone()
        .ok_or_else(|| Error::Decoder("song has no stream locator".to_string()))?;
    let seek = song.timing.start_offset_ms.filter(|&ms| ms > 0);

    let mut decoder =
        StreamingDecoder::spawn(&inner.config.decoder, DecoderInput::Locator(locator), seek)?;
    let mut frame = vec![0u8; inner.config.decoder.frame_bytes];
    let base_ms = seek.unwrap_or(0);
    let mut streamed: u64 = 0;
    let mut stalls: u32 = 0;

    loop {
        let read = tokio::select! {
            _ = scope.cancelled() => None,
            read = decoder.read_frame(&mut frame) => Some(read),
        };
        let read = match read {
            Some(Ok(read)) => read,
            Some(Err(e)) => {
                decoder.stop().await;
                return Err(e);
            }
            None => {
                decoder.stop().await;
                return Ok(StreamOutcome::Cancelled);
            }
        };

        if read == 0 {
            // zero bytes: a stall, or the end of the stream. Near the known
            // song length this counts as a natural end; otherwise retry.
            let position_ms = base_ms + bytes_to_ms(streamed);
            if near_natural_end(song.timing.length_ms, position_ms, &inner.config.stall) {
                decoder.stop().await;
                return Ok(StreamOutcome::Completed);
            }
            stalls += 1;
            if stalls > inner.config.stall.max_retries {
                if song.timing.length_ms == 0 && !inner.config.stall.fail_on_unknown_duration {
                    // live stream with unknown length: keep waiting
                    stalls = 0;
                } else {
                    decoder.stop().await;
                    return Err(Error::Decoder(format!(
                        "no data from decoder after {} retries at {}ms",
                        inner.config.stall.max_retries, position_ms
                    )));
                }
            }
            tokio::select! {
                _ = scope.cancelled() => {
                    decoder.stop().await;
                    return Ok(StreamOutcome::Cancelled);
                }
                _ = tokio::time::sleep(Duration::from_millis(inner.config.stall.retry_delay_ms)) => {}
            }
            continue;
        }
        stalls = 0;

        if !sink.is_writable() {
            decoder.stop().await;
            return Err(Error::Sink("output sink is no longer writable".to_string()));
        }

        let gain = *inner.volume.read().await;
        scale_pcm(&mut frame[..read], gain);

        let write = tokio::select! {
            _ = scope.cancelled() => {
                decoder.stop().await;
                return Ok(StreamOutcome::Cancelled);
            }
            write = sink.write(&frame[..read]) => write,
        };
        if let Err(e) = write {
            decoder.stop().await;
            return Err(e);
        }

        streamed += read as u64;
        let position_ms = base_ms + bytes_to_ms(streamed);
        song.timing.position_ms = Some(position_ms);
        if let Some(current) = inner.current.write().await.as_mut() {
            if current.id == song.id {
                current.timing.position_ms = Some(position_ms);
            }
        }
    }
}

/// End-of-stream heuristic: a zero-byte read close to the song's known
/// length is a natural completion. Unknown lengths (0) never satisfy it.
fn near_natural_end(length_ms: u64, position_ms: u64, stall: &StallConfig) -> bool {
    length_ms > 0 && position_ms + stall.natural_end_slack_secs * 1000 >= length_ms
}
