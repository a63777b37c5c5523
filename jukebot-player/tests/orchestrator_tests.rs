//! Orchestrator behaviour around queue mutation, play modes, and failure
//! recovery

#![cfg(unix)]

mod helpers;

use helpers::*;
use jukebot_common::{PlayMode, PlayerState, Song, SongSource};
use jukebot_player::playback::QueueOrchestrator;
use jukebot_player::resolve::ResolverChain;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

async fn wait_for_playing(orch: &QueueOrchestrator) {
    let orch = orch.clone();
    wait_for("playback to start", move || {
        let orch = orch.clone();
        async move {
            orch.state().await == PlayerState::Playing
                && orch
                    .current_song()
                    .await
                    .and_then(|s| s.timing.position_ms)
                    .unwrap_or(0)
                    > 0
        }
    })
    .await;
}

/// Removing the currently playing entry stops the player; the rest of the
/// queue stays.
#[tokio::test]
async fn removing_the_current_song_stops_the_player() {
    let dir = tempdir().unwrap();
    let args_log = dir.path().join("args.log");
    let decoder = fake_decoder(dir.path(), 500, &args_log);

    let orch = orchestrator(test_config(&decoder));
    orch.queue_song(song("current", "/music/current.mp3", 10_000)).await;

    orch.play(TestSink::paced(Duration::from_millis(20)))
        .await
        .unwrap();
    wait_for_playing(&orch).await;

    let removed = orch.remove_song(0).await;
    assert_eq!(removed.unwrap().name, "current");
    assert_eq!(orch.state().await, PlayerState::Stopped);

    orch.wait_idle().await;
    assert!(orch.song_list().await.is_empty());
}

/// Out-of-bounds removal returns no song and leaves the queue unchanged.
#[tokio::test]
async fn remove_song_out_of_bounds_is_harmless() {
    let dir = tempdir().unwrap();
    let decoder = fake_decoder(dir.path(), 10, &dir.path().join("args.log"));

    let orch = orchestrator(test_config(&decoder));
    orch.queue_song(song("only", "/music/only.mp3", 200)).await;

    assert!(orch.remove_song(3).await.is_none());
    assert_eq!(orch.song_list().await.len(), 1);
}

/// Playlist mode keeps the list intact and wraps the index from the end
/// back to 0.
#[tokio::test]
async fn playlist_mode_wraps_around_without_consuming_songs() {
    let dir = tempdir().unwrap();
    let args_log = dir.path().join("args.log");
    let decoder = fake_decoder(dir.path(), 5, &args_log);

    let orch = orchestrator(test_config(&decoder));
    orch.set_play_mode(PlayMode::Playlist).await;
    assert_eq!(orch.play_mode().await, PlayMode::Playlist);

    // 5 frames = 100 ms each; length matches so each pass ends naturally
    orch.queue_song(song("alpha", "/music/alpha.mp3", 100)).await;
    orch.queue_song(song("beta", "/music/beta.mp3", 100)).await;
    orch.play(TestSink::new()).await.unwrap();

    {
        let args_log = args_log.clone();
        wait_for("the playlist to wrap back to the first song", move || {
            let args_log = args_log.clone();
            async move { decoder_invocations(&args_log).len() >= 3 }
        })
        .await;
    }

    // still two songs queued while the loop is running
    assert_eq!(orch.song_list().await.len(), 2);

    let invocations = decoder_invocations(&args_log);
    assert!(invocations[0].contains("/music/alpha.mp3"));
    assert!(invocations[1].contains("/music/beta.mp3"));
    assert!(invocations[2].contains("/music/alpha.mp3"), "index must wrap to 0");

    assert!(orch.stop().await);
    orch.wait_idle().await;
    assert!(orch.song_list().await.is_empty());
}

/// A song that cannot be resolved is skipped with a user-facing
/// notification; the session and the rest of the queue survive.
#[tokio::test]
async fn resolution_failure_skips_the_song_not_the_session() {
    let dir = tempdir().unwrap();
    let args_log = dir.path().join("args.log");
    let decoder = fake_decoder(dir.path(), 10, &args_log);

    let status = Arc::new(RecordingStatusSink::new());
    let orch = orchestrator_with(
        test_config(&decoder),
        ResolverChain::with_resolvers(Vec::new(), None),
        status.clone(),
    );

    // no stream locator and no resolver able to provide one
    let unresolvable = Song::new("mystery", "mystery reference", SongSource::HttpStream);
    orch.queue_song(unresolvable).await;
    orch.queue_song(song("good", "/music/good.mp3", 200)).await;

    orch.play(TestSink::new()).await.unwrap();
    orch.wait_idle().await;

    assert!(status.contains("Could not play: mystery"));
    let invocations = decoder_invocations(&args_log);
    assert_eq!(invocations.len(), 1, "only the playable song reaches the decoder");
    assert!(invocations[0].contains("/music/good.mp3"));
    assert_eq!(orch.last_song().await.unwrap().name, "good");
    assert!(orch.song_list().await.is_empty());
}

/// A sink that stops accepting writes fails the current song the same way
/// a decoder failure would.
#[tokio::test]
async fn sink_failure_is_fatal_for_the_current_song() {
    let dir = tempdir().unwrap();
    let args_log = dir.path().join("args.log");
    let decoder = fake_decoder(dir.path(), 500, &args_log);

    let status = Arc::new(RecordingStatusSink::new());
    let orch = orchestrator_with(
        test_config(&decoder),
        ResolverChain::with_resolvers(Vec::new(), None),
        status.clone(),
    );
    orch.queue_song(song("doomed", "/music/doomed.mp3", 10_000)).await;

    let sink = TestSink::paced(Duration::from_millis(20));
    orch.play(sink.clone()).await.unwrap();
    wait_for_playing(&orch).await;

    sink.set_writable(false);
    orch.wait_idle().await;

    assert!(status.contains("Could not play: doomed"));
    assert!(orch.song_list().await.is_empty());
    assert_eq!(orch.state().await, PlayerState::Stopped);
}

/// Exhausted stall retries on a song with unknown length end it with an
/// error instead of stalling forever.
#[tokio::test]
async fn unknown_duration_stall_fails_the_song() {
    let dir = tempdir().unwrap();
    let args_log = dir.path().join("args.log");
    let decoder = fake_decoder(dir.path(), 10, &args_log);

    let status = Arc::new(RecordingStatusSink::new());
    let orch = orchestrator_with(
        test_config(&decoder),
        ResolverChain::with_resolvers(Vec::new(), None),
        status.clone(),
    );
    // length 0: the near-end heuristic is disabled
    orch.queue_song(song("endless", "/music/endless.mp3", 0)).await;

    orch.play(TestSink::new()).await.unwrap();
    orch.wait_idle().await;

    assert!(status.contains("Could not play: endless"));
    assert!(orch.song_list().await.is_empty());
}

/// Stop clears everything and reports whether anything was playing.
#[tokio::test]
async fn stop_reports_whether_anything_was_playing() {
    let dir = tempdir().unwrap();
    let args_log = dir.path().join("args.log");
    let decoder = fake_decoder(dir.path(), 500, &args_log);

    let orch = orchestrator(test_config(&decoder));
    assert!(!orch.stop().await, "stopping an idle session returns false");

    let orch = orchestrator(test_config(&decoder));
    orch.queue_song(song("running", "/music/running.mp3", 10_000)).await;
    orch.play(TestSink::paced(Duration::from_millis(20)))
        .await
        .unwrap();
    wait_for_playing(&orch).await;

    assert!(orch.stop().await);
    orch.wait_idle().await;
    assert!(orch.song_list().await.is_empty());
    assert_eq!(orch.state().await, PlayerState::Stopped);
    // a stopped session refuses further play requests
    assert!(orch.play(TestSink::new()).await.is_err());
}

/// Volume is clamped to [0, 1] and readable in every state.
#[tokio::test]
async fn volume_is_clamped_and_always_settable() {
    let dir = tempdir().unwrap();
    let decoder = fake_decoder(dir.path(), 10, &dir.path().join("args.log"));

    let orch = orchestrator(test_config(&decoder));
    orch.set_volume(1.5).await;
    assert_eq!(orch.volume().await, 1.0);
    orch.set_volume(-0.25).await;
    assert_eq!(orch.volume().await, 0.0);
    orch.set_volume(0.42).await;
    assert!((orch.volume().await - 0.42).abs() < f32::EPSILON);
}
