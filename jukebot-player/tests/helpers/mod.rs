//! Shared fixtures for playback integration tests
//!
//! The decoder is faked with a generated shell script that records its
//! argv to a log file and emits PCM zeros on stdout, so the end-to-end
//! scenarios run without a real ffmpeg installation.

use async_trait::async_trait;
use jukebot_common::{Song, SongSource, SongTiming};
use jukebot_player::audio::AudioSink;
use jukebot_player::error::{Error, Result};
use jukebot_player::playback::{MessageHandle, QueueOrchestrator, StatusSink};
use jukebot_player::resolve::ResolverChain;
use jukebot_player::Config;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Write an executable stand-in decoder: appends its argv to `args_log`,
/// then emits `frames` blocks of 3840 PCM zero bytes (20 ms each).
pub fn fake_decoder(dir: &Path, frames: u32, args_log: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script_path = dir.join("fake-ffmpeg");
    let script = format!(
        "#!/bin/sh\necho \"$@\" >> \"{log}\"\ndd if=/dev/zero bs=3840 count={frames} 2>/dev/null\n",
        log = args_log.display(),
        frames = frames,
    );
    std::fs::write(&script_path, script).unwrap();
    let mut permissions = std::fs::metadata(&script_path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&script_path, permissions).unwrap();
    script_path
}

/// Read the decoder invocations recorded so far, one argv per line
pub fn decoder_invocations(args_log: &Path) -> Vec<String> {
    std::fs::read_to_string(args_log)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Engine configuration pointing at the fake decoder, with test-friendly
/// stall tuning
pub fn test_config(decoder_path: &Path) -> Config {
    let mut config = Config::default();
    config.decoder.ffmpeg_path = decoder_path.display().to_string();
    config.decoder.shutdown_grace_ms = 200;
    config.stall.max_retries = 3;
    config.stall.retry_delay_ms = 10;
    config.stall.natural_end_slack_secs = 1;
    config.playback.status_interval_secs = 1;
    config
}

/// A pre-resolved song pointing at `locator`
pub fn song(name: &str, locator: &str, length_ms: u64) -> Song {
    let mut song = Song::new(name, locator, SongSource::LocalFile);
    song.stream_url = Some(locator.to_string());
    song.timing = SongTiming::with_length(length_ms);
    song
}

/// Orchestrator over an empty resolver chain (songs arrive pre-resolved)
pub fn orchestrator(config: Config) -> QueueOrchestrator {
    orchestrator_with(
        config,
        ResolverChain::with_resolvers(Vec::new(), None),
        Arc::new(RecordingStatusSink::new()),
    )
}

pub fn orchestrator_with(
    config: Config,
    resolvers: ResolverChain,
    status: Arc<dyn StatusSink>,
) -> QueueOrchestrator {
    QueueOrchestrator::new(
        Arc::new(config),
        Arc::new(resolvers),
        status,
        CancellationToken::new(),
    )
}

/// Sink that counts bytes and can pace or refuse writes
pub struct TestSink {
    bytes: AtomicU64,
    writable: AtomicBool,
    delay: Duration,
}

impl TestSink {
    pub fn new() -> Arc<Self> {
        Self::paced(Duration::ZERO)
    }

    /// Sink that takes `delay` to accept each write, simulating transport
    /// backpressure
    pub fn paced(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            bytes: AtomicU64::new(0),
            writable: AtomicBool::new(true),
            delay,
        })
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn set_writable(&self, writable: bool) {
        self.writable.store(writable, Ordering::Relaxed);
    }
}

#[async_trait]
impl AudioSink for TestSink {
    async fn write(&self, pcm: &[u8]) -> Result<()> {
        if !self.is_writable() {
            return Err(Error::Sink("test sink disconnected".to_string()));
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.bytes.fetch_add(pcm.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn is_writable(&self) -> bool {
        self.writable.load(Ordering::Relaxed)
    }
}

/// Status sink that records every message it is asked to show
pub struct RecordingStatusSink {
    next_id: AtomicU64,
    pub messages: Mutex<Vec<String>>,
}

impl RecordingStatusSink {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .any(|m| m.contains(needle))
    }
}

#[async_trait]
impl StatusSink for RecordingStatusSink {
    async fn send_message(&self, content: &str) -> Result<MessageHandle> {
        self.messages.lock().unwrap().push(content.to_string());
        Ok(MessageHandle(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    async fn update_message(&self, _handle: &MessageHandle, content: &str) -> Result<()> {
        self.messages.lock().unwrap().push(content.to_string());
        Ok(())
    }

    async fn delete_message(&self, _handle: &MessageHandle) -> Result<()> {
        Ok(())
    }
}

/// Poll `condition` until it holds, panicking after 10 seconds
pub async fn wait_for<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Duration::from_secs(10);
    tokio::time::timeout(deadline, async {
        loop {
            if condition().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {}", what));
}
