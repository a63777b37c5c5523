//! Output sink abstraction
//!
//! The engine pushes contiguous runs of raw PCM (s16le, stereo, 48 kHz) to
//! an `AudioSink`. The sink's connection lifecycle is owned by the caller;
//! the engine only writes, checks writability, and releases the connection
//! on teardown. Sink write backpressure is what paces the decode loop.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Destination for decoded PCM frames
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Write one contiguous run of raw PCM frames.
    ///
    /// The call awaits until the transport has accepted the data; this is
    /// the engine's backpressure point.
    async fn write(&self, pcm: &[u8]) -> Result<()>;

    /// Whether the sink can currently accept frames
    fn is_writable(&self) -> bool {
        true
    }

    /// Flush buffered data to the transport
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Release the underlying connection
    async fn disconnect(&self) {}

    /// Whether the transport requires exclusive ownership (a paused player
    /// must release it so other users can claim it)
    fn exclusive(&self) -> bool {
        false
    }
}

/// Sink that writes raw PCM to stdout, for piping into `aplay -f S16_LE
/// -c 2 -r 48000` or a file.
pub struct StdoutSink {
    stdout: Mutex<tokio::io::Stdout>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioSink for StdoutSink {
    async fn write(&self, pcm: &[u8]) -> Result<()> {
        let mut stdout = self.stdout.lock().await;
        stdout
            .write_all(pcm)
            .await
            .map_err(|e| Error::Sink(format!("stdout write failed: {}", e)))
    }

    async fn flush(&self) -> Result<()> {
        let mut stdout = self.stdout.lock().await;
        stdout
            .flush()
            .await
            .map_err(|e| Error::Sink(format!("stdout flush failed: {}", e)))
    }
}

/// Sink that discards frames while counting them. Used by tests and as a
/// dry-run output.
#[derive(Default)]
pub struct NullSink {
    bytes: AtomicU64,
    writable: AtomicBool,
}

impl NullSink {
    pub fn new() -> Self {
        Self {
            bytes: AtomicU64::new(0),
            writable: AtomicBool::new(true),
        }
    }

    /// Total bytes accepted so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Simulate the transport going away
    pub fn set_writable(&self, writable: bool) {
        self.writable.store(writable, Ordering::Relaxed);
    }
}

#[async_trait]
impl AudioSink for NullSink {
    async fn write(&self, pcm: &[u8]) -> Result<()> {
        if !self.is_writable() {
            return Err(Error::Sink("sink disconnected".to_string()));
        }
        self.bytes.fetch_add(pcm.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn is_writable(&self) -> bool {
        self.writable.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_sink_counts_bytes() {
        let sink = NullSink::new();
        sink.write(&[0u8; 3840]).await.unwrap();
        sink.write(&[0u8; 1920]).await.unwrap();
        assert_eq!(sink.bytes_written(), 5760);
    }

    #[tokio::test]
    async fn null_sink_rejects_writes_when_unwritable() {
        let sink = NullSink::new();
        sink.set_writable(false);
        assert!(!sink.is_writable());
        assert!(sink.write(&[0u8; 4]).await.is_err());
    }
}
