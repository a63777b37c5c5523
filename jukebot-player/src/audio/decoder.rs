//! Streaming decoder wrapping an external ffmpeg process
//!
//! The decoder turns a stream locator (file path or URL), or a live byte
//! stream piped into stdin, into raw PCM on stdout: signed 16-bit
//! little-endian, 2 channels, 48 kHz. Seeking is expressed as an input-side
//! `-ss` argument when the decoder is (re)launched; there is no mid-stream
//! seek.
//!
//! Termination is graceful-then-kill: dropping the output pipe asks the
//! process to wind down, and a bounded grace period later it is killed if
//! still running. Decoder stderr is drained and logged, never surfaced as a
//! playback failure.

use crate::config::DecoderConfig;
use crate::error::{Error, Result};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// Input handed to the decoder
pub enum DecoderInput {
    /// A stream locator the decoder opens itself (file path or URL)
    Locator(String),
    /// A live byte stream copied into the decoder's stdin
    Stream(Box<dyn AsyncRead + Send + Unpin>),
}

/// Handle to a running decoder process
pub struct StreamingDecoder {
    child: Child,
    stdout: ChildStdout,
    grace: Duration,
}

/// Build the decoder argument list for one decode request.
///
/// The seek offset must precede `-i` so the demuxer seeks instead of
/// decoding and discarding.
pub fn decode_args(locator: &str, seek_offset_ms: Option<u64>) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
    ];
    if let Some(offset_ms) = seek_offset_ms {
        args.push("-ss".into());
        args.push(format_seek(offset_ms));
    }
    args.extend([
        "-i".into(),
        locator.into(),
        "-vn".into(),
        "-f".into(),
        "s16le".into(),
        "-ar".into(),
        "48000".into(),
        "-ac".into(),
        "2".into(),
        "pipe:1".into(),
    ]);
    args
}

/// Render a millisecond offset as a decoder seek value (`SS.mmm`)
fn format_seek(offset_ms: u64) -> String {
    format!("{}.{:03}", offset_ms / 1000, offset_ms % 1000)
}

impl StreamingDecoder {
    /// Spawn the decoder process for the given input.
    ///
    /// Fatal for the current song when the process cannot be spawned or its
    /// output stream is unavailable.
    pub fn spawn(
        config: &DecoderConfig,
        input: DecoderInput,
        seek_offset_ms: Option<u64>,
    ) -> Result<Self> {
        let (locator, live_source) = match input {
            DecoderInput::Locator(locator) => (locator, None),
            DecoderInput::Stream(stream) => ("pipe:0".to_string(), Some(stream)),
        };

        let mut cmd = Command::new(&config.ffmpeg_path);
        cmd.args(decode_args(&locator, seek_offset_ms))
            .stdin(if live_source.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // backstop: a dropped decoder never outlives the song
            .kill_on_drop(true);

        debug!(
            decoder = %config.ffmpeg_path,
            locator = %locator,
            seek_ms = ?seek_offset_ms,
            "spawning decoder"
        );

        let mut child = cmd.spawn().map_err(|e| {
            Error::Decoder(format!("failed to start {}: {}", config.ffmpeg_path, e))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Decoder("decoder stdout unavailable".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(stderr));
        }

        if let Some(mut source) = live_source {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| Error::Decoder("decoder stdin unavailable".to_string()))?;
            tokio::spawn(async move {
                if let Err(e) = tokio::io::copy(&mut source, &mut stdin).await {
                    debug!("decoder input stream ended: {}", e);
                }
                let _ = stdin.shutdown().await;
            });
        }

        Ok(Self {
            child,
            stdout,
            grace: Duration::from_millis(config.shutdown_grace_ms),
        })
    }

    /// Read PCM into `buf` until it is full or the stream yields no more
    /// data. Returns the number of bytes read; 0 means the decoder produced
    /// nothing (stall or end of stream; the caller decides which).
    pub async fn read_frame(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .stdout
                .read(&mut buf[filled..])
                .await
                .map_err(|e| Error::Decoder(format!("decoder read failed: {}", e)))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Terminate the decoder: release the output pipe, wait out the grace
    /// period, then kill if still running.
    pub async fn stop(self) {
        let Self {
            mut child,
            stdout,
            grace,
        } = self;
        drop(stdout);
        match timeout(grace, child.wait()).await {
            Ok(Ok(status)) => debug!("decoder exited: {}", status),
            Ok(Err(e)) => warn!("decoder wait failed: {}", e),
            Err(_) => {
                warn!("decoder still running after {:?} grace, killing", grace);
                if let Err(e) = child.kill().await {
                    warn!("failed to kill decoder: {}", e);
                }
            }
        }
    }
}

/// Drain decoder stderr into the log
async fn drain_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("decoder: {}", line);
    }
}
