//! Configuration for the playback engine
//!
//! A minimal TOML bootstrap file plus built-in defaults. Every field has a
//! default so an absent or partial file still yields a working engine.
//!
//! Settings sources priority:
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Engine configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// External decoder process settings
    #[serde(default)]
    pub decoder: DecoderConfig,

    /// Resolver tool settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Playback behaviour
    #[serde(default)]
    pub playback: PlaybackConfig,

    /// Decoder stall / natural-end heuristic tuning
    #[serde(default)]
    pub stall: StallConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// External decoder process settings
#[derive(Debug, Clone, Deserialize)]
pub struct DecoderConfig {
    /// Decoder binary invoked for every song
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// Bytes per PCM frame read from the decoder (s16le stereo 48 kHz;
    /// 3840 bytes = 20 ms of audio)
    #[serde(default = "default_frame_bytes")]
    pub frame_bytes: usize,

    /// Grace period before a cancelled decoder process is killed
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            frame_bytes: default_frame_bytes(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

/// Resolver tool settings
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// General-purpose URL-to-media resolver tool
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,

    /// Duration probe tool for direct files/URLs
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: default_ytdlp_path(),
            ffprobe_path: default_ffprobe_path(),
        }
    }
}

/// Playback behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// Initial volume, clamped to [0.0, 1.0]
    #[serde(default = "default_volume")]
    pub default_volume: f32,

    /// Interval between status/progress updates, in seconds
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            status_interval_secs: default_status_interval_secs(),
        }
    }
}

/// Decoder stall / natural-end heuristic tuning
///
/// A zero-byte frame read is retried `max_retries` times with
/// `retry_delay_ms` between attempts. If the playback position is within
/// `natural_end_slack_secs` of the song's known length, the stream is
/// treated as naturally finished instead. Songs with unknown length (0)
/// cannot satisfy that test; `fail_on_unknown_duration` decides whether
/// exhausted retries end such a song with a decode error (true) or keep
/// retrying forever (false, for live streams).
#[derive(Debug, Clone, Deserialize)]
pub struct StallConfig {
    #[serde(default = "default_stall_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_stall_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_natural_end_slack_secs")]
    pub natural_end_slack_secs: u64,

    #[serde(default = "default_fail_on_unknown_duration")]
    pub fail_on_unknown_duration: bool,
}

impl Default for StallConfig {
    fn default() -> Self {
        Self {
            max_retries: default_stall_max_retries(),
            retry_delay_ms: default_stall_retry_delay_ms(),
            natural_end_slack_secs: default_natural_end_slack_secs(),
            fail_on_unknown_duration: default_fail_on_unknown_duration(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (tracing EnvFilter syntax)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_frame_bytes() -> usize {
    3840
}

fn default_shutdown_grace_ms() -> u64 {
    3000
}

fn default_ytdlp_path() -> String {
    "yt-dlp".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_volume() -> f32 {
    0.5
}

fn default_status_interval_secs() -> u64 {
    5
}

fn default_stall_max_retries() -> u32 {
    20
}

fn default_stall_retry_delay_ms() -> u64 {
    100
}

fn default_natural_end_slack_secs() -> u64 {
    10
}

fn default_fail_on_unknown_duration() -> bool {
    true
}

fn default_log_level() -> String {
    "jukebot_player=info,jukebot_common=info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// A missing file is not an error; built-in defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Err(Error::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("invalid config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.decoder.ffmpeg_path, "ffmpeg");
        assert_eq!(config.decoder.frame_bytes, 3840);
        assert_eq!(config.resolver.ytdlp_path, "yt-dlp");
        assert_eq!(config.playback.status_interval_secs, 5);
        assert!(config.stall.fail_on_unknown_duration);
        assert!(config.playback.default_volume >= 0.0 && config.playback.default_volume <= 1.0);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [decoder]
            ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"

            [stall]
            max_retries = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.decoder.ffmpeg_path, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(config.decoder.frame_bytes, 3840);
        assert_eq!(config.stall.max_retries, 5);
        assert_eq!(config.stall.retry_delay_ms, 100);
    }

    #[test]
    fn empty_toml_is_all_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.decoder.shutdown_grace_ms, 3000);
        assert_eq!(config.stall.natural_end_slack_secs, 10);
    }

    #[test]
    fn load_without_path_uses_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.decoder.ffmpeg_path, "ffmpeg");
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/jukebot.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
