//! YouTube resolver backed by the yt-dlp command-line tool
//!
//! Metadata comes from `yt-dlp -J` (single JSON document on stdout); the
//! actual stream URL is resolved lazily with `--get-url` just before the
//! decoder starts, because extracted media URLs expire quickly. The same
//! `--get-url` call doubles as the chain's fallback locator strategy for
//! any song resolved without a concrete locator.

use crate::error::{Error, Result};
use crate::resolve::{run_tool, SongResolver};
use async_trait::async_trait;
use jukebot_common::{Song, SongSource};
use serde::Deserialize;
use tracing::debug;

/// The subset of yt-dlp's JSON output the resolver cares about
#[derive(Debug, Deserialize)]
struct TrackMetadata {
    id: Option<String>,
    title: Option<String>,
    /// Duration in (possibly fractional) seconds
    duration: Option<f64>,
    thumbnail: Option<String>,
}

fn parse_metadata(json: &str) -> Result<TrackMetadata> {
    serde_json::from_str(json).map_err(|e| Error::Resolve(format!("unexpected yt-dlp output: {}", e)))
}

/// Resolver for YouTube references
pub struct YtDlpResolver {
    ytdlp_path: String,
}

impl YtDlpResolver {
    pub fn new(ytdlp_path: impl Into<String>) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
        }
    }
}

#[async_trait]
impl SongResolver for YtDlpResolver {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn matches(&self, reference: &str) -> bool {
        (reference.starts_with("http://") || reference.starts_with("https://"))
            && (reference.contains("youtube.com/") || reference.contains("youtu.be/"))
    }

    async fn resolve(&self, reference: &str) -> Result<Song> {
        let stdout = run_tool(&self.ytdlp_path, &["-J", "--no-playlist", reference]).await?;
        let metadata = parse_metadata(&stdout)?;

        let mut song = Song::new(
            metadata.title.unwrap_or_else(|| reference.to_string()),
            reference,
            SongSource::YouTube,
        );
        song.track_id = metadata.id;
        song.thumbnail = metadata.thumbnail;
        song.timing.length_ms = metadata
            .duration
            .map(|seconds| (seconds * 1000.0).round() as u64)
            .unwrap_or(0);
        // the media URL expires; leave it for the deferred step
        debug!(song = %song.name, "resolved metadata, stream URL deferred");
        Ok(song)
    }

    async fn resolve_stream_url(&self, song: &mut Song) -> Result<()> {
        let stdout = run_tool(
            &self.ytdlp_path,
            &[
                "-f",
                "bestaudio/best",
                "--get-url",
                "--no-playlist",
                &song.reference,
            ],
        )
        .await?;
        let url = stdout.lines().next().map(str::trim).unwrap_or("");
        if url.is_empty() {
            return Err(Error::Resolve(format!(
                "yt-dlp produced no stream URL for '{}'",
                song.reference
            )));
        }
        song.stream_url = Some(url.to_string());
        Ok(())
    }
}
