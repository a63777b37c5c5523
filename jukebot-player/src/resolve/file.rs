//! Resolvers for local files and direct audio URLs

use crate::error::Result;
use crate::resolve::{DurationProbe, SongResolver};
use async_trait::async_trait;
use jukebot_common::{Song, SongSource};
use std::ffi::OsStr;
use std::path::Path;
use tracing::debug;

/// File extensions accepted as directly decodable audio
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "wav", "ogg", "oga", "opus", "m4a", "aac", "webm", "mka", "wma", "aiff", "aif",
];

/// Whether the reference (query string and fragment stripped) ends in a
/// recognized audio extension
pub(crate) fn has_audio_extension(reference: &str) -> bool {
    let stripped = reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference);
    Path::new(stripped)
        .extension()
        .and_then(OsStr::to_str)
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Resolves references that point at the local filesystem
pub struct LocalFileResolver {
    probe: DurationProbe,
}

impl LocalFileResolver {
    pub fn new(probe: DurationProbe) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl SongResolver for LocalFileResolver {
    fn name(&self) -> &'static str {
        "local-file"
    }

    fn matches(&self, reference: &str) -> bool {
        !reference.contains("://")
            && (Path::new(reference).is_file() || has_audio_extension(reference))
    }

    async fn resolve(&self, reference: &str) -> Result<Song> {
        let name = Path::new(reference)
            .file_stem()
            .and_then(OsStr::to_str)
            .unwrap_or(reference)
            .to_string();
        let mut song = Song::new(name, reference, SongSource::LocalFile);
        song.stream_url = Some(reference.to_string());
        // a failed probe only disables the near-end heuristic
        match self.probe.duration_ms(reference).await {
            Ok(length_ms) => song.timing.length_ms = length_ms,
            Err(e) => debug!(reference, "duration probe failed: {}", e),
        }
        Ok(song)
    }
}

/// Resolves http(s) URLs that already point at a raw audio stream
pub struct HttpUrlResolver;

#[async_trait]
impl SongResolver for HttpUrlResolver {
    fn name(&self) -> &'static str {
        "http-url"
    }

    fn matches(&self, reference: &str) -> bool {
        (reference.starts_with("http://") || reference.starts_with("https://"))
            && has_audio_extension(reference)
    }

    async fn resolve(&self, reference: &str) -> Result<Song> {
        // the URL itself is the stream locator; no metadata to fetch
        Ok(Song::direct(reference))
    }
}
