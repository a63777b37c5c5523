//! Song data model shared across the playback engine

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a song reference came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SongSource {
    /// A file on the local filesystem
    LocalFile,
    /// A direct http(s) URL to a raw audio stream
    HttpStream,
    /// A YouTube video resolved through the metadata tool
    YouTube,
}

impl std::fmt::Display for SongSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SongSource::LocalFile => write!(f, "file"),
            SongSource::HttpStream => write!(f, "http"),
            SongSource::YouTube => write!(f, "youtube"),
        }
    }
}

/// Queue replay policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    /// Songs are removed from the list after they finish
    #[default]
    Queue,
    /// Songs are kept; the playback index advances and wraps to 0
    Playlist,
}

impl std::fmt::Display for PlayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayMode::Queue => write!(f, "queue"),
            PlayMode::Playlist => write!(f, "playlist"),
        }
    }
}

/// Timing information for one song
///
/// `length_ms == 0` means the total length is unknown (live streams,
/// unprobed direct URLs). The near-end completion heuristic is disabled
/// in that case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongTiming {
    /// Total length in milliseconds (0 when unknown)
    pub length_ms: u64,

    /// Offset the decoder should start from, in milliseconds
    pub start_offset_ms: Option<u64>,

    /// Last observed playback position, in milliseconds
    pub position_ms: Option<u64>,
}

impl SongTiming {
    /// Timing with a known total length and no offsets
    pub fn with_length(length_ms: u64) -> Self {
        Self {
            length_ms,
            start_offset_ms: None,
            position_ms: None,
        }
    }

    /// Record the last observed position back as the start offset,
    /// so a relaunched decoder resumes close to where playback stopped.
    pub fn persist_position_as_offset(&mut self) {
        if let Some(position) = self.position_ms {
            self.start_offset_ms = Some(position);
        }
    }

    /// Drop any recorded position and offset
    pub fn reset(&mut self) {
        self.start_offset_ms = None;
        self.position_ms = None;
    }
}

/// One queued song
///
/// Created by a resolver (or as a raw-URL fallback) and owned by the queue.
/// The component currently playing it updates `timing.position_ms`; the
/// orchestrator sets `timing.start_offset_ms` before a resumed play.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song {
    /// Queue-entry identity (the same song may be queued twice; each entry
    /// gets its own id)
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// The reference string the song was created from (path, URL, phrase)
    pub reference: String,

    /// Resolved playable stream locator (None until resolved)
    pub stream_url: Option<String>,

    /// Thumbnail/cover reference, when the resolver provides one
    pub thumbnail: Option<String>,

    /// Playback timing
    pub timing: SongTiming,

    /// Source tag
    pub source: SongSource,

    /// Opaque per-resolver identifier (e.g. the platform's video id)
    pub track_id: Option<String>,
}

impl Song {
    /// Create a song with a known name and source, not yet resolved to a
    /// stream locator.
    pub fn new(name: impl Into<String>, reference: impl Into<String>, source: SongSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            reference: reference.into(),
            stream_url: None,
            thumbnail: None,
            timing: SongTiming::default(),
            source,
            track_id: None,
        }
    }

    /// Permissive fallback: treat the raw reference as both the original
    /// reference and the stream locator. Direct file/stream URLs bypass
    /// all metadata resolution this way.
    pub fn direct(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        let name = display_name_from_reference(&reference);
        Self {
            id: Uuid::new_v4(),
            name,
            reference: reference.clone(),
            stream_url: Some(reference),
            thumbnail: None,
            timing: SongTiming::default(),
            source: SongSource::HttpStream,
            track_id: None,
        }
    }

    /// Whether the song already carries a concrete stream locator
    pub fn is_resolved(&self) -> bool {
        self.stream_url.is_some()
    }
}

/// Derive a display name from the tail of a reference string
fn display_name_from_reference(reference: &str) -> String {
    let tail = reference
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(reference);
    // strip a query string, if any
    let tail = tail.split('?').next().unwrap_or(tail);
    if tail.is_empty() {
        reference.to_string()
    } else {
        tail.to_string()
    }
}
