//! Song resolution: turn a loose reference (path, URL, phrase) into a Song
//! with a playable stream locator
//!
//! Resolvers are tried in a fixed priority order; the first whose matcher
//! recognizes the reference produces the Song. Some resolvers return a Song
//! without a concrete locator; a second resolution step fills it in just
//! before decode, falling back to a general-purpose URL-to-media tool.
//! Resolution failure is always per-song, never per-session.

pub mod file;
pub mod probe;
pub mod ytdlp;

pub use file::{HttpUrlResolver, LocalFileResolver};
pub use probe::DurationProbe;
pub use ytdlp::YtDlpResolver;

use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use jukebot_common::Song;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

/// One song resolution strategy
#[async_trait]
pub trait SongResolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this resolver recognizes the reference
    fn matches(&self, reference: &str) -> bool;

    /// Produce a Song for a recognized reference. May leave the stream
    /// locator unset for deferred resolution.
    async fn resolve(&self, reference: &str) -> Result<Song>;

    /// Fill in a concrete stream locator for a song produced without one.
    /// Default: nothing to do.
    async fn resolve_stream_url(&self, song: &mut Song) -> Result<()> {
        let _ = song;
        Ok(())
    }
}

/// Fixed-priority ordered set of resolvers
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn SongResolver>>,
    /// Default locator strategy for songs no resolver could complete
    fallback: Option<Arc<dyn SongResolver>>,
}

impl ResolverChain {
    /// The standard chain: local files, direct audio URLs, then YouTube,
    /// with yt-dlp as the fallback locator strategy.
    pub fn standard(config: &ResolverConfig) -> Self {
        let probe = DurationProbe::new(&config.ffprobe_path);
        let ytdlp: Arc<dyn SongResolver> = Arc::new(YtDlpResolver::new(&config.ytdlp_path));
        Self {
            resolvers: vec![
                Arc::new(LocalFileResolver::new(probe)),
                Arc::new(HttpUrlResolver),
                Arc::clone(&ytdlp),
            ],
            fallback: Some(ytdlp),
        }
    }

    /// Chain over explicit resolvers, in priority order
    pub fn with_resolvers(
        resolvers: Vec<Arc<dyn SongResolver>>,
        fallback: Option<Arc<dyn SongResolver>>,
    ) -> Self {
        Self {
            resolvers,
            fallback,
        }
    }

    /// Resolve a reference into a Song via the first matching resolver.
    ///
    /// When nothing matches, the raw reference is deliberately accepted as
    /// a direct stream locator; direct file/stream URLs bypass all
    /// metadata resolution.
    pub async fn resolve(&self, reference: &str) -> Result<Song> {
        for resolver in &self.resolvers {
            if resolver.matches(reference) {
                debug!(resolver = resolver.name(), reference, "resolver matched");
                return resolver.resolve(reference).await;
            }
        }
        debug!(reference, "no resolver matched; treating as direct stream");
        Ok(Song::direct(reference))
    }

    /// Make sure the song carries a concrete stream locator, running the
    /// owning resolver's deferred step or the fallback strategy.
    pub async fn resolve_stream_url(&self, song: &mut Song) -> Result<()> {
        if song.is_resolved() {
            return Ok(());
        }
        for resolver in &self.resolvers {
            if resolver.matches(&song.reference) {
                resolver.resolve_stream_url(song).await?;
                if song.is_resolved() {
                    return Ok(());
                }
                break;
            }
        }
        if let Some(fallback) = &self.fallback {
            debug!(song = %song.name, "using fallback stream locator strategy");
            fallback.resolve_stream_url(song).await?;
            if song.is_resolved() {
                return Ok(());
            }
        }
        Err(Error::Resolve(format!(
            "no stream locator for '{}'",
            song.name
        )))
    }
}

/// Run an external resolver tool, returning its stdout
pub(crate) async fn run_tool(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| Error::Resolve(format!("failed to run {}: {}", program, e)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Resolve(format!(
            "{} failed: {}",
            program,
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
