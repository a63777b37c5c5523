//! Duration probing through ffprobe
//!
//! Fills in `SongTiming.length_ms` for direct files and URLs so the
//! near-end completion heuristic has something to work with.

use crate::error::{Error, Result};
use crate::resolve::run_tool;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// ffprobe wrapper reporting a stream's total duration
#[derive(Debug, Clone)]
pub struct DurationProbe {
    ffprobe_path: String,
}

impl DurationProbe {
    pub fn new(ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Probe the locator's duration in milliseconds
    pub async fn duration_ms(&self, locator: &str) -> Result<u64> {
        let stdout = run_tool(
            &self.ffprobe_path,
            &[
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "json",
                locator,
            ],
        )
        .await?;
        parse_duration_ms(&stdout)
    }
}

/// Parse ffprobe's JSON output into milliseconds
fn parse_duration_ms(json: &str) -> Result<u64> {
    let parsed: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| Error::Resolve(format!("unexpected ffprobe output: {}", e)))?;
    let duration = parsed
        .format
        .and_then(|f| f.duration)
        .ok_or_else(|| Error::Resolve("ffprobe reported no duration".to_string()))?;
    let seconds: f64 = duration
        .trim()
        .parse()
        .map_err(|e| Error::Resolve(format!("bad duration '{}': {}", duration, e)))?;
    Ok((seconds * 1000.0).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ffprobe_format_duration() {
        let json = r#"{"format": {"filename": "a.mp3", "duration": "215.013000"}}"#;
        assert_eq!(parse_duration_ms(json).unwrap(), 215_013);
    }

    #[test]
    fn missing_duration_is_an_error() {
        assert!(parse_duration_ms(r#"{"format": {}}"#).is_err());
        assert!(parse_duration_ms(r#"{}"#).is_err());
    }

    #[test]
    fn garbage_output_is_an_error() {
        assert!(parse_duration_ms("not json").is_err());
        assert!(parse_duration_ms(r#"{"format": {"duration": "n/a"}}"#).is_err());
    }
}
