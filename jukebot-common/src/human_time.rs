//! Human-readable track time formatting
//!
//! Used by status reporting to render playback positions consistently:
//! `M:SS` below one hour, `H:MM:SS` above.

/// Format a track time given in milliseconds as `M:SS` or `H:MM:SS`.
pub fn format_track_time(time_ms: u64) -> String {
    let total_secs = time_ms / 1000;
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}

/// Format a playback progress pair as `position / length`.
///
/// When the total length is unknown (0), only the position is shown.
pub fn format_progress(position_ms: u64, length_ms: u64) -> String {
    if length_ms == 0 {
        format_track_time(position_ms)
    } else {
        format!(
            "{} / {}",
            format_track_time(position_ms),
            format_track_time(length_ms)
        )
    }
}
