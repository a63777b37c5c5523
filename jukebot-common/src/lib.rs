//! # Jukebot Common Library
//!
//! Shared code for the jukebot playback engine:
//! - Song data model (Song, SongTiming, SongSource, PlayMode)
//! - Event types (PlayerEvent enum)
//! - Human-readable track time formatting

pub mod events;
pub mod human_time;
pub mod song;

pub use events::{PlayerEvent, PlayerState};
pub use song::{PlayMode, Song, SongSource, SongTiming};
