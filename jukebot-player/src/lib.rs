//! # Jukebot Player Library
//!
//! The playback engine of a queue-driven music bot.
//!
//! **Purpose:** resolve queued song references to playable streams, decode
//! them through an external ffmpeg process, and push volume-scaled raw PCM
//! (s16le, stereo, 48 kHz) to an output sink under a
//! stopped/paused/playing state machine, one song at a time per session.
//!
//! **Architecture:** per-session orchestration loop + single decode/stream
//! task, cooperatively cancelled through a session→song token hierarchy.

pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod resolve;

pub use config::Config;
pub use error::{Error, Result};
