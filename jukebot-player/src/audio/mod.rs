//! Audio plumbing: the external decoder process and output sinks

pub mod decoder;
pub mod sink;

pub use decoder::{DecoderInput, StreamingDecoder};
pub use sink::{AudioSink, NullSink, StdoutSink};

/// Output sample rate requested from the decoder
pub const SAMPLE_RATE: u32 = 48_000;

/// Output channel count requested from the decoder
pub const CHANNELS: u16 = 2;

/// Bytes per second of decoded audio (s16le, stereo, 48 kHz)
pub const BYTES_PER_SECOND: u64 = SAMPLE_RATE as u64 * CHANNELS as u64 * 2;

/// Convert a decoded byte count to a playback duration in milliseconds
pub fn bytes_to_ms(bytes: u64) -> u64 {
    bytes * 1000 / BYTES_PER_SECOND
}
