//! In-place volume scaling for raw PCM frames
//!
//! Operates on s16le stereo samples with fixed-point arithmetic so the hot
//! path stays deterministic and allocation-free.

/// Fixed-point shift used for the integer gain multiply
const GAIN_SHIFT: u32 = 16;

/// Gains within one fixed-point step of 1.0 skip scaling entirely
const UNITY_EPSILON: f32 = 1.0 / 65_536.0;

/// Scale every 16-bit sample in `pcm` by `gain`, in place.
///
/// The gain is converted to a 16.16 fixed-point factor
/// (`round(gain * 65536)`); each sample is multiplied and shifted back,
/// saturating at the i16 range. A trailing odd byte, which cannot be a
/// whole sample, is left untouched.
pub fn scale_pcm(pcm: &mut [u8], gain: f32) {
    if (gain - 1.0).abs() < UNITY_EPSILON {
        return;
    }
    let factor = (gain * 65_536.0).round() as i64;
    for sample in pcm.chunks_exact_mut(2) {
        let value = i16::from_le_bytes([sample[0], sample[1]]) as i64;
        let scaled = (value * factor) >> GAIN_SHIFT;
        let clamped = scaled.clamp(i16::MIN as i64, i16::MAX as i64) as i16;
        sample.copy_from_slice(&clamped.to_le_bytes());
    }
}
