//! # Sample Conversion
//!
//! Conversion between little-endian interleaved byte buffers and normalized
//! `f32` samples.
//!
//! | Source        | Scale                |
//! |---------------|----------------------|
//! | 16-bit int    | `-1 / i16::MIN`      |
//! | 24-bit packed | `1 / 2^23`           |
//! | 32-bit int    | `-1 / i32::MIN`      |
//! | 32-bit float  | passthrough          |
//!
//! Decoded values are nominally in `[-1.0, 1.0]`, but decoders upstream of
//! us are known to overshoot slightly, so nothing here asserts the range.

use crate::codec::SampleKind;

const SCALE_16: f32 = -1.0 / i16::MIN as f32;
const SCALE_24: f32 = 1.0 / (1u32 << 23) as f32;
const SCALE_32: f32 = -1.0 / i32::MIN as f32;

/// Stateless sample converter.
pub struct SampleConverter;

impl SampleConverter {
    /// Decode as many whole samples as fit in both `input` and `output`.
    ///
    /// Returns the number of samples written. Trailing bytes that do not form
    /// a whole sample are ignored.
    pub fn decode(kind: SampleKind, input: &[u8], output: &mut [f32]) -> usize {
        let width = kind.bytes_per_sample();
        let count = (input.len() / width).min(output.len());
        let input = &input[..count * width];
        let output = &mut output[..count];

        match kind {
            SampleKind::Pcm16 => {
                for (out, bytes) in output.iter_mut().zip(input.chunks_exact(2)) {
                    *out = f32::from(i16::from_le_bytes([bytes[0], bytes[1]])) * SCALE_16;
                }
            }
            SampleKind::Pcm24 => {
                for (out, bytes) in output.iter_mut().zip(input.chunks_exact(3)) {
                    *out = Self::read_i24(bytes) as f32 * SCALE_24;
                }
            }
            SampleKind::Pcm32 => {
                for (out, bytes) in output.iter_mut().zip(input.chunks_exact(4)) {
                    let value = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                    *out = value as f32 * SCALE_32;
                }
            }
            SampleKind::Float32 => {
                for (out, bytes) in output.iter_mut().zip(input.chunks_exact(4)) {
                    *out = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                }
            }
        }

        count
    }

    /// Encode as many samples as fit in both `input` and `output`.
    ///
    /// Integer targets saturate. Returns the number of bytes written.
    pub fn encode(kind: SampleKind, input: &[f32], output: &mut [u8]) -> usize {
        let width = kind.bytes_per_sample();
        let count = input.len().min(output.len() / width);
        let input = &input[..count];
        let output = &mut output[..count * width];

        match kind {
            SampleKind::Pcm16 => {
                for (bytes, &sample) in output.chunks_exact_mut(2).zip(input) {
                    let value = Self::quantize(sample, 32_768.0, i16::MIN as f32, i16::MAX as f32);
                    bytes.copy_from_slice(&(value as i16).to_le_bytes());
                }
            }
            SampleKind::Pcm24 => {
                for (bytes, &sample) in output.chunks_exact_mut(3).zip(input) {
                    let value = Self::quantize(sample, 8_388_608.0, -8_388_608.0, 8_388_607.0);
                    let le = (value as i32).to_le_bytes();
                    bytes.copy_from_slice(&le[..3]);
                }
            }
            SampleKind::Pcm32 => {
                for (bytes, &sample) in output.chunks_exact_mut(4).zip(input) {
                    let value = (f64::from(sample) * 2_147_483_648.0)
                        .round()
                        .clamp(i32::MIN as f64, i32::MAX as f64);
                    bytes.copy_from_slice(&(value as i32).to_le_bytes());
                }
            }
            SampleKind::Float32 => {
                for (bytes, &sample) in output.chunks_exact_mut(4).zip(input) {
                    bytes.copy_from_slice(&sample.to_le_bytes());
                }
            }
        }

        count * width
    }

    /// Sign-extend a packed three-byte little-endian integer.
    #[inline]
    pub fn read_i24(bytes: &[u8]) -> i32 {
        i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8
    }

    #[inline]
    fn quantize(sample: f32, scale: f32, min: f32, max: f32) -> f32 {
        (sample * scale).round().clamp(min, max)
    }

    /// Count samples whose magnitude exceeds `limit`.
    pub fn count_out_of_range(samples: &[f32], limit: f32) -> usize {
        samples.iter().filter(|s| s.abs() > limit).count()
    }
}
