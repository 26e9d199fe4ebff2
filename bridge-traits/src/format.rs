//! Sample Format Descriptions
//!
//! The format a decoder pipeline offers on one of its output pins. The core
//! negotiates against these descriptions before connecting.

use serde::{Deserialize, Serialize};

/// Encoding of the individual samples in a pushed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleEncoding {
    /// Signed little-endian integer PCM (unsigned for 8-bit).
    Pcm,
    /// IEEE-754 little-endian floating point.
    IeeeFloat,
    /// Anything else, identified by its raw WAVE format tag.
    Other(u16),
}

/// Interleaved audio format offered by a pipeline output pin.
///
/// Mirrors the fields of a WAVE `fmt ` chunk that matter for decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaFormat {
    pub encoding: SampleEncoding,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Bytes per interleaved frame.
    pub block_align: u16,
}

impl MediaFormat {
    /// Packed integer PCM with the block alignment derived from the bit depth.
    pub fn pcm(channels: u16, sample_rate: u32, bits_per_sample: u16) -> Self {
        Self {
            encoding: SampleEncoding::Pcm,
            channels,
            sample_rate,
            bits_per_sample,
            block_align: channels * (bits_per_sample / 8),
        }
    }

    /// 32-bit IEEE float.
    pub fn float(channels: u16, sample_rate: u32) -> Self {
        Self {
            encoding: SampleEncoding::IeeeFloat,
            channels,
            sample_rate,
            bits_per_sample: 32,
            block_align: channels * 4,
        }
    }

    /// Bytes occupied by one sample of one channel, as laid out in the buffer.
    pub fn container_bytes(&self) -> u16 {
        if self.channels == 0 {
            0
        } else {
            self.block_align / self.channels
        }
    }

    /// Returns `true` when the bit depth is a whole number of bytes and each
    /// sample occupies exactly that many bytes (no padding).
    pub fn is_packed(&self) -> bool {
        self.bits_per_sample % 8 == 0
            && self.channels != 0
            && self.block_align % self.channels == 0
            && self.bits_per_sample / 8 == self.container_bytes()
    }

    pub fn is_float(&self) -> bool {
        self.encoding == SampleEncoding::IeeeFloat
    }
}
