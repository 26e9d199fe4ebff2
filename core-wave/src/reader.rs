//! # WAVE File Reader
//!
//! Reads an entire WAVE file into memory and serves normalized `f32` frames
//! from it with random access.

use std::ops::Range;
use std::path::Path;

use tracing::{debug, instrument};

use crate::codec::{self, SampleKind, WaveFormat};
use crate::error::Result;
use crate::sample::SampleConverter;

/// In-memory WAVE reader.
///
/// Supports PCM 16/24-bit and IEEE-float 32-bit files. Output buffers are
/// interleaved, `channels()` samples per frame.
#[derive(Debug, Clone)]
pub struct InputWaveFile {
    bytes: Vec<u8>,
    format: WaveFormat,
    kind: SampleKind,
    data: Range<usize>,
    /// Byte offset of the next frame, relative to `data.start`.
    cursor: usize,
}

impl InputWaveFile {
    /// Open and parse a WAVE file.
    #[instrument(skip_all, fields(file = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let file = Self::from_bytes(bytes)?;
        debug!(
            channels = file.channels(),
            sample_rate = file.sample_rate(),
            frames = file.length_frames(),
            kind = ?file.kind,
            "Opened WAVE file"
        );
        Ok(file)
    }

    /// Parse an in-memory WAVE image.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let parsed = codec::parse(&bytes)?;
        Ok(Self {
            bytes,
            format: parsed.format,
            kind: parsed.kind,
            data: parsed.data,
            cursor: 0,
        })
    }

    pub fn channels(&self) -> u16 {
        self.format.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    pub fn format(&self) -> &WaveFormat {
        &self.format
    }

    pub fn kind(&self) -> SampleKind {
        self.kind
    }

    fn frame_bytes(&self) -> usize {
        usize::from(self.channels()) * self.kind.bytes_per_sample()
    }

    pub fn length_frames(&self) -> u64 {
        (self.data.len() / self.frame_bytes().max(1)) as u64
    }

    pub fn remaining_frames(&self) -> u64 {
        ((self.data.len() - self.cursor) / self.frame_bytes().max(1)) as u64
    }

    /// Fill `output` with up to `output.len() / channels` frames.
    ///
    /// Returns the number of frames read; fewer than requested means the end
    /// of the data chunk was reached.
    pub fn read(&mut self, output: &mut [f32]) -> usize {
        let channels = usize::from(self.channels()).max(1);
        let frames = (output.len() / channels).min(self.remaining_frames() as usize);
        if frames == 0 {
            return 0;
        }

        let start = self.data.start + self.cursor;
        let byte_len = frames * self.frame_bytes();
        SampleConverter::decode(
            self.kind,
            &self.bytes[start..start + byte_len],
            &mut output[..frames * channels],
        );
        self.cursor += byte_len;
        frames
    }

    /// Fill all of `output`, wrapping to the start whenever the data runs out.
    ///
    /// Returns `false` only for a file with no frames at all.
    pub fn read_looped(&mut self, output: &mut [f32]) -> bool {
        let channels = usize::from(self.channels()).max(1);
        let mut filled = 0;
        while filled + channels <= output.len() {
            let frames = self.read(&mut output[filled..]);
            filled += frames * channels;
            if filled + channels <= output.len() {
                if frames == 0 && self.cursor == 0 {
                    return false;
                }
                self.restart();
            }
        }
        true
    }

    /// Read what is available and zero the rest of `output`.
    ///
    /// Returns `false` when nothing could be read.
    pub fn read_silence_padded(&mut self, output: &mut [f32]) -> bool {
        let channels = usize::from(self.channels()).max(1);
        let frames = self.read(output);
        if frames == 0 {
            return false;
        }
        output[frames * channels..].fill(0.0);
        true
    }

    pub fn sample_position(&self) -> u64 {
        (self.cursor / self.frame_bytes().max(1)) as u64
    }

    /// Seek to `frame`, clamped to the length.
    pub fn set_sample_position(&mut self, frame: u64) {
        let frame = frame.min(self.length_frames());
        self.cursor = frame as usize * self.frame_bytes();
    }

    pub fn time_position_ms(&self) -> u64 {
        self.sample_position() * 1000 / u64::from(self.sample_rate().max(1))
    }

    pub fn set_time_position_ms(&mut self, ms: u64) {
        self.set_sample_position(ms * u64::from(self.sample_rate()) / 1000);
    }

    pub fn restart(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::WaveHeader;

    fn mono_pcm16(samples: &[i16]) -> InputWaveFile {
        let mut header = WaveHeader::new(1, 1_000, SampleKind::Pcm16);
        let mut bytes = header.finalize((samples.len() * 2) as u32);
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        InputWaveFile::from_bytes(bytes).unwrap()
    }

    #[test]
    fn test_read_advances_position() {
        let mut file = mono_pcm16(&[0, 16_384, -16_384, 0]);
        let mut out = [0.0f32; 3];
        assert_eq!(file.read(&mut out), 3);
        assert_eq!(out, [0.0, 0.5, -0.5]);
        assert_eq!(file.sample_position(), 3);
        assert_eq!(file.remaining_frames(), 1);
        assert_eq!(file.read(&mut out), 1);
        assert_eq!(file.read(&mut out), 0);
    }

    #[test]
    fn test_read_looped_wraps() {
        let mut file = mono_pcm16(&[16_384, -16_384]);
        let mut out = [0.0f32; 5];
        assert!(file.read_looped(&mut out));
        assert_eq!(out, [0.5, -0.5, 0.5, -0.5, 0.5]);
    }

    #[test]
    fn test_read_looped_empty_file() {
        let mut file = mono_pcm16(&[]);
        let mut out = [1.0f32; 4];
        assert!(!file.read_looped(&mut out));
    }

    #[test]
    fn test_read_silence_padded() {
        let mut file = mono_pcm16(&[16_384]);
        let mut out = [1.0f32; 3];
        assert!(file.read_silence_padded(&mut out));
        assert_eq!(out, [0.5, 0.0, 0.0]);
        assert!(!file.read_silence_padded(&mut out));
    }

    #[test]
    fn test_time_position() {
        let mut file = mono_pcm16(&[0; 2_000]);
        file.set_time_position_ms(1_500);
        assert_eq!(file.sample_position(), 1_500);
        assert_eq!(file.time_position_ms(), 1_500);
        file.set_sample_position(10_000);
        assert_eq!(file.sample_position(), 2_000);
        file.restart();
        assert_eq!(file.sample_position(), 0);
    }
}
