//! # RIFF/WAVE Container Codec
//!
//! Stateless encoding and decoding of the `RIFF`/`fmt `/`data` chunk triplet.
//!
//! ## Layout
//!
//! All fields are little-endian:
//!
//! ```text
//! "RIFF" <u32 riff size> "WAVE"
//! "fmt " <u32 fmt size>  <WAVEFORMATEX | WAVEFORMATEXTENSIBLE>
//! "data" <u32 data size> <payload>
//! ```
//!
//! The `fmt ` chunk is 16 bytes (`WAVEFORMATEX` without `cbSize`), 18 bytes
//! (`WAVEFORMATEX`) or 40 bytes (`WAVEFORMATEXTENSIBLE`).
//!
//! ## Usage
//!
//! ```ignore
//! let mut header = WaveHeader::new(2, 44_100, SampleKind::Pcm16);
//! file.write_all(&header.placeholder_bytes())?;
//! // ... payload ...
//! let finalized = header.finalize(payload_len);
//! file.seek(SeekFrom::Start(0))?;
//! file.write_all(&finalized)?;
//! ```

use std::ops::Range;

use crate::error::ParseError;

pub const RIFF_TAG: [u8; 4] = *b"RIFF";
pub const WAVE_TAG: [u8; 4] = *b"WAVE";
pub const FMT_TAG: [u8; 4] = *b"fmt ";
pub const DATA_TAG: [u8; 4] = *b"data";

pub const WAVE_FORMAT_PCM: u16 = 0x0001;
pub const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
pub const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Size of a chunk header: tag plus size field.
pub const CHUNK_HEADER_SIZE: usize = 8;
/// `RIFF` header including the `WAVE` form type.
pub const RIFF_HEADER_SIZE: usize = CHUNK_HEADER_SIZE + 4;

/// `WAVEFORMATEX` without the trailing `cbSize` field.
pub const WAVEFORMAT_SIZE: u32 = 16;
pub const WAVEFORMATEX_SIZE: u32 = 18;
pub const WAVEFORMATEXTENSIBLE_SIZE: u32 = 40;

pub const SUBTYPE_PCM: [u8; 16] = [
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
];
pub const SUBTYPE_IEEE_FLOAT: [u8; 16] = [
    0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
];

const SPEAKER_FRONT_LEFT: u32 = 0x1;
const SPEAKER_FRONT_RIGHT: u32 = 0x2;
const SPEAKER_FRONT_CENTER: u32 = 0x4;
const SPEAKER_LOW_FREQUENCY: u32 = 0x8;
const SPEAKER_BACK_LEFT: u32 = 0x10;
const SPEAKER_BACK_RIGHT: u32 = 0x20;
const SPEAKER_FRONT_LEFT_OF_CENTER: u32 = 0x40;
const SPEAKER_FRONT_RIGHT_OF_CENTER: u32 = 0x80;
const SPEAKER_BACK_CENTER: u32 = 0x100;

const QUAD: u32 = SPEAKER_FRONT_LEFT | SPEAKER_FRONT_RIGHT | SPEAKER_BACK_LEFT | SPEAKER_BACK_RIGHT;

/// Speaker layouts indexed by channel count minus one.
const CHANNEL_MASKS: [u32; 8] = [
    SPEAKER_FRONT_CENTER,
    SPEAKER_FRONT_LEFT | SPEAKER_FRONT_RIGHT,
    SPEAKER_FRONT_LEFT | SPEAKER_FRONT_RIGHT | SPEAKER_FRONT_CENTER,
    QUAD,
    QUAD | SPEAKER_FRONT_CENTER,
    QUAD | SPEAKER_FRONT_CENTER | SPEAKER_LOW_FREQUENCY,
    QUAD | SPEAKER_FRONT_CENTER | SPEAKER_BACK_CENTER,
    QUAD | SPEAKER_FRONT_CENTER | SPEAKER_FRONT_LEFT_OF_CENTER | SPEAKER_FRONT_RIGHT_OF_CENTER,
];

/// Default speaker mask for a channel count. Counts past the table saturate
/// to the widest layout.
pub fn channel_mask(channels: u16) -> u32 {
    let index = usize::from(channels.max(1)).min(CHANNEL_MASKS.len()) - 1;
    CHANNEL_MASKS[index]
}

/// On-disk sample representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    Pcm16,
    /// Packed three-byte little-endian integers.
    Pcm24,
    Pcm32,
    Float32,
}

impl SampleKind {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleKind::Pcm16 => 2,
            SampleKind::Pcm24 => 3,
            SampleKind::Pcm32 | SampleKind::Float32 => 4,
        }
    }

    pub fn bits_per_sample(self) -> u16 {
        (self.bytes_per_sample() * 8) as u16
    }

    pub fn is_float(self) -> bool {
        self == SampleKind::Float32
    }

    /// Resolve from an encoding flag and a bit depth.
    pub fn from_bits(is_float: bool, bits_per_sample: u16) -> Option<Self> {
        match (is_float, bits_per_sample) {
            (true, 32) => Some(SampleKind::Float32),
            (false, 16) => Some(SampleKind::Pcm16),
            (false, 24) => Some(SampleKind::Pcm24),
            (false, 32) => Some(SampleKind::Pcm32),
            _ => None,
        }
    }
}

/// Extra fields of `WAVEFORMATEXTENSIBLE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extensible {
    pub valid_bits_per_sample: u16,
    pub channel_mask: u32,
    pub sub_format: [u8; 16],
}

/// Contents of the `fmt ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveFormat {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub avg_bytes_per_sec: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub extensible: Option<Extensible>,
}

impl WaveFormat {
    /// Plain `WAVEFORMATEX`-style description of interleaved `kind` samples.
    pub fn new(kind: SampleKind, channels: u16, sample_rate: u32) -> Self {
        let block_align = channels * kind.bytes_per_sample() as u16;
        Self {
            format_tag: if kind.is_float() {
                WAVE_FORMAT_IEEE_FLOAT
            } else {
                WAVE_FORMAT_PCM
            },
            channels,
            sample_rate,
            avg_bytes_per_sec: sample_rate * u32::from(block_align),
            block_align,
            bits_per_sample: kind.bits_per_sample(),
            extensible: None,
        }
    }

    /// `WAVEFORMATEXTENSIBLE` variant with the default speaker mask.
    pub fn new_extensible(kind: SampleKind, channels: u16, sample_rate: u32) -> Self {
        Self {
            format_tag: WAVE_FORMAT_EXTENSIBLE,
            extensible: Some(Extensible {
                valid_bits_per_sample: kind.bits_per_sample(),
                channel_mask: channel_mask(channels),
                sub_format: if kind.is_float() {
                    SUBTYPE_IEEE_FLOAT
                } else {
                    SUBTYPE_PCM
                },
            }),
            ..Self::new(kind, channels, sample_rate)
        }
    }

    /// Size of the encoded chunk body.
    pub fn chunk_size(&self) -> u32 {
        if self.extensible.is_some() {
            WAVEFORMATEXTENSIBLE_SIZE
        } else {
            WAVEFORMAT_SIZE
        }
    }

    /// Header plus body of the `fmt ` chunk.
    pub fn total_size(&self) -> u32 {
        CHUNK_HEADER_SIZE as u32 + self.chunk_size()
    }

    /// Resolve the sample layout, accepting only the formats we can read.
    pub fn sample_kind(&self) -> Result<SampleKind, ParseError> {
        let unrecognized = ParseError::UnrecognizedFormat {
            format_tag: self.format_tag,
            bits_per_sample: self.bits_per_sample,
        };

        let is_float = match (self.format_tag, &self.extensible) {
            (WAVE_FORMAT_PCM, _) => false,
            (WAVE_FORMAT_IEEE_FLOAT, _) => true,
            (WAVE_FORMAT_EXTENSIBLE, Some(ext)) if ext.sub_format == SUBTYPE_PCM => false,
            (WAVE_FORMAT_EXTENSIBLE, Some(ext)) if ext.sub_format == SUBTYPE_IEEE_FLOAT => true,
            _ => return Err(unrecognized),
        };

        match SampleKind::from_bits(is_float, self.bits_per_sample) {
            Some(SampleKind::Pcm32) | None => Err(unrecognized),
            Some(kind) => Ok(kind),
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.format_tag.to_le_bytes());
        out.extend_from_slice(&self.channels.to_le_bytes());
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&self.avg_bytes_per_sec.to_le_bytes());
        out.extend_from_slice(&self.block_align.to_le_bytes());
        out.extend_from_slice(&self.bits_per_sample.to_le_bytes());
        if let Some(ext) = &self.extensible {
            let cb_size = (WAVEFORMATEXTENSIBLE_SIZE - WAVEFORMATEX_SIZE) as u16;
            out.extend_from_slice(&cb_size.to_le_bytes());
            out.extend_from_slice(&ext.valid_bits_per_sample.to_le_bytes());
            out.extend_from_slice(&ext.channel_mask.to_le_bytes());
            out.extend_from_slice(&ext.sub_format);
        }
    }

    fn decode(body: &[u8]) -> Self {
        let mut format = Self {
            format_tag: le_u16(body, 0),
            channels: le_u16(body, 2),
            sample_rate: le_u32(body, 4),
            avg_bytes_per_sec: le_u32(body, 8),
            block_align: le_u16(body, 12),
            bits_per_sample: le_u16(body, 14),
            extensible: None,
        };
        if body.len() >= WAVEFORMATEXTENSIBLE_SIZE as usize {
            let mut sub_format = [0u8; 16];
            sub_format.copy_from_slice(&body[24..40]);
            format.extensible = Some(Extensible {
                valid_bits_per_sample: le_u16(body, 18),
                channel_mask: le_u32(body, 20),
                sub_format,
            });
        }
        format
    }
}

/// Header model shared by the synchronous and asynchronous writers.
///
/// Size fields stay zero until [`finalize`](Self::finalize) is called with
/// the final payload length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveHeader {
    format: WaveFormat,
    riff_size: u32,
    data_size: u32,
}

impl WaveHeader {
    pub fn new(channels: u16, sample_rate: u32, kind: SampleKind) -> Self {
        Self::with_format(WaveFormat::new(kind, channels, sample_rate))
    }

    pub fn with_format(format: WaveFormat) -> Self {
        Self {
            format,
            riff_size: 0,
            data_size: 0,
        }
    }

    pub fn format(&self) -> &WaveFormat {
        &self.format
    }

    /// Bytes reserved in front of the payload.
    pub fn header_size(&self) -> usize {
        RIFF_HEADER_SIZE + self.format.total_size() as usize + CHUNK_HEADER_SIZE
    }

    pub fn data_size(&self) -> u32 {
        self.data_size
    }

    /// Track the payload length without emitting header bytes.
    pub fn set_data_size(&mut self, data_size: u32) {
        self.data_size = data_size;
    }

    /// Largest payload whose RIFF size still fits in 32 bits, rounded down
    /// to whole frames with an even length.
    pub fn max_data_size(&self) -> u32 {
        let riff_overhead = (self.header_size() - CHUNK_HEADER_SIZE) as u32;
        let mut limit = u32::MAX - riff_overhead;
        let block_align = u32::from(self.format.block_align.max(1));
        limit -= limit % block_align;
        if limit % 2 != 0 {
            limit -= block_align;
        }
        limit
    }

    pub fn riff_size(&self) -> u32 {
        self.riff_size
    }

    /// Frames covered by the current data size.
    pub fn sample_position(&self) -> u64 {
        if self.format.block_align == 0 {
            return 0;
        }
        u64::from(self.data_size) / u64::from(self.format.block_align)
    }

    /// Millisecond position derived from [`sample_position`](Self::sample_position).
    pub fn time_position_ms(&self) -> u64 {
        if self.format.sample_rate == 0 {
            return 0;
        }
        self.sample_position() * 1000 / u64::from(self.format.sample_rate)
    }

    /// Header bytes with both size fields zeroed.
    pub fn placeholder_bytes(&self) -> Vec<u8> {
        self.encode(0, 0)
    }

    /// Fix the size fields for `total_data_bytes` of payload and return the
    /// header bytes to rewrite at offset 0.
    ///
    /// Payloads beyond [`max_data_size`](Self::max_data_size) are recorded
    /// as that limit.
    pub fn finalize(&mut self, total_data_bytes: u32) -> Vec<u8> {
        self.data_size = total_data_bytes.min(self.max_data_size());
        let data_total = CHUNK_HEADER_SIZE as u32 + self.data_size;
        self.riff_size = WAVE_TAG.len() as u32 + self.format.total_size() + data_total;

        debug_assert!(self.riff_size % 2 == 0, "RIFF chunk requires a padding byte");
        debug_assert!(self.format.chunk_size() % 2 == 0, "fmt chunk requires a padding byte");
        debug_assert!(self.data_size % 2 == 0, "data chunk requires a padding byte");

        self.encode(self.riff_size, self.data_size)
    }

    fn encode(&self, riff_size: u32, data_size: u32) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.header_size());
        out.extend_from_slice(&RIFF_TAG);
        out.extend_from_slice(&riff_size.to_le_bytes());
        out.extend_from_slice(&WAVE_TAG);
        out.extend_from_slice(&FMT_TAG);
        out.extend_from_slice(&self.format.chunk_size().to_le_bytes());
        self.format.encode_into(&mut out);
        out.extend_from_slice(&DATA_TAG);
        out.extend_from_slice(&data_size.to_le_bytes());
        out
    }
}

/// Result of a successful [`parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedWave {
    pub format: WaveFormat,
    pub kind: SampleKind,
    /// Byte range of the sample payload within the parsed buffer.
    pub data: Range<usize>,
}

/// Decode a WAVE header from `bytes`.
///
/// Unknown chunks between `fmt ` and `data` (`LIST`, `fact`, `bext`, ...)
/// are skipped. Every size field is checked against the bytes that remain.
pub fn parse(bytes: &[u8]) -> Result<ParsedWave, ParseError> {
    require(bytes, 0, RIFF_HEADER_SIZE)?;
    if bytes[0..4] != RIFF_TAG {
        return Err(ParseError::InvalidTag { expected: "RIFF" });
    }
    if bytes[8..12] != WAVE_TAG {
        return Err(ParseError::InvalidTag { expected: "WAVE" });
    }

    let riff_size = le_u32(bytes, 4);
    let remaining_for_riff = bytes.len() - CHUNK_HEADER_SIZE;
    if riff_size as usize > remaining_for_riff {
        return Err(ParseError::ChunkTooLarge {
            tag: "RIFF".to_string(),
            size: riff_size,
            remaining: remaining_for_riff,
        });
    }
    if (riff_size as usize) < remaining_for_riff {
        tracing::trace!(
            riff_size,
            file_size = bytes.len(),
            "WAVE has trailing data after the RIFF chunk"
        );
    }

    let mut offset = RIFF_HEADER_SIZE;
    let mut format: Option<WaveFormat> = None;

    loop {
        require(bytes, offset, CHUNK_HEADER_SIZE)?;
        let tag = &bytes[offset..offset + 4];
        let size = le_u32(bytes, offset + 4);
        let body = offset + CHUNK_HEADER_SIZE;
        let remaining = bytes.len() - body;

        if size as usize > remaining {
            return Err(ParseError::ChunkTooLarge {
                tag: String::from_utf8_lossy(tag).into_owned(),
                size,
                remaining,
            });
        }

        if tag == FMT_TAG {
            if !matches!(
                size,
                WAVEFORMAT_SIZE | WAVEFORMATEX_SIZE | WAVEFORMATEXTENSIBLE_SIZE
            ) {
                return Err(ParseError::InvalidFormatSize(size));
            }
            format = Some(WaveFormat::decode(&bytes[body..body + size as usize]));
        } else if tag == DATA_TAG {
            let format = format.ok_or(ParseError::MissingChunk("fmt "))?;
            let kind = format.sample_kind()?;
            return Ok(ParsedWave {
                format,
                kind,
                data: body..body + size as usize,
            });
        }

        // Odd-sized chunks carry one pad byte.
        let padded = size as usize + (size as usize & 1);
        offset = body + padded;
        if offset >= bytes.len() {
            return Err(if format.is_some() {
                ParseError::MissingChunk("data")
            } else {
                ParseError::MissingChunk("fmt ")
            });
        }
    }
}

fn require(bytes: &[u8], offset: usize, needed: usize) -> Result<(), ParseError> {
    if bytes.len() < offset + needed {
        Err(ParseError::Truncated { offset, needed })
    } else {
        Ok(())
    }
}

fn le_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
