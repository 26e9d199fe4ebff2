//! # WAVE Error Types

use thiserror::Error;

/// Failures while decoding a RIFF/WAVE header.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Fewer bytes than a header or chunk requires.
    #[error("Truncated WAVE data: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    /// `RIFF` or `WAVE` tag missing or wrong.
    #[error("Invalid {expected} tag")]
    InvalidTag { expected: &'static str },

    /// A chunk claims more bytes than remain in the buffer.
    #[error("Chunk '{tag}' size {size} exceeds remaining {remaining} bytes")]
    ChunkTooLarge {
        tag: String,
        size: u32,
        remaining: usize,
    },

    /// The file has no `fmt ` or no `data` chunk.
    #[error("Missing '{0}' chunk")]
    MissingChunk(&'static str),

    /// `fmt ` chunk size is not one of the layouts we know.
    #[error("Invalid fmt chunk size: {0}")]
    InvalidFormatSize(u32),

    /// The sample format is not PCM 16/24-bit or IEEE-float 32-bit.
    #[error("Unrecognized sample format (tag {format_tag:#06x}, {bits_per_sample} bits)")]
    UnrecognizedFormat {
        format_tag: u16,
        bits_per_sample: u16,
    },
}

/// Errors from the WAVE file readers and writers.
#[derive(Error, Debug)]
pub enum WaveError {
    #[error("WAVE parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Not enough disk space")]
    DiskFull,

    #[error("Invalid channel count: {0}")]
    InvalidChannels(u16),

    #[error("Data chunk would exceed the {limit} byte WAVE limit")]
    DataTooLarge { limit: u32 },

    #[error("File already closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WaveError {
    /// Returns `true` if the file itself is malformed rather than unreadable.
    pub fn is_format_error(&self) -> bool {
        matches!(self, WaveError::Parse(_))
    }
}

pub type Result<T> = std::result::Result<T, WaveError>;
