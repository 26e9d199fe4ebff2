//! # Streaming Error Types

use thiserror::Error;

/// Why a candidate decoder output format was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Unsupported sample encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Sample layout is padded or not byte aligned ({bits_per_sample} bits, block align {block_align})")]
    NotPacked { bits_per_sample: u16, block_align: u16 },

    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),

    #[error("Too many channels: {0}")]
    TooManyChannels(u16),

    #[error("Channel count changed from {expected} to {actual}")]
    ChannelMismatch { expected: u8, actual: u16 },

    #[error("Sample rate changed from {expected} to {actual}")]
    SampleRateMismatch { expected: u32, actual: u32 },

    #[error("Bit depth would drop from {baseline} to {actual}")]
    BitDepthDecrease { baseline: u16, actual: u16 },
}

/// Failures while opening a stream.
#[derive(Error, Debug)]
pub enum OpenError {
    /// No output pin offered a format the negotiator accepts.
    #[error("No compatible decoder output")]
    NoCompatibleDecoder,

    #[error("Failed to construct decoder pipeline: {0}")]
    PipelineConstructionFailed(String),
}

impl From<bridge_traits::BridgeError> for OpenError {
    fn from(err: bridge_traits::BridgeError) -> Self {
        OpenError::PipelineConstructionFailed(err.to_string())
    }
}

/// Failures while loading a whole sample into memory.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Open(#[from] OpenError),

    /// The stream produced no frames.
    #[error("Sample is empty: {0}")]
    Empty(String),

    #[error("Invalid loader settings: {0}")]
    Settings(#[from] core_runtime::Error),
}

impl LoadError {
    /// True when retrying with another file type could help.
    pub fn is_format_error(&self) -> bool {
        matches!(self, LoadError::Open(OpenError::NoCompatibleDecoder))
    }
}

pub type Result<T> = std::result::Result<T, OpenError>;
