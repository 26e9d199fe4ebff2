//! # Write-Back Error Types

use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WriteBackError {
    /// An earlier asynchronous write failed. Sticky until the writer is closed.
    #[error("Asynchronous write failed")]
    Io,

    /// The target refused a submission or a header write.
    #[error("Write target error: {0}")]
    Target(#[from] BridgeError),

    #[error("Expected {expected} samples, got {actual}")]
    ShortInput { expected: usize, actual: usize },

    #[error("Invalid channel count: {0}")]
    InvalidChannels(u16),

    #[error("Writer is closed")]
    Closed,
}

impl WriteBackError {
    /// Errors caused by the caller rather than the I/O layer.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            WriteBackError::ShortInput { .. }
                | WriteBackError::InvalidChannels(_)
                | WriteBackError::Closed
        )
    }
}

pub type Result<T> = std::result::Result<T, WriteBackError>;
