//! Asynchronous File Output
//!
//! Platform primitive for overlapped writes: the caller hands over a buffer and
//! an absolute offset and gets exactly one completion back, eventually, on an
//! arbitrary thread. Completions of different submissions may arrive in any
//! order.

use bytes::BytesMut;
use std::io;

use crate::error::Result;

/// Called once per submission with the buffer (returned for recycling) and
/// the number of bytes written or the error that stopped the write.
pub type WriteCompletion = Box<dyn FnOnce(BytesMut, io::Result<usize>) + Send + 'static>;

/// Destination for asynchronous positioned writes.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::async_io::AsyncWriteTarget;
///
/// fn flush_block(target: &dyn AsyncWriteTarget, block: BytesMut, offset: u64) -> Result<()> {
///     target.submit(block, offset, Box::new(|_buffer, result| {
///         if let Err(e) = result {
///             tracing::error!("write failed: {}", e);
///         }
///     }))
/// }
/// ```
pub trait AsyncWriteTarget: Send + Sync {
    /// Queue `buffer` to be written at `offset` and return immediately.
    ///
    /// An `Err` means the write was never queued and `completion` will not run.
    fn submit(&self, buffer: BytesMut, offset: u64, completion: WriteCompletion) -> Result<()>;

    /// Blocking write used for headers, outside the real-time path.
    fn write_header(&self, offset: u64, bytes: &[u8]) -> Result<()>;

    /// Make everything written so far durable and release the handle.
    fn close(&self) -> Result<()>;
}
