//! Decoder Pipeline Abstractions
//!
//! A decoder pipeline is the platform media framework that turns an encoded
//! file into interleaved PCM. It is push-driven: once connected and running,
//! it calls [`SampleSink::receive`] from a thread it owns, with buffers of
//! whatever size it produced, at whatever cadence it likes.
//!
//! The lifecycle the core drives is:
//!
//! ```text
//! output_pins() -> connect(pin, format, sink) -> run()/pause()/stop()
//!     ... sink.receive(buffer) per decoded buffer ...
//!     sink.end_of_stream()
//! ```

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::format::MediaFormat;

/// Outcome of a push reported back to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveStatus {
    /// Every byte of the buffer was taken.
    Consumed,
    /// The sink stopped accepting data part way through. The pipeline must
    /// re-deliver the same buffer; the sink remembers how much it already took.
    NotFullyConsumed,
}

/// Receiving end of a connected pipeline.
///
/// Implemented by the core and handed to [`DecoderPipeline::connect`]. Calls
/// to `receive` are serialized with respect to each other but arrive on an
/// arbitrary thread.
pub trait SampleSink: Send + Sync {
    /// Push one decoded buffer.
    ///
    /// Returns [`BridgeError::ProtocolViolation`](crate::BridgeError::ProtocolViolation)
    /// when called while the sink is flushing or after end-of-stream was
    /// signalled.
    fn receive(&self, buffer: &[u8]) -> Result<ReceiveStatus>;

    /// The pipeline has no more data.
    fn end_of_stream(&self);

    /// Discard everything in flight (seek or teardown is about to happen).
    fn begin_flush(&self);

    /// Flushing is over; pushes may resume.
    fn end_flush(&self);
}

/// One output of a decoder pipeline together with the formats it can produce,
/// in order of preference.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPin {
    pub id: usize,
    pub formats: Vec<MediaFormat>,
}

/// Push-style decoder for a single opened source.
///
/// Implementations must deliver data from a thread of their own: `run` may
/// wake that thread but must never call back into the sink before returning.
/// Running a pipeline that already reached the end signals
/// [`SampleSink::end_of_stream`] again.
pub trait DecoderPipeline: Send {
    /// Enumerate the output pins and their candidate formats.
    fn output_pins(&mut self) -> Result<Vec<OutputPin>>;

    /// Connect `sink` to `pin`, committing to `format`.
    fn connect(&mut self, pin: usize, format: MediaFormat, sink: Arc<dyn SampleSink>)
        -> Result<()>;

    /// Release the sink. Safe to call when not connected.
    fn disconnect(&mut self);

    /// Start or resume pushing.
    fn run(&mut self) -> Result<()>;

    /// Suspend pushing without losing the position.
    fn pause(&mut self) -> Result<()>;

    /// Stop pushing and rewind nothing; a later `run` continues from the
    /// current position.
    fn stop(&mut self) -> Result<()>;

    /// Total length in frames at the connected format's rate, if known.
    fn duration_frames(&self) -> Option<u64>;

    /// Move the decode position. Only valid while stopped or paused.
    fn seek(&mut self, frame: u64) -> Result<()>;
}

/// Builds pipelines for files on the current platform.
pub trait PipelineFactory: Send + Sync {
    /// Construct an unconnected pipeline reading `path`.
    fn open(&self, path: &Path) -> Result<Box<dyn DecoderPipeline>>;

    /// File extensions this factory can usually decode, without the dot.
    fn supported_extensions(&self) -> Vec<&'static str>;
}
