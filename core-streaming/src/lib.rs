//! # Streaming Decoder Core
//!
//! Pull-style access to push-style decoder pipelines.
//!
//! ## Overview
//!
//! A platform decoder (see `bridge_traits::DecoderPipeline`) pushes buffers
//! of interleaved PCM from its own thread whenever it likes. Hosts want to
//! ask for "the next N frames as `f32`" and block until they have them. The
//! [`StreamingDecoderAdapter`] sits between the two:
//!
//! - [`negotiator`]: which pin formats are acceptable
//! - [`state`]: Stopped/Paused/Running, flushing and deferred completion
//! - [`cursor`]: staging for the read in progress
//! - [`adapter`]: the blocking hand-off itself
//! - [`loader`]: decode a whole file into a stereo [`Sample`]
//!
//! ## Usage
//!
//! ```ignore
//! use core_streaming::StreamingDecoderAdapter;
//!
//! let adapter = StreamingDecoderAdapter::new(factory);
//! adapter.open(Path::new("loop.flac"))?;
//!
//! let mut block = vec![0.0f32; 512 * adapter.channels()];
//! while adapter.read(&mut block) == 512 {
//!     render(&block);
//! }
//! adapter.close();
//! ```

pub mod adapter;
pub mod cursor;
pub mod error;
pub mod loader;
pub mod negotiator;
pub mod state;

pub use adapter::StreamingDecoderAdapter;
pub use cursor::OutputCursor;
pub use error::{FormatError, LoadError, OpenError, Result};
pub use loader::{Sample, SampleLoader};
pub use negotiator::{AcceptedFormat, DecodedFormat, SampleFormatNegotiator};
pub use state::{PlaybackStateMachine, RunOutcome, StreamEvent, StreamState};
