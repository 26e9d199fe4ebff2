//! # Host Bridge Traits
//!
//! Contracts between the streaming core and the platform collaborators it
//! drives but does not own.
//!
//! ## Overview
//!
//! The core never talks to a media framework or an overlapped-I/O API
//! directly. Each platform provides adapters for the traits below; the core
//! only sees trait objects.
//!
//! ## Traits
//!
//! ### Decoding
//! - [`PipelineFactory`](pipeline::PipelineFactory) - Builds a decoder pipeline for a file
//! - [`DecoderPipeline`](pipeline::DecoderPipeline) - Push-style decoder: pins, connect, run/pause/stop
//! - [`SampleSink`](pipeline::SampleSink) - Receiving end implemented by the core
//!
//! ### Output
//! - [`AsyncWriteTarget`](async_io::AsyncWriteTarget) - Positioned writes with completion callbacks
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Decoder           | Async I/O                 |
//! |----------|----------------------|-------------------|---------------------------|
//! | Desktop  | `bridge-desktop`     | symphonia thread  | tokio blocking pool       |
//!
//! ## Threading
//!
//! Pipelines push from their own threads and write completions run on
//! whatever thread the I/O layer uses. All traits are `Send`, and the ones
//! shared across threads are also `Sync`.
//!
//! ## Error Handling
//!
//! Every bridge uses [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it with enough context (file path,
//! pin id, offset) to act on.

pub mod async_io;
pub mod error;
pub mod format;
pub mod pipeline;

pub use error::{BridgeError, Result};

pub use async_io::{AsyncWriteTarget, WriteCompletion};
pub use format::{MediaFormat, SampleEncoding};
pub use pipeline::{DecoderPipeline, OutputPin, PipelineFactory, ReceiveStatus, SampleSink};
