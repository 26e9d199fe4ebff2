//! # WAVE Container Support
//!
//! RIFF/WAVE codec, sample conversion and file readers/writers shared by the
//! streaming and write-back crates.
//!
//! ## Overview
//!
//! - [`codec`]: stateless header encode/parse (`RIFF`, `fmt `, `data`)
//! - [`sample`]: byte buffer <-> normalized `f32` conversion
//! - [`reader`]: in-memory [`InputWaveFile`] with looping and padding reads
//! - [`writer`]: blocking [`OutputWaveFile`]

pub mod codec;
pub mod error;
pub mod reader;
pub mod sample;
pub mod writer;

pub use codec::{parse, ParsedWave, SampleKind, WaveFormat, WaveHeader};
pub use error::{ParseError, Result, WaveError};
pub use reader::InputWaveFile;
pub use sample::SampleConverter;
pub use writer::OutputWaveFile;
