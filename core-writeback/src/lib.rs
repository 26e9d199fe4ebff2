//! # Asynchronous Write-Back
//!
//! Non-blocking WAVE recording for real-time threads.
//!
//! ## Overview
//!
//! - [`pool`]: bounded lock-free recycling of write buffers
//! - [`writer`]: [`AsyncWaveWriter`], which submits positioned writes to a
//!   `bridge_traits::AsyncWriteTarget` and finalizes the header on close
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::WriteBackSettings;
//! use core_writeback::AsyncWaveWriter;
//!
//! let mut writer = AsyncWaveWriter::create(target, 2, 48_000, &WriteBackSettings::default())?;
//! writer.write(&block, 256)?; // returns before the disk is touched
//! writer.close()?;            // waits for outstanding writes
//! ```

pub mod error;
pub mod pool;
pub mod writer;

pub use error::{Result, WriteBackError};
pub use pool::BufferPool;
pub use writer::AsyncWaveWriter;
