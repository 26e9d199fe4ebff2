//! # Desktop Bridge Implementations
//!
//! Default implementations of the bridge traits for desktop platforms
//! (macOS, Windows, Linux):
//! - [`SymphoniaPipelineFactory`] decodes local files with `symphonia` and
//!   pushes interleaved buffers from a thread of its own
//! - [`TokioFileTarget`] performs positioned writes on a Tokio blocking pool
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use bridge_desktop::{SymphoniaPipelineFactory, TokioFileTarget};
//! use core_runtime::config::EngineConfig;
//! use core_streaming::SampleLoader;
//!
//! let config = EngineConfig::default();
//! let factory = Arc::new(SymphoniaPipelineFactory::new(&config.streaming));
//! let loader = SampleLoader::new(factory, config.streaming.clone());
//! let kick = loader.load("kick.flac".as_ref())?;
//!
//! let target = Arc::new(TokioFileTarget::create("take.wav", &config.write_back)?);
//! ```

mod file_target;
mod symphonia_pipeline;

pub use file_target::TokioFileTarget;
pub use symphonia_pipeline::{SymphoniaPipeline, SymphoniaPipelineFactory};
