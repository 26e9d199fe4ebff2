//! Umbrella crate for the sample streaming engine.
//!
//! Re-exports the workspace crates so hosts can depend on one package and
//! pick the platform bridge with a feature flag:
//!
//! - `desktop` (default): Symphonia decoding and Tokio file output
//!
//! ```ignore
//! use std::sync::Arc;
//! use sampleflow_workspace::{desktop::SymphoniaPipelineFactory, runtime::EngineConfig};
//! use sampleflow_workspace::streaming::StreamingDecoderAdapter;
//!
//! let config = EngineConfig::default();
//! let adapter = StreamingDecoderAdapter::new(Arc::new(SymphoniaPipelineFactory::new(&config.streaming)));
//! adapter.open("loop.flac".as_ref())?;
//! ```

pub use bridge_traits as bridge;
pub use core_runtime as runtime;
pub use core_streaming as streaming;
pub use core_wave as wave;
pub use core_writeback as writeback;

#[cfg(feature = "desktop")]
pub use bridge_desktop as desktop;
