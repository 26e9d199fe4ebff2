//! # Engine Configuration
//!
//! Tunables for the streaming adapter, the sample loader and the write-back
//! engine.
//!
//! ## Overview
//!
//! Every field has a serde default, so a partial JSON document (or an empty
//! one) deserializes into a usable configuration. Call
//! [`EngineConfig::validate`] before handing a deserialized config to the
//! engines; it fails fast with the offending field named.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{ "write_back": { "pool_capacity": 8 } }"#)?;
//! assert_eq!(config.streaming.loader_chunk_frames, 4096);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub streaming: StreamingSettings,

    #[serde(default)]
    pub write_back: WriteBackSettings,
}

impl EngineConfig {
    /// Small pools and chunks for minimum latency.
    pub fn low_latency() -> Self {
        Self {
            streaming: StreamingSettings {
                loader_chunk_frames: 512,
                push_chunk_frames: 256,
                ..StreamingSettings::default()
            },
            write_back: WriteBackSettings {
                pool_capacity: 8,
                ..WriteBackSettings::default()
            },
        }
    }

    /// Larger chunks and float output.
    pub fn high_quality() -> Self {
        Self {
            streaming: StreamingSettings {
                loader_chunk_frames: 16_384,
                push_chunk_frames: 4_096,
                ..StreamingSettings::default()
            },
            write_back: WriteBackSettings {
                sample_format: WriteSampleFormat::Float32,
                ..WriteBackSettings::default()
            },
        }
    }

    /// Parse a JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.streaming.validate()?;
        self.write_back.validate()
    }
}

/// Settings for the decoder adapter and sample loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingSettings {
    /// Frames requested per `read` while loading a whole file.
    ///
    /// Default: 4096.
    #[serde(default = "default_loader_chunk_frames")]
    pub loader_chunk_frames: usize,

    /// Frames per buffer pushed by the desktop decoder pipeline.
    ///
    /// Default: 1024.
    #[serde(default = "default_push_chunk_frames")]
    pub push_chunk_frames: usize,

    /// Loaded samples beyond this magnitude are reported with a warning.
    /// Some decoders overshoot full scale slightly, so this is above 1.0.
    ///
    /// Default: 1.15.
    #[serde(default = "default_clip_warning_threshold")]
    pub clip_warning_threshold: f32,
}

fn default_loader_chunk_frames() -> usize {
    4096
}

fn default_push_chunk_frames() -> usize {
    1024
}

fn default_clip_warning_threshold() -> f32 {
    1.15
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            loader_chunk_frames: default_loader_chunk_frames(),
            push_chunk_frames: default_push_chunk_frames(),
            clip_warning_threshold: default_clip_warning_threshold(),
        }
    }
}

impl StreamingSettings {
    pub fn validate(&self) -> Result<()> {
        if self.loader_chunk_frames == 0 {
            return Err(invalid("streaming.loader_chunk_frames", "must be greater than 0"));
        }
        if self.push_chunk_frames == 0 {
            return Err(invalid("streaming.push_chunk_frames", "must be greater than 0"));
        }
        if !(self.clip_warning_threshold >= 1.0) {
            return Err(invalid(
                "streaming.clip_warning_threshold",
                "must be at least 1.0",
            ));
        }
        Ok(())
    }
}

/// On-disk sample type produced by the writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteSampleFormat {
    #[default]
    Int16,
    Float32,
}

/// Settings for the asynchronous write-back engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteBackSettings {
    /// Completed buffers kept for reuse. Extra buffers are freed.
    ///
    /// Default: 4.
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,

    /// Default: 16-bit integer.
    #[serde(default)]
    pub sample_format: WriteSampleFormat,

    /// Threads available to the desktop file target for blocking writes.
    ///
    /// Default: 2.
    #[serde(default = "default_io_worker_threads")]
    pub io_worker_threads: usize,
}

fn default_pool_capacity() -> usize {
    4
}

fn default_io_worker_threads() -> usize {
    2
}

impl Default for WriteBackSettings {
    fn default() -> Self {
        Self {
            pool_capacity: default_pool_capacity(),
            sample_format: WriteSampleFormat::default(),
            io_worker_threads: default_io_worker_threads(),
        }
    }
}

impl WriteBackSettings {
    pub fn validate(&self) -> Result<()> {
        if self.pool_capacity == 0 {
            return Err(invalid("write_back.pool_capacity", "must be greater than 0"));
        }
        if self.io_worker_threads == 0 {
            return Err(invalid("write_back.io_worker_threads", "must be greater than 0"));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> Error {
    Error::InvalidSetting {
        field: field.to_string(),
        message: message.to_string(),
    }
}
