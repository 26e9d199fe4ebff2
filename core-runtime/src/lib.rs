//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the engine crates:
//! - Logging and tracing setup
//! - Engine configuration with serde defaults and validation
//!
//! ## Overview
//!
//! Hosts call [`logging::init_logging`] once at startup and build an
//! [`config::EngineConfig`] (from defaults, a preset or JSON) that the
//! streaming and write-back engines read their tunables from.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{EngineConfig, StreamingSettings, WriteBackSettings, WriteSampleFormat};
pub use error::{Error, Result};
