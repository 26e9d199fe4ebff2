//! # Sample Loader
//!
//! Decodes a whole file into memory as a two-channel [`Sample`], pulling it
//! through a [`StreamingDecoderAdapter`] in fixed-size chunks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bridge_traits::PipelineFactory;
use core_runtime::config::StreamingSettings;
use core_wave::SampleConverter;
use tracing::{info, instrument, warn};

use crate::adapter::StreamingDecoderAdapter;
use crate::error::LoadError;

/// A fully decoded stereo sample.
///
/// Mono sources are duplicated into both channels. Sources with more than
/// two channels keep the first two.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    left: Vec<f32>,
    right: Vec<f32>,
    sample_rate: u32,
    source: PathBuf,
    /// Playback position in frames, owned by the caller.
    pub position: usize,
}

impl Sample {
    /// `0` is the left channel, `1` the right one.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        match index {
            0 => Some(&self.left),
            1 => Some(&self.right),
            _ => None,
        }
    }

    pub fn frames(&self) -> usize {
        self.left.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn restart(&mut self) {
        self.position = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }
}

pub struct SampleLoader {
    factory: Arc<dyn PipelineFactory>,
    settings: StreamingSettings,
}

impl SampleLoader {
    pub fn new(factory: Arc<dyn PipelineFactory>, settings: StreamingSettings) -> Self {
        Self { factory, settings }
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(&self, path: &Path) -> Result<Sample, LoadError> {
        self.settings.validate()?;
        let adapter = StreamingDecoderAdapter::new(Arc::clone(&self.factory));
        adapter.open(path)?;

        let channels = adapter.channels();
        let sample_rate = adapter.sample_rate();
        let chunk_frames = self.settings.loader_chunk_frames;
        let expected = adapter.length_frames().unwrap_or(0) as usize;

        let mut chunk = vec![0.0f32; chunk_frames * channels];
        let mut left = Vec::with_capacity(expected);
        let mut right = Vec::with_capacity(expected);

        loop {
            let frames = adapter.read(&mut chunk);
            for frame in chunk[..frames * channels].chunks_exact(channels) {
                left.push(frame[0]);
                right.push(frame.get(1).copied().unwrap_or(frame[0]));
            }
            if frames < chunk_frames {
                break;
            }
        }
        adapter.close();

        if left.is_empty() {
            return Err(LoadError::Empty(path.display().to_string()));
        }

        let limit = self.settings.clip_warning_threshold;
        let out_of_range = SampleConverter::count_out_of_range(&left, limit)
            + SampleConverter::count_out_of_range(&right, limit);
        if out_of_range > 0 {
            warn!(out_of_range, limit, "Decoded sample exceeds the expected range");
        }

        info!(frames = left.len(), channels, sample_rate, "Sample loaded");
        Ok(Sample {
            left,
            right,
            sample_rate,
            source: path.to_path_buf(),
            position: 0,
        })
    }
}
