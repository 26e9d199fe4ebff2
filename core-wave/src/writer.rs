//! # Synchronous WAVE Writer
//!
//! Streams interleaved `f32` frames to disk, converting to the configured
//! on-disk sample type, and rewrites the header sizes on close.

use std::fs::File;
use std::io::{ErrorKind, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, instrument, warn};

use crate::codec::{SampleKind, WaveFormat, WaveHeader};
use crate::error::{Result, WaveError};
use crate::sample::SampleConverter;

/// Conversion happens in blocks of this many bytes.
const BLOCK_BYTES: usize = 16 * 1024;

/// Blocking WAVE writer.
///
/// The header is reserved on creation with zeroed sizes and finalized by
/// [`close`](Self::close) (or on drop).
pub struct OutputWaveFile {
    file: Option<File>,
    header: WaveHeader,
    kind: SampleKind,
    scratch: Vec<u8>,
}

impl OutputWaveFile {
    /// Create a 16-bit PCM file.
    pub fn create(path: impl AsRef<Path>, channels: u16, sample_rate: u32) -> Result<Self> {
        Self::create_with_format(path, WaveFormat::new(SampleKind::Pcm16, channels, sample_rate))
    }

    /// Create a file with an explicit `fmt ` description.
    #[instrument(skip_all, fields(file = %path.as_ref().display(), channels = format.channels))]
    pub fn create_with_format(path: impl AsRef<Path>, format: WaveFormat) -> Result<Self> {
        if format.channels == 0 {
            return Err(WaveError::InvalidChannels(format.channels));
        }
        let kind = format.sample_kind()?;
        let header = WaveHeader::with_format(format);

        let mut file = File::create(path.as_ref())?;
        file.write_all(&header.placeholder_bytes())?;
        debug!(header_size = header.header_size(), ?kind, "Created WAVE file");

        Ok(Self {
            file: Some(file),
            header,
            kind,
            scratch: Vec::with_capacity(BLOCK_BYTES),
        })
    }

    pub fn header(&self) -> &WaveHeader {
        &self.header
    }

    pub fn header_size(&self) -> usize {
        self.header.header_size()
    }

    pub fn channels(&self) -> u16 {
        self.header.format().channels
    }

    /// Frames written so far.
    pub fn sample_position(&self) -> u64 {
        self.header.sample_position()
    }

    pub fn time_position_ms(&self) -> u64 {
        self.header.time_position_ms()
    }

    /// Append `frames` interleaved frames from `samples`.
    pub fn write(&mut self, samples: &[f32], frames: u32) -> Result<()> {
        let file = self.file.as_mut().ok_or(WaveError::Closed)?;
        let total = (frames as usize * usize::from(self.header.format().channels)).min(samples.len());
        let width = self.kind.bytes_per_sample();
        let block_samples = BLOCK_BYTES / width;
        let limit = self.header.max_data_size();

        for block in samples[..total].chunks(block_samples) {
            self.scratch.resize(block.len() * width, 0);
            let bytes = SampleConverter::encode(self.kind, block, &mut self.scratch);
            let data_size = u32::try_from(bytes)
                .ok()
                .and_then(|bytes| self.header.data_size().checked_add(bytes))
                .filter(|&size| size <= limit)
                .ok_or(WaveError::DataTooLarge { limit })?;

            file.write_all(&self.scratch[..bytes]).map_err(|e| match e.kind() {
                ErrorKind::WriteZero => WaveError::DiskFull,
                _ => WaveError::Io(e),
            })?;
            self.header.set_data_size(data_size);
        }
        Ok(())
    }

    /// Rewrite the header with the final sizes and close the file.
    ///
    /// Calling `close` again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };
        let bytes = self.header.finalize(self.header.data_size());
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&bytes)?;
        file.flush()?;
        debug!(
            data_bytes = self.header.data_size(),
            frames = self.header.sample_position(),
            "Finalized WAVE file"
        );
        Ok(())
    }
}

impl Drop for OutputWaveFile {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to finalize WAVE file on drop: {}", e);
        }
    }
}
