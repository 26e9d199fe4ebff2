//! Staging area for one `read()`.
//!
//! The push side converts straight into this buffer; the reader copies the
//! filled prefix out once the request is satisfied or the stream stops. The
//! storage is kept between reads so steady-state reads do not allocate.

use core_wave::{SampleConverter, SampleKind};

#[derive(Debug, Default)]
pub struct OutputCursor {
    storage: Vec<f32>,
    wanted: usize,
    filled: usize,
}

impl OutputCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request for `samples` samples.
    pub fn install(&mut self, samples: usize) {
        debug_assert!(!self.is_active(), "cursor installed twice");
        if self.storage.len() < samples {
            self.storage.resize(samples, 0.0);
        }
        self.wanted = samples;
        self.filled = 0;
    }

    pub fn is_active(&self) -> bool {
        self.wanted != 0
    }

    /// Samples that still fit.
    pub fn room(&self) -> usize {
        self.wanted - self.filled
    }

    pub fn is_full(&self) -> bool {
        self.filled == self.wanted
    }

    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Convert whole samples from `input` into the free space.
    ///
    /// Returns the number of samples written.
    pub fn fill_from(&mut self, kind: SampleKind, input: &[u8]) -> usize {
        let end = self.wanted;
        let written = SampleConverter::decode(kind, input, &mut self.storage[self.filled..end]);
        self.filled += written;
        written
    }

    /// Copy the filled prefix into `output` and return the sample count.
    pub fn drain_into(&mut self, output: &mut [f32]) -> usize {
        let count = self.filled.min(output.len());
        output[..count].copy_from_slice(&self.storage[..count]);
        self.reset();
        count
    }

    /// Drop the request without copying anything out.
    pub fn reset(&mut self) {
        self.wanted = 0;
        self.filled = 0;
    }
}
