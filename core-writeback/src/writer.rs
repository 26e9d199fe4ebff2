//! # Asynchronous WAVE Writer
//!
//! Real-time friendly WAVE output. `write` converts into a pooled buffer,
//! hands it to an [`AsyncWriteTarget`] and returns without waiting for the
//! disk. Completions arrive later, out of order, on I/O threads.
//!
//! ## Accounting
//!
//! - Offsets are assigned by the producer from a running counter, so the
//!   file layout does not depend on completion order.
//! - Completed byte counts are summed into an atomic; the header is
//!   finalized from that sum at close.
//! - A failed completion sets a sticky flag. Every later `write` and the
//!   final `close` report it.
//! - `close` waits until every submitted write has completed.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use bridge_traits::AsyncWriteTarget;
use bytes::BytesMut;
use core_runtime::config::{WriteBackSettings, WriteSampleFormat};
use core_wave::{SampleConverter, SampleKind, WaveHeader};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, instrument, trace, warn};

use crate::error::{Result, WriteBackError};
use crate::pool::BufferPool;

/// State touched by completion callbacks.
struct Completions {
    pool: BufferPool,
    data_size: AtomicU64,
    failed: AtomicBool,
    in_flight: AtomicUsize,
    /// Held only to hand the last completion over to `join`.
    drain_lock: Mutex<()>,
    drained: Condvar,
}

impl Completions {
    fn complete(&self, buffer: BytesMut, expected: usize, result: io::Result<usize>) {
        match result {
            Ok(written) if written == expected => {
                self.data_size.fetch_add(written as u64, Ordering::AcqRel);
            }
            Ok(written) => {
                error!(written, expected, "Asynchronous write was short");
                self.failed.store(true, Ordering::Release);
            }
            Err(err) => {
                error!(error = %err, "Asynchronous write failed");
                self.failed.store(true, Ordering::Release);
            }
        }
        if !self.pool.recycle(buffer) {
            trace!("Pool full, freeing write buffer");
        }
        self.finish_one();
    }

    fn finish_one(&self) {
        if self.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.drain_lock.lock();
            self.drained.notify_all();
        }
    }

    fn join(&self) {
        let mut guard = self.drain_lock.lock();
        while self.in_flight.load(Ordering::Acquire) > 0 {
            self.drained.wait(&mut guard);
        }
    }
}

pub struct AsyncWaveWriter {
    target: Arc<dyn AsyncWriteTarget>,
    header: WaveHeader,
    kind: SampleKind,
    completions: Arc<Completions>,
    next_offset: u64,
    /// `Some(succeeded)` once closed.
    closed: Option<bool>,
}

impl AsyncWaveWriter {
    /// Reserve the header on `target` and prepare for writes.
    #[instrument(skip(target, settings))]
    pub fn create(
        target: Arc<dyn AsyncWriteTarget>,
        channels: u16,
        sample_rate: u32,
        settings: &WriteBackSettings,
    ) -> Result<Self> {
        if channels == 0 {
            return Err(WriteBackError::InvalidChannels(channels));
        }

        let kind = match settings.sample_format {
            WriteSampleFormat::Int16 => SampleKind::Pcm16,
            WriteSampleFormat::Float32 => SampleKind::Float32,
        };
        let header = WaveHeader::new(channels, sample_rate, kind);
        target.write_header(0, &header.placeholder_bytes())?;

        debug!(header_size = header.header_size(), ?kind, "Write-back file created");
        Ok(Self {
            next_offset: header.header_size() as u64,
            target,
            header,
            kind,
            completions: Arc::new(Completions {
                pool: BufferPool::new(settings.pool_capacity),
                data_size: AtomicU64::new(0),
                failed: AtomicBool::new(false),
                in_flight: AtomicUsize::new(0),
                drain_lock: Mutex::new(()),
                drained: Condvar::new(),
            }),
            closed: None,
        })
    }

    /// Queue `frames` interleaved frames from `samples` and return at once.
    pub fn write(&mut self, samples: &[f32], frames: u16) -> Result<()> {
        if self.closed.is_some() {
            return Err(WriteBackError::Closed);
        }
        if self.completions.failed.load(Ordering::Acquire) {
            return Err(WriteBackError::Io);
        }

        let channels = usize::from(self.header.format().channels);
        let count = usize::from(frames) * channels;
        if samples.len() < count {
            return Err(WriteBackError::ShortInput {
                expected: count,
                actual: samples.len(),
            });
        }
        if count == 0 {
            return Ok(());
        }

        let len = count * self.kind.bytes_per_sample();
        let mut buffer = self.completions.pool.checkout(len);
        buffer.resize(len, 0);
        SampleConverter::encode(self.kind, &samples[..count], &mut buffer);

        let offset = self.next_offset;
        self.next_offset += len as u64;
        self.completions.in_flight.fetch_add(1, Ordering::AcqRel);

        let completions = Arc::clone(&self.completions);
        let submitted = self.target.submit(
            buffer,
            offset,
            Box::new(move |buffer, result| completions.complete(buffer, len, result)),
        );

        if let Err(err) = submitted {
            warn!(error = %err, offset, "Write submission refused");
            self.completions.failed.store(true, Ordering::Release);
            self.completions.finish_one();
            return Err(err.into());
        }

        trace!(offset, len, "Write submitted");
        Ok(())
    }

    /// Wait for outstanding writes, finalize the header and release the target.
    ///
    /// Fails with [`WriteBackError::Io`] if any write failed. Later calls
    /// return the same outcome without touching the target.
    pub fn close(&mut self) -> Result<()> {
        if let Some(succeeded) = self.closed {
            return if succeeded { Ok(()) } else { Err(WriteBackError::Io) };
        }

        self.completions.join();

        let total = self.completions.data_size.load(Ordering::Acquire);
        let limit = self.header.max_data_size();
        let total = match u32::try_from(total) {
            Ok(total) if total <= limit => total,
            _ => {
                warn!(total, limit, "Data exceeds the WAVE size limit, truncating header");
                limit
            }
        };
        let header_bytes = self.header.finalize(total);

        let finished = self
            .target
            .write_header(0, &header_bytes)
            .and_then(|()| self.target.close());
        let failed = self.completions.failed.load(Ordering::Acquire);
        self.closed = Some(finished.is_ok() && !failed);

        debug!(
            frames = self.header.sample_position(),
            failed,
            "Write-back file closed"
        );
        finished?;
        if failed {
            return Err(WriteBackError::Io);
        }
        Ok(())
    }

    /// Frames whose writes have completed.
    pub fn frames_written(&self) -> u64 {
        let block_align = u64::from(self.header.format().block_align);
        if block_align == 0 {
            return 0;
        }
        self.completions.data_size.load(Ordering::Acquire) / block_align
    }

    pub fn time_position_ms(&self) -> u64 {
        let rate = u64::from(self.header.format().sample_rate);
        if rate == 0 {
            return 0;
        }
        self.frames_written() * 1000 / rate
    }

    /// Writes submitted but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.completions.in_flight.load(Ordering::Acquire)
    }

    pub fn header(&self) -> &WaveHeader {
        &self.header
    }

    pub fn header_size(&self) -> usize {
        self.header.header_size()
    }

    pub fn pooled_buffers(&self) -> usize {
        self.completions.pool.len()
    }
}

impl Drop for AsyncWaveWriter {
    fn drop(&mut self) {
        if self.closed.is_none() {
            if let Err(err) = self.close() {
                warn!(error = %err, "Failed to close write-back file on drop");
            }
        }
    }
}
