//! # Streaming Decoder Adapter
//!
//! Turns a push-driven [`DecoderPipeline`] into a blocking pull API.
//!
//! ## Hand-off
//!
//! One mutex guards the output cursor, the carry-over count and the state
//! machine. Two condition variables sit on it:
//!
//! - `not_full`: the pipeline thread waits here while no read is in progress
//!   or the current read is already satisfied.
//! - `not_empty`: the reader waits here until its request is full or the
//!   stream leaves Running.
//!
//! A single pushed buffer may be spread over several reads. While it is,
//! `receive` stays blocked inside the pipeline thread and `bytes_to_skip`
//! records how much of it has been converted. If the stream stops part way
//! through, `receive` reports [`ReceiveStatus::NotFullyConsumed`], the
//! pipeline re-delivers the same buffer later, and conversion resumes after
//! the skipped bytes.
//!
//! ## Locking
//!
//! The hand-off lock is never held while taking the session lock (pipeline
//! and negotiator). A pipeline that joins its push thread inside `stop()`
//! therefore cannot deadlock against a blocked `receive`.

use std::path::Path;
use std::sync::Arc;

use bridge_traits::{
    BridgeError, DecoderPipeline, MediaFormat, PipelineFactory, ReceiveStatus, SampleSink,
};
use core_wave::SampleKind;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, instrument, trace, warn};

use crate::cursor::OutputCursor;
use crate::error::{OpenError, Result};
use crate::negotiator::{AcceptedFormat, DecodedFormat, SampleFormatNegotiator};
use crate::state::{PlaybackStateMachine, RunOutcome, StreamEvent, StreamState};

/// Everything guarded by the hand-off lock.
#[derive(Debug, Default)]
struct HandOff {
    machine: PlaybackStateMachine,
    cursor: OutputCursor,
    kind: Option<SampleKind>,
    channels: usize,
    /// Bytes at the front of the buffer being pushed that were already converted.
    bytes_to_skip: usize,
    /// Frame the pipeline was last positioned at.
    base_frame: u64,
    /// Samples handed to readers since `base_frame`.
    samples_delivered: u64,
}

impl HandOff {
    fn position(&self) -> u64 {
        if self.channels == 0 {
            return self.base_frame;
        }
        self.base_frame + self.samples_delivered / self.channels as u64
    }

    /// Convert as much of `buffer` as fits. Returns `true` once every whole
    /// sample past `bytes_to_skip` has been taken.
    fn copy_and_convert(&mut self, kind: SampleKind, buffer: &[u8]) -> bool {
        let width = kind.bytes_per_sample();
        let start = self.bytes_to_skip.min(buffer.len());
        let available = buffer.len() - start;
        let usable = available - available % width;
        let take = usable.min(self.cursor.room() * width);

        let written = self.cursor.fill_from(kind, &buffer[start..start + take]);
        self.bytes_to_skip += written * width;
        self.samples_delivered += written as u64;

        if take == usable && usable != available {
            trace!(bytes = available - usable, "Dropping partial trailing sample");
        }
        take == usable
    }
}

/// State shared with the pipeline thread. This is the sink handed to
/// [`DecoderPipeline::connect`].
struct Shared {
    hand_off: Mutex<HandOff>,
    not_empty: Condvar,
    not_full: Condvar,
    subscribers: Mutex<Vec<Sender<StreamEvent>>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            hand_off: Mutex::new(HandOff::default()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn wake_all(&self) {
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    fn publish(&self, event: StreamEvent) {
        debug!(?event, "Publishing stream event");
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(event).is_ok());
    }

    fn subscribe(&self) -> Receiver<StreamEvent> {
        let (sender, receiver) = channel::unbounded();
        self.subscribers.lock().push(sender);
        receiver
    }

    /// Ask the state machine to run, publishing a deferred completion.
    fn start(&self, hand_off: &mut HandOff) -> RunOutcome {
        let outcome = hand_off.machine.run();
        if outcome == RunOutcome::Completed {
            self.publish(StreamEvent::Complete);
        }
        outcome
    }
}

impl SampleSink for Shared {
    fn receive(&self, buffer: &[u8]) -> bridge_traits::Result<ReceiveStatus> {
        let mut hand_off = self.hand_off.lock();

        if !hand_off.machine.accepts_data() {
            let reason = if hand_off.machine.is_flushing() {
                "receive while flushing"
            } else {
                "receive after end of stream"
            };
            return Err(BridgeError::ProtocolViolation(reason.into()));
        }
        let Some(kind) = hand_off.kind else {
            return Err(BridgeError::ProtocolViolation("receive on a closed stream".into()));
        };
        if !hand_off.machine.is_running() {
            trace!(state = ?hand_off.machine.state(), "Push outside Running");
        }

        loop {
            while hand_off.cursor.room() == 0 && hand_off.machine.is_running() {
                self.not_full.wait(&mut hand_off);
            }
            if hand_off.machine.is_flushing() {
                return Ok(ReceiveStatus::NotFullyConsumed);
            }

            let consumed = hand_off.copy_and_convert(kind, buffer);
            self.not_empty.notify_one();

            if consumed {
                hand_off.bytes_to_skip = 0;
                return Ok(ReceiveStatus::Consumed);
            }
            if !hand_off.machine.is_running() {
                trace!(
                    bytes_to_skip = hand_off.bytes_to_skip,
                    "Stream left Running mid-buffer"
                );
                return Ok(ReceiveStatus::NotFullyConsumed);
            }
        }
    }

    fn end_of_stream(&self) {
        let mut hand_off = self.hand_off.lock();
        if let Some(event) = hand_off.machine.end_of_stream() {
            self.publish(event);
        } else {
            debug!("End of stream deferred until next run");
        }
        self.wake_all();
    }

    fn begin_flush(&self) {
        let mut hand_off = self.hand_off.lock();
        hand_off.machine.begin_flush();
        hand_off.bytes_to_skip = 0;
        self.wake_all();
    }

    fn end_flush(&self) {
        self.hand_off.lock().machine.end_flush();
    }
}

/// A connected pipeline. Disconnects when dropped.
struct Connection {
    pipeline: Box<dyn DecoderPipeline>,
    pin: usize,
    media_format: MediaFormat,
    accepted: AcceptedFormat,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.pipeline.disconnect();
    }
}

#[derive(Default)]
struct Session {
    negotiator: SampleFormatNegotiator,
    connection: Option<Connection>,
}

/// Blocking reader over a push-driven decoder pipeline.
pub struct StreamingDecoderAdapter {
    factory: Arc<dyn PipelineFactory>,
    shared: Arc<Shared>,
    session: Mutex<Session>,
    /// Serializes readers; the cursor belongs to one read at a time.
    reader: Mutex<()>,
}

impl StreamingDecoderAdapter {
    pub fn new(factory: Arc<dyn PipelineFactory>) -> Self {
        Self {
            factory,
            shared: Arc::new(Shared::new()),
            session: Mutex::new(Session::default()),
            reader: Mutex::new(()),
        }
    }

    /// Open `path`, replacing any previous stream.
    ///
    /// Connects the first pin format the negotiator accepts. A failed open
    /// leaves the adapter stopped with nothing connected.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn open(&self, path: &Path) -> Result<()> {
        self.close();

        let mut pipeline = self.factory.open(path)?;
        let pins = pipeline.output_pins()?;

        let mut session = self.session.lock();
        session.negotiator.reset();

        for pin in pins {
            for media_format in pin.formats {
                let accepted = match session.negotiator.propose_format(&media_format) {
                    Ok(accepted) => accepted,
                    Err(reason) => {
                        debug!(pin = pin.id, %reason, "Rejected pin format");
                        continue;
                    }
                };

                let sink: Arc<dyn SampleSink> = self.shared.clone();
                pipeline.connect(pin.id, media_format, sink)?;

                {
                    let mut hand_off = self.shared.hand_off.lock();
                    *hand_off = HandOff {
                        kind: Some(accepted.kind),
                        channels: accepted.channels(),
                        ..HandOff::default()
                    };
                }

                info!(
                    pin = pin.id,
                    channels = accepted.format.channels,
                    sample_rate = accepted.format.sample_rate,
                    bits = accepted.format.bits_per_sample,
                    "Stream opened"
                );
                session.connection = Some(Connection {
                    pipeline,
                    pin: pin.id,
                    media_format,
                    accepted,
                });
                return Ok(());
            }
        }

        session.negotiator.reset();
        warn!("No pin offered a usable format");
        Err(OpenError::NoCompatibleDecoder)
    }

    /// Fill `output` with whole interleaved frames, blocking until the
    /// request is satisfied or the stream stops.
    ///
    /// Returns the number of frames written. Fewer than requested means the
    /// end of the stream was reached (or the stream was stopped or closed).
    pub fn read(&self, output: &mut [f32]) -> usize {
        let _reader = self.reader.lock();
        let mut hand_off = self.shared.hand_off.lock();

        let channels = hand_off.channels;
        if channels == 0 {
            return 0;
        }
        let wanted = output.len() / channels * channels;
        if wanted == 0 {
            return 0;
        }
        hand_off.cursor.install(wanted);

        if !hand_off.machine.is_running() {
            if self.shared.start(&mut hand_off) == RunOutcome::Completed {
                hand_off.cursor.reset();
                return 0;
            }
            drop(hand_off);
            let started = self.with_pipeline(|pipeline| pipeline.run());
            hand_off = self.shared.hand_off.lock();

            if let Err(err) = started {
                warn!(error = %err, "Failed to start decoder pipeline");
                // A push may have landed while the lock was released.
                hand_off.machine.stop();
                self.shared.wake_all();
                let samples = hand_off.cursor.drain_into(&mut output[..wanted]);
                return samples / channels;
            }
        }

        self.shared.not_full.notify_one();
        while !hand_off.cursor.is_full() && hand_off.machine.is_running() {
            self.shared.not_empty.wait(&mut hand_off);
        }

        let samples = hand_off.cursor.drain_into(&mut output[..wanted]);
        trace!(frames = samples / channels, "Read complete");
        samples / channels
    }

    /// Fill all of `output`, restarting from the beginning whenever the
    /// stream ends.
    ///
    /// Returns `false` only when the stream yields nothing right after a
    /// restart.
    pub fn read_looped(&self, output: &mut [f32]) -> bool {
        let channels = self.channels();
        if channels == 0 {
            return false;
        }
        let wanted = output.len() / channels * channels;
        let mut filled = 0;
        let mut just_restarted = false;

        while filled < wanted {
            let frames = self.read(&mut output[filled..wanted]);
            filled += frames * channels;
            if filled < wanted {
                if frames == 0 && just_restarted {
                    return false;
                }
                if let Err(err) = self.restart() {
                    warn!(error = %err, "Failed to loop stream");
                    return false;
                }
                just_restarted = true;
            } else {
                just_restarted = false;
            }
        }
        true
    }

    /// Read what is available and zero the rest of `output`.
    ///
    /// Returns `false` when nothing could be read.
    pub fn read_silence_padded(&self, output: &mut [f32]) -> bool {
        let frames = self.read(output);
        if frames == 0 {
            return false;
        }
        output[frames * self.channels()..].fill(0.0);
        true
    }

    /// Start the pipeline, or deliver a completion that arrived while paused.
    pub fn run(&self) -> bridge_traits::Result<()> {
        {
            let mut hand_off = self.shared.hand_off.lock();
            if self.shared.start(&mut hand_off) == RunOutcome::Completed {
                return Ok(());
            }
            self.shared.not_full.notify_all();
        }
        self.with_pipeline(|pipeline| pipeline.run())
    }

    pub fn pause(&self) -> bridge_traits::Result<()> {
        {
            let mut hand_off = self.shared.hand_off.lock();
            hand_off.machine.pause();
            self.shared.wake_all();
        }
        self.with_pipeline(|pipeline| pipeline.pause())
    }

    pub fn stop(&self) -> bridge_traits::Result<()> {
        {
            let mut hand_off = self.shared.hand_off.lock();
            hand_off.machine.stop();
            self.shared.wake_all();
        }
        self.with_pipeline(|pipeline| pipeline.stop())
    }

    /// Stop, disconnect and forget the stream. Safe to call repeatedly.
    pub fn close(&self) {
        {
            let mut hand_off = self.shared.hand_off.lock();
            hand_off.machine.stop();
            self.shared.wake_all();
        }

        let connection = {
            let mut session = self.session.lock();
            session.negotiator.reset();
            session.connection.take()
        };

        if let Some(mut connection) = connection {
            if let Err(err) = connection.pipeline.stop() {
                warn!(error = %err, "Pipeline failed to stop cleanly");
            }
            debug!(pin = connection.pin, "Stream closed");
            drop(connection);

            let mut hand_off = self.shared.hand_off.lock();
            hand_off.machine.reset();
            hand_off.kind = None;
            hand_off.channels = 0;
            hand_off.bytes_to_skip = 0;
            hand_off.base_frame = 0;
            hand_off.samples_delivered = 0;
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.lock().connection.is_some()
    }

    /// Channel count of the open stream, 0 when closed.
    pub fn channels(&self) -> usize {
        self.shared.hand_off.lock().channels
    }

    /// Sample rate of the open stream, 0 when closed.
    pub fn sample_rate(&self) -> u32 {
        self.format().map_or(0, |format| format.sample_rate)
    }

    pub fn format(&self) -> Option<DecodedFormat> {
        self.session
            .lock()
            .connection
            .as_ref()
            .map(|connection| connection.accepted.format)
    }

    /// The pin format the pipeline committed to.
    pub fn media_format(&self) -> Option<MediaFormat> {
        self.session
            .lock()
            .connection
            .as_ref()
            .map(|connection| connection.media_format)
    }

    pub fn length_frames(&self) -> Option<u64> {
        self.session
            .lock()
            .connection
            .as_ref()
            .and_then(|connection| connection.pipeline.duration_frames())
    }

    /// Frames not yet handed to a reader. Samples already taken from a
    /// partially consumed buffer count as read.
    pub fn remaining_frames(&self) -> Option<u64> {
        let length = self.length_frames()?;
        Some(length.saturating_sub(self.sample_position()))
    }

    pub fn sample_position(&self) -> u64 {
        self.shared.hand_off.lock().position()
    }

    /// Stop the stream and reposition the pipeline at `frame`, clamped to the
    /// length when it is known. The next `read` resumes from there.
    pub fn set_sample_position(&self, frame: u64) -> bridge_traits::Result<()> {
        {
            let mut hand_off = self.shared.hand_off.lock();
            hand_off.machine.stop();
            self.shared.wake_all();
        }

        let frame = {
            let mut session = self.session.lock();
            let connection = session
                .connection
                .as_mut()
                .ok_or_else(|| BridgeError::NotAvailable("no open stream".into()))?;
            let pipeline = &mut connection.pipeline;

            pipeline.stop()?;
            let frame = match pipeline.duration_frames() {
                Some(length) => frame.min(length),
                None => frame,
            };

            self.shared.begin_flush();
            let seeked = pipeline.seek(frame);
            self.shared.end_flush();
            seeked?;
            frame
        };

        let mut hand_off = self.shared.hand_off.lock();
        hand_off.base_frame = frame;
        hand_off.samples_delivered = 0;
        debug!(frame, "Stream repositioned");
        Ok(())
    }

    pub fn time_position_ms(&self) -> u64 {
        let rate = u64::from(self.sample_rate());
        if rate == 0 {
            return 0;
        }
        self.sample_position() * 1000 / rate
    }

    pub fn set_time_position_ms(&self, ms: u64) -> bridge_traits::Result<()> {
        self.set_sample_position(ms * u64::from(self.sample_rate()) / 1000)
    }

    pub fn restart(&self) -> bridge_traits::Result<()> {
        self.set_sample_position(0)
    }

    /// Receive completion events. Every subscriber gets every event.
    pub fn subscribe(&self) -> Receiver<StreamEvent> {
        self.shared.subscribe()
    }

    pub fn supported_extensions(&self) -> Vec<&'static str> {
        self.factory.supported_extensions()
    }

    pub fn bytes_to_skip(&self) -> usize {
        self.shared.hand_off.lock().bytes_to_skip
    }

    pub fn state(&self) -> StreamState {
        self.shared.hand_off.lock().machine.state()
    }

    fn with_pipeline<T>(
        &self,
        f: impl FnOnce(&mut dyn DecoderPipeline) -> bridge_traits::Result<T>,
    ) -> bridge_traits::Result<T> {
        let mut session = self.session.lock();
        let connection = session
            .connection
            .as_mut()
            .ok_or_else(|| BridgeError::NotAvailable("no open stream".into()))?;
        f(connection.pipeline.as_mut())
    }
}

impl Drop for StreamingDecoderAdapter {
    fn drop(&mut self) {
        self.close();
    }
}
