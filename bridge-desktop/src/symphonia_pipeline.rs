//! Decoder pipeline backed by Symphonia.
//!
//! The format reader and codec decoder move onto a dedicated push thread at
//! `connect`. The pipeline handle drives that thread with commands; the
//! thread decodes packets, slices them into buffers of `push_chunk_frames`
//! frames and pushes them into the sink.
//!
//! A buffer the sink reports as not fully consumed stays at the head of the
//! queue and is delivered again on the next `run`.

use std::collections::VecDeque;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bridge_traits::{
    BridgeError, DecoderPipeline, MediaFormat, OutputPin, PipelineFactory, ReceiveStatus, Result,
    SampleEncoding, SampleSink,
};
use bytes::{BufMut, Bytes, BytesMut};
use core_runtime::config::StreamingSettings;
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::IntoSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, error, info, instrument, warn};

const MAX_CONSECUTIVE_ERRORS: usize = 10;

const EXTENSIONS: &[&str] = &[
    "wav", "wave", "aif", "aiff", "flac", "mp3", "ogg", "oga", "m4a", "mp4", "aac", "caf", "mkv",
    "webm",
];

/// Builds [`SymphoniaPipeline`]s for local files.
pub struct SymphoniaPipelineFactory {
    push_chunk_frames: usize,
}

impl SymphoniaPipelineFactory {
    pub fn new(settings: &StreamingSettings) -> Self {
        Self {
            push_chunk_frames: settings.push_chunk_frames.max(1),
        }
    }
}

impl Default for SymphoniaPipelineFactory {
    fn default() -> Self {
        Self::new(&StreamingSettings::default())
    }
}

impl PipelineFactory for SymphoniaPipelineFactory {
    fn open(&self, path: &Path) -> Result<Box<dyn DecoderPipeline>> {
        Ok(Box::new(SymphoniaPipeline::open(path, self.push_chunk_frames)?))
    }

    fn supported_extensions(&self) -> Vec<&'static str> {
        EXTENSIONS.to_vec()
    }
}

/// Reader and decoder for the selected track.
struct DecodeSource {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: usize,
    length: Option<u64>,
    /// Decoded ahead of time while probing the channel layout.
    primed: Vec<f32>,
    /// Frames to drop after an accurate seek landed early.
    skip_frames: u64,
    eof: bool,
}

impl DecodeSource {
    /// Next packet of interleaved samples, or `None` at the end.
    fn next_samples(&mut self) -> Result<Option<Vec<f32>>> {
        if !self.primed.is_empty() {
            return Ok(Some(std::mem::take(&mut self.primed)));
        }
        if self.eof {
            return Ok(None);
        }

        let mut consecutive_errors = 0;
        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("Reached end of stream");
                    self.eof = true;
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    warn!("Track list changed, ending stream");
                    self.eof = true;
                    return Ok(None);
                }
                Err(e) => {
                    return Err(BridgeError::Decoder(format!("Failed to read packet: {}", e)));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let channels = decoded.spec().channels.count();
                    if channels != self.channels {
                        debug!(from = self.channels, to = channels, "Channel count changed");
                        self.channels = channels;
                    }

                    let mut buffer =
                        SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
                    buffer.copy_interleaved_ref(decoded);
                    let mut samples = buffer.samples().to_vec();

                    if self.skip_frames > 0 && self.channels > 0 {
                        let frames = (samples.len() / self.channels) as u64;
                        let dropped = self.skip_frames.min(frames);
                        samples.drain(..dropped as usize * self.channels);
                        self.skip_frames -= dropped;
                    }
                    if samples.is_empty() {
                        continue;
                    }
                    return Ok(Some(samples));
                }
                Err(SymphoniaError::DecodeError(err)) => {
                    consecutive_errors += 1;
                    warn!(
                        "Skipping packet with decode error (attempt {}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, err
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(BridgeError::Decoder(format!(
                            "Decoder failure after {} failed packets: {}",
                            MAX_CONSECUTIVE_ERRORS, err
                        )));
                    }
                }
                Err(SymphoniaError::IoError(err)) => {
                    consecutive_errors += 1;
                    warn!(
                        "Skipping corrupted packet (attempt {}/{}): {}",
                        consecutive_errors, MAX_CONSECUTIVE_ERRORS, err
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(BridgeError::Decoder(format!(
                            "Stream corruption after {} failed packets",
                            MAX_CONSECUTIVE_ERRORS
                        )));
                    }
                }
                Err(e) => {
                    return Err(BridgeError::Decoder(format!("Failed to decode packet: {}", e)));
                }
            }
        }
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        self.primed.clear();
        self.skip_frames = 0;

        if self.length.is_some_and(|length| frame >= length) {
            self.eof = true;
            return Ok(());
        }

        // Track timestamps count frames for the containers this is used with.
        let seeked = self
            .reader
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: frame,
                    track_id: self.track_id,
                },
            )
            .map_err(|e| BridgeError::OperationFailed(format!("Seek failed: {}", e)))?;

        self.decoder.reset();
        self.skip_frames = seeked.required_ts.saturating_sub(seeked.actual_ts);
        self.eof = false;
        debug!(frame, skip = self.skip_frames, "Seek completed");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PushEncoding {
    Float32,
    Pcm16,
}

impl PushEncoding {
    fn for_format(format: &MediaFormat) -> Option<Self> {
        match (format.encoding, format.bits_per_sample) {
            (SampleEncoding::IeeeFloat, 32) => Some(PushEncoding::Float32),
            (SampleEncoding::Pcm, 16) => Some(PushEncoding::Pcm16),
            _ => None,
        }
    }

    fn bytes_per_sample(self) -> usize {
        match self {
            PushEncoding::Float32 => 4,
            PushEncoding::Pcm16 => 2,
        }
    }

    fn encode(self, samples: &[f32]) -> Bytes {
        let mut out = BytesMut::with_capacity(samples.len() * self.bytes_per_sample());
        match self {
            PushEncoding::Float32 => samples.iter().for_each(|&s| out.put_f32_le(s)),
            PushEncoding::Pcm16 => samples
                .iter()
                .for_each(|&s| out.put_i16_le(IntoSample::<i16>::into_sample(s))),
        }
        out.freeze()
    }
}

enum Command {
    Run,
    Halt,
    Seek { frame: u64, reply: Sender<Result<()>> },
    Shutdown,
}

struct Worker {
    commands: Sender<Command>,
    handle: JoinHandle<()>,
}

/// One opened file.
pub struct SymphoniaPipeline {
    source: Option<DecodeSource>,
    channels: u16,
    sample_rate: u32,
    length: Option<u64>,
    push_chunk_frames: usize,
    worker: Option<Worker>,
}

impl SymphoniaPipeline {
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path, push_chunk_frames: usize) -> Result<Self> {
        let file = File::open(path)?;
        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(extension);
        }
        let stream = MediaSourceStream::new(Box::new(file), Default::default());

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                error!("Format detection failed: {}", e);
                BridgeError::Decoder(format!("Failed to detect format: {}", e))
            })?;
        let reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| BridgeError::Decoder("No supported audio tracks".to_string()))?;
        let params = track.codec_params.clone();
        let track_id = track.id;

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| BridgeError::Decoder("Missing sample rate".to_string()))?;
        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| BridgeError::Decoder(format!("Failed to create codec decoder: {}", e)))?;

        let mut source = DecodeSource {
            reader,
            decoder,
            track_id,
            channels: params.channels.map_or(0, |c| c.count()),
            length: params.n_frames,
            primed: Vec::new(),
            skip_frames: 0,
            eof: false,
        };

        // Some containers only reveal the layout once a packet is decoded.
        if source.channels == 0 {
            source.primed = source.next_samples()?.unwrap_or_default();
        }
        let channels = u16::try_from(source.channels)
            .ok()
            .filter(|&c| c > 0)
            .ok_or_else(|| BridgeError::Decoder("Unknown channel layout".to_string()))?;

        info!(channels, sample_rate, length = ?params.n_frames, "Decoder pipeline opened");
        Ok(Self {
            channels,
            sample_rate,
            length: params.n_frames,
            source: Some(source),
            push_chunk_frames,
            worker: None,
        })
    }

    fn send(&self, command: Command) -> Result<()> {
        let worker = self
            .worker
            .as_ref()
            .ok_or_else(|| BridgeError::NotAvailable("pipeline is not connected".into()))?;
        worker
            .commands
            .send(command)
            .map_err(|_| BridgeError::OperationFailed("push thread has exited".into()))
    }
}

impl DecoderPipeline for SymphoniaPipeline {
    fn output_pins(&mut self) -> Result<Vec<OutputPin>> {
        Ok(vec![OutputPin {
            id: 0,
            formats: vec![
                MediaFormat::float(self.channels, self.sample_rate),
                MediaFormat::pcm(self.channels, self.sample_rate, 16),
            ],
        }])
    }

    fn connect(&mut self, pin: usize, format: MediaFormat, sink: Arc<dyn SampleSink>) -> Result<()> {
        if pin != 0 {
            return Err(BridgeError::OperationFailed(format!("no output pin {}", pin)));
        }
        let encoding = PushEncoding::for_format(&format).ok_or_else(|| {
            BridgeError::OperationFailed(format!("pin cannot produce {:?}", format))
        })?;
        let source = self
            .source
            .take()
            .ok_or_else(|| BridgeError::NotAvailable("pipeline already connected".into()))?;

        let (commands, receiver) = channel::unbounded();
        let chunk_frames = self.push_chunk_frames;
        let handle = thread::Builder::new()
            .name("symphonia-push".into())
            .spawn(move || push_loop(source, sink, encoding, chunk_frames, receiver))?;

        debug!(?encoding, chunk_frames, "Pipeline connected");
        self.worker = Some(Worker { commands, handle });
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.commands.send(Command::Shutdown).ok();
            if worker.handle.join().is_err() {
                warn!("Push thread panicked");
            }
        }
    }

    fn run(&mut self) -> Result<()> {
        self.send(Command::Run)
    }

    fn pause(&mut self) -> Result<()> {
        self.send(Command::Halt)
    }

    fn stop(&mut self) -> Result<()> {
        self.send(Command::Halt)
    }

    fn duration_frames(&self) -> Option<u64> {
        self.length
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        let (reply, result) = channel::bounded(1);
        self.send(Command::Seek { frame, reply })?;
        result
            .recv()
            .map_err(|_| BridgeError::OperationFailed("push thread has exited".into()))?
    }
}

impl Drop for SymphoniaPipeline {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn push_loop(
    mut source: DecodeSource,
    sink: Arc<dyn SampleSink>,
    encoding: PushEncoding,
    chunk_frames: usize,
    commands: Receiver<Command>,
) {
    let mut queue: VecDeque<Bytes> = VecDeque::new();
    let mut running = false;

    loop {
        let command = if running {
            match commands.try_recv() {
                Ok(command) => Some(command),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => return,
            }
        } else {
            match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => return,
            }
        };

        if let Some(command) = command {
            match command {
                Command::Run => running = true,
                Command::Halt => running = false,
                Command::Seek { frame, reply } => {
                    queue.clear();
                    reply.send(source.seek(frame)).ok();
                }
                Command::Shutdown => return,
            }
            continue;
        }

        if queue.is_empty() {
            match source.next_samples() {
                Ok(Some(samples)) => {
                    let chunk = chunk_frames * source.channels.max(1);
                    queue.extend(samples.chunks(chunk).map(|part| encoding.encode(part)));
                }
                Ok(None) => {
                    sink.end_of_stream();
                    running = false;
                }
                Err(err) => {
                    error!(error = %err, "Decoding stopped");
                    sink.end_of_stream();
                    running = false;
                }
            }
            continue;
        }

        let Some(buffer) = queue.front() else {
            continue;
        };
        match sink.receive(buffer) {
            Ok(ReceiveStatus::Consumed) => {
                queue.pop_front();
            }
            Ok(ReceiveStatus::NotFullyConsumed) => running = false,
            Err(err) => {
                debug!(error = %err, "Sink refused buffer");
                queue.pop_front();
                running = false;
            }
        }
    }
}
