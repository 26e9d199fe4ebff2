#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use bridge_traits::{
    BridgeError, DecoderPipeline, MediaFormat, OutputPin, PipelineFactory, ReceiveStatus,
    SampleSink,
};
use crossbeam::channel::{self, Receiver, Sender};
use mockall::mock;
use parking_lot::Mutex;

mock! {
    pub Factory {}

    impl PipelineFactory for Factory {
        fn open(&self, path: &Path) -> bridge_traits::Result<Box<dyn DecoderPipeline>>;
        fn supported_extensions(&self) -> Vec<&'static str>;
    }
}

mock! {
    pub Pipeline {}

    impl DecoderPipeline for Pipeline {
        fn output_pins(&mut self) -> bridge_traits::Result<Vec<OutputPin>>;
        fn connect(
            &mut self,
            pin: usize,
            format: MediaFormat,
            sink: Arc<dyn SampleSink>,
        ) -> bridge_traits::Result<()>;
        fn disconnect(&mut self);
        fn run(&mut self) -> bridge_traits::Result<()>;
        fn pause(&mut self) -> bridge_traits::Result<()>;
        fn stop(&mut self) -> bridge_traits::Result<()>;
        fn duration_frames(&self) -> Option<u64>;
        fn seek(&mut self, frame: u64) -> bridge_traits::Result<()>;
    }
}

pub fn pcm16(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

pub fn float32(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

pub fn to_f32(sample: i16) -> f32 {
    f32::from(sample) / 32768.0
}

/// Pushes a fixed list of buffers from its own thread, then signals the end.
///
/// A buffer the sink did not fully take is pushed again on the next `run`.
pub struct ScriptedPipeline {
    format: MediaFormat,
    buffers: Arc<Vec<Vec<u8>>>,
    next: Arc<AtomicUsize>,
    sink: Option<Arc<dyn SampleSink>>,
    worker: Option<JoinHandle<()>>,
}

impl ScriptedPipeline {
    pub fn new(format: MediaFormat, buffers: Vec<Vec<u8>>) -> Self {
        Self {
            format,
            buffers: Arc::new(buffers),
            next: Arc::new(AtomicUsize::new(0)),
            sink: None,
            worker: None,
        }
    }

    fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.join().unwrap();
        }
    }

    fn frames_in(&self, buffer: &[u8]) -> u64 {
        (buffer.len() / usize::from(self.format.block_align)) as u64
    }
}

impl DecoderPipeline for ScriptedPipeline {
    fn output_pins(&mut self) -> bridge_traits::Result<Vec<OutputPin>> {
        Ok(vec![OutputPin {
            id: 0,
            formats: vec![self.format],
        }])
    }

    fn connect(
        &mut self,
        _pin: usize,
        _format: MediaFormat,
        sink: Arc<dyn SampleSink>,
    ) -> bridge_traits::Result<()> {
        self.sink = Some(sink);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.join();
        self.sink = None;
    }

    fn run(&mut self) -> bridge_traits::Result<()> {
        self.join();
        let sink = self
            .sink
            .clone()
            .ok_or_else(|| BridgeError::NotAvailable("not connected".into()))?;
        let buffers = Arc::clone(&self.buffers);
        let next = Arc::clone(&self.next);

        self.worker = Some(std::thread::spawn(move || loop {
            let index = next.load(Ordering::SeqCst);
            let Some(buffer) = buffers.get(index) else {
                sink.end_of_stream();
                return;
            };
            match sink.receive(buffer) {
                Ok(ReceiveStatus::Consumed) => next.store(index + 1, Ordering::SeqCst),
                Ok(ReceiveStatus::NotFullyConsumed) | Err(_) => return,
            }
        }));
        Ok(())
    }

    fn pause(&mut self) -> bridge_traits::Result<()> {
        self.join();
        Ok(())
    }

    fn stop(&mut self) -> bridge_traits::Result<()> {
        self.join();
        Ok(())
    }

    fn duration_frames(&self) -> Option<u64> {
        Some(self.buffers.iter().map(|b| self.frames_in(b)).sum())
    }

    fn seek(&mut self, frame: u64) -> bridge_traits::Result<()> {
        let mut end = 0;
        let mut index = 0;
        for buffer in self.buffers.iter() {
            end += self.frames_in(buffer);
            if end > frame {
                break;
            }
            index += 1;
        }
        self.next.store(index, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands the connected sink to the test and reports every `run`.
pub struct ManualPipeline {
    format: MediaFormat,
    sink_slot: Arc<Mutex<Option<Arc<dyn SampleSink>>>>,
    runs: Sender<()>,
}

pub struct ManualHandle {
    pub sink_slot: Arc<Mutex<Option<Arc<dyn SampleSink>>>>,
    pub runs: Receiver<()>,
}

impl ManualHandle {
    pub fn sink(&self) -> Arc<dyn SampleSink> {
        self.sink_slot.lock().clone().unwrap()
    }
}

impl ManualPipeline {
    pub fn new(format: MediaFormat) -> (Self, ManualHandle) {
        let sink_slot = Arc::new(Mutex::new(None));
        let (runs, runs_rx) = channel::unbounded();
        (
            Self {
                format,
                sink_slot: Arc::clone(&sink_slot),
                runs,
            },
            ManualHandle {
                sink_slot,
                runs: runs_rx,
            },
        )
    }
}

impl DecoderPipeline for ManualPipeline {
    fn output_pins(&mut self) -> bridge_traits::Result<Vec<OutputPin>> {
        Ok(vec![OutputPin {
            id: 7,
            formats: vec![self.format],
        }])
    }

    fn connect(
        &mut self,
        _pin: usize,
        _format: MediaFormat,
        sink: Arc<dyn SampleSink>,
    ) -> bridge_traits::Result<()> {
        *self.sink_slot.lock() = Some(sink);
        Ok(())
    }

    fn disconnect(&mut self) {}

    fn run(&mut self) -> bridge_traits::Result<()> {
        self.runs.send(()).ok();
        Ok(())
    }

    fn pause(&mut self) -> bridge_traits::Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> bridge_traits::Result<()> {
        Ok(())
    }

    fn duration_frames(&self) -> Option<u64> {
        None
    }

    fn seek(&mut self, _frame: u64) -> bridge_traits::Result<()> {
        Ok(())
    }
}

/// A factory that builds a fresh [`ScriptedPipeline`] for every open.
pub fn scripted_factory(format: MediaFormat, buffers: Vec<Vec<u8>>) -> Arc<MockFactory> {
    let mut factory = MockFactory::new();
    factory
        .expect_open()
        .returning(move |_| {
            Ok(Box::new(ScriptedPipeline::new(format, buffers.clone())) as Box<dyn DecoderPipeline>)
        });
    factory
        .expect_supported_extensions()
        .returning(|| vec!["wav", "flac"]);
    Arc::new(factory)
}

/// A factory that hands out one [`ManualPipeline`].
pub fn manual_factory(format: MediaFormat) -> (Arc<MockFactory>, ManualHandle) {
    let (pipeline, handle) = ManualPipeline::new(format);
    let pipeline = Mutex::new(Some(pipeline));
    let mut factory = MockFactory::new();
    factory.expect_open().times(1).returning(move |_| {
        let pipeline = pipeline.lock().take().unwrap();
        Ok(Box::new(pipeline) as Box<dyn DecoderPipeline>)
    });
    (Arc::new(factory), handle)
}
