use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bridge_traits::{AsyncWriteTarget, BridgeError, WriteCompletion};
use bytes::BytesMut;
use core_runtime::config::WriteBackSettings;
use core_wave::{parse, SampleConverter, SampleKind};
use core_writeback::{AsyncWaveWriter, WriteBackError};
use mockall::mock;
use parking_lot::Mutex;

/// In-memory file whose writes complete on their own threads after a delay.
struct DelayedTarget {
    image: Arc<Mutex<Vec<u8>>>,
    delay: Duration,
    completed: Arc<AtomicUsize>,
    submitted: AtomicUsize,
    /// Submission index that completes with an error.
    fail_at: Option<usize>,
}

impl DelayedTarget {
    fn new(delay: Duration) -> Self {
        Self {
            image: Arc::new(Mutex::new(Vec::new())),
            delay,
            completed: Arc::new(AtomicUsize::new(0)),
            submitted: AtomicUsize::new(0),
            fail_at: None,
        }
    }

    fn put(image: &Mutex<Vec<u8>>, offset: u64, bytes: &[u8]) {
        let mut image = image.lock();
        let end = offset as usize + bytes.len();
        if image.len() < end {
            image.resize(end, 0);
        }
        image[offset as usize..end].copy_from_slice(bytes);
    }
}

impl AsyncWriteTarget for DelayedTarget {
    fn submit(
        &self,
        buffer: BytesMut,
        offset: u64,
        completion: WriteCompletion,
    ) -> bridge_traits::Result<()> {
        let index = self.submitted.fetch_add(1, Ordering::SeqCst);
        let fail = self.fail_at == Some(index);
        let image = Arc::clone(&self.image);
        let completed = Arc::clone(&self.completed);
        // Later submissions finish first.
        let delay = self.delay / (index as u32 + 1);

        thread::spawn(move || {
            thread::sleep(delay);
            let result = if fail {
                Err(io::Error::new(io::ErrorKind::Other, "disk unplugged"))
            } else {
                Self::put(&image, offset, &buffer);
                Ok(buffer.len())
            };
            completed.fetch_add(1, Ordering::SeqCst);
            completion(buffer, result);
        });
        Ok(())
    }

    fn write_header(&self, offset: u64, bytes: &[u8]) -> bridge_traits::Result<()> {
        Self::put(&self.image, offset, bytes);
        Ok(())
    }

    fn close(&self) -> bridge_traits::Result<()> {
        Ok(())
    }
}

mock! {
    pub Target {}

    impl AsyncWriteTarget for Target {
        fn submit(
            &self,
            buffer: BytesMut,
            offset: u64,
            completion: WriteCompletion,
        ) -> bridge_traits::Result<()>;
        fn write_header(&self, offset: u64, bytes: &[u8]) -> bridge_traits::Result<()>;
        fn close(&self) -> bridge_traits::Result<()>;
    }
}

fn block(frames: usize, channels: usize, seed: f32) -> Vec<f32> {
    (0..frames * channels)
        .map(|i| ((i as f32 * 0.01 + seed) % 1.0) - 0.5)
        .collect()
}

#[test]
fn test_close_waits_for_delayed_completions() {
    let target = Arc::new(DelayedTarget::new(Duration::from_millis(50)));
    let mut writer =
        AsyncWaveWriter::create(target.clone(), 2, 44_100, &WriteBackSettings::default()).unwrap();

    let blocks: Vec<Vec<f32>> = (0..5).map(|i| block(100, 2, i as f32 * 0.1)).collect();
    for samples in &blocks {
        writer.write(samples, 100).unwrap();
    }
    writer.close().unwrap();

    assert_eq!(target.completed.load(Ordering::SeqCst), 5);
    assert_eq!(writer.in_flight(), 0);
    assert_eq!(writer.frames_written(), 500);
    assert_eq!(writer.header().sample_position(), 500);

    let image = target.image.lock();
    let parsed = parse(&image).unwrap();
    assert_eq!(parsed.data.len(), 500 * 4);

    // Payload order follows submission order, not completion order.
    let expected: Vec<f32> = blocks.concat();
    let mut encoded = vec![0u8; expected.len() * 2];
    SampleConverter::encode(SampleKind::Pcm16, &expected, &mut encoded);
    assert_eq!(&image[parsed.data], encoded.as_slice());
}

#[test]
fn test_header_counts_only_successful_writes() {
    let target = Arc::new(DelayedTarget {
        fail_at: Some(2),
        ..DelayedTarget::new(Duration::from_millis(20))
    });
    let mut writer =
        AsyncWaveWriter::create(target.clone(), 1, 8_000, &WriteBackSettings::default()).unwrap();

    for i in 0..4 {
        writer.write(&block(50, 1, i as f32), 50).unwrap();
    }
    assert!(matches!(writer.close(), Err(WriteBackError::Io)));
    assert_eq!(target.completed.load(Ordering::SeqCst), 4);
    assert_eq!(writer.header().data_size(), 3 * 50 * 2);
    assert_eq!(writer.frames_written(), 150);

    let image = target.image.lock();
    let data_size = u32::from_le_bytes([image[40], image[41], image[42], image[43]]);
    assert_eq!(data_size, 300);
}

#[test]
fn test_failure_is_reported_by_later_writes() {
    let target = Arc::new(DelayedTarget {
        fail_at: Some(0),
        ..DelayedTarget::new(Duration::from_millis(1))
    });
    let mut writer =
        AsyncWaveWriter::create(target.clone(), 1, 8_000, &WriteBackSettings::default()).unwrap();
    writer.write(&[0.0; 10], 10).unwrap();

    while target.completed.load(Ordering::SeqCst) == 0 {
        thread::sleep(Duration::from_millis(1));
    }
    // The completion may still be finishing its bookkeeping.
    let mut result = writer.write(&[0.0; 10], 10);
    for _ in 0..100 {
        if result.is_err() {
            break;
        }
        thread::sleep(Duration::from_millis(5));
        result = writer.write(&[0.0; 10], 10);
    }
    assert!(matches!(result, Err(WriteBackError::Io)));
    assert!(writer.close().is_err());
}

#[test]
fn test_header_write_failure_surfaces_on_create() {
    let mut target = MockTarget::new();
    target
        .expect_write_header()
        .returning(|_, _| Err(BridgeError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))));
    let result = AsyncWaveWriter::create(Arc::new(target), 2, 44_100, &WriteBackSettings::default());
    assert!(matches!(result, Err(WriteBackError::Target(BridgeError::Io(_)))));
}

#[test]
fn test_offsets_follow_submission_order() {
    let offsets = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&offsets);

    let mut target = MockTarget::new();
    target.expect_write_header().returning(|_, _| Ok(()));
    target.expect_submit().times(3).returning(move |buffer, offset, completion| {
        recorded.lock().push(offset);
        let len = buffer.len();
        completion(buffer, Ok(len));
        Ok(())
    });
    target.expect_close().times(1).returning(|| Ok(()));

    let mut writer =
        AsyncWaveWriter::create(Arc::new(target), 2, 48_000, &WriteBackSettings::default()).unwrap();
    writer.write(&[0.1; 20], 10).unwrap();
    writer.write(&[0.1; 8], 4).unwrap();
    writer.write(&[0.1; 20], 10).unwrap();
    writer.close().unwrap();

    assert_eq!(*offsets.lock(), vec![44, 84, 100]);
    assert_eq!(writer.time_position_ms(), 0);
    assert_eq!(writer.frames_written(), 24);
}

#[test]
fn test_short_completion_fails_the_file() {
    let mut target = MockTarget::new();
    target.expect_write_header().returning(|_, _| Ok(()));
    target.expect_submit().times(1).returning(|buffer, _, completion| {
        let half = buffer.len() / 2;
        completion(buffer, Ok(half));
        Ok(())
    });
    target.expect_close().returning(|| Ok(()));

    let mut writer =
        AsyncWaveWriter::create(Arc::new(target), 2, 8_000, &WriteBackSettings::default()).unwrap();
    writer.write(&[0.5; 8], 4).unwrap();
    assert!(matches!(writer.write(&[0.5; 8], 4), Err(WriteBackError::Io)));

    assert!(matches!(writer.close(), Err(WriteBackError::Io)));
    assert_eq!(writer.header().data_size(), 0);
    assert_eq!(writer.frames_written(), 0);
    assert_eq!(writer.in_flight(), 0);
}
