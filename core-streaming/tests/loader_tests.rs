mod common;

use std::path::Path;
use std::sync::Arc;

use bridge_traits::MediaFormat;
use common::{float32, pcm16, scripted_factory, to_f32, MockFactory};
use core_runtime::config::StreamingSettings;
use core_streaming::{LoadError, SampleLoader};

fn small_chunks() -> StreamingSettings {
    StreamingSettings {
        loader_chunk_frames: 3,
        ..StreamingSettings::default()
    }
}

#[test]
fn test_mono_is_duplicated() {
    let samples: Vec<i16> = (0..10).map(|i| i * 1000).collect();
    let factory = scripted_factory(
        MediaFormat::pcm(1, 22_050, 16),
        vec![pcm16(&samples[..4]), pcm16(&samples[4..])],
    );
    let loader = SampleLoader::new(factory, small_chunks());

    let mut sample = loader.load(Path::new("kick.wav")).unwrap();
    assert_eq!(sample.frames(), 10);
    assert_eq!(sample.sample_rate(), 22_050);
    assert_eq!(sample.channel(0), sample.channel(1));
    assert_eq!(sample.channel(0).unwrap()[9], to_f32(9000));
    assert!(sample.channel(2).is_none());
    assert_eq!(sample.source(), Path::new("kick.wav"));

    sample.position = 6;
    sample.restart();
    assert_eq!(sample.position, 0);
}

#[test]
fn test_extra_channels_are_dropped() {
    // Three channels: left, right, and a third that is ignored.
    let frames: Vec<f32> = (0..4)
        .flat_map(|i| [i as f32 * 0.1, -(i as f32) * 0.1, 0.9])
        .collect();
    let factory = scripted_factory(MediaFormat::float(3, 48_000), vec![float32(&frames)]);
    let loader = SampleLoader::new(factory, small_chunks());

    let sample = loader.load(Path::new("surround.wav")).unwrap();
    assert_eq!(sample.frames(), 4);
    let left: Vec<f32> = (0..4).map(|i| i as f32 * 0.1).collect();
    assert_eq!(sample.channel(0).unwrap(), left.as_slice());
    assert_eq!(sample.channel(1).unwrap()[3], -left[3]);
}

#[test]
fn test_exact_multiple_of_chunk_size() {
    let samples = [1i16, 2, 3, 4, 5, 6];
    let factory = scripted_factory(MediaFormat::pcm(1, 8_000, 16), vec![pcm16(&samples)]);
    let loader = SampleLoader::new(factory, small_chunks());
    assert_eq!(loader.load(Path::new("six.wav")).unwrap().frames(), 6);
}

#[test]
fn test_out_of_range_samples_still_load() {
    let factory = scripted_factory(MediaFormat::float(2, 44_100), vec![float32(&[1.5, -1.5])]);
    let loader = SampleLoader::new(factory, StreamingSettings::default());
    let sample = loader.load(Path::new("hot.wav")).unwrap();
    assert_eq!(sample.channel(0).unwrap(), &[1.5]);
}

#[test]
fn test_empty_stream_is_an_error() {
    let factory = scripted_factory(MediaFormat::pcm(2, 44_100, 16), vec![]);
    let loader = SampleLoader::new(factory, small_chunks());
    let err = loader.load(Path::new("nothing.wav")).unwrap_err();
    assert!(matches!(err, LoadError::Empty(ref path) if path.contains("nothing.wav")));
    assert!(!err.is_format_error());
}

#[test]
fn test_unusable_format_is_a_format_error() {
    let factory = scripted_factory(MediaFormat::pcm(2, 44_100, 8), vec![pcm16(&[0; 4])]);
    let loader = SampleLoader::new(factory, small_chunks());
    let err = loader.load(Path::new("eight_bit.wav")).unwrap_err();
    assert!(err.is_format_error());
}

#[test]
fn test_zero_chunk_size_is_rejected_before_opening() {
    let mut factory = MockFactory::new();
    factory.expect_open().never();
    let loader = SampleLoader::new(
        Arc::new(factory),
        StreamingSettings {
            loader_chunk_frames: 0,
            ..StreamingSettings::default()
        },
    );

    let err = loader.load(Path::new("kick.wav")).unwrap_err();
    assert!(matches!(err, LoadError::Settings(_)));
    assert!(!err.is_format_error());
}
