//! End-to-end pipeline tests on synthesized WAV recordings

use approx::assert_abs_diff_eq;
use batspec_artifact::SpectrogramResponse;
use batspec_core::store::ArtifactStore;
use batspec_core::{
    encoder, process_and_store, process_recording, FilesystemStore, PipelineConfig, PipelineError,
};
use std::f64::consts::PI;
use std::io::Cursor;

fn wav_bytes(samples: &[f32], sample_rate: u32, channels: u16) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            for _ in 0..channels {
                writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// 0.4 s silence, 0.2 s of a 40 kHz call, 0.4 s silence at 250 kHz
fn bat_call() -> Vec<f32> {
    let rate = 250_000usize;
    let mut samples = vec![0.0f32; rate * 2 / 5];
    samples.extend((0..rate / 5).map(|i| (0.6 * (2.0 * PI * 40_000.0 * i as f64 / rate as f64).sin()) as f32));
    samples.extend(vec![0.0f32; rate * 2 / 5]);
    samples
}

#[test]
fn test_full_pipeline_on_bat_call() {
    let bytes = wav_bytes(&bat_call(), 250_000, 1);
    let config = PipelineConfig::default();

    let artifacts = process_recording(&bytes, &config).unwrap();
    let full = &artifacts.full;
    let compressed = &artifacts.compressed;

    // hop 250: ceil(250000 / 250)
    assert_eq!(full.width, 1000);
    assert_abs_diff_eq!(full.duration, 1.0, epsilon = 1e-12);
    assert_eq!(full.frequency_min, 5_000.0);
    assert_eq!(full.frequency_max, 120_000.0);

    let image = encoder::decode(&encoder::from_transport(&full.base64_spectrogram).unwrap()).unwrap();
    assert_eq!(image.dimensions(), (full.width, full.height));

    assert_eq!(compressed.num_segments(), 3);
    assert!(compressed.validate().is_ok());
    assert_abs_diff_eq!(compressed.starts[1], 0.4, epsilon = 0.01);
    assert_abs_diff_eq!(compressed.starts[2], 0.6, epsilon = 0.01);
}

/// Bytes of every segment's blob, in segment order
fn segment_blob_sizes(compressed: &batspec_artifact::CompressedSpectrogramArtifact) -> Vec<u64> {
    compressed
        .segment_blobs
        .iter()
        .map(|&b| compressed.blobs[b as usize].length)
        .collect()
}

#[test]
fn test_silences_around_call_share_one_blob() {
    // 2 s silence, 2 s call, 2 s silence at the default settings
    let rate = 250_000usize;
    let mut samples = vec![0.0f32; rate * 2];
    samples.extend((0..rate * 2).map(|i| (0.6 * (2.0 * PI * 40_000.0 * i as f64 / rate as f64).sin()) as f32));
    samples.extend(vec![0.0f32; rate * 2]);
    let bytes = wav_bytes(&samples, rate as u32, 1);

    let artifacts = process_recording(&bytes, &PipelineConfig::default()).unwrap();
    let compressed = &artifacts.compressed;

    assert_eq!(compressed.width, 6000);
    assert_eq!(compressed.num_segments(), 3);
    assert_abs_diff_eq!(compressed.starts[1], 2.0, epsilon = 0.01);
    assert_abs_diff_eq!(compressed.starts[2], 4.0, epsilon = 0.01);
    assert_eq!(compressed.widths[0], compressed.widths[2]);
    assert_eq!(compressed.segment_blobs[0], compressed.segment_blobs[2]);
    assert_ne!(compressed.segment_blobs[0], compressed.segment_blobs[1]);
    assert_eq!(compressed.blobs.len(), 2);

    let payload = encoder::from_transport(&compressed.compressed).unwrap();
    let per_segment: u64 = segment_blob_sizes(compressed).iter().sum();
    assert!((payload.len() as u64) < per_segment, "{} >= {}", payload.len(), per_segment);
}

#[test]
fn test_bat_call_silences_deduplicate() {
    let bytes = wav_bytes(&bat_call(), 250_000, 1);
    let compressed = process_recording(&bytes, &PipelineConfig::default()).unwrap().compressed;
    assert_eq!(compressed.widths[0], compressed.widths[2]);
    assert_eq!(compressed.segment_blobs, vec![0, 1, 0]);
}

#[test]
fn test_full_and_compressed_agree() {
    let bytes = wav_bytes(&bat_call(), 250_000, 1);
    let artifacts = process_recording(&bytes, &PipelineConfig::default()).unwrap();
    let (full, compressed) = (&artifacts.full, &artifacts.compressed);

    assert_eq!(full.width, compressed.width);
    assert_eq!(full.height, compressed.height);
    assert_eq!(full.duration, compressed.duration);
    assert_eq!(full.frequency_min, compressed.frequency_min);
    assert_eq!(full.frequency_max, compressed.frequency_max);
    assert_eq!(compressed.widths.iter().sum::<u32>(), full.width);

    let full_info = SpectrogramResponse::from(full).spectro_info;
    let compressed_info = SpectrogramResponse::from(compressed).spectro_info;
    assert_eq!(full_info.end_time, compressed_info.end_time);
    assert_eq!(compressed_info.start_times.as_deref(), Some(&compressed.starts[..]));
}

#[test]
fn test_stereo_recording_is_resampled() {
    let rate = 44_100usize;
    let samples: Vec<f32> = (0..rate / 2)
        .map(|i| (0.4 * (2.0 * PI * 9_000.0 * i as f64 / rate as f64).sin()) as f32)
        .collect();
    let bytes = wav_bytes(&samples, rate as u32, 2);

    let mut config = PipelineConfig::default();
    config.spectrogram.frequency_max = 20_000.0;
    let artifacts = process_recording(&bytes, &config).unwrap();

    // 0.5 s at the 250 kHz canonical rate
    assert_abs_diff_eq!(artifacts.full.duration, 0.5, epsilon = 1e-9);
    assert_eq!(artifacts.full.width, 125_000 / 250);
    assert!(artifacts.compressed.validate().is_ok());
}

#[test]
fn test_short_recording_has_single_column() {
    let bytes = wav_bytes(&[0.1; 300], 250_000, 1);
    let artifacts = process_recording(&bytes, &PipelineConfig::default()).unwrap();
    assert_eq!(artifacts.full.width, 1);
    assert_eq!(artifacts.compressed.num_segments(), 1);
    assert_eq!(artifacts.compressed.ends, vec![artifacts.full.duration]);
}

#[test]
fn test_invalid_config_rejected_before_decoding() {
    let mut config = PipelineConfig::default();
    config.spectrogram.colormap = "rainbow".to_string();
    let bytes = wav_bytes(&bat_call(), 250_000, 1);
    assert!(matches!(
        process_recording(&bytes, &config),
        Err(PipelineError::InvalidParameters(_))
    ));
}

#[test]
fn test_malformed_audio_persists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::new(dir.path());

    let mut bytes = wav_bytes(&bat_call(), 250_000, 1);
    bytes.truncate(bytes.len() / 3);

    let result = process_and_store(&store, "rec-7", &bytes, &PipelineConfig::default());
    assert!(matches!(result, Err(PipelineError::CorruptAudio(_))));
    assert!(store.list().unwrap().is_empty());
    assert!(store.load("rec-7").unwrap().is_none());
}

#[test]
fn test_store_round_trip_and_invalidate() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::new(dir.path());
    let config = PipelineConfig::default();
    let bytes = wav_bytes(&bat_call(), 250_000, 1);

    let artifacts = process_and_store(&store, "rec-1", &bytes, &config).unwrap();
    assert_eq!(store.list().unwrap(), vec!["rec-1".to_string()]);

    let bundle = store.load("rec-1").unwrap().unwrap();
    assert_eq!(bundle.metadata.recording_id, "rec-1");
    assert_eq!(bundle.full, artifacts.full);
    assert_eq!(bundle.compressed, artifacts.compressed);
    let params: PipelineConfig = serde_json::from_str(&bundle.metadata.pipeline_params).unwrap();
    assert_eq!(params, config);

    // regenerate replaces the cached artifacts in place
    process_and_store(&store, "rec-1", &bytes, &config).unwrap();
    assert_eq!(store.list().unwrap().len(), 1);

    assert!(store.invalidate("rec-1").unwrap());
    assert!(!store.invalidate("rec-1").unwrap());
    assert!(store.load("rec-1").unwrap().is_none());
}

#[test]
fn test_store_rejects_path_like_ids() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemStore::new(dir.path());
    let bytes = wav_bytes(&[0.0; 2048], 250_000, 1);
    assert!(matches!(
        process_and_store(&store, "../escape", &bytes, &PipelineConfig::default()),
        Err(PipelineError::Store(_))
    ));
}
