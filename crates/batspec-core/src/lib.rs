//! batspec core - spectrogram generation for bat call recordings
//!
//! Decodes a recording, computes its time-frequency magnitudes, and produces
//! two artifacts: the full-resolution spectrogram image and a segment
//! compressed variant with an index of segment boundaries.

pub mod audio;
pub mod colormap;
pub mod config;
pub mod coords;
pub mod encoder;
pub mod error;
pub mod segmentation;
pub mod settings;
pub mod store;
pub mod transform;

pub use audio::{decode_audio, AudioFormat, Waveform};
pub use colormap::{ColorMapper, Colormap, Normalizer, Scale};
pub use config::{PipelineConfig, SegmentationConfig, SpectrogramConfig};
pub use error::{CoordError, PipelineError, StoreError};
pub use segmentation::SegmentCompressor;
pub use settings::{Settings, SettingsError, StorageConfig};
pub use store::{ArtifactStore, FilesystemStore};
pub use transform::{MagnitudeMatrix, SpectrogramGenerator};

use batspec_artifact::{
    ArtifactBundle, BundleMetadata, CompressedSpectrogramArtifact, SpectrogramArtifact,
};
use std::time::Instant;

/// Both renderings of one recording
#[derive(Debug, Clone, PartialEq)]
pub struct Artifacts {
    pub full: SpectrogramArtifact,
    pub compressed: CompressedSpectrogramArtifact,
}

impl Artifacts {
    /// Package for storage under `recording_id`
    pub fn into_bundle(
        self,
        recording_id: &str,
        config: &PipelineConfig,
    ) -> Result<ArtifactBundle, StoreError> {
        let params = serde_json::to_string(config)?;
        Ok(ArtifactBundle {
            metadata: BundleMetadata::new(recording_id, params),
            full: self.full,
            compressed: self.compressed,
        })
    }
}

/// Render the full spectrogram of an already computed matrix
pub fn render_full(matrix: &MagnitudeMatrix, mapper: &ColorMapper) -> error::Result<SpectrogramArtifact> {
    let image = mapper.render(matrix);
    let png = encoder::encode(&image)?;
    Ok(SpectrogramArtifact {
        base64_spectrogram: encoder::to_transport(&png),
        width: matrix.width() as u32,
        height: matrix.height() as u32,
        duration: matrix.duration(),
        frequency_min: matrix.frequency_min(),
        frequency_max: matrix.frequency_max(),
    })
}

/// Run the whole pipeline on an in-memory recording
pub fn process_recording(audio_bytes: &[u8], config: &PipelineConfig) -> error::Result<Artifacts> {
    config.validate()?;
    let spec = &config.spectrogram;
    let mapper = ColorMapper::new(Colormap::named(&spec.colormap)?, spec.scale, spec.dynamic_range_db);

    let start = Instant::now();
    let waveform = decode_audio(audio_bytes, spec.sample_rate)?;
    log::info!(
        "Decoded {} bytes -> {} samples ({:.3}s) in {:.2?}",
        audio_bytes.len(),
        waveform.len(),
        waveform.duration(),
        start.elapsed()
    );

    let start = Instant::now();
    let generator = SpectrogramGenerator::new(spec.window_size)?;
    let matrix = generator.generate(
        &waveform,
        spec.frequency_min,
        spec.frequency_max,
        spec.time_resolution,
    )?;
    log::info!(
        "Spectrogram {}x{} in {:.2?}",
        matrix.width(),
        matrix.height(),
        start.elapsed()
    );

    let start = Instant::now();
    let full = render_full(&matrix, &mapper)?;
    log::info!(
        "Full image encoded ({} base64 bytes) in {:.2?}",
        full.base64_spectrogram.len(),
        start.elapsed()
    );

    let start = Instant::now();
    let compressed = SegmentCompressor::new(&config.segmentation, &mapper).compress(&matrix)?;
    log::info!(
        "Compressed image: {} segments ({} base64 bytes) in {:.2?}",
        compressed.num_segments(),
        compressed.compressed.len(),
        start.elapsed()
    );

    Ok(Artifacts { full, compressed })
}

/// Run the pipeline and persist both artifacts. Nothing is written unless
/// both variants were produced.
pub fn process_and_store(
    store: &dyn ArtifactStore,
    recording_id: &str,
    audio_bytes: &[u8],
    config: &PipelineConfig,
) -> error::Result<Artifacts> {
    store::validate_identifier(recording_id)?;
    let artifacts = process_recording(audio_bytes, config)?;
    let bundle = artifacts.clone().into_bundle(recording_id, config)?;
    store.save(&bundle)?;
    Ok(artifacts)
}
