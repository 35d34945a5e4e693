//! JSON output formatting and PNG export

use anyhow::{Context, Result};
use batspec_artifact::ArtifactBundle;
use batspec_core::{encoder, Artifacts};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Outcome of processing one input file
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum GenerationSummary {
    Success {
        input_file: String,
        recording_id: String,
        width: u32,
        height: u32,
        duration_seconds: f64,
        segments: usize,
        distinct_blobs: usize,
        full_payload_bytes: usize,
        compressed_payload_bytes: usize,
        processing_time_seconds: f64,
    },
    Error {
        input_file: String,
        recording_id: Option<String>,
        message: String,
    },
}

impl GenerationSummary {
    pub fn success(input: &Path, recording_id: &str, artifacts: &Artifacts, elapsed: Duration) -> Self {
        let (full, compressed) = (&artifacts.full, &artifacts.compressed);
        GenerationSummary::Success {
            input_file: input.display().to_string(),
            recording_id: recording_id.to_string(),
            width: full.width,
            height: full.height,
            duration_seconds: full.duration,
            segments: compressed.num_segments(),
            distinct_blobs: compressed.blobs.len(),
            full_payload_bytes: full.base64_spectrogram.len(),
            compressed_payload_bytes: compressed.compressed.len(),
            processing_time_seconds: elapsed.as_secs_f64(),
        }
    }

    pub fn error(input: &Path, recording_id: Option<&str>, err: &anyhow::Error) -> Self {
        GenerationSummary::Error {
            input_file: input.display().to_string(),
            recording_id: recording_id.map(str::to_string),
            message: format!("{:#}", err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GenerationSummary::Success { .. })
    }
}

/// Pretty-print any serializable value to stdout
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}

/// Write the full image and every distinct segment blob as PNG files.
///
/// Files are named `<id>_full.png` and `<id>_blob_<n>.png`; returns the paths
/// in that order.
pub fn export_pngs(bundle: &ArtifactBundle, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory: {}", dir.display()))?;
    let id = &bundle.metadata.recording_id;
    let mut written = Vec::with_capacity(bundle.compressed.blobs.len() + 1);

    let full = encoder::from_transport(&bundle.full.base64_spectrogram)?;
    let path = dir.join(format!("{}_full.png", id));
    std::fs::write(&path, &full).with_context(|| format!("Failed to write {}", path.display()))?;
    written.push(path);

    let payload = encoder::from_transport(&bundle.compressed.compressed)?;
    for (n, span) in bundle.compressed.blobs.iter().enumerate() {
        let start = span.offset as usize;
        let end = start + span.length as usize;
        let bytes = payload
            .get(start..end)
            .with_context(|| format!("Blob {} ({}..{}) exceeds payload of {} bytes", n, start, end, payload.len()))?;
        let path = dir.join(format!("{}_blob_{}.png", id, n));
        std::fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }

    log::info!("Exported {} PNG files to {}", written.len(), dir.display());
    Ok(written)
}
