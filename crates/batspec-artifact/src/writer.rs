//! .bspc file writer

use crate::checksum;
use crate::error::ArtifactError;
use crate::format::{ArtifactBundle, ArtifactHeader, StoredMetadata, HEADER_SIZE};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// zstd level used for payload compression
const ZSTD_LEVEL: i32 = 3;

pub struct ArtifactWriter {
    compress: bool,
}

impl ArtifactWriter {
    pub fn new() -> Self {
        Self { compress: true }
    }

    /// Toggle zstd compression of the payload section
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Serialize a bundle to bytes (header, metadata, payload)
    pub fn to_bytes(&self, bundle: &ArtifactBundle) -> Result<Vec<u8>, ArtifactError> {
        bundle.compressed.validate()?;

        let full_text = bundle.full.base64_spectrogram.as_bytes();
        let compressed_text = bundle.compressed.compressed.as_bytes();

        let metadata = StoredMetadata {
            bundle: bundle.metadata.clone(),
            duration: bundle.full.duration,
            frequency_min: bundle.full.frequency_min,
            frequency_max: bundle.full.frequency_max,
            full_length: full_text.len() as u64,
            starts: bundle.compressed.starts.clone(),
            ends: bundle.compressed.ends.clone(),
            widths: bundle.compressed.widths.clone(),
            segment_blobs: bundle.compressed.segment_blobs.clone(),
            blobs: bundle.compressed.blobs.clone(),
        };
        let metadata_bytes = serde_json::to_vec(&metadata)?;

        let mut payload = Vec::with_capacity(full_text.len() + compressed_text.len());
        payload.extend_from_slice(full_text);
        payload.extend_from_slice(compressed_text);

        let mut header = ArtifactHeader::new(
            metadata_bytes.len() as u64,
            payload.len() as u64,
            bundle.compressed.num_segments() as u32,
            bundle.compressed.blobs.len() as u32,
            bundle.full.width,
            bundle.full.height,
        );

        let stored = if self.compress {
            let packed = zstd::encode_all(&payload[..], ZSTD_LEVEL)?;
            header.set_compressed(true);
            header.payload_size_compressed = packed.len() as u64;
            packed
        } else {
            payload
        };
        header.checksum = checksum(&stored);

        let mut out = Vec::with_capacity(HEADER_SIZE + metadata_bytes.len() + stored.len());
        write_header(&mut out, &header)?;
        out.write_all(&metadata_bytes)?;
        out.write_all(&stored)?;
        Ok(out)
    }

    /// Write .bspc file. The target is replaced atomically: the bytes go to a
    /// uniquely named temporary file in the same directory, which is synced
    /// and then renamed over `path`, so concurrent writers never share a file
    /// and readers only ever see a complete artifact.
    pub fn write(&self, path: &Path, bundle: &ArtifactBundle) -> Result<(), ArtifactError> {
        let bytes = self.to_bytes(bundle)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;

        log::debug!(
            "Wrote {} ({} bytes, {} segments)",
            path.display(),
            bytes.len(),
            bundle.compressed.num_segments()
        );
        Ok(())
    }
}

impl Default for ArtifactWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn write_header<W: Write>(writer: &mut W, header: &ArtifactHeader) -> std::io::Result<()> {
    writer.write_all(&header.magic)?;
    writer.write_all(&header.version.to_le_bytes())?;
    writer.write_all(&header.flags.to_le_bytes())?;
    writer.write_all(&header.metadata_size.to_le_bytes())?;
    writer.write_all(&header.payload_size.to_le_bytes())?;
    writer.write_all(&header.payload_size_compressed.to_le_bytes())?;
    writer.write_all(&header.num_segments.to_le_bytes())?;
    writer.write_all(&header.num_blobs.to_le_bytes())?;
    writer.write_all(&header.width.to_le_bytes())?;
    writer.write_all(&header.height.to_le_bytes())?;
    writer.write_all(&header.checksum.to_le_bytes())?;
    writer.write_all(&header.reserved.to_le_bytes())?;
    Ok(())
}
