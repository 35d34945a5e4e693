//! .bspc artifact structures

use crate::error::ArtifactError;
use serde::{Deserialize, Serialize};

/// Magic bytes for .bspc files: "BSPC"
pub const MAGIC: [u8; 4] = [0x42, 0x53, 0x50, 0x43];

/// Current format version
pub const VERSION: u16 = 1;

/// Size of the fixed header in bytes
pub const HEADER_SIZE: usize = 64;

/// Header flag: payload is zstd-compressed
pub const FLAG_ZSTD: u16 = 0x1;

/// File header (64 bytes fixed size)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHeader {
    /// Magic bytes: "BSPC"
    pub magic: [u8; 4],
    /// Format version
    pub version: u16,
    /// Flags (bit 0: zstd payload)
    pub flags: u16,
    /// Size of metadata section
    pub metadata_size: u64,
    /// Size of payload (uncompressed)
    pub payload_size: u64,
    /// Stored payload size (0 if uncompressed)
    pub payload_size_compressed: u64,
    /// Number of logical segments in the compressed artifact
    pub num_segments: u32,
    /// Number of distinct blobs in the compressed payload
    pub num_blobs: u32,
    /// Spectrogram width (time bins)
    pub width: u32,
    /// Spectrogram height (frequency bins)
    pub height: u32,
    /// CRC-64 of the stored payload bytes
    pub checksum: u64,
    /// Reserved
    pub reserved: u64,
}

impl ArtifactHeader {
    pub fn new(
        metadata_size: u64,
        payload_size: u64,
        num_segments: u32,
        num_blobs: u32,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            flags: 0,
            metadata_size,
            payload_size,
            payload_size_compressed: 0,
            num_segments,
            num_blobs,
            width,
            height,
            checksum: 0,
            reserved: 0,
        }
    }

    pub fn is_compressed(&self) -> bool {
        (self.flags & FLAG_ZSTD) != 0
    }

    pub fn set_compressed(&mut self, compressed: bool) {
        if compressed {
            self.flags |= FLAG_ZSTD;
        } else {
            self.flags &= !FLAG_ZSTD;
        }
    }

    /// Number of payload bytes physically stored after the metadata
    pub fn stored_payload_size(&self) -> u64 {
        if self.is_compressed() {
            self.payload_size_compressed
        } else {
            self.payload_size
        }
    }
}

/// Full-resolution spectrogram artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrogramArtifact {
    /// Base64 of the PNG-encoded image
    pub base64_spectrogram: String,
    pub width: u32,
    pub height: u32,
    /// Seconds spanned
    pub duration: f64,
    /// Lower edge of the displayed band (Hz)
    pub frequency_min: f64,
    /// Upper edge of the displayed band (Hz)
    pub frequency_max: f64,
}

/// Byte span of one distinct blob inside the decoded compressed payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobSpan {
    pub offset: u64,
    pub length: u64,
}

/// Segment-compressed spectrogram artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressedSpectrogramArtifact {
    /// Base64 of the concatenated distinct segment blobs
    pub compressed: String,
    pub width: u32,
    pub height: u32,
    pub duration: f64,
    pub frequency_min: f64,
    pub frequency_max: f64,
    /// Segment start times (seconds)
    pub starts: Vec<f64>,
    /// Segment end times (seconds)
    pub ends: Vec<f64>,
    /// Pixel columns covered by each segment
    pub widths: Vec<u32>,
    /// Blob index each segment renders to
    pub segment_blobs: Vec<u32>,
    /// Distinct blobs in first-occurrence order
    pub blobs: Vec<BlobSpan>,
}

impl CompressedSpectrogramArtifact {
    pub fn num_segments(&self) -> usize {
        self.starts.len()
    }

    /// Check the segment index against the coverage and reference invariants.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        let n = self.starts.len();
        if n == 0 {
            return Err(ArtifactError::InvalidSegmentIndex("no segments".to_string()));
        }
        if self.ends.len() != n || self.widths.len() != n || self.segment_blobs.len() != n {
            return Err(ArtifactError::InvalidSegmentIndex(format!(
                "length mismatch: {} starts, {} ends, {} widths, {} blob refs",
                n,
                self.ends.len(),
                self.widths.len(),
                self.segment_blobs.len()
            )));
        }
        if self.starts[0] != 0.0 {
            return Err(ArtifactError::InvalidSegmentIndex(format!(
                "first segment starts at {}",
                self.starts[0]
            )));
        }
        if self.ends[n - 1] != self.duration {
            return Err(ArtifactError::InvalidSegmentIndex(format!(
                "last segment ends at {} but duration is {}",
                self.ends[n - 1],
                self.duration
            )));
        }
        for i in 0..n {
            if !(self.starts[i] < self.ends[i]) {
                return Err(ArtifactError::InvalidSegmentIndex(format!(
                    "segment {} is empty: [{}, {}]",
                    i, self.starts[i], self.ends[i]
                )));
            }
            if i + 1 < n && self.ends[i] != self.starts[i + 1] {
                return Err(ArtifactError::InvalidSegmentIndex(format!(
                    "gap or overlap between segments {} and {}",
                    i,
                    i + 1
                )));
            }
            if self.widths[i] == 0 {
                return Err(ArtifactError::InvalidSegmentIndex(format!("segment {} has zero width", i)));
            }
            if self.segment_blobs[i] as usize >= self.blobs.len() {
                return Err(ArtifactError::InvalidSegmentIndex(format!(
                    "segment {} references missing blob {}",
                    i, self.segment_blobs[i]
                )));
            }
        }
        let total_width: u64 = self.widths.iter().map(|&w| w as u64).sum();
        if total_width != self.width as u64 {
            return Err(ArtifactError::InvalidSegmentIndex(format!(
                "segment widths sum to {} but width is {}",
                total_width, self.width
            )));
        }
        let mut expected_offset = 0u64;
        for (j, blob) in self.blobs.iter().enumerate() {
            if blob.offset != expected_offset || blob.length == 0 {
                return Err(ArtifactError::InvalidSegmentIndex(format!(
                    "blob {} span {}+{} is not contiguous",
                    j, blob.offset, blob.length
                )));
            }
            expected_offset += blob.length;
        }
        Ok(())
    }
}

/// Bookkeeping stored next to the artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    /// Identifier of the owning recording
    pub recording_id: String,
    /// Creation time (RFC 3339)
    pub created_at: String,
    /// Pipeline parameters used (JSON)
    pub pipeline_params: String,
}

impl BundleMetadata {
    pub fn new(recording_id: impl Into<String>, pipeline_params: impl Into<String>) -> Self {
        Self {
            recording_id: recording_id.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            pipeline_params: pipeline_params.into(),
        }
    }
}

/// Both artifacts of one recording, persisted as a unit
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBundle {
    pub metadata: BundleMetadata,
    pub full: SpectrogramArtifact,
    pub compressed: CompressedSpectrogramArtifact,
}

/// Metadata section of a .bspc file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredMetadata {
    pub bundle: BundleMetadata,
    pub duration: f64,
    pub frequency_min: f64,
    pub frequency_max: f64,
    /// Byte length of the full artifact's base64 text at the start of the payload
    pub full_length: u64,
    pub starts: Vec<f64>,
    pub ends: Vec<f64>,
    pub widths: Vec<u32>,
    pub segment_blobs: Vec<u32>,
    pub blobs: Vec<BlobSpan>,
}
