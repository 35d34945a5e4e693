//! Spectrogram artifact types and the .bspc container format

pub mod error;
pub mod format;
pub mod json_format;
pub mod reader;
pub mod writer;

pub use error::ArtifactError;
pub use format::{
    ArtifactBundle, ArtifactHeader, BlobSpan, BundleMetadata, CompressedSpectrogramArtifact,
    SpectrogramArtifact, HEADER_SIZE, MAGIC, VERSION,
};
pub use json_format::{SpectroInfo, SpectrogramResponse};
pub use reader::ArtifactReader;
pub use writer::ArtifactWriter;

const CRC64: crc::Crc<u64> = crc::Crc::<u64>::new(&crc::CRC_64_ECMA_182);

/// CRC-64/ECMA-182 of a byte slice
pub fn checksum(data: &[u8]) -> u64 {
    CRC64.checksum(data)
}
