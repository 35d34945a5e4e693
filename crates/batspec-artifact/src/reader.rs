//! .bspc file reader

use crate::checksum;
use crate::error::ArtifactError;
use crate::format::{
    ArtifactBundle, ArtifactHeader, CompressedSpectrogramArtifact, SpectrogramArtifact,
    StoredMetadata, HEADER_SIZE, MAGIC, VERSION,
};
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub struct ArtifactReader;

impl ArtifactReader {
    /// Read .bspc file
    pub fn read(path: &Path) -> Result<ArtifactBundle, ArtifactError> {
        let mmap = map_file(path)?;
        Self::from_bytes(&mmap)
    }

    /// Read only the fixed header
    pub fn read_header(path: &Path) -> Result<ArtifactHeader, ArtifactError> {
        let mmap = map_file(path)?;
        Self::parse_header(&mmap)
    }

    pub fn from_bytes(data: &[u8]) -> Result<ArtifactBundle, ArtifactError> {
        let header = Self::parse_header(data)?;

        let found = data.len() as u64;
        // Sizes come from the file; an overflowing sum can never fit in `data`
        let payload_end = (HEADER_SIZE as u64)
            .checked_add(header.metadata_size)
            .and_then(|end| end.checked_add(header.stored_payload_size()))
            .ok_or(ArtifactError::Truncated { expected: u64::MAX, found })?;
        if found < payload_end {
            return Err(ArtifactError::Truncated {
                expected: payload_end,
                found,
            });
        }
        let metadata_end = HEADER_SIZE as u64 + header.metadata_size;

        let metadata: StoredMetadata =
            serde_json::from_slice(&data[HEADER_SIZE..metadata_end as usize])?;

        let stored = &data[metadata_end as usize..payload_end as usize];
        let actual = checksum(stored);
        if actual != header.checksum {
            return Err(ArtifactError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            });
        }

        let payload = if header.is_compressed() {
            // Decode at most one byte past the declared size, enough to detect a mismatch
            let mut payload = Vec::new();
            zstd::stream::read::Decoder::new(stored)?
                .take(header.payload_size.saturating_add(1))
                .read_to_end(&mut payload)?;
            payload
        } else {
            stored.to_vec()
        };
        if payload.len() as u64 != header.payload_size {
            return Err(ArtifactError::Truncated {
                expected: header.payload_size,
                found: payload.len() as u64,
            });
        }

        let split = metadata.full_length as usize;
        if split > payload.len() {
            return Err(ArtifactError::Truncated {
                expected: metadata.full_length,
                found: payload.len() as u64,
            });
        }
        let mut full_text = payload;
        let compressed_text = full_text.split_off(split);
        let full_text = String::from_utf8(full_text).map_err(|_| ArtifactError::InvalidPayloadText)?;
        let compressed_text =
            String::from_utf8(compressed_text).map_err(|_| ArtifactError::InvalidPayloadText)?;

        let full = SpectrogramArtifact {
            base64_spectrogram: full_text,
            width: header.width,
            height: header.height,
            duration: metadata.duration,
            frequency_min: metadata.frequency_min,
            frequency_max: metadata.frequency_max,
        };
        let compressed = CompressedSpectrogramArtifact {
            compressed: compressed_text,
            width: header.width,
            height: header.height,
            duration: metadata.duration,
            frequency_min: metadata.frequency_min,
            frequency_max: metadata.frequency_max,
            starts: metadata.starts,
            ends: metadata.ends,
            widths: metadata.widths,
            segment_blobs: metadata.segment_blobs,
            blobs: metadata.blobs,
        };
        compressed.validate()?;

        if compressed.num_segments() != header.num_segments as usize
            || compressed.blobs.len() != header.num_blobs as usize
        {
            return Err(ArtifactError::InvalidSegmentIndex(format!(
                "header declares {} segments / {} blobs, metadata has {} / {}",
                header.num_segments,
                header.num_blobs,
                compressed.num_segments(),
                compressed.blobs.len()
            )));
        }

        Ok(ArtifactBundle {
            metadata: metadata.bundle,
            full,
            compressed,
        })
    }

    fn parse_header(data: &[u8]) -> Result<ArtifactHeader, ArtifactError> {
        if data.len() < HEADER_SIZE {
            return Err(ArtifactError::Truncated {
                expected: HEADER_SIZE as u64,
                found: data.len() as u64,
            });
        }

        let mut cursor = HeaderCursor { data, pos: 0 };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(cursor.take(4));
        if magic != MAGIC {
            return Err(ArtifactError::InvalidMagic);
        }

        let version = cursor.u16();
        if version != VERSION {
            return Err(ArtifactError::UnsupportedVersion(version));
        }

        Ok(ArtifactHeader {
            magic,
            version,
            flags: cursor.u16(),
            metadata_size: cursor.u64(),
            payload_size: cursor.u64(),
            payload_size_compressed: cursor.u64(),
            num_segments: cursor.u32(),
            num_blobs: cursor.u32(),
            width: cursor.u32(),
            height: cursor.u32(),
            checksum: cursor.u64(),
            reserved: cursor.u64(),
        })
    }
}

fn map_file(path: &Path) -> Result<Mmap, ArtifactError> {
    let file = File::open(path)?;
    // SAFETY: artifacts are only ever replaced by renaming a finished file over
    // them, never truncated or rewritten in place, so the mapping stays valid.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap)
}

/// Little-endian field reader over a slice already checked to hold a full header
struct HeaderCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> HeaderCursor<'a> {
    fn take(&mut self, n: usize) -> &'a [u8] {
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        slice
    }

    fn u16(&mut self) -> u16 {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(self.take(2));
        u16::from_le_bytes(buf)
    }

    fn u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4));
        u32::from_le_bytes(buf)
    }

    fn u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8));
        u64::from_le_bytes(buf)
    }
}
