use thiserror::Error;

/// Errors raised while reading or writing .bspc artifacts
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid .bspc file: magic bytes mismatch")]
    InvalidMagic,
    #[error("unsupported .bspc version {0}")]
    UnsupportedVersion(u16),
    #[error("truncated .bspc file: expected {expected} bytes, found {found}")]
    Truncated { expected: u64, found: u64 },
    #[error("payload checksum mismatch: header {expected:#018x}, computed {actual:#018x}")]
    ChecksumMismatch { expected: u64, actual: u64 },
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("payload is not valid UTF-8 text")]
    InvalidPayloadText,
    #[error("invalid segment index: {0}")]
    InvalidSegmentIndex(String),
}
