//! Error types for the spectrogram pipeline

use batspec_artifact::ArtifactError;
use thiserror::Error;

/// Failure of one pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
    #[error("corrupt audio: {0}")]
    CorruptAudio(String),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("encoding failure: {0}")]
    EncodingFailure(String),
    #[error("resampling failed: {0}")]
    Resample(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Artifact store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid recording identifier: {0:?}")]
    InvalidIdentifier(String),
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),
    #[error("failed to serialize pipeline parameters: {0}")]
    Params(#[from] serde_json::Error),
}

/// Coordinate mapping failures
#[derive(Debug, Error, PartialEq)]
pub enum CoordError {
    #[error("rectangle spans segments {first} and {last}")]
    SpansSegments { first: usize, last: usize },
    #[error("coordinates out of bounds: {0}")]
    OutOfBounds(String),
    #[error("degenerate geometry: {0}")]
    Degenerate(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
