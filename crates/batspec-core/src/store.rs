//! Artifact store
//!
//! Artifacts are keyed by recording id. The filesystem store keeps one `.bspc`
//! file per recording and replaces it atomically on save.

use crate::error::StoreError;
use batspec_artifact::{ArtifactBundle, ArtifactReader, ArtifactWriter};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "bspc";

/// Persistent home of spectrogram artifacts
pub trait ArtifactStore: Send + Sync {
    /// Store both artifacts of a recording, replacing any previous version
    fn save(&self, bundle: &ArtifactBundle) -> Result<(), StoreError>;

    /// Artifacts of a recording, if cached
    fn load(&self, recording_id: &str) -> Result<Option<ArtifactBundle>, StoreError>;

    /// Drop cached artifacts; returns whether anything was removed
    fn invalidate(&self, recording_id: &str) -> Result<bool, StoreError>;

    /// Ids of all cached recordings, sorted
    fn list(&self) -> Result<Vec<String>, StoreError>;
}

/// Reject ids that could escape the store directory
pub fn validate_identifier(recording_id: &str) -> Result<(), StoreError> {
    let bad = recording_id.is_empty()
        || recording_id.contains('/')
        || recording_id.contains('\\')
        || recording_id.contains("..")
        || recording_id.contains('\0');
    if bad {
        return Err(StoreError::InvalidIdentifier(recording_id.to_string()));
    }
    Ok(())
}

/// Filesystem-based artifact store
pub struct FilesystemStore {
    base_dir: PathBuf,
    compress: bool,
}

impl FilesystemStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            compress: true,
        }
    }

    /// Toggle zstd compression of stored payloads
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Location of a recording's artifact file
    pub fn path_for(&self, recording_id: &str) -> Result<PathBuf, StoreError> {
        validate_identifier(recording_id)?;
        Ok(self.base_dir.join(format!("{}.{}", recording_id, EXTENSION)))
    }

    /// Load every cached bundle in parallel, skipping unreadable files
    pub fn load_all(&self) -> Result<Vec<ArtifactBundle>, StoreError> {
        let ids = self.list()?;
        let bundles = ids
            .par_iter()
            .filter_map(|id| match self.load(id) {
                Ok(bundle) => bundle,
                Err(e) => {
                    log::warn!("Failed to load artifacts for {}: {}", id, e);
                    None
                }
            })
            .collect();
        Ok(bundles)
    }
}

impl ArtifactStore for FilesystemStore {
    fn save(&self, bundle: &ArtifactBundle) -> Result<(), StoreError> {
        let path = self.path_for(&bundle.metadata.recording_id)?;
        std::fs::create_dir_all(&self.base_dir)?;
        ArtifactWriter::new()
            .with_compression(self.compress)
            .write(&path, bundle)?;
        log::info!("Stored artifacts for {} at {}", bundle.metadata.recording_id, path.display());
        Ok(())
    }

    fn load(&self, recording_id: &str) -> Result<Option<ArtifactBundle>, StoreError> {
        let path = self.path_for(recording_id)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(ArtifactReader::read(&path)?))
    }

    fn invalidate(&self, recording_id: &str) -> Result<bool, StoreError> {
        let path = self.path_for(recording_id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                log::info!("Invalidated artifacts for {}", recording_id);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids: Vec<String> = std::fs::read_dir(&self.base_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|s| s.to_str()) == Some(EXTENSION))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("rec-2024_001").is_ok());
        assert!(validate_identifier("42").is_ok());
        for bad in ["", "../etc", "a/b", "a\\b", "..", "x\0y"] {
            assert!(
                matches!(validate_identifier(bad), Err(StoreError::InvalidIdentifier(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_path_layout() {
        let store = FilesystemStore::new("/data/specs");
        assert_eq!(store.path_for("abc").unwrap(), PathBuf::from("/data/specs/abc.bspc"));
        assert!(store.path_for("../abc").is_err());
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path().join("not-yet"));
        assert!(store.list().unwrap().is_empty());
        assert!(store.load("rec").unwrap().is_none());
        assert!(!store.invalidate("rec").unwrap());
    }
}
