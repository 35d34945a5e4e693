//! TOML settings file
//!
//! ```toml
//! [spectrogram]
//! window_size = 512
//! colormap = "viridis"
//!
//! [segmentation]
//! boundary_threshold = 0.15
//!
//! [storage]
//! base_directory = "/var/lib/batspec"
//! ```
//!
//! Every section and field is optional and falls back to its default.

use crate::config::{PipelineConfig, SegmentationConfig, SpectrogramConfig};
use crate::error::PipelineError;
use crate::store::FilesystemStore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] PipelineError),
}

/// Settings file contents
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub spectrogram: SpectrogramConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Artifact cache location
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_base_directory")]
    pub base_directory: String,
    /// zstd-compress the payload section of stored artifacts
    #[serde(default = "default_compress_payload")]
    pub compress_payload: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_directory: default_base_directory(),
            compress_payload: default_compress_payload(),
        }
    }
}

fn default_base_directory() -> String {
    "./spectrograms".to_string()
}
fn default_compress_payload() -> bool {
    true
}

impl Settings {
    /// Load and validate settings from a TOML file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.pipeline().validate()?;
        Ok(settings)
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            spectrogram: self.spectrogram.clone(),
            segmentation: self.segmentation.clone(),
        }
    }

    /// Open the filesystem store this file points at
    pub fn open_store(&self) -> FilesystemStore {
        FilesystemStore::new(&self.storage.base_directory).with_compression(self.storage.compress_payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colormap::Scale;

    #[test]
    fn test_empty_file_uses_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.storage.base_directory, "./spectrograms");
        assert!(settings.storage.compress_payload);
    }

    #[test]
    fn test_parse_partial_sections() {
        let toml_str = r#"
            [spectrogram]
            window_size = 512
            colormap = "viridis"
            scale = "linear"

            [segmentation]
            boundary_threshold = 0.15

            [storage]
            base_directory = "/tmp/specs"
            compress_payload = false
        "#;

        let settings = Settings::from_toml(toml_str).unwrap();
        assert_eq!(settings.spectrogram.window_size, 512);
        assert_eq!(settings.spectrogram.colormap, "viridis");
        assert_eq!(settings.spectrogram.scale, Scale::Linear);
        assert_eq!(settings.spectrogram.sample_rate, 250_000);
        assert_eq!(settings.segmentation.boundary_threshold, 0.15);
        assert_eq!(settings.segmentation.min_segment_seconds, 0.05);
        assert_eq!(settings.storage.base_directory, "/tmp/specs");
        assert!(!settings.storage.compress_payload);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let toml_str = r#"
            [spectrogram]
            frequency_min = 50000.0
            frequency_max = 20000.0
        "#;
        assert!(matches!(
            Settings::from_toml(toml_str),
            Err(SettingsError::Invalid(PipelineError::InvalidParameters(_)))
        ));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        assert!(matches!(
            Settings::from_toml("[spectrogram\nwindow_size = "),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batspec.toml");
        std::fs::write(&path, "[spectrogram]\ntime_resolution = 0.002\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.spectrogram.time_resolution, 0.002);
        assert!(matches!(
            Settings::load(&dir.path().join("missing.toml")),
            Err(SettingsError::Read { .. })
        ));
    }
}
