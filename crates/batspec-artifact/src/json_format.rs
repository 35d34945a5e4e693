//! JSON response shapes served to the annotation client
//!
//! Both views share one shape; the segment index fields are only present for
//! the compressed view.

use crate::format::{CompressedSpectrogramArtifact, SpectrogramArtifact};
use serde::{Deserialize, Serialize};

/// Spectrogram payload plus its display geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrogramResponse {
    pub base64_spectrogram: String,
    #[serde(rename = "spectroInfo")]
    pub spectro_info: SpectroInfo,
}

/// Geometry of a spectrogram image in time and frequency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectroInfo {
    pub width: u32,
    pub height: u32,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_times: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_times: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widths: Option<Vec<u32>>,
    pub low_freq: f64,
    pub high_freq: f64,
}

impl SpectroInfo {
    pub fn is_compressed(&self) -> bool {
        self.start_times.is_some()
    }
}

impl From<&SpectrogramArtifact> for SpectrogramResponse {
    fn from(artifact: &SpectrogramArtifact) -> Self {
        Self {
            base64_spectrogram: artifact.base64_spectrogram.clone(),
            spectro_info: SpectroInfo {
                width: artifact.width,
                height: artifact.height,
                start_time: 0.0,
                end_time: artifact.duration,
                start_times: None,
                end_times: None,
                widths: None,
                low_freq: artifact.frequency_min,
                high_freq: artifact.frequency_max,
            },
        }
    }
}

impl From<&CompressedSpectrogramArtifact> for SpectrogramResponse {
    fn from(artifact: &CompressedSpectrogramArtifact) -> Self {
        Self {
            base64_spectrogram: artifact.compressed.clone(),
            spectro_info: SpectroInfo {
                width: artifact.width,
                height: artifact.height,
                start_time: 0.0,
                end_time: artifact.duration,
                start_times: Some(artifact.starts.clone()),
                end_times: Some(artifact.ends.clone()),
                widths: Some(artifact.widths.clone()),
                low_freq: artifact.frequency_min,
                high_freq: artifact.frequency_max,
            },
        }
    }
}

impl SpectrogramResponse {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
