//! Pipeline parameters
//!
//! Defaults target full-spectrum bat recordings: a 250 kHz canonical rate
//! keeps the ultrasonic band up to 125 kHz.

use crate::colormap::Scale;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Spectrogram rendering parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrogramConfig {
    /// Canonical sample rate every recording is resampled to (Hz)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// FFT window length in samples
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Seconds per time bin
    #[serde(default = "default_time_resolution")]
    pub time_resolution: f64,
    /// Lower edge of the displayed band (Hz)
    #[serde(default = "default_frequency_min")]
    pub frequency_min: f64,
    /// Upper edge of the displayed band (Hz)
    #[serde(default = "default_frequency_max")]
    pub frequency_max: f64,
    /// Palette name
    #[serde(default = "default_colormap")]
    pub colormap: String,
    #[serde(default)]
    pub scale: Scale,
    /// Magnitude range mapped onto the palette in log scale (dB)
    #[serde(default = "default_dynamic_range_db")]
    pub dynamic_range_db: f32,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            window_size: default_window_size(),
            time_resolution: default_time_resolution(),
            frequency_min: default_frequency_min(),
            frequency_max: default_frequency_max(),
            colormap: default_colormap(),
            scale: Scale::default(),
            dynamic_range_db: default_dynamic_range_db(),
        }
    }
}

fn default_sample_rate() -> u32 {
    250_000
}
fn default_window_size() -> usize {
    1024
}
fn default_time_resolution() -> f64 {
    0.001
}
fn default_frequency_min() -> f64 {
    5_000.0
}
fn default_frequency_max() -> f64 {
    120_000.0
}
fn default_colormap() -> String {
    "inferno".to_string()
}
fn default_dynamic_range_db() -> f32 {
    80.0
}

impl SpectrogramConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate must be > 0"));
        }
        if self.window_size < 2 {
            return Err(invalid("window_size must be >= 2"));
        }
        if !self.time_resolution.is_finite() || self.time_resolution <= 0.0 {
            return Err(invalid("time_resolution must be > 0"));
        }
        if !self.frequency_min.is_finite() || !self.frequency_max.is_finite() {
            return Err(invalid("frequency band must be finite"));
        }
        if self.frequency_min < 0.0 || self.frequency_min >= self.frequency_max {
            return Err(invalid("frequency_min must be >= 0 and < frequency_max"));
        }
        if self.frequency_min >= self.sample_rate as f64 / 2.0 {
            return Err(invalid("frequency_min must be below the Nyquist frequency"));
        }
        if !self.dynamic_range_db.is_finite() || self.dynamic_range_db <= 0.0 {
            return Err(invalid("dynamic_range_db must be > 0"));
        }
        Ok(())
    }
}

/// Segment compression parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Segments shorter than this are merged into a neighbour (seconds)
    #[serde(default = "default_min_segment_seconds")]
    pub min_segment_seconds: f64,
    /// Column distance above which a new segment starts
    #[serde(default = "default_boundary_threshold")]
    pub boundary_threshold: f32,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            min_segment_seconds: default_min_segment_seconds(),
            boundary_threshold: default_boundary_threshold(),
        }
    }
}

fn default_min_segment_seconds() -> f64 {
    0.05
}
fn default_boundary_threshold() -> f32 {
    0.1
}

impl SegmentationConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.min_segment_seconds.is_finite() || self.min_segment_seconds < 0.0 {
            return Err(invalid("min_segment_seconds must be >= 0"));
        }
        if !self.boundary_threshold.is_finite() || self.boundary_threshold < 0.0 {
            return Err(invalid("boundary_threshold must be >= 0"));
        }
        Ok(())
    }
}

/// Everything one pipeline run needs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub spectrogram: SpectrogramConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.spectrogram.validate()?;
        self.segmentation.validate()
    }
}

fn invalid(msg: &str) -> PipelineError {
    PipelineError::InvalidParameters(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.spectrogram.sample_rate, 250_000);
        assert_eq!(config.spectrogram.window_size, 1024);
        assert_eq!(config.spectrogram.scale, Scale::Log);
        assert_eq!(config.segmentation.boundary_threshold, 0.1);
    }

    #[test]
    fn test_inverted_band_rejected() {
        let mut config = PipelineConfig::default();
        config.spectrogram.frequency_min = 90_000.0;
        config.spectrogram.frequency_max = 10_000.0;
        assert!(matches!(config.validate(), Err(PipelineError::InvalidParameters(_))));
    }

    #[test]
    fn test_band_above_nyquist_rejected() {
        let mut config = PipelineConfig::default();
        config.spectrogram.sample_rate = 48_000;
        config.spectrogram.frequency_min = 30_000.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_time_resolution_rejected() {
        let mut config = PipelineConfig::default();
        config.spectrogram.time_resolution = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let mut config = PipelineConfig::default();
        config.segmentation.boundary_threshold = -0.5;
        assert!(config.validate().is_err());
    }
}
