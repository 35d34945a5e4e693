//! Short-time Fourier transform producing a linear-frequency magnitude matrix

use crate::audio::Waveform;
use crate::error::{PipelineError, Result};
use rayon::prelude::*;
use rustfft::num_complex::Complex;
use rustfft::num_traits::Zero;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Time-frequency magnitudes.
///
/// Stored column-major: each time bin owns `height` contiguous values, row 0
/// being the lowest frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct MagnitudeMatrix {
    values: Vec<f32>,
    width: usize,
    height: usize,
    frequency_min: f64,
    frequency_max: f64,
    duration: f64,
}

impl MagnitudeMatrix {
    pub fn new(
        values: Vec<f32>,
        width: usize,
        height: usize,
        frequency_min: f64,
        frequency_max: f64,
        duration: f64,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(invalid(format!("matrix must be non-empty, got {}x{}", width, height)));
        }
        if values.len() != width * height {
            return Err(invalid(format!(
                "expected {} values for {}x{}, got {}",
                width * height,
                width,
                height,
                values.len()
            )));
        }
        if !(frequency_min < frequency_max) {
            return Err(invalid(format!(
                "frequency band {}..{} is empty",
                frequency_min, frequency_max
            )));
        }
        if !(duration > 0.0) || !duration.is_finite() {
            return Err(invalid(format!("duration must be > 0, got {}", duration)));
        }
        if values.iter().any(|v| !(*v >= 0.0) || !v.is_finite()) {
            return Err(invalid("magnitudes must be finite and non-negative".to_string()));
        }
        Ok(Self {
            values,
            width,
            height,
            frequency_min,
            frequency_max,
            duration,
        })
    }

    /// Number of time bins
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of frequency bins
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn frequency_min(&self) -> f64 {
        self.frequency_min
    }

    pub fn frequency_max(&self) -> f64 {
        self.frequency_max
    }

    /// Seconds spanned by the whole matrix
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Seconds spanned by one time bin
    pub fn column_seconds(&self) -> f64 {
        self.duration / self.width as f64
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// All frequency rows of time bin `t`
    pub fn column(&self, t: usize) -> &[f32] {
        &self.values[t * self.height..(t + 1) * self.height]
    }

    pub fn get(&self, row: usize, t: usize) -> f32 {
        self.values[t * self.height + row]
    }

    /// Smallest and largest magnitude
    pub fn min_max(&self) -> (f32, f32) {
        self.values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }
}

/// FFT-based spectrogram generator for a fixed window size
pub struct SpectrogramGenerator {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    window_gain: f32,
}

impl SpectrogramGenerator {
    pub fn new(window_size: usize) -> Result<Self> {
        if window_size < 2 {
            return Err(invalid(format!("window size must be >= 2, got {}", window_size)));
        }
        let fft = FftPlanner::<f32>::new().plan_fft_forward(window_size);
        let window = create_hann_window(window_size);
        let window_gain = window.iter().sum::<f32>();
        Ok(Self {
            fft,
            window,
            window_gain,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window.len()
    }

    /// Compute the magnitude matrix of `waveform` restricted to the
    /// `[frequency_min, frequency_max]` band, one time bin every
    /// `time_resolution` seconds.
    pub fn generate(
        &self,
        waveform: &Waveform,
        frequency_min: f64,
        frequency_max: f64,
        time_resolution: f64,
    ) -> Result<MagnitudeMatrix> {
        let sample_rate = waveform.sample_rate();
        if sample_rate == 0 || waveform.is_empty() {
            return Err(invalid("waveform is empty".to_string()));
        }
        if !time_resolution.is_finite() || time_resolution <= 0.0 {
            return Err(invalid(format!("time resolution must be > 0, got {}", time_resolution)));
        }
        if !frequency_min.is_finite() || !frequency_max.is_finite() {
            return Err(invalid("frequency band must be finite".to_string()));
        }
        if frequency_min < 0.0 || frequency_min >= frequency_max {
            return Err(invalid(format!(
                "invalid frequency band {}..{}",
                frequency_min, frequency_max
            )));
        }
        let nyquist = sample_rate as f64 / 2.0;
        if frequency_min >= nyquist {
            return Err(invalid(format!(
                "frequency_min {} is not below Nyquist {}",
                frequency_min, nyquist
            )));
        }

        let window_size = self.window.len();
        let samples = waveform.samples();
        let hop = ((time_resolution * sample_rate as f64).round() as usize).max(1);
        let width = if samples.len() <= window_size {
            1
        } else {
            samples.len().div_ceil(hop)
        };
        // Frames are laid out symmetrically about the middle of the signal and
        // zero-padded past either end, so frame t and frame width - 1 - t see
        // mirrored excerpts.
        let first_start = frame_offset(samples.len(), window_size, width, hop);

        let upper = frequency_max.min(nyquist);
        let rows = frequency_rows(frequency_min, upper, sample_rate, window_size);
        let first_bin = *rows.start();
        let height = rows.end() - rows.start() + 1;

        let scale = 2.0 / self.window_gain;
        let mut values = vec![0.0f32; width * height];
        values.par_chunks_mut(height).enumerate().for_each_init(
            || {
                (
                    vec![Complex::<f32>::zero(); window_size],
                    vec![Complex::<f32>::zero(); self.fft.get_inplace_scratch_len()],
                )
            },
            |(buffer, scratch), (t, column)| {
                let start = first_start + (t * hop) as i64;
                for (i, slot) in buffer.iter_mut().enumerate() {
                    let sample = usize::try_from(start + i as i64)
                        .ok()
                        .and_then(|index| samples.get(index))
                        .copied()
                        .unwrap_or(0.0);
                    *slot = Complex::new(sample * self.window[i], 0.0);
                }
                self.fft.process_with_scratch(buffer, scratch);
                for (row, value) in column.iter_mut().enumerate() {
                    *value = buffer[first_bin + row].norm() * scale;
                }
            },
        );

        log::debug!(
            "STFT: {} samples, window {}, hop {} -> {}x{}",
            samples.len(),
            window_size,
            hop,
            width,
            height
        );

        MagnitudeMatrix::new(values, width, height, frequency_min, upper, waveform.duration())
    }
}

/// Start sample of the first frame. Negative when the first frame reaches
/// into the zero padding before the signal.
fn frame_offset(len: usize, window_size: usize, width: usize, hop: usize) -> i64 {
    let span = (window_size + (width - 1) * hop) as i64;
    (len as i64 - span).div_euclid(2)
}

/// FFT bins whose centre frequency lies within `[low, high]`, or the single
/// bin nearest the band centre when the band is narrower than one bin
fn frequency_rows(low: f64, high: f64, sample_rate: u32, window_size: usize) -> RangeInclusive<usize> {
    let bin_hz = sample_rate as f64 / window_size as f64;
    let max_bin = window_size / 2;
    let first = ((low / bin_hz).ceil() as usize).min(max_bin);
    let last = ((high / bin_hz).floor() as usize).min(max_bin);
    if first <= last {
        first..=last
    } else {
        let centre = (((low + high) / 2.0 / bin_hz).round() as usize).min(max_bin);
        centre..=centre
    }
}

/// Symmetric Hann window
fn create_hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let x = i as f32 / (size - 1) as f32;
            0.5 * (1.0 - (2.0 * PI * x).cos())
        })
        .collect()
}

fn invalid(msg: String) -> PipelineError {
    PipelineError::InvalidParameters(msg)
}
