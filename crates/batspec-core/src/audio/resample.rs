//! Band-limited resampling with rubato

use crate::error::{PipelineError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

const CHUNK_SIZE: usize = 4096;

/// Resample a mono signal from `from_rate` to `to_rate`.
///
/// The resampler's group delay is trimmed so the output is aligned with the
/// input and holds `round(len * to_rate / from_rate)` samples.
pub fn resample_to_target(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == 0 || to_rate == 0 {
        return Err(PipelineError::InvalidParameters(format!(
            "cannot resample {} Hz -> {} Hz",
            from_rate, to_rate
        )));
    }
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let expected = (samples.len() as f64 * ratio).round() as usize;

    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, 1)
        .map_err(|e| PipelineError::Resample(format!("failed to create resampler: {}", e)))?;

    let delay = resampler.output_delay();
    let target = expected + delay;
    let mut output = Vec::with_capacity(target + CHUNK_SIZE);

    let mut chunks = samples.chunks_exact(CHUNK_SIZE);
    for chunk in &mut chunks {
        let result = resampler
            .process(&[chunk], None)
            .map_err(|e| PipelineError::Resample(e.to_string()))?;
        output.extend_from_slice(&result[0]);
    }

    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        let tail = [remainder];
        let result = resampler
            .process_partial(Some(&tail[..]), None)
            .map_err(|e| PipelineError::Resample(e.to_string()))?;
        output.extend_from_slice(&result[0]);
    }

    // Flush the filter tail until the delayed signal is fully out
    while output.len() < target {
        let result = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| PipelineError::Resample(e.to_string()))?;
        if result[0].is_empty() {
            break;
        }
        output.extend_from_slice(&result[0]);
    }

    output.drain(..delay.min(output.len()));
    output.resize(expected, 0.0);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_identity_when_rates_match() {
        let samples = vec![0.1, -0.2, 0.3];
        assert_eq!(resample_to_target(&samples, 48_000, 48_000).unwrap(), samples);
    }

    #[test]
    fn test_output_length_follows_ratio() {
        let samples = vec![0.0f32; 44_100];
        let out = resample_to_target(&samples, 44_100, 250_000).unwrap();
        assert_eq!(out.len(), 250_000);

        let samples = vec![0.0f32; 10_001];
        let out = resample_to_target(&samples, 96_000, 32_000).unwrap();
        assert_eq!(out.len(), (10_001f64 / 3.0).round() as usize);
    }

    #[test]
    fn test_tone_keeps_amplitude_and_alignment() {
        let from = 48_000u32;
        let to = 96_000u32;
        let freq = 1_000.0f32;
        let samples: Vec<f32> = (0..from as usize)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / from as f32).sin())
            .collect();

        let out = resample_to_target(&samples, from, to).unwrap();
        assert_eq!(out.len(), 96_000);

        // Compare against the analytic signal away from the edges
        for i in (10_000..80_000).step_by(997) {
            let expected = 0.5 * (2.0 * PI * freq * i as f32 / to as f32).sin();
            assert!((out[i] - expected).abs() < 0.05, "sample {} off: {} vs {}", i, out[i], expected);
        }
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(resample_to_target(&[0.0; 4], 0, 8_000).is_err());
    }
}
