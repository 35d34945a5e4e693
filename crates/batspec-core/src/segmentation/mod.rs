//! Segment compression of a spectrogram
//!
//! The time axis is cut wherever the normalized spectrum changes sharply, and
//! around long runs of identical columns such as digital silence. Segments
//! shorter than the configured minimum are absorbed by a neighbour, never by
//! a steady run when the other side is not one, so onsets and offsets stay
//! with the call and equal backgrounds render equal. Each segment is rendered
//! and PNG-encoded on its own, and byte-identical encodings are stored once.

use crate::colormap::{ColorMapper, Normalizer};
use crate::config::SegmentationConfig;
use crate::encoder;
use crate::error::Result;
use crate::transform::MagnitudeMatrix;
use batspec_artifact::{BlobSpan, CompressedSpectrogramArtifact};
use rayon::prelude::*;
use std::collections::HashMap;
use std::ops::Range;

/// Builds the segment-compressed artifact from a magnitude matrix
pub struct SegmentCompressor<'a> {
    config: &'a SegmentationConfig,
    mapper: &'a ColorMapper,
}

impl<'a> SegmentCompressor<'a> {
    pub fn new(config: &'a SegmentationConfig, mapper: &'a ColorMapper) -> Self {
        Self { config, mapper }
    }

    /// Column ranges of the segments, in time order
    pub fn segments(&self, matrix: &MagnitudeMatrix, normalizer: &Normalizer) -> Vec<Range<usize>> {
        let profile = ColumnProfile::new(matrix, normalizer);
        let min_columns = min_columns(self.config.min_segment_seconds, matrix.column_seconds());
        partition(&profile, self.config.boundary_threshold, min_columns)
    }

    pub fn compress(&self, matrix: &MagnitudeMatrix) -> Result<CompressedSpectrogramArtifact> {
        let normalizer = self.mapper.normalizer(matrix);
        let segments = self.segments(matrix, &normalizer);

        let encoded: Vec<Vec<u8>> = segments
            .par_iter()
            .map(|columns| {
                let image = self.mapper.render_columns(matrix, columns.clone(), &normalizer);
                encoder::encode(&image)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut payload = Vec::new();
        let mut blobs = Vec::new();
        let mut segment_blobs = Vec::with_capacity(segments.len());
        let mut seen: HashMap<&[u8], u32> = HashMap::new();
        for (columns, blob) in segments.iter().zip(&encoded) {
            let index = *seen.entry(blob.as_slice()).or_insert_with(|| {
                blobs.push(BlobSpan {
                    offset: payload.len() as u64,
                    length: blob.len() as u64,
                });
                payload.extend_from_slice(blob);
                (blobs.len() - 1) as u32
            });
            segment_blobs.push(index);
            log::debug!(
                "Segment columns {}..{} -> blob {} ({} bytes)",
                columns.start,
                columns.end,
                index,
                blob.len()
            );
        }

        let width = matrix.width();
        let duration = matrix.duration();
        let starts: Vec<f64> = segments
            .iter()
            .map(|columns| columns.start as f64 * duration / width as f64)
            .collect();
        let mut ends: Vec<f64> = starts.iter().skip(1).copied().collect();
        ends.push(duration);

        log::info!(
            "Compressed {} columns into {} segments, {} distinct blobs, {} bytes",
            width,
            segments.len(),
            blobs.len(),
            payload.len()
        );

        Ok(CompressedSpectrogramArtifact {
            compressed: encoder::to_transport(&payload),
            width: width as u32,
            height: matrix.height() as u32,
            duration,
            frequency_min: matrix.frequency_min(),
            frequency_max: matrix.frequency_max(),
            starts,
            ends,
            widths: segments.iter().map(|c| c.len() as u32).collect(),
            segment_blobs,
            blobs,
        })
    }
}

/// Per-column summary that drives boundary placement
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProfile {
    /// Mean absolute difference of normalized values; entry `j` compares
    /// column `j` with column `j + 1`
    pub distances: Vec<f32>,
    /// Mean normalized value of each column
    pub levels: Vec<f32>,
    /// Entry `j` is set when column `j + 1` holds exactly the magnitudes of
    /// column `j`
    pub repeats: Vec<bool>,
}

impl ColumnProfile {
    pub fn new(matrix: &MagnitudeMatrix, normalizer: &Normalizer) -> Self {
        let height = matrix.height();
        let normalized: Vec<f32> = matrix.values().iter().map(|&v| normalizer.normalize(v)).collect();
        let columns: Vec<&[f32]> = normalized.chunks(height).collect();

        let distances = columns
            .windows(2)
            .map(|pair| {
                pair[0]
                    .iter()
                    .zip(pair[1])
                    .map(|(a, b)| (a - b).abs())
                    .sum::<f32>()
                    / height as f32
            })
            .collect();
        let levels = columns
            .iter()
            .map(|column| column.iter().sum::<f32>() / height as f32)
            .collect();
        let repeats = (1..matrix.width())
            .map(|t| matrix.column(t - 1) == matrix.column(t))
            .collect();

        Self {
            distances,
            levels,
            repeats,
        }
    }

    /// Profile with only distances; every column at the same level and no
    /// exact repeats
    pub fn from_distances(distances: &[f32]) -> Self {
        Self {
            distances: distances.to_vec(),
            levels: vec![0.0; distances.len() + 1],
            repeats: vec![false; distances.len()],
        }
    }

    pub fn width(&self) -> usize {
        self.levels.len()
    }

    /// Every column of `columns` repeats the first and there are at least
    /// `min_run` of them
    fn is_steady(&self, columns: &Range<usize>, min_run: usize) -> bool {
        columns.len() >= min_run && self.repeats[columns.start..columns.end - 1].iter().all(|&r| r)
    }

    fn mean_level(&self, columns: &Range<usize>) -> f64 {
        let total: f64 = self.levels[columns.clone()].iter().map(|&l| l as f64).sum();
        total / columns.len() as f64
    }

    /// Whether the short segment `current` joins `previous` rather than `next`
    fn joins_previous(
        &self,
        previous: &Range<usize>,
        current: &Range<usize>,
        next: &Range<usize>,
        min_run: usize,
    ) -> bool {
        let (previous_steady, next_steady) = (self.is_steady(previous, min_run), self.is_steady(next, min_run));
        if previous_steady != next_steady {
            return next_steady;
        }
        let (previous_level, next_level) = (self.mean_level(previous), self.mean_level(next));
        if previous_level != next_level {
            return previous_level > next_level;
        }
        self.distances[current.start - 1] <= self.distances[current.end - 1]
    }
}

/// Shortest allowed segment in columns
pub fn min_columns(min_segment_seconds: f64, column_seconds: f64) -> usize {
    if column_seconds <= 0.0 {
        return 1;
    }
    ((min_segment_seconds / column_seconds).ceil() as usize).max(1)
}

/// Split the profiled columns into segments.
///
/// A boundary goes before column `j` when `distances[j - 1] > threshold`, and
/// around every run of at least `min_columns` (and at least two) identical
/// columns. Segments shorter than `min_columns` are then merged, shortest
/// first. A short segment joins the neighbour that is not a steady run; if
/// both or neither are, the louder one; on equal levels, the one across the
/// weaker boundary, and the previous one on a tie.
pub fn partition(profile: &ColumnProfile, threshold: f32, min_columns: usize) -> Vec<Range<usize>> {
    let width = profile.width();
    let min_run = min_columns.max(2);

    let mut cuts = vec![false; width];
    for (i, &d) in profile.distances.iter().enumerate() {
        if d > threshold {
            cuts[i + 1] = true;
        }
    }
    let mut run_start = 0;
    for j in 1..=width {
        if j < width && profile.repeats[j - 1] {
            continue;
        }
        if j - run_start >= min_run {
            cuts[run_start] = true;
            if j < width {
                cuts[j] = true;
            }
        }
        run_start = j;
    }

    let mut segments = Vec::new();
    let mut start = 0;
    for j in 1..width {
        if cuts[j] {
            segments.push(start..j);
            start = j;
        }
    }
    segments.push(start..width);

    while segments.len() > 1 {
        let shortest = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.len() < min_columns)
            .min_by_key(|(i, s)| (s.len(), *i))
            .map(|(i, _)| i);
        let Some(i) = shortest else { break };

        let join_previous = if i == 0 {
            false
        } else if i == segments.len() - 1 {
            true
        } else {
            profile.joins_previous(&segments[i - 1], &segments[i], &segments[i + 1], min_run)
        };

        if join_previous {
            let end = segments[i].end;
            segments[i - 1].end = end;
        } else {
            let start = segments[i].start;
            segments[i + 1].start = start;
        }
        segments.remove(i);
    }

    segments
}
