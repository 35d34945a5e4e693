//! Magnitude to RGB mapping
//!
//! A [`Normalizer`] turns magnitudes into `[0, 1]` using the matrix's own
//! range; a [`Colormap`] turns that into a palette colour.

use crate::error::{PipelineError, Result};
use crate::transform::MagnitudeMatrix;
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Entries in the built-in palettes
const PALETTE_LEN: usize = 256;

const VIRIDIS: [[u8; 3]; 9] = [
    [68, 1, 84],
    [71, 44, 122],
    [59, 81, 139],
    [44, 113, 142],
    [33, 144, 141],
    [39, 173, 129],
    [92, 200, 99],
    [170, 220, 50],
    [253, 231, 37],
];

const INFERNO: [[u8; 3]; 9] = [
    [0, 0, 4],
    [31, 12, 72],
    [85, 15, 109],
    [136, 34, 106],
    [186, 54, 85],
    [227, 89, 51],
    [249, 140, 10],
    [249, 201, 50],
    [252, 255, 164],
];

const MAGMA: [[u8; 3]; 9] = [
    [0, 0, 4],
    [28, 16, 68],
    [79, 18, 123],
    [129, 37, 129],
    [181, 54, 122],
    [229, 80, 100],
    [251, 135, 97],
    [254, 194, 135],
    [252, 253, 191],
];

/// Magnitude scaling applied before palette lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Linear,
    #[default]
    Log,
}

/// Ordered palette indexed by normalized magnitude
#[derive(Debug, Clone, PartialEq)]
pub struct Colormap {
    name: String,
    palette: Vec<[u8; 3]>,
}

impl Colormap {
    /// Built-in palette by name: gray, gray_r, viridis, inferno, magma
    pub fn named(name: &str) -> Result<Self> {
        let palette = match name.to_ascii_lowercase().as_str() {
            "gray" | "grey" => (0..PALETTE_LEN).map(|i| [i as u8; 3]).collect(),
            "gray_r" | "grey_r" => (0..PALETTE_LEN).rev().map(|i| [i as u8; 3]).collect(),
            "viridis" => interpolate(&VIRIDIS, PALETTE_LEN),
            "inferno" => interpolate(&INFERNO, PALETTE_LEN),
            "magma" => interpolate(&MAGMA, PALETTE_LEN),
            _ => {
                return Err(PipelineError::InvalidParameters(format!(
                    "unknown colormap {:?}",
                    name
                )))
            }
        };
        Ok(Self {
            name: name.to_ascii_lowercase(),
            palette,
        })
    }

    /// Explicit palette, darkest entry first
    pub fn from_palette(name: impl Into<String>, palette: Vec<[u8; 3]>) -> Result<Self> {
        if palette.is_empty() {
            return Err(PipelineError::InvalidParameters("palette is empty".to_string()));
        }
        Ok(Self {
            name: name.into(),
            palette,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.palette.len()
    }

    pub fn is_empty(&self) -> bool {
        self.palette.is_empty()
    }

    /// Colour for a normalized value in `[0, 1]`
    pub fn lookup(&self, normalized: f32) -> [u8; 3] {
        let t = if normalized.is_nan() { 0.0 } else { normalized.clamp(0.0, 1.0) };
        let index = (t * (self.palette.len() - 1) as f32).round() as usize;
        self.palette[index]
    }
}

/// Spread anchor colours evenly over `len` entries
fn interpolate(anchors: &[[u8; 3]], len: usize) -> Vec<[u8; 3]> {
    let segments = (anchors.len() - 1) as f32;
    (0..len)
        .map(|i| {
            let position = i as f32 / (len - 1) as f32 * segments;
            let lower = (position.floor() as usize).min(anchors.len() - 2);
            let local = position - lower as f32;
            let (a, b) = (anchors[lower], anchors[lower + 1]);
            [
                lerp_u8(a[0], b[0], local),
                lerp_u8(a[1], b[1], local),
                lerp_u8(a[2], b[2], local),
            ]
        })
        .collect()
}

fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round() as u8
}

/// Matrix-wide mapping from magnitude to `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizer {
    scale: Scale,
    min: f32,
    max: f32,
    /// Lowest dB level shown, relative to `max` (log scale only)
    floor_db: f32,
}

impl Normalizer {
    pub fn new(matrix: &MagnitudeMatrix, scale: Scale, dynamic_range_db: f32) -> Self {
        let (min, max) = matrix.min_max();
        let floor_db = if max > 0.0 {
            let relative_min = if min > 0.0 {
                20.0 * (min / max).log10()
            } else {
                f32::NEG_INFINITY
            };
            relative_min.max(-dynamic_range_db.abs())
        } else {
            0.0
        };
        Self {
            scale,
            min,
            max,
            floor_db,
        }
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn normalize(&self, value: f32) -> f32 {
        match self.scale {
            Scale::Linear => {
                let span = self.max - self.min;
                if span <= 0.0 {
                    return 0.0;
                }
                ((value - self.min) / span).clamp(0.0, 1.0)
            }
            Scale::Log => {
                if value <= 0.0 || self.max <= 0.0 || self.floor_db >= 0.0 {
                    return 0.0;
                }
                let db = 20.0 * (value / self.max).log10();
                ((db - self.floor_db) / -self.floor_db).clamp(0.0, 1.0)
            }
        }
    }
}

/// Renders magnitude matrices into RGB images
#[derive(Debug, Clone)]
pub struct ColorMapper {
    colormap: Colormap,
    scale: Scale,
    dynamic_range_db: f32,
}

impl ColorMapper {
    pub fn new(colormap: Colormap, scale: Scale, dynamic_range_db: f32) -> Self {
        Self {
            colormap,
            scale,
            dynamic_range_db,
        }
    }

    pub fn colormap(&self) -> &Colormap {
        &self.colormap
    }

    /// Normalizer for `matrix` under this mapper's scale
    pub fn normalizer(&self, matrix: &MagnitudeMatrix) -> Normalizer {
        Normalizer::new(matrix, self.scale, self.dynamic_range_db)
    }

    /// Render the whole matrix
    pub fn render(&self, matrix: &MagnitudeMatrix) -> RgbImage {
        let normalizer = self.normalizer(matrix);
        self.render_columns(matrix, 0..matrix.width(), &normalizer)
    }

    /// Render a range of time bins. Image row 0 is the highest frequency.
    pub fn render_columns(
        &self,
        matrix: &MagnitudeMatrix,
        columns: Range<usize>,
        normalizer: &Normalizer,
    ) -> RgbImage {
        let height = matrix.height();
        let start = columns.start;
        let width = columns.end.min(matrix.width()).saturating_sub(start);
        RgbImage::from_fn(width as u32, height as u32, |x, y| {
            let row = height - 1 - y as usize;
            let value = matrix.get(row, start + x as usize);
            Rgb(self.colormap.lookup(normalizer.normalize(value)))
        })
    }
}
