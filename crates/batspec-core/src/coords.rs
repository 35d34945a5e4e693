//! Annotation box <-> pixel rectangle mapping
//!
//! Time runs left to right, frequency bottom to top (pixel row 0 is
//! `high_freq`). On the compressed view each segment occupies `widths[i]`
//! pixels for the interval `[start_times[i], end_times[i]]`, so the time axis
//! is piecewise linear.

use crate::error::CoordError;
use batspec_artifact::SpectroInfo;

/// Time-frequency box in seconds and Hz
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Annotation {
    pub start_time: f64,
    pub end_time: f64,
    pub low_freq: f64,
    pub high_freq: f64,
}

/// Pixel rectangle; `top` maps to `high_freq`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

/// One linear piece of the time axis
#[derive(Debug, Clone, Copy)]
struct Piece {
    start_time: f64,
    end_time: f64,
    left: f64,
    right: f64,
}

impl Piece {
    fn time_to_x(&self, t: f64) -> f64 {
        self.left + (t - self.start_time) * (self.right - self.left) / (self.end_time - self.start_time)
    }

    fn x_to_time(&self, x: f64) -> f64 {
        self.start_time + (x - self.left) * (self.end_time - self.start_time) / (self.right - self.left)
    }
}

fn pieces(info: &SpectroInfo) -> Result<Vec<Piece>, CoordError> {
    if info.width == 0 || info.height == 0 {
        return Err(CoordError::Degenerate("image has no pixels".to_string()));
    }
    if !(info.end_time > info.start_time) || !(info.high_freq > info.low_freq) {
        return Err(CoordError::Degenerate("empty time or frequency range".to_string()));
    }

    match (&info.start_times, &info.end_times, &info.widths) {
        (None, None, None) => Ok(vec![Piece {
            start_time: info.start_time,
            end_time: info.end_time,
            left: 0.0,
            right: info.width as f64,
        }]),
        (Some(starts), Some(ends), Some(widths))
            if !starts.is_empty() && starts.len() == ends.len() && starts.len() == widths.len() =>
        {
            let mut left = 0.0;
            let mut result = Vec::with_capacity(starts.len());
            for ((&start_time, &end_time), &w) in starts.iter().zip(ends).zip(widths) {
                if !(end_time > start_time) || w == 0 {
                    return Err(CoordError::Degenerate(format!(
                        "segment [{}, {}] with width {}",
                        start_time, end_time, w
                    )));
                }
                result.push(Piece {
                    start_time,
                    end_time,
                    left,
                    right: left + w as f64,
                });
                left += w as f64;
            }
            Ok(result)
        }
        _ => Err(CoordError::Degenerate("incomplete segment index".to_string())),
    }
}

fn freq_to_y(freq: f64, info: &SpectroInfo) -> f64 {
    let height = info.height as f64;
    height - (freq - info.low_freq) * height / (info.high_freq - info.low_freq)
}

fn y_to_freq(y: f64, info: &SpectroInfo) -> f64 {
    let height = info.height as f64;
    info.low_freq + (height - y) * (info.high_freq - info.low_freq) / height
}

/// Index of the piece holding time `t`; boundaries belong to the later piece
/// unless `t` is the very end.
fn piece_for_time(pieces: &[Piece], t: f64) -> Option<usize> {
    let last = pieces.len() - 1;
    pieces
        .iter()
        .position(|p| p.start_time <= t && t < p.end_time)
        .or_else(|| (t == pieces[last].end_time).then_some(last))
}

/// Index of the piece holding column `x`, treating `x` as a left edge
/// (`closed_right = false`) or right edge (`closed_right = true`).
fn piece_for_x(pieces: &[Piece], x: f64, closed_right: bool) -> Option<usize> {
    pieces.iter().position(|p| {
        if closed_right {
            p.left < x && x <= p.right
        } else {
            p.left <= x && x < p.right
        }
    })
}

/// Pixel rectangle covering `annotation` on the view described by `info`
pub fn annotation_to_pixels(annotation: &Annotation, info: &SpectroInfo) -> Result<PixelRect, CoordError> {
    let pieces = pieces(info)?;

    if annotation.start_time > annotation.end_time || annotation.low_freq > annotation.high_freq {
        return Err(CoordError::Degenerate("annotation bounds are inverted".to_string()));
    }
    if annotation.start_time < info.start_time || annotation.end_time > info.end_time {
        return Err(CoordError::OutOfBounds(format!(
            "time {}..{} outside {}..{}",
            annotation.start_time, annotation.end_time, info.start_time, info.end_time
        )));
    }
    if annotation.low_freq < info.low_freq || annotation.high_freq > info.high_freq {
        return Err(CoordError::OutOfBounds(format!(
            "frequency {}..{} outside {}..{}",
            annotation.low_freq, annotation.high_freq, info.low_freq, info.high_freq
        )));
    }

    let to_x = |t: f64| {
        piece_for_time(&pieces, t)
            .map(|i| pieces[i].time_to_x(t))
            .ok_or_else(|| CoordError::OutOfBounds(format!("time {} not covered by any segment", t)))
    };

    Ok(PixelRect {
        left: to_x(annotation.start_time)?,
        right: to_x(annotation.end_time)?,
        top: freq_to_y(annotation.high_freq, info),
        bottom: freq_to_y(annotation.low_freq, info),
    })
}

/// Annotation box drawn as `rect` on the view described by `info`.
///
/// On the compressed view both horizontal edges must lie in the same segment.
pub fn pixels_to_annotation(rect: &PixelRect, info: &SpectroInfo) -> Result<Annotation, CoordError> {
    let pieces = pieces(info)?;

    if rect.left > rect.right || rect.top > rect.bottom {
        return Err(CoordError::Degenerate("rectangle edges are inverted".to_string()));
    }
    let (width, height) = (info.width as f64, info.height as f64);
    if rect.left < 0.0 || rect.right > width || rect.top < 0.0 || rect.bottom > height {
        return Err(CoordError::OutOfBounds(format!(
            "rectangle x {}..{} y {}..{} outside {}x{}",
            rect.left, rect.right, rect.top, rect.bottom, info.width, info.height
        )));
    }

    let first = piece_for_x(&pieces, rect.left, false)
        .ok_or_else(|| CoordError::OutOfBounds(format!("x {} outside image", rect.left)))?;
    let last = if rect.right == rect.left {
        first
    } else {
        piece_for_x(&pieces, rect.right, true)
            .ok_or_else(|| CoordError::OutOfBounds(format!("x {} outside image", rect.right)))?
    };
    if first != last {
        return Err(CoordError::SpansSegments { first, last });
    }

    let piece = pieces[first];
    Ok(Annotation {
        start_time: piece.x_to_time(rect.left),
        end_time: piece.x_to_time(rect.right),
        low_freq: y_to_freq(rect.bottom, info),
        high_freq: y_to_freq(rect.top, info),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn full_info() -> SpectroInfo {
        SpectroInfo {
            width: 1000,
            height: 200,
            start_time: 0.0,
            end_time: 2.0,
            start_times: None,
            end_times: None,
            widths: None,
            low_freq: 10_000.0,
            high_freq: 110_000.0,
        }
    }

    fn compressed_info() -> SpectroInfo {
        SpectroInfo {
            width: 300,
            height: 100,
            start_time: 0.0,
            end_time: 3.0,
            start_times: Some(vec![0.0, 1.0, 2.5]),
            end_times: Some(vec![1.0, 2.5, 3.0]),
            widths: Some(vec![100, 150, 50]),
            low_freq: 0.0,
            high_freq: 50_000.0,
        }
    }

    #[test]
    fn test_full_view_mapping() {
        let annotation = Annotation {
            start_time: 0.5,
            end_time: 0.75,
            low_freq: 20_000.0,
            high_freq: 60_000.0,
        };
        let rect = annotation_to_pixels(&annotation, &full_info()).unwrap();
        assert_relative_eq!(rect.left, 250.0);
        assert_relative_eq!(rect.right, 375.0);
        assert_relative_eq!(rect.top, 100.0);
        assert_relative_eq!(rect.bottom, 180.0);

        let back = pixels_to_annotation(&rect, &full_info()).unwrap();
        assert_relative_eq!(back.start_time, 0.5);
        assert_relative_eq!(back.end_time, 0.75);
        assert_relative_eq!(back.low_freq, 20_000.0);
        assert_relative_eq!(back.high_freq, 60_000.0);
    }

    #[test]
    fn test_compressed_view_uses_segment_widths() {
        let info = compressed_info();
        let annotation = Annotation {
            start_time: 1.3,
            end_time: 2.2,
            low_freq: 10_000.0,
            high_freq: 20_000.0,
        };
        let rect = annotation_to_pixels(&annotation, &info).unwrap();
        // second segment: 100 px offset, 150 px for 1.5 s
        assert_relative_eq!(rect.left, 130.0, epsilon = 1e-9);
        assert_relative_eq!(rect.right, 220.0, epsilon = 1e-9);
        assert_relative_eq!(rect.top, 60.0, epsilon = 1e-9);
        assert_relative_eq!(rect.bottom, 80.0, epsilon = 1e-9);

        let back = pixels_to_annotation(&rect, &info).unwrap();
        assert_relative_eq!(back.start_time, 1.3, epsilon = 1e-9);
        assert_relative_eq!(back.end_time, 2.2, epsilon = 1e-9);
        assert_relative_eq!(back.low_freq, 10_000.0, epsilon = 1e-6);
        assert_relative_eq!(back.high_freq, 20_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_segment_edges_stay_inside_segment() {
        let info = compressed_info();
        let rect = PixelRect {
            left: 100.0,
            right: 250.0,
            top: 0.0,
            bottom: 100.0,
        };
        let annotation = pixels_to_annotation(&rect, &info).unwrap();
        assert_relative_eq!(annotation.start_time, 1.0);
        assert_relative_eq!(annotation.end_time, 2.5);
        assert_relative_eq!(annotation.high_freq, 50_000.0);
        assert_relative_eq!(annotation.low_freq, 0.0);
    }

    #[test]
    fn test_rectangle_across_segments_rejected() {
        let rect = PixelRect {
            left: 90.0,
            right: 120.0,
            top: 10.0,
            bottom: 20.0,
        };
        assert_eq!(
            pixels_to_annotation(&rect, &compressed_info()),
            Err(CoordError::SpansSegments { first: 0, last: 1 })
        );
    }

    #[test]
    fn test_rectangle_outside_image_rejected() {
        let rect = PixelRect {
            left: 280.0,
            right: 320.0,
            top: 10.0,
            bottom: 20.0,
        };
        assert!(matches!(
            pixels_to_annotation(&rect, &compressed_info()),
            Err(CoordError::OutOfBounds(_))
        ));

        let annotation = Annotation {
            start_time: 1.0,
            end_time: 2.5,
            low_freq: 5_000.0,
            high_freq: 20_000.0,
        };
        assert!(matches!(
            annotation_to_pixels(&annotation, &full_info()),
            Err(CoordError::OutOfBounds(_))
        ));
    }

    #[test]
    fn test_incomplete_segment_index_rejected() {
        let mut info = compressed_info();
        info.widths = None;
        let annotation = Annotation {
            start_time: 0.1,
            end_time: 0.2,
            low_freq: 1_000.0,
            high_freq: 2_000.0,
        };
        assert!(matches!(
            annotation_to_pixels(&annotation, &info),
            Err(CoordError::Degenerate(_))
        ));
    }
}
