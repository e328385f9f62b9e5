// src/pattern/ramp.rs

//! Knife edges with a linear grey transition band ("ramps").
//!
//! ```text
//!   Edge1 |  ░█|   Edge2 |█░  |   Edge3 |    |   Edge4 |████|
//!         |  ░█|         |█░  |         |░░░░|         |░░░░|
//!                                       |████|         |    |
//! ```
//!
//! The band is `width` mirrors wide and centered on the pattern center. An odd
//! width cannot straddle the center symmetrically, so the band gains one extra
//! mirror on its far side, which tilts the edge by one mirror.

use super::{PatternBuffer, PatternError};
use crate::color::{encode_intensity, Intensity, PackedPixel, WHITE};
use crate::response::ResponseCurve;
use crate::session::Edge;
use std::ops::Range;

/// Mirrors covered by the transition band along one axis, clipped to `0..limit`.
///
/// Fails with [`PatternError::EmptyBand`] when nothing is left after clipping,
/// which happens for `width == 0` or when the center has been moved off the DMD.
pub fn transition_band(center: i64, width: u32, limit: usize) -> Result<Range<usize>, PatternError> {
    let half = i64::from(width / 2);
    let start = center - half;
    let mut end = center + half;
    if width % 2 == 1 {
        end += 1;
    }

    let band = super::clip(start..end, limit);
    if band.is_empty() {
        return Err(PatternError::EmptyBand { start, end, limit });
    }
    Ok(band)
}

/// `n` levels evenly spaced from 0 to 255, truncated to integers.
pub fn linear_levels(n: usize) -> Vec<Intensity> {
    match n {
        0 => Vec::new(),
        1 => vec![Intensity::MIN],
        _ => {
            let last = (n - 1) as u64;
            (0..n as u64)
                .map(|i| Intensity::from((i * 255 / last) as u8))
                .collect()
        }
    }
}

/// The band's pixel sequence, dark to bright.
pub fn gradient(n: usize, correction: bool, curve: &ResponseCurve) -> Vec<PackedPixel> {
    linear_levels(n)
        .into_iter()
        .map(|level| encode_intensity(level, correction, curve))
        .collect()
}

/// Renders ramp `edge` centered on `(cx, cy)` into a `dims` buffer.
///
/// Outside the band one side stays black (`0`) and the other is filled with
/// [`WHITE`]. `Edge2`/`Edge4` reverse the gradient and swap those sides
/// relative to `Edge1`/`Edge3`.
pub fn render(
    edge: Edge,
    width: u32,
    (cx, cy): (i64, i64),
    (dmd_width, dmd_height): (usize, usize),
    correction: bool,
    curve: &ResponseCurve,
) -> Result<PatternBuffer, PatternError> {
    let (center, limit) = if edge.is_horizontal() {
        (cx, dmd_width)
    } else {
        (cy, dmd_height)
    };
    let band = transition_band(center, width, limit)?;
    if width % 2 == 1 {
        log::trace!("Odd ramp width {} tilts the edge by one mirror", width);
    }

    let mut levels = gradient(band.len(), correction, curve);
    let mut buffer = PatternBuffer::new(dmd_width, dmd_height);
    let (lo, hi) = (band.start as i64, band.end as i64);
    let (w, h) = (dmd_width as i64, dmd_height as i64);

    match edge {
        Edge::Edge1 => {
            buffer.paint_columns(band.start, &levels);
            buffer.fill_rect(hi..w, 0..h, WHITE);
        }
        Edge::Edge2 => {
            levels.reverse();
            buffer.paint_columns(band.start, &levels);
            buffer.fill_rect(0..lo, 0..h, WHITE);
        }
        Edge::Edge3 => {
            buffer.paint_rows(band.start, &levels);
            buffer.fill_rect(0..w, hi..h, WHITE);
        }
        Edge::Edge4 => {
            levels.reverse();
            buffer.paint_rows(band.start, &levels);
            buffer.fill_rect(0..w, 0..lo, WHITE);
        }
    }

    Ok(buffer)
}
