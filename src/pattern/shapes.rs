// src/pattern/shapes.rs

//! Binary knife edges, pyramid quadrants, and flat fields.

use super::PatternBuffer;
use crate::color::{pack_grey, Intensity, WHITE};
use crate::session::Edge;

/// One half-plane on, split at the center:
/// Edge1 `x >= cx`, Edge2 `x < cx`, Edge3 `y >= cy`, Edge4 `y < cy`.
pub fn knife(edge: Edge, (cx, cy): (i64, i64), (width, height): (usize, usize)) -> PatternBuffer {
    let (w, h) = (width as i64, height as i64);
    let (xs, ys) = match edge {
        Edge::Edge1 => (cx..w, 0..h),
        Edge::Edge2 => (0..cx, 0..h),
        Edge::Edge3 => (0..w, cy..h),
        Edge::Edge4 => (0..w, 0..cy),
    };
    let mut buffer = PatternBuffer::new(width, height);
    buffer.fill_rect(xs, ys, WHITE);
    buffer
}

/// One quadrant on, numbered counter-clockwise from `+X+Y`:
/// 1 `(x >= cx, y >= cy)`, 2 `(x < cx, y >= cy)`, 3 `(x < cx, y < cy)`,
/// 4 `(x >= cx, y < cy)`.
pub fn pyramid(
    quadrant: Edge,
    (cx, cy): (i64, i64),
    (width, height): (usize, usize),
) -> PatternBuffer {
    let (w, h) = (width as i64, height as i64);
    let (xs, ys) = match quadrant {
        Edge::Edge1 => (cx..w, cy..h),
        Edge::Edge2 => (0..cx, cy..h),
        Edge::Edge3 => (0..cx, 0..cy),
        Edge::Edge4 => (cx..w, 0..cy),
    };
    let mut buffer = PatternBuffer::new(width, height);
    buffer.fill_rect(xs, ys, WHITE);
    buffer
}

/// Every mirror at `intensity`, never pre-distorted: the flat field exists to
/// measure the raw response at a requested level.
pub fn flat(intensity: Intensity, (width, height): (usize, usize)) -> PatternBuffer {
    PatternBuffer::filled(width, height, pack_grey(intensity.value()))
}
