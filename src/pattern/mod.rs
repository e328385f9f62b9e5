// src/pattern/mod.rs

//! Calibration pattern synthesis at DMD mirror resolution.
//!
//! Every pattern family is produced by one [`PatternGenerator`], which reads a
//! [`SessionSnapshot`] and dispatches on its [`PatternFamily`]. Buffers are
//! row-major, indexed `(x, y)` with `x` along the mirror row, and always have
//! the configured DMD dimensions regardless of the family or edge.

pub mod ramp;
pub mod shapes;

#[cfg(test)]
mod tests;

use crate::color::{PackedPixel, BLACK};
use crate::resample::upscale_nearest;
use crate::response::ResponseCurve;
use crate::session::{Offset, PatternFamily, SessionSnapshot};
use std::ops::Range;

pub use crate::color::PatternError;

/// A 2D grid of packed pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternBuffer {
    width: usize,
    height: usize,
    pixels: Vec<PackedPixel>,
}

impl PatternBuffer {
    /// A zero-filled (black) buffer.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, BLACK)
    }

    pub fn filled(width: usize, height: usize, value: PackedPixel) -> Self {
        PatternBuffer {
            width,
            height,
            pixels: vec![value; width * height],
        }
    }

    pub fn from_pixels(
        width: usize,
        height: usize,
        pixels: Vec<PackedPixel>,
    ) -> Result<Self, PatternError> {
        if pixels.len() != width * height {
            return Err(PatternError::ShapeMismatch {
                width,
                height,
                expected: width * height,
                actual: pixels.len(),
            });
        }
        Ok(PatternBuffer {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn get(&self, x: usize, y: usize) -> Option<PackedPixel> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y * self.width + x).copied()
    }

    pub fn pixels(&self) -> &[PackedPixel] {
        &self.pixels
    }

    pub fn row(&self, y: usize) -> &[PackedPixel] {
        let start = y * self.width;
        &self.pixels[start..start + self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [PackedPixel] {
        let start = y * self.width;
        &mut self.pixels[start..start + self.width]
    }

    /// Copies row `src` over row `dst`.
    pub fn copy_row_within(&mut self, src: usize, dst: usize) {
        let width = self.width;
        self.pixels
            .copy_within(src * width..(src + 1) * width, dst * width);
    }

    /// Fills the rectangle `xs` x `ys`, clipped to the buffer. Bounds may be
    /// negative or past the edge; nothing outside the buffer is touched.
    pub fn fill_rect(&mut self, xs: Range<i64>, ys: Range<i64>, value: PackedPixel) {
        let xs = clip(xs, self.width);
        let ys = clip(ys, self.height);
        if xs.is_empty() {
            return;
        }
        for y in ys {
            self.row_mut(y)[xs.clone()].fill(value);
        }
    }

    /// Writes `values` into columns `start..start + values.len()` of every row.
    pub(crate) fn paint_columns(&mut self, start: usize, values: &[PackedPixel]) {
        for y in 0..self.height {
            self.row_mut(y)[start..start + values.len()].copy_from_slice(values);
        }
    }

    /// Fills row `start + i` with `values[i]`.
    pub(crate) fn paint_rows(&mut self, start: usize, values: &[PackedPixel]) {
        for (i, &value) in values.iter().enumerate() {
            self.row_mut(start + i).fill(value);
        }
    }
}

/// Clamps a signed range to `0..limit`.
pub(crate) fn clip(range: Range<i64>, limit: usize) -> Range<usize> {
    let limit = limit as i64;
    let start = range.start.clamp(0, limit);
    let end = range.end.clamp(start, limit);
    start as usize..end as usize
}

/// The pattern-provider capability the frame streamer depends on.
pub trait PatternProvider {
    /// Builds the display-ready frame for `state`.
    fn render(&self, state: &SessionSnapshot) -> Result<PatternBuffer, PatternError>;
}

/// Builds every pattern family for one DMD and display geometry.
#[derive(Debug, Clone)]
pub struct PatternGenerator {
    dmd_width: usize,
    dmd_height: usize,
    display_width: usize,
    display_height: usize,
    curve: ResponseCurve,
}

impl PatternGenerator {
    pub fn new(
        (dmd_width, dmd_height): (usize, usize),
        (display_width, display_height): (usize, usize),
        curve: ResponseCurve,
    ) -> Self {
        PatternGenerator {
            dmd_width,
            dmd_height,
            display_width,
            display_height,
            curve,
        }
    }

    pub fn from_config(config: &crate::config::Config) -> Self {
        let geometry = &config.geometry;
        Self::new(
            (geometry.dmd_width, geometry.dmd_height),
            (geometry.display_width, geometry.display_height),
            config.response.curve(),
        )
    }

    pub fn dmd_dimensions(&self) -> (usize, usize) {
        (self.dmd_width, self.dmd_height)
    }

    /// Pattern center in mirrors: the middle of the DMD displaced by `offset`.
    pub fn center(&self, offset: Offset) -> (i64, i64) {
        (
            (self.dmd_width / 2) as i64 + i64::from(offset.right),
            (self.dmd_height / 2) as i64 + i64::from(offset.up),
        )
    }

    /// Builds the DMD-resolution buffer for `state`.
    pub fn generate(&self, state: &SessionSnapshot) -> Result<PatternBuffer, PatternError> {
        let (cx, cy) = self.center(state.offset);
        let dims = self.dmd_dimensions();
        match state.family {
            PatternFamily::Ramp => ramp::render(
                state.edge,
                state.width,
                (cx, cy),
                dims,
                state.correction,
                &self.curve,
            ),
            PatternFamily::Knife => Ok(shapes::knife(state.edge, (cx, cy), dims)),
            PatternFamily::Pyramid => Ok(shapes::pyramid(state.edge, (cx, cy), dims)),
            PatternFamily::Flat => Ok(shapes::flat(state.flat_intensity, dims)),
        }
    }
}

impl PatternProvider for PatternGenerator {
    fn render(&self, state: &SessionSnapshot) -> Result<PatternBuffer, PatternError> {
        let dmd = self.generate(state)?;
        Ok(upscale_nearest(
            &dmd,
            self.display_width,
            self.display_height,
        ))
    }
}
