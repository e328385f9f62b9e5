// src/color.rs

//! Greyscale intensity codec for the framebuffer's packed ARGB8888 pixels.
//!
//! The framebuffer relayed to the projector holds one `u32` per pixel laid out
//! as `0xAARRGGBB`. Calibration patterns are monochrome, so every pixel this
//! crate produces has `AA = 0xFF` and `RR = GG = BB`.

use crate::response::ResponseCurve;
use thiserror::Error;

/// Fully transparent black. Fresh buffers are zero-filled with this.
pub const BLACK: PackedPixel = 0;

/// Every bit set: opaque white. Used for the "on" side of an edge.
pub const WHITE: PackedPixel = 0xFFFF_FFFF;

const ALPHA_OPAQUE: u32 = 0xFF00_0000;

/// A pixel in the framebuffer's native `0xAARRGGBB` layout.
pub type PackedPixel = u32;

/// Errors raised by the codec and the pattern providers that use it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("intensity {0} is outside 0..=255")]
    IntensityOutOfRange(i64),
    #[error("transition band [{start}, {end}) is empty after clipping to 0..{limit}")]
    EmptyBand { start: i64, end: i64, limit: usize },
    #[error("edge id {0} is not one of 1, 2, 3, 4")]
    InvalidEdge(u8),
    #[error("buffer holds {actual} pixels but {width}x{height} needs {expected}")]
    ShapeMismatch {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },
}

/// An 8-bit greyscale level.
///
/// Construction goes through [`Intensity::new`], which rejects anything
/// outside `0..=255` instead of clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Intensity(u8);

impl Intensity {
    pub const MIN: Intensity = Intensity(0);
    pub const MAX: Intensity = Intensity(255);

    pub fn new(value: i64) -> Result<Self, PatternError> {
        u8::try_from(value)
            .map(Intensity)
            .map_err(|_| PatternError::IntensityOutOfRange(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Normalised level in `[0, 1]`.
    pub fn as_unit(self) -> f64 {
        f64::from(self.0) / 255.0
    }
}

impl From<u8> for Intensity {
    fn from(value: u8) -> Self {
        Intensity(value)
    }
}

/// Packs a grey level into an opaque ARGB pixel.
#[inline]
pub const fn pack_grey(level: u8) -> PackedPixel {
    let v = level as u32;
    ALPHA_OPAQUE | (v << 16) | (v << 8) | v
}

/// Extracts the blue channel, which equals the grey level for pixels built here.
#[inline]
pub const fn grey_level(pixel: PackedPixel) -> u8 {
    (pixel & 0xFF) as u8
}

/// Encodes a raw intensity, optionally pre-distorted through the inverse
/// response curve so the perceived brightness comes out linear.
///
/// Fails with [`PatternError::IntensityOutOfRange`] before doing anything else
/// when `intensity` is outside `0..=255`.
pub fn encode_pixel(
    intensity: i64,
    apply_correction: bool,
    curve: &ResponseCurve,
) -> Result<PackedPixel, PatternError> {
    let intensity = Intensity::new(intensity)?;
    Ok(encode_intensity(intensity, apply_correction, curve))
}

/// Infallible form of [`encode_pixel`] for an already validated level.
pub fn encode_intensity(
    intensity: Intensity,
    apply_correction: bool,
    curve: &ResponseCurve,
) -> PackedPixel {
    if !apply_correction {
        return pack_grey(intensity.value());
    }

    // The only place a level is clamped: the inverse power law can land a hair
    // outside [0, 255] through floating point.
    let corrected = (curve.inverse(intensity.as_unit()) * 255.0).clamp(0.0, 255.0);
    pack_grey(corrected.floor() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn it_should_pack_every_level_with_opaque_alpha_and_equal_channels() {
        let curve = ResponseCurve::default();
        for i in 0..=255i64 {
            let pixel = encode_pixel(i, false, &curve).unwrap();
            assert_eq!(pixel >> 24, 0xFF, "alpha for {}", i);
            let i = i as u32;
            assert_eq!(pixel & 0x00FF_FFFF, i | (i << 8) | (i << 16));
        }
    }

    #[test]
    fn it_should_reject_out_of_range_intensities() {
        let curve = ResponseCurve::default();
        assert_eq!(
            encode_pixel(256, false, &curve),
            Err(PatternError::IntensityOutOfRange(256))
        );
        assert_eq!(
            encode_pixel(-1, true, &curve),
            Err(PatternError::IntensityOutOfRange(-1))
        );
    }

    #[test]
    fn it_should_keep_endpoints_fixed_under_correction() {
        let curve = ResponseCurve::default();
        assert_eq!(encode_pixel(0, true, &curve).unwrap(), 0xFF00_0000);
        assert_eq!(encode_pixel(255, true, &curve).unwrap(), WHITE);
    }

    #[test]
    fn it_should_brighten_midtones_when_correcting() {
        let curve = ResponseCurve::default();
        for i in 1..255i64 {
            let raw = grey_level(encode_pixel(i, false, &curve).unwrap());
            let corrected = grey_level(encode_pixel(i, true, &curve).unwrap());
            assert!(corrected >= raw, "level {} darkened to {}", raw, corrected);
        }
        // (36/255)^(1/2.2) * 255 = 104.7
        assert_eq!(grey_level(encode_pixel(36, true, &curve).unwrap()), 104);
    }
}
