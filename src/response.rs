// src/response.rs

//! Power-law model of the DMD's duty-cycle to perceived-brightness response.
//!
//! `forward` maps a linear drive level to what the eye (or detector) reports;
//! `inverse` undoes it. The codec runs requested intensities through `inverse`
//! so that after the device applies `forward` the result is linear again.

use serde::{Deserialize, Serialize};

/// Parameters `(A, gamma)` of `output = A * input^gamma`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseCurve {
    pub amplitude: f64,
    pub gamma: f64,
}

impl Default for ResponseCurve {
    fn default() -> Self {
        ResponseCurve {
            amplitude: 1.0,
            gamma: 2.2,
        }
    }
}

impl ResponseCurve {
    pub fn new(amplitude: f64, gamma: f64) -> Self {
        ResponseCurve { amplitude, gamma }
    }

    /// `A * level^gamma`. Negative input is floored at zero so the power stays real.
    pub fn forward(&self, level: f64) -> f64 {
        self.amplitude * level.max(0.0).powf(self.gamma)
    }

    /// `(level / A)^(1 / gamma)`. Negative input is floored at zero.
    pub fn inverse(&self, level: f64) -> f64 {
        (level.max(0.0) / self.amplitude).powf(self.gamma.recip())
    }

    pub fn forward_all(&self, levels: &mut [f64]) {
        for level in levels.iter_mut() {
            *level = self.forward(*level);
        }
    }

    pub fn inverse_all(&self, levels: &mut [f64]) {
        for level in levels.iter_mut() {
            *level = self.inverse(*level);
        }
    }
}
