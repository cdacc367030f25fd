//! Wormhole shape: embedding radius as a function of the flare coordinate `l`.

use std::f32::consts::PI;

use crate::error::{Result, WormholeError};

/// Shape parameters of the wormhole. Fixed for the lifetime of the process.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MetricParameters {
    /// Throat radius
    pub rho: f32,
    /// Half-length of the flat collar around the throat
    pub a: f32,
    /// Mass-like steepness of the flare
    pub mass: f32,
}

impl Default for MetricParameters {
    fn default() -> Self {
        Self { rho: 2.0, a: 2.0, mass: 0.3 }
    }
}

impl MetricParameters {
    pub fn new(rho: f32, a: f32, mass: f32) -> Result<Self> {
        if !(rho > 0.0) {
            return Err(WormholeError::InvalidMetric("throat radius must be positive"));
        }
        if !(a >= 0.0) {
            return Err(WormholeError::InvalidMetric("lens width must be non-negative"));
        }
        if !(mass > 0.0) {
            return Err(WormholeError::InvalidMetric("mass must be positive"));
        }
        Ok(Self { rho, a, mass })
    }

    /// Dimensionless distance past the collar edge, clamped at 0 inside it.
    #[inline]
    fn flare(&self, l: f32) -> f32 {
        (2.0 * (l.abs() - self.a) / (PI * self.mass)).max(0.0)
    }

    /// Embedding radius `r(l)`. Exactly `rho` on `|l| <= a`.
    #[inline]
    pub fn l_to_r(&self, l: f32) -> f32 {
        let x = self.flare(l);
        self.rho + self.mass * (x * x.atan() - 0.5 * (1.0 + x * x).ln())
    }

    /// `dr/dl`, odd in `l`, exactly 0 on `|l| <= a`.
    #[inline]
    pub fn l_to_dr(&self, l: f32) -> f32 {
        let x = self.flare(l);
        2.0 * x.atan() * sign(l) / PI
    }
}

/// GLSL-style sign: 0 at 0, unlike `f32::signum`.
#[inline]
pub fn sign(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}
