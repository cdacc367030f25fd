//! Fixed-step geodesic integrator in the wormhole embedding.
//!
//! A ray is reduced to its flare coordinate `l`, axial rate `dl`, azimuth `phi`
//! and the conserved transverse invariant `h`. Each step is one explicit Euler
//! update with `r` and `dr` sampled at the pre-update `l`. Keep that order:
//! rendered output is defined by this exact discretisation.

use glam::{Vec2, Vec3};

use crate::metric::MetricParameters;

/// Transverse components shorter than this are treated as an on-axis ray.
pub const TRANSVERSE_EPSILON: f32 = 1e-5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntegratorSettings {
    pub dt: f32,
    pub max_steps: u32,
    /// `|l|` beyond which a ray has escaped into one of the asymptotic regions
    pub boundary: f32,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self { dt: 0.05, max_steps: 500, boundary: 50.0 }
    }
}

/// Per-ray integration state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayState {
    pub l: f32,
    /// Conserved for the whole integration; never written by [`RayState::step`].
    pub h: f32,
    pub dl: f32,
    pub phi: f32,
}

impl RayState {
    pub fn new(l: f32, h: f32, dl: f32) -> Self {
        Self { l, h, dl, phi: 0.0 }
    }

    /// Advance one Euler step, returning the radius used for it.
    #[inline]
    pub fn step(&mut self, metric: &MetricParameters, dt: f32) -> f32 {
        let r = metric.l_to_r(self.l);
        let dr = metric.l_to_dr(self.l);
        self.l += self.dl * dt;
        self.phi += self.h / (r * r) * dt;
        self.dl += self.h * self.h * dr / (r * r * r) * dt;
        r
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// `|l|` crossed the boundary
    Escaped,
    /// Step budget used up
    StepLimit,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeodesicOutcome {
    pub state: RayState,
    /// Radius evaluated by the last step (the initial radius if no step ran)
    pub r: f32,
    /// Slope at the final `l`
    pub dr: f32,
    pub steps: u32,
    pub termination: Termination,
}

pub fn integrate(
    metric: &MetricParameters,
    settings: &IntegratorSettings,
    initial: RayState,
) -> GeodesicOutcome {
    let mut state = initial;
    let mut r = metric.l_to_r(state.l);
    let mut steps = 0;
    let mut termination = Termination::StepLimit;

    while steps < settings.max_steps {
        r = state.step(metric, settings.dt);
        steps += 1;
        if state.l.abs() > settings.boundary {
            termination = Termination::Escaped;
            break;
        }
    }

    GeodesicOutcome {
        state,
        r,
        dr: metric.l_to_dr(state.l),
        steps,
        termination,
    }
}

/// Unit direction of the ray's component perpendicular to the wormhole axis,
/// or zero for a ray aimed along the axis.
pub fn transverse_unit(dir: Vec3) -> Vec2 {
    let xy = dir.truncate();
    if xy.length() > TRANSVERSE_EPSILON {
        xy.normalize()
    } else {
        Vec2::ZERO
    }
}

impl GeodesicOutcome {
    /// Axial and transverse velocity components after the final step.
    pub fn exit_components(&self) -> (f32, f32) {
        let RayState { h, dl, phi, .. } = self.state;
        let (sin, cos) = phi.sin_cos();
        let dx = dl * self.dr * cos - h / self.r * sin;
        let dy = dl * self.dr * sin + h / self.r * cos;
        (dx, dy)
    }

    /// Rebuild a 3-D direction from the final state, rotating the transverse
    /// component back into the plane of `initial_dir`. A state with no
    /// resolvable direction leaves the ray undeflected.
    pub fn exit_direction(&self, initial_dir: Vec3) -> Vec3 {
        let (dx, dy) = self.exit_components();
        let perp = transverse_unit(initial_dir) * dy;
        Vec3::new(perp.x, perp.y, dx)
            .try_normalize()
            .unwrap_or(initial_dir)
    }
}
