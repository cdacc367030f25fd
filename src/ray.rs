//! Pinhole ray generation: one initial geodesic state per output pixel.

use glam::{Vec2, Vec3};

use crate::camera::CameraPose;
use crate::geodesic::RayState;
use crate::metric::MetricParameters;

/// Normalised device coordinates of a pixel centre, scaled by the vertical
/// resolution so the horizontal extent follows the aspect ratio.
///
/// `x`/`y` are in raster order (row 0 at the top); `y` is flipped so up is
/// positive.
pub fn pixel_uv(x: u32, y: u32, width: u32, height: u32) -> Vec2 {
    let frag = Vec2::new(x as f32 + 0.5, (height - 1 - y) as f32 + 0.5);
    let res = Vec2::new(width as f32, height as f32);
    (2.0 * frag - res) / res.y
}

pub fn ray_direction(pose: &CameraPose, uv: Vec2, zoom: f32) -> Vec3 {
    (zoom * pose.forward + uv.x * pose.right + uv.y * pose.up).normalize()
}

/// Seed the integrator from the camera's axial position.
pub fn initial_state(metric: &MetricParameters, pose: &CameraPose, dir: Vec3) -> RayState {
    let l0 = pose.position.z;
    let r0 = metric.l_to_r(l0);
    RayState::new(l0, r0 * dir.truncate().length(), dir.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn axial_pose(z: f32) -> CameraPose {
        CameraPose {
            position: Vec3::new(0.0, 0.0, z),
            forward: Vec3::Z,
            right: Vec3::X,
            up: Vec3::Y,
        }
    }

    #[test]
    fn uv_spans_unit_vertically_and_aspect_horizontally() {
        let (w, h) = (200, 100);
        let top_left = pixel_uv(0, 0, w, h);
        let bottom_right = pixel_uv(w - 1, h - 1, w, h);
        assert_abs_diff_eq!(top_left.x, -2.0 + 1.0 / h as f32, epsilon = 1e-6);
        assert_abs_diff_eq!(top_left.y, 1.0 - 1.0 / h as f32, epsilon = 1e-6);
        assert_abs_diff_eq!(bottom_right.x, 2.0 - 1.0 / h as f32, epsilon = 1e-6);
        assert_abs_diff_eq!(bottom_right.y, -1.0 + 1.0 / h as f32, epsilon = 1e-6);
    }

    #[test]
    fn centre_ray_follows_forward() {
        let pose = axial_pose(15.0);
        let dir = ray_direction(&pose, Vec2::ZERO, 1.0);
        assert_eq!(dir, Vec3::Z);
    }

    #[test]
    fn zoom_narrows_field_of_view() {
        let pose = axial_pose(15.0);
        let wide = ray_direction(&pose, Vec2::new(1.0, 0.0), 1.0);
        let narrow = ray_direction(&pose, Vec2::new(1.0, 0.0), 3.0);
        assert!(narrow.dot(pose.forward) > wide.dot(pose.forward));
    }

    #[test]
    fn seeds_h_from_throat_radius() {
        let metric = MetricParameters::default();
        let pose = axial_pose(1.0);
        let dir = ray_direction(&pose, Vec2::new(1.0, 0.0), 1.0);
        let state = initial_state(&metric, &pose, dir);
        assert_eq!(state.l, 1.0);
        assert_abs_diff_eq!(state.h, metric.rho * std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-6);
        assert_abs_diff_eq!(state.dl, std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-6);
        assert_eq!(state.phi, 0.0);
    }

    #[test]
    fn axial_ray_has_no_angular_momentum() {
        let metric = MetricParameters::default();
        let pose = axial_pose(15.0);
        let state = initial_state(&metric, &pose, Vec3::Z);
        assert_eq!(state.h, 0.0);
        assert_eq!(state.dl, 1.0);
    }
}
