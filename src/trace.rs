//! CPU frame pass: ray generation, integration and environment lookup for
//! every pixel, spread over the rayon pool one row at a time.

use glam::Vec3;
use image::RgbaImage;
use rayon::prelude::*;

use crate::camera::CameraPose;
use crate::config::WormholeConfig;
use crate::environment::{EnvironmentSelector, Universe};
use crate::error::{Result, WormholeError};
use crate::geodesic::{integrate, GeodesicOutcome};
use crate::ray::{initial_state, pixel_uv, ray_direction};

/// Per-frame inputs, written once before the pixel pass and read-only during it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInputs {
    pub pose: CameraPose,
    pub time: f32,
    pub width: u32,
    pub height: u32,
}

impl FrameInputs {
    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(WormholeError::InvalidResolution {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// Result of tracing one pixel, before any colour lookup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelSample {
    pub universe: Universe,
    /// Exit direction before the flow rotation
    pub direction: Vec3,
    pub outcome: GeodesicOutcome,
}

pub fn trace_pixel(config: &WormholeConfig, pose: &CameraPose, x: u32, y: u32, width: u32, height: u32) -> PixelSample {
    let uv = pixel_uv(x, y, width, height);
    let dir = ray_direction(pose, uv, config.zoom);
    let outcome = integrate(&config.metric, &config.integrator, initial_state(&config.metric, pose, dir));
    PixelSample {
        universe: Universe::from_flare(outcome.state.l),
        direction: outcome.exit_direction(dir),
        outcome,
    }
}

fn to_rgba8(color: [f32; 4]) -> [u8; 4] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

/// Render one frame. Pure in its inputs: the same arguments give the same
/// bytes.
pub fn render_frame(config: &WormholeConfig, selector: &EnvironmentSelector, frame: &FrameInputs) -> Result<RgbaImage> {
    frame.validate()?;
    let FrameInputs { pose, time, width, height } = *frame;
    let start = std::time::Instant::now();

    let mut img = RgbaImage::new(width, height);
    img.par_chunks_mut(width as usize * 4)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let sample = trace_pixel(config, &pose, x as u32, y as u32, width, height);
                let color = selector.sample(sample.outcome.state.l, sample.direction, time);
                px.copy_from_slice(&to_rgba8(color));
            }
        });

    log::debug!("cpu frame {}x{} in {:.1}ms", width, height, start.elapsed().as_secs_f32() * 1000.0);
    Ok(img)
}

/// Headless variant of [`render_frame`]: which universe and direction each
/// pixel resolves to, in raster order.
pub fn classify_frame(config: &WormholeConfig, frame: &FrameInputs) -> Result<Vec<PixelSample>> {
    frame.validate()?;
    let FrameInputs { pose, width, height, .. } = *frame;
    Ok((0..width * height)
        .into_par_iter()
        .map(|i| trace_pixel(config, &pose, i % width, i / width, width, height))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::environment::EnvironmentMap;
    use crate::geodesic::Termination;

    fn selector() -> EnvironmentSelector {
        EnvironmentSelector::new(
            Arc::new(EnvironmentMap::from_colors([
                [255, 0, 0, 255],
                [200, 0, 0, 255],
                [150, 0, 0, 255],
                [100, 0, 0, 255],
                [50, 0, 0, 255],
                [25, 0, 0, 255],
            ])),
            Arc::new(EnvironmentMap::from_colors([
                [0, 0, 255, 255],
                [0, 0, 200, 255],
                [0, 0, 150, 255],
                [0, 0, 100, 255],
                [0, 0, 50, 255],
                [0, 0, 25, 255],
            ])),
            0.03,
        )
    }

    fn axial_pose(z: f32, forward: Vec3) -> CameraPose {
        CameraPose {
            position: Vec3::new(0.0, 0.0, z),
            forward,
            right: Vec3::X,
            up: Vec3::Y,
        }
    }

    #[test]
    fn straight_through_ray_is_undeflected() {
        let config = WormholeConfig::default();
        let pose = axial_pose(15.0, Vec3::Z);
        // Centre of an odd-sized frame is uv = (0, 0).
        let sample = trace_pixel(&config, &pose, 2, 2, 5, 5);
        let out = sample.outcome;

        assert_eq!(out.state.h, 0.0);
        assert_eq!(out.state.phi, 0.0);
        assert_eq!(out.state.dl, 1.0);
        assert!(out.steps <= config.integrator.max_steps);
        assert!(out.state.l > 15.0);
        assert_eq!(sample.universe, Universe::A);
        assert_eq!((sample.direction.x, sample.direction.y), (0.0, 0.0));
        assert!(sample.direction.z > 0.0);
    }

    #[test]
    fn straight_ray_from_near_boundary_escapes() {
        let config = WormholeConfig::default();
        let pose = axial_pose(45.0, Vec3::Z);
        let out = trace_pixel(&config, &pose, 0, 0, 1, 1).outcome;
        assert_eq!(out.termination, Termination::Escaped);
        assert!(out.state.l > config.integrator.boundary);
    }

    #[test]
    fn diving_ray_comes_out_in_universe_b() {
        let config = WormholeConfig::default();
        let pose = axial_pose(15.0, -Vec3::Z);
        let sample = trace_pixel(&config, &pose, 0, 0, 1, 1);
        assert_eq!(sample.universe, Universe::B);
    }

    #[test]
    fn sideways_ray_stays_in_starting_universe() {
        let config = WormholeConfig::default();
        let selector = selector();
        for (z, universe) in [(5.0, Universe::A), (-5.0, Universe::B)] {
            let pose = CameraPose {
                position: Vec3::new(0.0, 0.0, z),
                forward: Vec3::X,
                right: -Vec3::Z,
                up: Vec3::Y,
            };
            let sample = trace_pixel(&config, &pose, 0, 0, 1, 1);
            assert_eq!(sample.outcome.state.h, config.metric.l_to_r(z));
            assert_eq!(sample.universe, universe);
            let color = selector.sample(sample.outcome.state.l, sample.direction, 0.0);
            match universe {
                Universe::A => assert_eq!(color[2], 0.0),
                Universe::B => assert_eq!(color[0], 0.0),
            }
        }
    }

    #[test]
    fn identical_inputs_give_identical_frames() {
        let config = WormholeConfig::default();
        let selector = selector();
        let frame = FrameInputs {
            pose: CameraPose::from_angles(Vec3::new(0.3, -0.2, 6.0), -1.9, 0.15),
            time: 12.5,
            width: 48,
            height: 27,
        };
        let first = render_frame(&config, &selector, &frame).unwrap();
        let second = render_frame(&config, &selector, &frame).unwrap();
        assert_eq!(first.dimensions(), (48, 27));
        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn frame_colours_follow_classification() {
        let config = WormholeConfig::default();
        let selector = selector();
        let frame = FrameInputs {
            pose: CameraPose::from_angles(Vec3::new(0.0, 0.0, 4.0), -1.5, 0.0),
            time: 0.0,
            width: 32,
            height: 18,
        };
        let img = render_frame(&config, &selector, &frame).unwrap();
        let samples = classify_frame(&config, &frame).unwrap();
        assert_eq!(samples.len(), 32 * 18);

        for (i, sample) in samples.iter().enumerate() {
            let px = img.get_pixel(i as u32 % 32, i as u32 / 32).0;
            match sample.universe {
                Universe::A => assert_eq!(px[2], 0, "pixel {i}"),
                Universe::B => assert_eq!(px[0], 0, "pixel {i}"),
            }
        }
        assert!(samples.iter().any(|s| s.universe == Universe::A));
        assert!(samples.iter().any(|s| s.universe == Universe::B));
    }

    #[test]
    fn zero_resolution_is_rejected() {
        let config = WormholeConfig::default();
        let frame = FrameInputs {
            pose: axial_pose(15.0, Vec3::Z),
            time: 0.0,
            width: 0,
            height: 10,
        };
        assert!(matches!(
            render_frame(&config, &selector(), &frame),
            Err(WormholeError::InvalidResolution { .. })
        ));
        assert!(classify_frame(&config, &frame).is_err());
    }
}
