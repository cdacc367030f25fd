use std::path::PathBuf;

use glam::Vec3;

use crate::camera::FlyCamera;
use crate::geodesic::IntegratorSettings;
use crate::metric::MetricParameters;

/// Everything the per-pixel core needs besides the camera and time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WormholeConfig {
    pub metric: MetricParameters,
    pub integrator: IntegratorSettings,
    pub zoom: f32,
    /// Radians per second of skybox drift in universe A
    pub flow_speed: f32,
}

impl Default for WormholeConfig {
    fn default() -> Self {
        Self {
            metric: MetricParameters::default(),
            integrator: IntegratorSettings::default(),
            zoom: 1.0,
            flow_speed: 0.03,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub wormhole: WormholeConfig,
    pub width: u32,
    pub height: u32,
    pub skybox_a: PathBuf,
    pub skybox_b: PathBuf,
    pub start_position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub speed: f32,
    pub sensitivity: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            wormhole: WormholeConfig::default(),
            width: 1280,
            height: 720,
            skybox_a: PathBuf::from("skybox1"),
            skybox_b: PathBuf::from("skybox2"),
            start_position: Vec3::new(0.0, 0.0, 15.0),
            yaw: (-90.0f32).to_radians(),
            pitch: 0.0,
            speed: 3.0,
            sensitivity: 0.005,
        }
    }
}

impl ViewerConfig {
    pub fn camera(&self) -> FlyCamera {
        FlyCamera {
            speed: self.speed,
            sensitivity: self.sensitivity,
            ..FlyCamera::new(self.start_position, self.yaw, self.pitch)
        }
    }
}
