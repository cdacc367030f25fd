use std::f32::consts::FRAC_PI_2;

use glam::Vec3;

pub const WORLD_UP: Vec3 = Vec3::Y;

/// Camera position plus orthonormal frame, fixed for one frame.
///
/// `position.z` doubles as the camera's flare coordinate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

impl CameraPose {
    /// Build the frame from yaw/pitch. Pitch must stay strictly inside the
    /// poles or `right` degenerates.
    pub fn from_angles(position: Vec3, yaw: f32, pitch: f32) -> Self {
        let forward = Vec3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        );
        let right = forward.cross(WORLD_UP).normalize();
        let up = right.cross(forward);
        Self { position, forward, right, up }
    }

    /// Get camera uniform data for GPU
    pub fn uniform_data(&self, width: u32, height: u32, zoom: f32) -> CameraUniform {
        CameraUniform {
            position: self.position.extend(0.0).to_array(),
            forward: self.forward.extend(0.0).to_array(),
            right: self.right.extend(0.0).to_array(),
            up: self.up.extend(0.0).to_array(),
            resolution: [width as f32, height as f32],
            zoom,
            _padding: 0.0,
        }
    }
}

/// Movement intent along one camera axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveAxis {
    Strafe,
    Vertical,
    Forward,
}

/// Free-fly controller: mouse look plus WASD/QE style movement.
#[derive(Clone, Debug)]
pub struct FlyCamera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    /// x = strafe, y = vertical, z = forward; each component in {-1, 0, 1}
    pub velocity: Vec3,
    pub speed: f32,
    pub sensitivity: f32,
    pub pitch_margin: f32,
}

impl FlyCamera {
    pub fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        Self {
            position,
            yaw,
            pitch,
            velocity: Vec3::ZERO,
            speed: 3.0,
            sensitivity: 0.005,
            pitch_margin: 0.01,
        }
    }

    pub fn look(&mut self, dx: f32, dy: f32) {
        let limit = FRAC_PI_2 - self.pitch_margin;
        self.yaw += dx * self.sensitivity;
        self.pitch = (self.pitch - dy * self.sensitivity).clamp(-limit, limit);
    }

    pub fn press(&mut self, axis: MoveAxis, dir: f32) {
        *self.axis_mut(axis) = dir;
    }

    /// Clear an axis only if it still holds this key's direction, so releasing
    /// A while D is held does not stop the strafe.
    pub fn release(&mut self, axis: MoveAxis, dir: f32) {
        let v = self.axis_mut(axis);
        if *v == dir {
            *v = 0.0;
        }
    }

    fn axis_mut(&mut self, axis: MoveAxis) -> &mut f32 {
        match axis {
            MoveAxis::Strafe => &mut self.velocity.x,
            MoveAxis::Vertical => &mut self.velocity.y,
            MoveAxis::Forward => &mut self.velocity.z,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        let pose = self.pose();
        let motion = pose.right * self.velocity.x
            + WORLD_UP * self.velocity.y
            + pose.forward * self.velocity.z;
        self.position += motion * self.speed * dt;
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose::from_angles(self.position, self.yaw, self.pitch)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub position: [f32; 4],
    pub forward: [f32; 4],
    pub right: [f32; 4],
    pub up: [f32; 4],
    pub resolution: [f32; 2],
    pub zoom: f32,
    pub _padding: f32,
}
