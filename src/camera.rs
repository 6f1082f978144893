use std::f32::consts::{FRAC_PI_2, TAU};
use std::time::Duration;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.0001;
pub const Z_NEAR: f32 = 0.1;
pub const Z_FAR: f32 = 100.0;

/// Fly camera described by a position and yaw/pitch angles in radians.
///
/// A yaw of -90° looks down -Z, matching the default orientation of the
/// scene file's camera object.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fovy: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            yaw: (-90.0f32).to_radians(),
            pitch: 0.0,
            fovy: 90.0f32.to_radians(),
        }
    }
}

impl Camera {
    pub fn front(&self) -> Vec3 {
        let (yaw_s, yaw_c) = self.yaw.sin_cos();
        let (pitch_s, pitch_c) = self.pitch.sin_cos();
        Vec3::new(yaw_c * pitch_c, pitch_s, yaw_s * pitch_c).normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.front().cross(Vec3::Y).normalize()
    }

    pub fn up(&self) -> Vec3 {
        self.right().cross(self.front()).normalize()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.front(), self.up())
    }

    /// Perspective projection with wgpu's 0..1 depth range.
    pub fn projection_matrix(&self, aspect: f32, znear: f32, zfar: f32) -> Mat4 {
        Mat4::perspective_rh(self.fovy, aspect.max(0.01), znear, zfar)
    }

    pub fn uniform(&self, aspect: f32) -> CameraUniform {
        CameraUniform {
            view: self.view_matrix().to_cols_array_2d(),
            projection: self.projection_matrix(aspect, Z_NEAR, Z_FAR).to_cols_array_2d(),
            position: self.position.extend(1.0).into(),
        }
    }
}

/// Movement keys understood by [`CameraController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    Forward,
    Backward,
    Left,
    Right,
}

/// Accumulates keyboard and mouse input between frames and applies it to a
/// [`Camera`].
#[derive(Debug, Clone)]
pub struct CameraController {
    forward: f32,
    backward: f32,
    left: f32,
    right: f32,
    rotate_horizontal: f32,
    rotate_vertical: f32,
    pub speed: f32,
    pub sensitivity: f32,
}

impl Default for CameraController {
    fn default() -> Self {
        Self {
            forward: 0.0,
            backward: 0.0,
            left: 0.0,
            right: 0.0,
            rotate_horizontal: 0.0,
            rotate_vertical: 0.0,
            speed: 2.5,
            sensitivity: 1.0,
        }
    }
}

impl CameraController {
    pub fn set_movement(&mut self, movement: Movement, pressed: bool) {
        let amount = if pressed { 1.0 } else { 0.0 };
        match movement {
            Movement::Forward => self.forward = amount,
            Movement::Backward => self.backward = amount,
            Movement::Left => self.left = amount,
            Movement::Right => self.right = amount,
        }
    }

    pub fn mouse_motion(&mut self, dx: f64, dy: f64) {
        self.rotate_horizontal = dx as f32;
        self.rotate_vertical = dy as f32;
    }

    pub fn update_camera(&mut self, camera: &mut Camera, dt: Duration) {
        let dt = dt.as_secs_f32();

        let front = camera.front();
        let right = camera.right();
        camera.position += front * (self.forward - self.backward) * self.speed * dt;
        camera.position += right * (self.right - self.left) * self.speed * dt;

        camera.yaw = (camera.yaw + self.rotate_horizontal * self.sensitivity * dt) % TAU;
        camera.pitch = (camera.pitch - self.rotate_vertical * self.sensitivity * dt)
            .clamp(-PITCH_LIMIT, PITCH_LIMIT);

        // Mouse deltas are per event, not held state.
        self.rotate_horizontal = 0.0;
        self.rotate_vertical = 0.0;
    }
}

/// Group 0, binding 0 of both passes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub position: [f32; 4],
}

impl CameraUniform {
    pub fn view(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.view)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.projection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_is_two_matrices_and_a_vec4() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 144);
    }

    #[test]
    fn default_camera_looks_down_negative_z() {
        let camera = Camera::default();
        assert!((camera.front() - Vec3::NEG_Z).length() < 1e-5);
        assert!((camera.up() - Vec3::Y).length() < 1e-5);
        let view = camera.view_matrix();
        let ahead = view.transform_point3(Vec3::new(0.0, 0.0, -3.0));
        assert!((ahead - Vec3::new(0.0, 0.0, -3.0)).length() < 1e-5);
    }

    #[test]
    fn projection_maps_near_plane_to_zero_depth() {
        let camera = Camera::default();
        let projection = camera.projection_matrix(1.0, Z_NEAR, Z_FAR);
        let clip = projection * Vec3::new(0.0, 0.0, -Z_NEAR).extend(1.0);
        assert!((clip.z / clip.w).abs() < 1e-5);
    }

    #[test]
    fn forward_movement_follows_front() {
        let mut camera = Camera::default();
        let mut controller = CameraController::default();
        controller.set_movement(Movement::Forward, true);
        controller.update_camera(&mut camera, Duration::from_secs(1));
        assert!((camera.position - Vec3::new(0.0, 0.0, -2.5)).length() < 1e-4);

        controller.set_movement(Movement::Forward, false);
        controller.update_camera(&mut camera, Duration::from_secs(1));
        assert!((camera.position - Vec3::new(0.0, 0.0, -2.5)).length() < 1e-4);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = Camera::default();
        let mut controller = CameraController::default();
        controller.mouse_motion(0.0, -1000.0);
        controller.update_camera(&mut camera, Duration::from_secs(1));
        assert!(camera.pitch <= PITCH_LIMIT);
        assert!(camera.front().is_finite());
    }

    #[test]
    fn mouse_motion_is_consumed_once() {
        let mut camera = Camera::default();
        let mut controller = CameraController::default();
        controller.mouse_motion(0.5, 0.0);
        controller.update_camera(&mut camera, Duration::from_secs(1));
        let yaw = camera.yaw;
        controller.update_camera(&mut camera, Duration::from_secs(1));
        assert_eq!(camera.yaw, yaw);
    }
}
