//! Orbit camera for viewing the wave surface

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use std::f32::consts::PI;

/// Camera uniform data for GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 3],
    pub _padding: f32,
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            camera_pos: [0.0, 0.0, 1.0],
            _padding: 0.0,
        }
    }
}

/// Orbit camera that rotates around a target point
pub struct Camera {
    /// Target point to look at
    pub target: Vec3,
    /// Distance from target
    pub distance: f32,
    /// Horizontal angle (radians)
    pub yaw: f32,
    /// Vertical angle (radians, clamped)
    pub pitch: f32,
    /// Field of view (radians)
    pub fov: f32,
    /// Aspect ratio (width / height)
    pub aspect: f32,
    /// Near clipping plane
    pub near: f32,
    /// Far clipping plane
    pub far: f32,
}

impl Camera {
    /// Create a new camera with given aspect ratio, placed slightly above
    /// the surface looking at the origin.
    pub fn new(aspect: f32) -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 3.4,
            yaw: 0.0,
            pitch: 0.46, // roughly (0, 1.5, 3) relative to the origin
            fov: 75.0_f32.to_radians(),
            aspect,
            near: 0.1,
            far: 1000.0,
        }
    }

    /// Calculate camera position from orbit parameters
    pub fn position(&self) -> Vec3 {
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        self.target + Vec3::new(x, y, z)
    }

    /// Rotate camera around target
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        self.yaw += delta_x * 0.01;
        self.pitch += delta_y * 0.01;

        // Clamp pitch to avoid gimbal lock
        let max_pitch = PI / 2.0 - 0.01;
        self.pitch = self.pitch.clamp(-max_pitch, max_pitch);
    }

    /// Zoom in/out
    pub fn zoom(&mut self, delta: f32) {
        self.distance *= 1.0 - delta * 0.1;
        self.distance = self.distance.clamp(0.5, 200.0);
    }

    /// Set aspect ratio (call on viewport resize)
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Get camera uniform for GPU
    pub fn uniform(&self) -> CameraUniform {
        CameraUniform {
            view_proj: self.view_projection_matrix().to_cols_array_2d(),
            camera_pos: self.position().to_array(),
            _padding: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_creation() {
        let camera = Camera::new(16.0 / 9.0);
        assert!(camera.distance > 0.0);
        assert!(camera.fov > 0.0);
    }

    #[test]
    fn test_camera_position_at_distance() {
        let camera = Camera::new(1.0);
        let pos = camera.position();
        assert!((pos.length() - camera.distance).abs() < 0.001);
    }

    #[test]
    fn test_camera_uniform_size() {
        // Must stay aligned for the GPU uniform buffer
        assert_eq!(std::mem::size_of::<CameraUniform>(), 80);
    }

    #[test]
    fn test_pitch_clamping() {
        let mut camera = Camera::new(1.0);
        camera.orbit(0.0, 10000.0);
        assert!(camera.pitch <= PI / 2.0 - 0.01);
        camera.orbit(0.0, -20000.0);
        assert!(camera.pitch >= -(PI / 2.0 - 0.01));
    }

    #[test]
    fn test_zoom_bounds() {
        let mut camera = Camera::new(1.0);
        camera.zoom(1000.0);
        assert!(camera.distance >= 0.5);
        camera.zoom(-1000.0);
        assert!(camera.distance <= 200.0);
    }

    #[test]
    fn test_set_aspect_is_idempotent() {
        // Repeated resize to the same dimensions must not drift
        let mut camera = Camera::new(16.0 / 9.0);
        camera.set_aspect(4.0 / 3.0);
        let proj_once = camera.projection_matrix();
        camera.set_aspect(4.0 / 3.0);
        camera.set_aspect(4.0 / 3.0);
        assert_eq!(camera.projection_matrix(), proj_once);
        assert!((camera.aspect - 4.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_view_projection_invertible() {
        let camera = Camera::new(1.0);
        assert!(camera.view_matrix().determinant().abs() > 0.001);
        assert!(camera.projection_matrix().determinant().abs() > 0.001);
    }

    #[test]
    fn test_orbit_changes_position() {
        let mut camera = Camera::new(1.0);
        let before = camera.position();
        camera.orbit(50.0, 25.0);
        assert!((before - camera.position()).length() > 0.001);
    }
}
