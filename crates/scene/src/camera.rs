//! Fly camera.

use glam::{Mat4, Vec3};

/// Perspective camera looking down -Z.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    /// World units per second at full motion intent
    pub speed: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 6.0, 10.0),
            fov_y: 70.0_f32.to_radians(),
            near: 0.1,
            far: 200.0,
            speed: 5.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, Vec3::NEG_Z, Vec3::Y)
    }

    /// Projection matrix with Y flipped for Vulkan clip space.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far);
        proj.y_axis.y *= -1.0;
        proj
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// Moves the camera along a world-space intent vector.
    ///
    /// Each component of `intent` is expected in `-1.0..=1.0`.
    pub fn apply_motion(&mut self, intent: Vec3, dt: f32) {
        self.position += intent * self.speed * dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn test_view_moves_world_opposite_to_camera() {
        let camera = Camera::new().with_position(Vec3::new(0.0, 6.0, 10.0));
        let origin = camera.view_matrix() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!((origin.truncate() - Vec3::new(0.0, -6.0, -10.0)).length() < 1e-5);
    }

    #[test]
    fn test_projection_flips_y() {
        let camera = Camera::new();
        let flipped = camera.projection_matrix(1.0);
        let plain = Mat4::perspective_rh(camera.fov_y, 1.0, camera.near, camera.far);
        assert_eq!(flipped.y_axis.y, -plain.y_axis.y);
        assert_eq!(flipped.x_axis, plain.x_axis);
    }

    #[test]
    fn test_point_above_camera_lands_in_upper_half() {
        let camera = Camera::new().with_position(Vec3::ZERO);
        let clip = camera.view_projection(1.0) * Vec4::new(0.0, 1.0, -5.0, 1.0);
        // Vulkan NDC has +Y pointing down.
        assert!(clip.y / clip.w < 0.0);
    }

    #[test]
    fn test_apply_motion_scales_by_speed_and_dt() {
        let mut camera = Camera::new().with_position(Vec3::ZERO);
        camera.speed = 2.0;
        camera.apply_motion(Vec3::new(1.0, 0.0, -1.0), 0.5);
        assert_eq!(camera.position, Vec3::new(1.0, 0.0, -1.0));

        camera.apply_motion(Vec3::ZERO, 10.0);
        assert_eq!(camera.position, Vec3::new(1.0, 0.0, -1.0));
    }
}
