//! Definition of the camera data read while binding.

use crate::matrix::Mat4;

#[derive(Clone, Debug, PartialEq)]
/// A 3D camera.
pub struct Camera {
    /// Position.
    pub position: [f32; 3],
    /// World to view transform.
    pub view: Mat4,
    /// View to clip transform.
    pub projection: Mat4,
    /// Near clipping plane distance.
    pub near: f32,
    /// Far clipping plane distance.
    pub far: f32,
}

impl Camera {
    /// Perspective camera at `position` looking down -Z.
    pub fn perspective(position: [f32; 3], fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            view: Mat4::translation(position.map(|x| -x)),
            projection: Mat4::perspective(fov_y, aspect, near, far),
            near,
            far,
        }
    }

    /// World to clip transform.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

impl Default for Camera {
    fn default() -> Self {
        Camera::perspective([0.; 3], std::f32::consts::FRAC_PI_3, 1., 0.1, 100.)
    }
}
