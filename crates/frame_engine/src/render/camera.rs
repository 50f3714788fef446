//! Camera projection and view matrices
//!
//! Vulkan conventions: right-handed view space looking down +Z, -Y up, depth
//! in 0..1.

use crate::foundation::math::{Mat4, Vec3, Vec4};

/// Default up vector (Vulkan's Y axis points down)
pub const DEFAULT_UP: Vec3 = Vec3::new(0.0, -1.0, 0.0);

/// Projection, view and inverse view matrices
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    projection: Mat4,
    view: Mat4,
    inverse_view: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Mat4::identity(),
            view: Mat4::identity(),
            inverse_view: Mat4::identity(),
        }
    }
}

impl Camera {
    /// Create a camera with identity matrices
    pub fn new() -> Self {
        Self::default()
    }

    /// Orthographic projection of the given box
    pub fn set_orthographic_projection(
        &mut self,
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    ) {
        let mut projection = Mat4::identity();
        projection[(0, 0)] = 2.0 / (right - left);
        projection[(1, 1)] = 2.0 / (bottom - top);
        projection[(2, 2)] = 1.0 / (far - near);
        projection[(0, 3)] = -(right + left) / (right - left);
        projection[(1, 3)] = -(bottom + top) / (bottom - top);
        projection[(2, 3)] = -near / (far - near);
        self.projection = projection;
    }

    /// Perspective projection with vertical field of view `fovy` in radians
    pub fn set_perspective_projection(&mut self, fovy: f32, aspect: f32, near: f32, far: f32) {
        assert!(aspect.abs() > f32::EPSILON, "aspect ratio must be non-zero");
        let tan_half_fovy = (fovy / 2.0).tan();
        let mut projection = Mat4::zeros();
        projection[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        projection[(1, 1)] = 1.0 / tan_half_fovy;
        projection[(2, 2)] = far / (far - near);
        projection[(3, 2)] = 1.0;
        projection[(2, 3)] = -(far * near) / (far - near);
        self.projection = projection;
    }

    /// Look from `position` along `direction`
    pub fn set_view_direction(&mut self, position: Vec3, direction: Vec3, up: Vec3) {
        let w = direction.normalize();
        let u = w.cross(&up).normalize();
        let v = w.cross(&u);
        self.set_view_basis(position, u, v, w);
    }

    /// Look from `position` at `target`
    pub fn set_view_target(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.set_view_direction(position, target - position, up);
    }

    /// Orient by Tait-Bryan angles applied Y, X, Z
    pub fn set_view_yxz(&mut self, position: Vec3, rotation: Vec3) {
        let (s3, c3) = rotation.z.sin_cos();
        let (s2, c2) = rotation.x.sin_cos();
        let (s1, c1) = rotation.y.sin_cos();
        let u = Vec3::new(c1 * c3 + s1 * s2 * s3, c2 * s3, c1 * s2 * s3 - c3 * s1);
        let v = Vec3::new(c3 * s1 * s2 - c1 * s3, c2 * c3, c1 * c3 * s2 + s1 * s3);
        let w = Vec3::new(c2 * s1, -s2, c1 * c2);
        self.set_view_basis(position, u, v, w);
    }

    fn set_view_basis(&mut self, position: Vec3, u: Vec3, v: Vec3, w: Vec3) {
        self.view = Mat4::from_rows(&[
            Vec4::new(u.x, u.y, u.z, -u.dot(&position)).transpose(),
            Vec4::new(v.x, v.y, v.z, -v.dot(&position)).transpose(),
            Vec4::new(w.x, w.y, w.z, -w.dot(&position)).transpose(),
            Vec4::new(0.0, 0.0, 0.0, 1.0).transpose(),
        ]);
        self.inverse_view = Mat4::from_columns(&[
            u.push(0.0),
            v.push(0.0),
            w.push(0.0),
            position.push(1.0),
        ]);
    }

    /// Projection matrix
    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    /// World to view matrix
    pub fn view(&self) -> &Mat4 {
        &self.view
    }

    /// View to world matrix
    pub fn inverse_view(&self) -> &Mat4 {
        &self.inverse_view
    }

    /// Camera position in world space
    pub fn position(&self) -> Vec3 {
        self.inverse_view.fixed_view::<3, 1>(0, 3).into_owned()
    }
}
