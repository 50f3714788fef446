//! Math utilities and types
//!
//! Thin aliases over nalgebra plus the object transform used by game objects.

pub use nalgebra::{Matrix3, Matrix4, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Position, scale and Tait-Bryan rotation of an object
///
/// Rotation is stored as angles in radians and applied in Y, X, Z order
/// (yaw, pitch, roll), matching how the camera builds its view matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformComponent {
    /// Position in world space
    pub translation: Vec3,
    /// Per-axis scale factors
    pub scale: Vec3,
    /// Rotation angles in radians
    pub rotation: Vec3,
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            translation: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            rotation: Vec3::zeros(),
        }
    }
}

impl TransformComponent {
    /// Model matrix: translate * Ry * Rx * Rz * scale
    pub fn mat4(&self) -> Mat4 {
        let (s1, c1) = self.rotation.y.sin_cos();
        let (s2, c2) = self.rotation.x.sin_cos();
        let (s3, c3) = self.rotation.z.sin_cos();
        let s = self.scale;
        let t = self.translation;

        Mat4::from_columns(&[
            Vec4::new(
                s.x * (c1 * c3 + s1 * s2 * s3),
                s.x * (c2 * s3),
                s.x * (c1 * s2 * s3 - c3 * s1),
                0.0,
            ),
            Vec4::new(
                s.y * (c3 * s1 * s2 - c1 * s3),
                s.y * (c2 * c3),
                s.y * (c1 * c3 * s2 + s1 * s3),
                0.0,
            ),
            Vec4::new(s.z * (c2 * s1), s.z * (-s2), s.z * (c1 * c2), 0.0),
            Vec4::new(t.x, t.y, t.z, 1.0),
        ])
    }

    /// Inverse-transpose of the upper 3x3 of [`Self::mat4`], widened to a
    /// 4x4 so it can travel in a push constant block
    pub fn normal_matrix(&self) -> Mat4 {
        let (s1, c1) = self.rotation.y.sin_cos();
        let (s2, c2) = self.rotation.x.sin_cos();
        let (s3, c3) = self.rotation.z.sin_cos();
        let inv = Vec3::new(1.0 / self.scale.x, 1.0 / self.scale.y, 1.0 / self.scale.z);

        let normal = Mat3::from_columns(&[
            Vec3::new(
                inv.x * (c1 * c3 + s1 * s2 * s3),
                inv.x * (c2 * s3),
                inv.x * (c1 * s2 * s3 - c3 * s1),
            ),
            Vec3::new(
                inv.y * (c3 * s1 * s2 - c1 * s3),
                inv.y * (c2 * c3),
                inv.y * (c1 * c3 * s2 + s1 * s3),
            ),
            Vec3::new(inv.z * (c2 * s1), inv.z * (-s2), inv.z * (c1 * c2)),
        ]);
        normal.to_homogeneous()
    }
}
