//! SE3: 6-DOF rigid body transformation (rotation + translation).
//!
//! Poses in an alignment window are stored as body-to-world transforms
//! (T_wb), so that `p_w = R_wb * p_b + t_wb`.

use nalgebra::{Matrix3, UnitQuaternion, Vector3};

/// Rigid body transformation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE3 {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl SE3 {
    /// Identity transformation.
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Inverse transformation.
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// Composition `self * other`.
    pub fn compose(&self, other: &SE3) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// Relative transform from `self` to `other`: `self⁻¹ * other`.
    pub fn between(&self, other: &SE3) -> Self {
        self.inverse().compose(other)
    }

    /// Rotation as a 3x3 matrix.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }
}

impl Default for SE3 {
    fn default() -> Self {
        Self::identity()
    }
}
