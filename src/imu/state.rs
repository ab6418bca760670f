//! Navigation state handed to the downstream estimator.

use nalgebra::{UnitQuaternion, Vector3};

use crate::geometry::SE3;

/// Orientation, position and velocity of the body at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavState {
    /// Body-to-world rotation.
    pub rotation: UnitQuaternion<f64>,
    /// Body position in world frame.
    pub position: Vector3<f64>,
    /// Body velocity in world frame.
    pub velocity: Vector3<f64>,
}

impl NavState {
    pub fn new(pose: SE3, velocity: Vector3<f64>) -> Self {
        Self {
            rotation: pose.rotation,
            position: pose.translation,
            velocity,
        }
    }
}

impl Default for NavState {
    fn default() -> Self {
        Self::new(SE3::identity(), Vector3::zeros())
    }
}
