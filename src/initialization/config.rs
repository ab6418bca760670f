//! Configuration for online gravity alignment.

use serde::{Deserialize, Serialize};

use crate::optimizer::least_squares::DEFAULT_RANK_TOLERANCE;

/// Thresholds and iteration budgets of the alignment pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Minimum number of visual-inertial frames (pose pairs) in the window.
    pub min_frames: usize,
    /// Minimum summed camera rotation angle over the window (rad) for bias estimation.
    pub min_rotation_excitation: f64,
    /// Relative singular value below which a least-squares system is rank deficient.
    pub rank_tolerance: f64,
    /// Gauss-Newton rounds of gyroscope bias estimation.
    pub bias_iterations: usize,
    /// Bias correction norm (rad/s) that ends bias estimation early.
    pub bias_tolerance: f64,
    /// Largest accepted deviation of the linear gravity estimate from the
    /// reference magnitude (m/s²).
    pub gravity_magnitude_tolerance: f64,
    /// Maximum number of tangent-space gravity refinement rounds.
    pub refinement_iterations: usize,
    /// Gravity perturbation norm (m/s²) below which refinement has converged.
    pub refinement_tolerance: f64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            min_frames: 2,
            min_rotation_excitation: 1e-4,
            rank_tolerance: DEFAULT_RANK_TOLERANCE,
            bias_iterations: 3,
            bias_tolerance: 1e-10,
            gravity_magnitude_tolerance: 1.0,
            refinement_iterations: 4,
            refinement_tolerance: 1e-9,
        }
    }
}

impl AlignmentConfig {
    /// Tighter gates for windows from a well-calibrated rig.
    pub fn strict() -> Self {
        Self {
            min_frames: 4,
            min_rotation_excitation: 0.05,
            gravity_magnitude_tolerance: 0.3,
            refinement_iterations: 10,
            ..Self::default()
        }
    }

    /// Looser gates for short or noisy windows.
    pub fn relaxed() -> Self {
        Self {
            gravity_magnitude_tolerance: 2.0,
            refinement_iterations: 8,
            ..Self::default()
        }
    }
}
