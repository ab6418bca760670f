//! Online gravity alignment for visual-inertial initialization.
//!
//! Given a short window of camera poses and the preintegrated IMU measurements
//! between them, estimates:
//! - The gyroscope bias (shared by the whole window)
//! - The gravity vector in the world frame of the poses
//! - The velocity of every pose, and from it the initial navigation state
//!
//! The pipeline runs frame building → gyro bias estimation → delta state
//! update → linear alignment → gravity refinement. Poses are assumed metric
//! (stereo), so no scale is estimated.

use nalgebra::Vector3;
use tracing::{debug, info};

use super::config::AlignmentConfig;
use super::error::AlignmentError;
use super::frames::{build_frames, gyroscope_residuals, VisualInertialFrame};
use super::gravity_refinement::refine_gravity;
use super::gyro_bias::{estimate_bias_and_update_states, estimate_gyroscope_bias};
use super::linear_alignment::align_estimates_linearly;
use crate::geometry::{rotation_between_vectors, SE3};
use crate::imu::{NavState, PreintegratedMeasurement};

/// Output of a successful alignment attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentEstimate {
    /// Gyroscope bias (absolute, not a correction).
    pub gyro_bias: Vector3<f64>,
    /// Gravity in the world frame of the input poses, with the reference norm.
    pub gravity: Vector3<f64>,
    /// State of the first pose, expressed in the gravity-aligned frame of `g_world`.
    pub nav_state: NavState,
    /// Velocity of every input pose in the world frame of the input poses.
    pub velocities: Vec<Vector3<f64>>,
    /// Gravity refinement rounds performed.
    pub refinement_iterations: usize,
}

/// Alignment bound to one fixed window.
///
/// The window is borrowed for the lifetime of the aligner and never mutated;
/// every entry point rebuilds its own frames, so repeated calls give identical
/// results.
pub struct OnlineGravityAlignment<'a, P: PreintegratedMeasurement> {
    poses: &'a [SE3],
    delta_t_camera: &'a [f64],
    pims: &'a [P],
    g_world: Vector3<f64>,
    config: AlignmentConfig,
}

impl<'a, P: PreintegratedMeasurement> OnlineGravityAlignment<'a, P> {
    /// Bind the aligner to a window.
    ///
    /// All measurements must have been integrated with the same gyroscope
    /// bias; it is the linearization point the bias correction is added to.
    ///
    /// # Panics
    /// If the window is not made of N poses with N-1 time deltas and N-1
    /// measurements, or if `g_world` is zero or non-finite. Debug builds also
    /// panic when the measurements disagree on their linearization bias.
    pub fn new(
        poses: &'a [SE3],
        delta_t_camera: &'a [f64],
        pims: &'a [P],
        g_world: &Vector3<f64>,
    ) -> Self {
        assert!(!poses.is_empty(), "alignment window has no poses");
        assert_eq!(
            delta_t_camera.len() + 1,
            poses.len(),
            "need one camera time delta per consecutive pose pair"
        );
        assert_eq!(
            pims.len() + 1,
            poses.len(),
            "need one preintegrated measurement per consecutive pose pair"
        );
        assert!(
            g_world.iter().all(|v| v.is_finite()) && g_world.norm() > 0.0,
            "reference gravity must be finite and non-zero"
        );
        debug_assert!(
            pims.windows(2)
                .all(|pair| pair[0].gyro_bias_estimate() == pair[1].gyro_bias_estimate()),
            "measurements must share one linearization gyro bias"
        );

        Self {
            poses,
            delta_t_camera,
            pims,
            g_world: *g_world,
            config: AlignmentConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AlignmentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &AlignmentConfig {
        &self.config
    }

    /// Run the full alignment pipeline.
    ///
    /// With `estimate_bias == false` the bias stages are skipped and the bias
    /// is the one the measurements were integrated with.
    pub fn align_visual_inertial_estimates(
        &self,
        estimate_bias: bool,
    ) -> Result<AlignmentEstimate, AlignmentError> {
        let mut frames = self.construct_frames();

        let gyro_bias = if estimate_bias {
            estimate_bias_and_update_states(&mut frames, &self.config)?
        } else {
            self.linearization_bias()
        };

        let linear = align_estimates_linearly(&frames, &self.g_world, &self.config)?;
        let refined = refine_gravity(&frames, &self.g_world, linear, &self.config)?;
        let solution = refined.solution;

        // Minimal rotation taking the estimated gravity onto the reference one
        let r_align = rotation_between_vectors(&solution.gravity, &self.g_world);
        let t_align = SE3 {
            rotation: r_align,
            translation: Vector3::zeros(),
        };
        let nav_state = NavState::new(
            t_align.compose(&self.poses[0]),
            r_align * solution.velocities[0],
        );

        info!(
            "Gravity alignment over {} frames: g = [{:.4}, {:.4}, {:.4}], \
             bg = [{:.6}, {:.6}, {:.6}], {} refinement rounds",
            frames.len(),
            solution.gravity.x,
            solution.gravity.y,
            solution.gravity.z,
            gyro_bias.x,
            gyro_bias.y,
            gyro_bias.z,
            refined.iterations
        );

        Ok(AlignmentEstimate {
            gyro_bias,
            gravity: solution.gravity,
            nav_state,
            velocities: solution.velocities,
            refinement_iterations: refined.iterations,
        })
    }

    /// Estimate only the gyroscope bias (single linear solve).
    pub fn estimate_gyroscope_bias_only(&self) -> Result<Vector3<f64>, AlignmentError> {
        let frames = self.construct_frames();
        let delta_bg = estimate_gyroscope_bias(&frames, &self.config)?;
        let gyro_bias = self.linearization_bias() + delta_bg;

        debug!(
            "Bias-only estimate: bg = [{:.6}, {:.6}, {:.6}]",
            gyro_bias.x, gyro_bias.y, gyro_bias.z
        );
        Ok(gyro_bias)
    }

    /// Per-axis mean absolute rotation residual of the window at the
    /// measurements' linearization bias.
    pub fn estimate_gyroscope_residuals(&self) -> Vector3<f64> {
        gyroscope_residuals(&self.construct_frames())
    }

    /// Fresh frames for the bound window.
    pub fn construct_frames(&self) -> Vec<VisualInertialFrame> {
        build_frames(self.poses, self.delta_t_camera, self.pims)
    }

    fn linearization_bias(&self) -> Vector3<f64> {
        self.pims
            .first()
            .map(|pim| pim.gyro_bias_estimate())
            .unwrap_or_else(Vector3::zeros)
    }
}
