//! Linear alignment of camera poses with preintegrated IMU deltas.
//!
//! Unknowns are one world-frame velocity per pose and the gravity vector. Each
//! frame `i → j` contributes six rows from the preintegration kinematics:
//!
//! ```text
//! R_i^T (p_j - p_i - v_i Δt - ½ g Δt²) = Δp_ij
//! R_i^T (v_j - v_i - g Δt)            = Δv_ij
//! ```
//!
//! Gravity enters the system through a parameterization `g = g0 + G θ`: the
//! free linear solve uses `g0 = 0, G = I₃`, the refinement on the gravity
//! sphere uses `g0` on the sphere and a 3×2 tangent basis for `G`.

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use tracing::{debug, warn};

use super::config::AlignmentConfig;
use super::error::{AlignmentError, AlignmentStage};
use super::frames::VisualInertialFrame;
use crate::optimizer::least_squares::solve_least_squares;

/// Rows contributed by each frame.
const ROWS_PER_FRAME: usize = 6;

/// Affine parameterization of gravity, `g = offset + basis · θ`.
#[derive(Debug, Clone)]
pub struct GravityParameterization {
    pub offset: Vector3<f64>,
    /// 3×k basis, k = 3 for the free solve and k = 2 on the sphere.
    pub basis: DMatrix<f64>,
}

impl GravityParameterization {
    /// Unconstrained gravity vector.
    pub fn free() -> Self {
        Self {
            offset: Vector3::zeros(),
            basis: DMatrix::identity(3, 3),
        }
    }

    pub fn num_params(&self) -> usize {
        self.basis.ncols()
    }

    /// Gravity for parameter values `theta`.
    pub fn gravity(&self, theta: &DVector<f64>) -> Vector3<f64> {
        let delta = &self.basis * theta;
        self.offset + Vector3::new(delta[0], delta[1], delta[2])
    }
}

/// Column layout of the alignment system.
struct StateLayout {
    num_poses: usize,
}

impl StateLayout {
    fn new(num_poses: usize) -> Self {
        Self { num_poses }
    }

    fn vel_start(&self, pose_idx: usize) -> usize {
        pose_idx * 3
    }

    fn gravity_start(&self) -> usize {
        self.num_poses * 3
    }

    fn total_params(&self, gravity_params: usize) -> usize {
        self.num_poses * 3 + gravity_params
    }
}

/// Solution of one alignment solve.
#[derive(Debug, Clone)]
pub struct AlignmentSolution {
    /// World-frame velocity of every pose (N = frames + 1).
    pub velocities: Vec<Vector3<f64>>,
    /// Raw gravity parameters θ.
    pub gravity_params: DVector<f64>,
    /// Gravity vector `offset + basis · θ`.
    pub gravity: Vector3<f64>,
    /// RMS of the system residual.
    pub rms_residual: f64,
}

/// Assemble the dense system `A x = b` for the given gravity parameterization.
pub fn build_alignment_system(
    frames: &[VisualInertialFrame],
    gravity: &GravityParameterization,
) -> (DMatrix<f64>, DVector<f64>) {
    let layout = StateLayout::new(frames.len() + 1);
    let k = gravity.num_params();
    let mut a = DMatrix::zeros(frames.len() * ROWS_PER_FRAME, layout.total_params(k));
    let mut b = DVector::zeros(frames.len() * ROWS_PER_FRAME);

    for (i, frame) in frames.iter().enumerate() {
        let row = i * ROWS_PER_FRAME;
        let dt = frame.dt;
        let r_i_t = frame.pose_i.rotation_matrix().transpose();

        // Gravity blocks act on g = offset + G θ
        let g_pos: Matrix3<f64> = -0.5 * dt * dt * r_i_t;
        let g_vel: Matrix3<f64> = -dt * r_i_t;

        // Position rows
        a.fixed_view_mut::<3, 3>(row, layout.vel_start(i))
            .copy_from(&(-dt * r_i_t));
        a.view_mut((row, layout.gravity_start()), (3, k))
            .copy_from(&(g_pos * &gravity.basis));
        let rhs_pos = frame.delta_pos - r_i_t * frame.camera_delta_pos() - g_pos * gravity.offset;
        b.fixed_rows_mut::<3>(row).copy_from(&rhs_pos);

        // Velocity rows
        a.fixed_view_mut::<3, 3>(row + 3, layout.vel_start(i))
            .copy_from(&(-r_i_t));
        a.fixed_view_mut::<3, 3>(row + 3, layout.vel_start(i + 1))
            .copy_from(&r_i_t);
        a.view_mut((row + 3, layout.gravity_start()), (3, k))
            .copy_from(&(g_vel * &gravity.basis));
        let rhs_vel = frame.delta_vel - g_vel * gravity.offset;
        b.fixed_rows_mut::<3>(row + 3).copy_from(&rhs_vel);
    }

    (a, b)
}

/// Solve the alignment system for velocities and gravity parameters.
pub fn solve_alignment(
    frames: &[VisualInertialFrame],
    gravity: &GravityParameterization,
    config: &AlignmentConfig,
    stage: AlignmentStage,
) -> Result<AlignmentSolution, AlignmentError> {
    if frames.len() < config.min_frames {
        return Err(AlignmentError::InsufficientFrames {
            frames: frames.len(),
            required: config.min_frames,
        });
    }

    let layout = StateLayout::new(frames.len() + 1);
    let (a, b) = build_alignment_system(frames, gravity);
    let solution = solve_least_squares(&a, &b, config.rank_tolerance)
        .ok_or(AlignmentError::RankDeficient { stage })?;
    debug!(
        "{} solve: {}x{} system, inverse condition {:.3e}",
        stage,
        a.nrows(),
        a.ncols(),
        solution.inverse_condition
    );

    let velocities = (0..layout.num_poses)
        .map(|i| {
            let s = layout.vel_start(i);
            Vector3::new(solution.x[s], solution.x[s + 1], solution.x[s + 2])
        })
        .collect();
    let gravity_params = solution
        .x
        .rows(layout.gravity_start(), gravity.num_params())
        .into_owned();

    Ok(AlignmentSolution {
        velocities,
        gravity: gravity.gravity(&gravity_params),
        gravity_params,
        rms_residual: solution.rms_residual,
    })
}

/// Unconstrained linear alignment with a gravity magnitude sanity check.
pub fn align_estimates_linearly(
    frames: &[VisualInertialFrame],
    g_world: &Vector3<f64>,
    config: &AlignmentConfig,
) -> Result<AlignmentSolution, AlignmentError> {
    let solution = solve_alignment(
        frames,
        &GravityParameterization::free(),
        config,
        AlignmentStage::LinearAlignment,
    )?;

    let estimated = solution.gravity.norm();
    let reference = g_world.norm();
    debug!(
        "Linear alignment: |g| = {:.4} (reference {:.4}), rms residual {:.3e}",
        estimated, reference, solution.rms_residual
    );

    if (estimated - reference).abs() > config.gravity_magnitude_tolerance {
        warn!(
            "Rejecting linear alignment: gravity magnitude {:.4} vs reference {:.4}",
            estimated, reference
        );
        return Err(AlignmentError::GravityMagnitude {
            estimated,
            reference,
        });
    }

    Ok(solution)
}
