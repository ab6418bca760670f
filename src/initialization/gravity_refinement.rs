//! Gravity refinement on the sphere of known gravity magnitude.
//!
//! The free linear solve recovers gravity only approximately, including its
//! norm. Here gravity is written as `g = g0 + B w` with `g0` on the sphere
//! `|g| = |g_ref|` and `B` an orthonormal basis of the tangent plane at `g0`.
//! Each round solves the reduced system for `w` (two unknowns instead of
//! three), then projects `g0 + B w` back onto the sphere.

use nalgebra::{DMatrix, Matrix3x2, Vector3};
use tracing::{debug, warn};

use super::config::AlignmentConfig;
use super::error::{AlignmentError, AlignmentStage};
use super::frames::VisualInertialFrame;
use super::linear_alignment::{solve_alignment, AlignmentSolution, GravityParameterization};

/// Build an orthonormal basis of the plane orthogonal to `g`.
///
/// The seed axis is the coordinate axis least aligned with `g`, which keeps
/// the cross products well conditioned for any direction.
pub fn create_tangent_basis(g: &Vector3<f64>) -> Result<Matrix3x2<f64>, AlignmentError> {
    let norm = g.norm();
    if !(norm > f64::EPSILON) || !norm.is_finite() {
        return Err(AlignmentError::DegenerateGravity);
    }
    let a = g / norm;

    let seed = match a.iamin() {
        0 => Vector3::x(),
        1 => Vector3::y(),
        _ => Vector3::z(),
    };
    let b = (seed - a * a.dot(&seed)).normalize();
    let c = a.cross(&b);

    Ok(Matrix3x2::from_columns(&[b, c]))
}

/// Result of tangent-space refinement.
#[derive(Debug, Clone)]
pub struct RefinedGravity {
    pub solution: AlignmentSolution,
    /// Rounds actually performed.
    pub iterations: usize,
    pub converged: bool,
}

/// Refine a gravity estimate so that its norm equals `|g_world|`.
///
/// After every round the current gravity has exactly the reference norm. A
/// round budget exhausted without convergence still returns the last iterate.
/// An initial estimate with no usable direction is rejected up front.
pub fn refine_gravity(
    frames: &[VisualInertialFrame],
    g_world: &Vector3<f64>,
    initial: AlignmentSolution,
    config: &AlignmentConfig,
) -> Result<RefinedGravity, AlignmentError> {
    let initial_norm = initial.gravity.norm();
    if !(initial_norm > f64::EPSILON) || !initial_norm.is_finite() {
        return Err(AlignmentError::DegenerateGravity);
    }

    let magnitude = g_world.norm();
    let mut gravity = initial.gravity / initial_norm * magnitude;
    let mut solution = AlignmentSolution {
        gravity,
        ..initial
    };
    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.refinement_iterations {
        let basis = create_tangent_basis(&gravity)?;
        let parameterization = GravityParameterization {
            offset: gravity,
            basis: DMatrix::from_column_slice(3, 2, basis.as_slice()),
        };

        let mut round = solve_alignment(
            frames,
            &parameterization,
            config,
            AlignmentStage::GravityRefinement,
        )?;
        iterations += 1;

        let step = basis * round.gravity_params.fixed_rows::<2>(0);
        gravity = round.gravity.normalize() * magnitude;
        round.gravity = gravity;
        solution = round;

        debug!(
            "Gravity refinement round {}: |step| = {:.3e}, g = [{:.5}, {:.5}, {:.5}]",
            iterations,
            step.norm(),
            gravity.x,
            gravity.y,
            gravity.z
        );

        if step.norm() < config.refinement_tolerance {
            converged = true;
            break;
        }
    }

    if !converged && config.refinement_iterations > 0 {
        warn!(
            "Gravity refinement did not converge in {} rounds, keeping last iterate",
            iterations
        );
    }

    Ok(RefinedGravity {
        solution,
        iterations,
        converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imu::GRAVITY;
    use crate::initialization::frames::build_frames;
    use crate::initialization::frames::test_support::fake_window;
    use crate::initialization::linear_alignment::align_estimates_linearly;
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    fn assert_valid_basis(g: &Vector3<f64>) {
        let basis = create_tangent_basis(g).unwrap();
        let b = basis.column(0);
        let c = basis.column(1);

        assert_relative_eq!(b.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(c.norm(), 1.0, epsilon = 1e-12);
        assert!(b.dot(&c).abs() < 1e-12);
        assert!(b.dot(g).abs() < 1e-12 * g.norm());
        assert!(c.dot(g).abs() < 1e-12 * g.norm());
    }

    #[test]
    fn test_tangent_basis_coordinate_axes() {
        for axis in [Vector3::x(), Vector3::y(), Vector3::z()] {
            assert_valid_basis(&axis);
            assert_valid_basis(&(-9.81 * axis));
        }
    }

    #[test]
    fn test_tangent_basis_arbitrary_directions() {
        assert_valid_basis(&Vector3::new(0.3, -0.2, -9.8));
        assert_valid_basis(&Vector3::new(1.0, 1.0, 1.0));
        assert_valid_basis(&Vector3::new(-4.0, 7.5, 0.01));
        assert_valid_basis(&Vector3::new(1e-9, 0.0, -1e-9));
    }

    #[test]
    fn test_tangent_basis_nearly_axis_aligned() {
        assert_valid_basis(&Vector3::new(1e-12, 1e-12, -9.81));
        assert_valid_basis(&Vector3::new(9.81, -1e-14, 0.0));
    }

    #[test]
    fn test_tangent_basis_zero_vector() {
        assert_eq!(
            create_tangent_basis(&Vector3::zeros()),
            Err(AlignmentError::DegenerateGravity)
        );
        assert!(create_tangent_basis(&Vector3::new(f64::NAN, 0.0, 1.0)).is_err());
    }

    #[test]
    fn test_refinement_keeps_norm_and_recovers_direction() {
        let g_true = Vector3::new(0.4, -0.3, -9.795);
        let g_true = g_true.normalize() * 9.81;
        let window = fake_window(6, 0.1, Vector3::new(0.3, 0.2, -0.4), Vector3::zeros(), g_true);
        let frames = build_frames(&window.poses, &window.delta_t, &window.pims);
        let config = AlignmentConfig::default();

        // Perturb the linear estimate so that refinement has work to do
        let mut initial = align_estimates_linearly(&frames, &GRAVITY, &config).unwrap();
        initial.gravity = 1.05 * initial.gravity + Vector3::new(0.2, -0.1, 0.0);

        let refined = refine_gravity(&frames, &GRAVITY, initial, &config).unwrap();

        assert_relative_eq!(refined.solution.gravity.norm(), 9.81, epsilon = 1e-12);
        assert_relative_eq!(refined.solution.gravity, g_true, epsilon = 1e-6);
        assert!(refined.iterations >= 1);
    }

    #[test]
    fn test_norm_invariant_holds_every_round() {
        let g_true = Vector3::new(1.0, 0.5, -9.7).normalize() * 9.81;
        let window = fake_window(5, 0.1, Vector3::new(0.3, 0.2, -0.4), Vector3::zeros(), g_true);
        let frames = build_frames(&window.poses, &window.delta_t, &window.pims);

        let mut initial =
            align_estimates_linearly(&frames, &GRAVITY, &AlignmentConfig::default()).unwrap();
        initial.gravity = Vector3::new(0.0, 0.0, -9.0);

        for rounds in 1..=5 {
            let config = AlignmentConfig {
                refinement_iterations: rounds,
                refinement_tolerance: 0.0,
                ..AlignmentConfig::default()
            };
            let refined = refine_gravity(&frames, &GRAVITY, initial.clone(), &config).unwrap();

            assert_eq!(refined.iterations, rounds);
            assert!(!refined.converged);
            assert_relative_eq!(refined.solution.gravity.norm(), 9.81, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_zero_budget_projects_initial_estimate() {
        let window = fake_window(5, 0.1, Vector3::new(0.3, 0.2, -0.4), Vector3::zeros(), GRAVITY);
        let frames = build_frames(&window.poses, &window.delta_t, &window.pims);
        let mut initial =
            align_estimates_linearly(&frames, &GRAVITY, &AlignmentConfig::default()).unwrap();
        initial.gravity = Vector3::new(0.0, 0.0, -9.5);
        let config = AlignmentConfig {
            refinement_iterations: 0,
            ..AlignmentConfig::default()
        };

        let refined = refine_gravity(&frames, &GRAVITY, initial, &config).unwrap();

        assert_eq!(refined.iterations, 0);
        assert_relative_eq!(refined.solution.gravity, GRAVITY, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_initial_gravity_is_rejected() {
        let window = fake_window(5, 0.1, Vector3::new(0.3, 0.2, -0.4), Vector3::zeros(), GRAVITY);
        let frames = build_frames(&window.poses, &window.delta_t, &window.pims);
        let mut initial =
            align_estimates_linearly(&frames, &GRAVITY, &AlignmentConfig::default()).unwrap();
        initial.gravity = Vector3::zeros();

        for rounds in [0, 4] {
            let config = AlignmentConfig {
                refinement_iterations: rounds,
                ..AlignmentConfig::default()
            };
            let err = refine_gravity(&frames, &GRAVITY, initial.clone(), &config).unwrap_err();
            assert_eq!(err, AlignmentError::DegenerateGravity);
        }
    }

    #[test]
    fn test_underdetermined_reduced_system_fails() {
        // One frame gives 6 rows for 2 velocities and 2 tangent parameters
        let window = fake_window(2, 0.1, Vector3::new(0.3, 0.2, -0.4), Vector3::zeros(), GRAVITY);
        let frames = build_frames(&window.poses, &window.delta_t, &window.pims);
        let initial = AlignmentSolution {
            velocities: vec![Vector3::zeros(); 2],
            gravity_params: DVector::zeros(3),
            gravity: GRAVITY,
            rms_residual: 0.0,
        };
        let config = AlignmentConfig {
            min_frames: 1,
            ..AlignmentConfig::default()
        };

        let err = refine_gravity(&frames, &GRAVITY, initial, &config).unwrap_err();

        assert_eq!(
            err,
            AlignmentError::RankDeficient {
                stage: AlignmentStage::GravityRefinement
            }
        );
    }

    #[test]
    fn test_loose_rank_tolerance_fails_refinement() {
        let window = fake_window(5, 0.1, Vector3::new(0.3, 0.2, -0.4), Vector3::zeros(), GRAVITY);
        let frames = build_frames(&window.poses, &window.delta_t, &window.pims);
        let initial =
            align_estimates_linearly(&frames, &GRAVITY, &AlignmentConfig::default()).unwrap();
        let config = AlignmentConfig {
            rank_tolerance: 0.999,
            ..AlignmentConfig::default()
        };

        let err = refine_gravity(&frames, &GRAVITY, initial, &config).unwrap_err();

        assert_eq!(
            err,
            AlignmentError::RankDeficient {
                stage: AlignmentStage::GravityRefinement
            }
        );
    }
}
