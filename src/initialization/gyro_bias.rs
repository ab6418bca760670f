//! Gyroscope bias estimation from camera-observed relative rotations.
//!
//! For every frame, the camera gives the true relative rotation ΔR_cam while
//! the IMU gives ΔR_imu integrated with a (wrong) bias estimate. To first order
//!
//! ```text
//! ΔR_imu(b + δ) ≈ ΔR_imu(b) · Exp(J_R δ)
//! ```
//!
//! so the bias correction solves the stacked system `J_R,i δ = Log(ΔR_imu,i^T ΔR_cam,i)`.

use nalgebra::{DMatrix, DVector, Vector3};
use tracing::debug;

use super::config::AlignmentConfig;
use super::error::{AlignmentError, AlignmentStage};
use super::frames::{gyroscope_residuals, update_delta_states, VisualInertialFrame};
use crate::geometry::log_so3;
use crate::optimizer::least_squares::solve_least_squares;

/// Check that the window can constrain the gyroscope bias at all.
fn check_excitation(
    frames: &[VisualInertialFrame],
    config: &AlignmentConfig,
) -> Result<(), AlignmentError> {
    if frames.len() < config.min_frames {
        return Err(AlignmentError::InsufficientFrames {
            frames: frames.len(),
            required: config.min_frames,
        });
    }

    let total_angle: f64 = frames
        .iter()
        .map(|f| log_so3(&f.camera_delta_rot()).norm())
        .sum();
    if total_angle < config.min_rotation_excitation {
        return Err(AlignmentError::InsufficientExcitation { total_angle });
    }
    Ok(())
}

/// Single linear bias correction for the current frame deltas.
///
/// Returns the change δ to apply on top of the frames' current bias.
pub fn estimate_gyroscope_bias(
    frames: &[VisualInertialFrame],
    config: &AlignmentConfig,
) -> Result<Vector3<f64>, AlignmentError> {
    check_excitation(frames, config)?;

    let rows = frames.len() * 3;
    let mut a = DMatrix::zeros(rows, 3);
    let mut b = DVector::zeros(rows);

    for (i, frame) in frames.iter().enumerate() {
        a.fixed_view_mut::<3, 3>(i * 3, 0).copy_from(&frame.d_rot_d_bg);
        b.fixed_rows_mut::<3>(i * 3).copy_from(&frame.rotation_residual());
    }

    let solution = solve_least_squares(&a, &b, config.rank_tolerance).ok_or(
        AlignmentError::RankDeficient {
            stage: AlignmentStage::GyroscopeBias,
        },
    )?;
    debug!(
        "Gyro bias solve over {} frames, inverse condition {:.3e}",
        frames.len(),
        solution.inverse_condition
    );

    Ok(Vector3::new(solution.x[0], solution.x[1], solution.x[2]))
}

/// Estimate the gyroscope bias and re-linearize every frame with it.
///
/// Runs up to `config.bias_iterations` Gauss-Newton rounds. Returns the
/// absolute bias, i.e. the frames' initial linearization bias plus all
/// corrections. On error the frames may have been partially updated and must
/// be discarded.
pub fn estimate_bias_and_update_states(
    frames: &mut [VisualInertialFrame],
    config: &AlignmentConfig,
) -> Result<Vector3<f64>, AlignmentError> {
    let initial_bias = frames.first().map(|f| f.gyro_bias).unwrap_or_else(Vector3::zeros);
    let residual_before = gyroscope_residuals(frames);

    for iteration in 0..config.bias_iterations.max(1) {
        let delta_bg = estimate_gyroscope_bias(frames, config)?;
        update_delta_states(frames, &delta_bg);

        debug!(
            "Gyro bias round {}: correction [{:.3e}, {:.3e}, {:.3e}]",
            iteration, delta_bg.x, delta_bg.y, delta_bg.z
        );

        if delta_bg.norm() < config.bias_tolerance {
            break;
        }
    }

    let gyro_bias = frames.first().map(|f| f.gyro_bias).unwrap_or(initial_bias);
    debug!(
        "Gyro residuals {:.3e} -> {:.3e} rad after bias correction",
        residual_before.norm(),
        gyroscope_residuals(frames).norm()
    );

    Ok(gyro_bias)
}
