//! Visual-inertial frames: one record per consecutive pose pair of the window.
//!
//! A frame pairs the camera-observed relative motion between poses `i` and
//! `i + 1` with the preintegrated IMU deltas bridging the same interval. The
//! IMU deltas are the only mutable part: the state updater re-linearizes them
//! in place whenever the gyroscope bias estimate changes.

use nalgebra::{Matrix3, UnitQuaternion, Vector3};

use crate::geometry::{exp_so3, log_so3, SE3};
use crate::imu::PreintegratedMeasurement;

/// Camera pose pair plus the bias-corrected IMU deltas between them.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualInertialFrame {
    /// Pose at the start of the interval (T_wb_i).
    pub pose_i: SE3,
    /// Pose at the end of the interval (T_wb_j).
    pub pose_j: SE3,
    /// Camera time between the two poses (s).
    pub dt: f64,

    /// IMU rotation increment ΔR_ij at `gyro_bias`.
    pub delta_rot: UnitQuaternion<f64>,
    /// IMU velocity increment Δv_ij at `gyro_bias`.
    pub delta_vel: Vector3<f64>,
    /// IMU position increment Δp_ij at `gyro_bias`.
    pub delta_pos: Vector3<f64>,
    /// Gyroscope bias the deltas currently correspond to.
    pub gyro_bias: Vector3<f64>,

    pub d_rot_d_bg: Matrix3<f64>,
    pub d_vel_d_bg: Matrix3<f64>,
    pub d_pos_d_bg: Matrix3<f64>,
}

impl VisualInertialFrame {
    pub fn new<P: PreintegratedMeasurement>(pose_i: SE3, pose_j: SE3, dt: f64, pim: &P) -> Self {
        Self {
            pose_i,
            pose_j,
            dt,
            delta_rot: pim.delta_rotation(),
            delta_vel: pim.delta_velocity(),
            delta_pos: pim.delta_position(),
            gyro_bias: pim.gyro_bias_estimate(),
            d_rot_d_bg: pim.d_rotation_d_gyro_bias(),
            d_vel_d_bg: pim.d_velocity_d_gyro_bias(),
            d_pos_d_bg: pim.d_position_d_gyro_bias(),
        }
    }

    /// Camera-observed relative rotation R_i^T R_j.
    pub fn camera_delta_rot(&self) -> UnitQuaternion<f64> {
        self.pose_i.between(&self.pose_j).rotation
    }

    /// Camera-observed translation p_j - p_i in world frame.
    pub fn camera_delta_pos(&self) -> Vector3<f64> {
        self.pose_j.translation - self.pose_i.translation
    }

    /// Rotation residual Log(ΔR_imu^T ΔR_cam) in the tangent space of ΔR_imu.
    pub fn rotation_residual(&self) -> Vector3<f64> {
        log_so3(&(self.delta_rot.inverse() * self.camera_delta_rot()))
    }

    /// First-order re-linearization of the IMU deltas for a bias change `delta_bg`.
    pub fn correct_gyro_bias(&mut self, delta_bg: &Vector3<f64>) {
        self.delta_rot *= exp_so3(&(self.d_rot_d_bg * delta_bg));
        self.delta_vel += self.d_vel_d_bg * delta_bg;
        self.delta_pos += self.d_pos_d_bg * delta_bg;
        self.gyro_bias += delta_bg;
    }
}

/// Pair consecutive poses with their bridging measurement.
///
/// # Panics
/// If `delta_t_camera` or `pims` do not hold exactly one entry per consecutive
/// pose pair.
pub fn build_frames<P: PreintegratedMeasurement>(
    poses: &[SE3],
    delta_t_camera: &[f64],
    pims: &[P],
) -> Vec<VisualInertialFrame> {
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

    poses
        .windows(2)
        .zip(delta_t_camera)
        .zip(pims)
        .map(|((pair, &dt), pim)| VisualInertialFrame::new(pair[0], pair[1], dt, pim))
        .collect()
}

/// Apply a gyroscope bias change to every frame.
pub fn update_delta_states(frames: &mut [VisualInertialFrame], delta_bg: &Vector3<f64>) {
    for frame in frames.iter_mut() {
        frame.correct_gyro_bias(delta_bg);
    }
}

/// Per-axis mean absolute rotation residual (rad) between IMU and camera.
pub fn gyroscope_residuals(frames: &[VisualInertialFrame]) -> Vector3<f64> {
    if frames.is_empty() {
        return Vector3::zeros();
    }
    let sum = frames
        .iter()
        .fold(Vector3::zeros(), |acc, f| acc + f.rotation_residual().abs());
    sum / frames.len() as f64
}


#[cfg(test)]
mod tests {
    use super::test_support::fake_window;
    use super::*;
    use crate::imu::GRAVITY;
    use approx::assert_relative_eq;

    #[test]
    fn test_build_frames_aligns_indices() {
        let window = fake_window(5, 0.1, Vector3::new(0.1, 0.2, 0.3), Vector3::zeros(), GRAVITY);
        let frames = build_frames(&window.poses, &window.delta_t, &window.pims);

        assert_eq!(frames.len(), 4);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.pose_i, window.poses[i]);
            assert_eq!(frame.pose_j, window.poses[i + 1]);
            assert_eq!(frame.delta_vel, window.pims[i].delta_vel);
        }
    }

    #[test]
    fn test_camera_delta_rotation_is_relative() {
        let window = fake_window(3, 0.1, Vector3::new(0.1, 0.2, 0.3), Vector3::zeros(), GRAVITY);
        let frames = build_frames(&window.poses, &window.delta_t, &window.pims);

        for frame in &frames {
            let expected = frame.pose_i.rotation.inverse() * frame.pose_j.rotation;
            assert!((frame.camera_delta_rot().inverse() * expected).angle() < 1e-12);
        }
    }

    #[test]
    #[should_panic(expected = "camera time delta")]
    fn test_build_frames_rejects_mismatched_deltas() {
        let window = fake_window(4, 0.1, Vector3::new(0.1, 0.2, 0.3), Vector3::zeros(), GRAVITY);
        build_frames(&window.poses, &window.delta_t[..2], &window.pims);
    }

    #[test]
    #[should_panic(expected = "preintegrated measurement")]
    fn test_build_frames_rejects_mismatched_pims() {
        let window = fake_window(4, 0.1, Vector3::new(0.1, 0.2, 0.3), Vector3::zeros(), GRAVITY);
        build_frames(&window.poses, &window.delta_t, &window.pims[..1]);
    }

    #[test]
    fn test_residuals_vanish_without_bias() {
        let window = fake_window(6, 0.1, Vector3::new(0.3, -0.2, 0.5), Vector3::zeros(), GRAVITY);
        let frames = build_frames(&window.poses, &window.delta_t, &window.pims);

        assert_relative_eq!(gyroscope_residuals(&frames), Vector3::zeros(), epsilon = 1e-12);
    }

    #[test]
    fn test_bias_correction_reduces_residuals() {
        let bias = Vector3::new(0.01, -0.02, 0.015);
        let window = fake_window(6, 0.1, Vector3::new(0.3, -0.2, 0.5), bias, GRAVITY);
        let mut frames = build_frames(&window.poses, &window.delta_t, &window.pims);

        let before = gyroscope_residuals(&frames).norm();
        update_delta_states(&mut frames, &bias);
        let after = gyroscope_residuals(&frames).norm();

        assert!(before > 1e-3);
        assert!(after < 1e-2 * before);
        assert_relative_eq!(frames[0].gyro_bias, bias, epsilon = 1e-15);
    }

    #[test]
    fn test_gyroscope_residuals_empty() {
        assert_eq!(gyroscope_residuals(&[]), Vector3::zeros());
    }
}
