use nalgebra::{Matrix3, UnitQuaternion, Vector3};

use super::measurement::PreintegratedMeasurement;
use super::sample::{ImuBias, ImuSample};
use crate::geometry::{exp_so3, right_jacobian_so3, skew};

/// Preintegrated motion between two frames, with first-order bias Jacobians.
///
/// Deltas are gravity-free and expressed in the body frame at the start of the
/// interval (Forster et al.).
#[derive(Debug, Clone, Copy)]
pub struct PreintegratedState {
    pub delta_rot: UnitQuaternion<f64>,
    pub delta_vel: Vector3<f64>,
    pub delta_pos: Vector3<f64>,
    pub dt: f64,

    /// ∂ΔR/∂b_g
    pub d_rot_d_bg: Matrix3<f64>,
    /// ∂Δv/∂b_g
    pub d_vel_d_bg: Matrix3<f64>,
    /// ∂Δp/∂b_g
    pub d_pos_d_bg: Matrix3<f64>,
}

impl PreintegratedState {
    pub fn identity() -> Self {
        Self {
            delta_rot: UnitQuaternion::identity(),
            delta_vel: Vector3::zeros(),
            delta_pos: Vector3::zeros(),
            dt: 0.0,
            d_rot_d_bg: Matrix3::zeros(),
            d_vel_d_bg: Matrix3::zeros(),
            d_pos_d_bg: Matrix3::zeros(),
        }
    }
}

impl Default for PreintegratedState {
    fn default() -> Self {
        Self::identity()
    }
}

/// IMU preintegrator: integrates high-rate IMU into a relative motion prior.
#[derive(Debug, Clone)]
pub struct Preintegrator {
    /// Linearization bias subtracted from every sample.
    pub bias: ImuBias,
    pub state: PreintegratedState,
}

impl Preintegrator {
    pub fn new(bias: ImuBias) -> Self {
        Self {
            bias,
            state: PreintegratedState::identity(),
        }
    }

    pub fn reset(&mut self) {
        self.state = PreintegratedState::identity();
    }

    /// Integrate a single time step using midpoint integration.
    ///
    /// Samples with non-increasing timestamps are ignored.
    pub fn integrate(&mut self, prev: ImuSample, curr: ImuSample) {
        let dt = curr.timestamp_s - prev.timestamp_s;
        if dt <= 0.0 {
            return;
        }

        let omega = 0.5 * (prev.gyro + curr.gyro) - self.bias.gyro;
        let accel = 0.5 * (prev.accel + curr.accel) - self.bias.accel;

        let s = &mut self.state;
        let angle_axis = omega * dt;
        let delta_q = exp_so3(&angle_axis);

        // Rotation at the middle of the step, and its sensitivity to the gyro bias
        let half_step = exp_so3(&(0.5 * angle_axis));
        let r_mid = (s.delta_rot * half_step).to_rotation_matrix().into_inner();
        let d_rot_mid_d_bg = half_step.to_rotation_matrix().into_inner().transpose() * s.d_rot_d_bg
            - right_jacobian_so3(&(0.5 * angle_axis)) * (0.5 * dt);
        let accel_rot = r_mid * accel;
        let accel_skew = r_mid * skew(&accel);

        // Jacobians use the values from the start of the step, so update them first
        s.d_pos_d_bg += s.d_vel_d_bg * dt - 0.5 * accel_skew * d_rot_mid_d_bg * dt * dt;
        s.d_vel_d_bg -= accel_skew * d_rot_mid_d_bg * dt;
        s.d_rot_d_bg = delta_q.to_rotation_matrix().into_inner().transpose() * s.d_rot_d_bg
            - right_jacobian_so3(&angle_axis) * dt;

        s.delta_pos += s.delta_vel * dt + 0.5 * accel_rot * dt * dt;
        s.delta_vel += accel_rot * dt;
        s.delta_rot = s.delta_rot * delta_q;
        s.dt += dt;
    }

    /// Integrate consecutive pairs of an ordered sample sequence.
    pub fn integrate_samples(&mut self, samples: &[ImuSample]) {
        for pair in samples.windows(2) {
            self.integrate(pair[0], pair[1]);
        }
    }

    /// Predict rotation/position/velocity from a previous state, given gravity.
    pub fn propagate(
        &self,
        prev_rot: UnitQuaternion<f64>,
        prev_pos: Vector3<f64>,
        prev_vel: Vector3<f64>,
        gravity: &Vector3<f64>,
    ) -> (UnitQuaternion<f64>, Vector3<f64>, Vector3<f64>) {
        let dt = self.state.dt;
        let rot = prev_rot * self.state.delta_rot;
        let vel = prev_vel + gravity * dt + prev_rot * self.state.delta_vel;
        let pos =
            prev_pos + prev_vel * dt + 0.5 * gravity * dt * dt + prev_rot * self.state.delta_pos;
        (rot, pos, vel)
    }
}

impl PreintegratedMeasurement for Preintegrator {
    fn delta_rotation(&self) -> UnitQuaternion<f64> {
        self.state.delta_rot
    }

    fn delta_velocity(&self) -> Vector3<f64> {
        self.state.delta_vel
    }

    fn delta_position(&self) -> Vector3<f64> {
        self.state.delta_pos
    }

    fn delta_time(&self) -> f64 {
        self.state.dt
    }

    fn d_rotation_d_gyro_bias(&self) -> Matrix3<f64> {
        self.state.d_rot_d_bg
    }

    fn d_velocity_d_gyro_bias(&self) -> Matrix3<f64> {
        self.state.d_vel_d_bg
    }

    fn d_position_d_gyro_bias(&self) -> Matrix3<f64> {
        self.state.d_pos_d_bg
    }

    fn gyro_bias_estimate(&self) -> Vector3<f64> {
        self.bias.gyro
    }
}
