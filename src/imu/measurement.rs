//! Capability interface for preintegrated IMU measurements.
//!
//! The alignment pipeline never integrates raw IMU samples itself. It only
//! needs the compact summary of an interval: the gravity-free deltas expressed
//! in the body frame at the start of the interval, the elapsed time, and the
//! first-order sensitivity of those deltas to the gyroscope bias. Anything that
//! can provide these (the [`Preintegrator`](super::Preintegrator) of this
//! crate, an external preintegration engine, or a synthetic test fake) can be
//! aligned.

use nalgebra::{Matrix3, UnitQuaternion, Vector3};

/// Preintegrated motion between two consecutive keyframes.
pub trait PreintegratedMeasurement {
    /// ΔR_ij: rotation from body frame j to body frame i.
    fn delta_rotation(&self) -> UnitQuaternion<f64>;

    /// Δv_ij: velocity increment in body frame i, gravity excluded.
    fn delta_velocity(&self) -> Vector3<f64>;

    /// Δp_ij: position increment in body frame i, gravity excluded.
    fn delta_position(&self) -> Vector3<f64>;

    /// Integration time of the interval (s).
    fn delta_time(&self) -> f64;

    /// ∂ΔR/∂b_g, right-perturbation convention: ΔR(b + δ) ≈ ΔR(b) Exp(J δ).
    fn d_rotation_d_gyro_bias(&self) -> Matrix3<f64>;

    /// ∂Δv/∂b_g.
    fn d_velocity_d_gyro_bias(&self) -> Matrix3<f64>;

    /// ∂Δp/∂b_g.
    fn d_position_d_gyro_bias(&self) -> Matrix3<f64>;

    /// Gyroscope bias the deltas were integrated with.
    fn gyro_bias_estimate(&self) -> Vector3<f64>;
}
