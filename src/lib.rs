//! Visual-inertial initialization by online gravity alignment.
//!
//! Given a short window of metric camera poses and the preintegrated IMU
//! measurements between them, [`initialization::OnlineGravityAlignment`]
//! estimates the gyroscope bias, the gravity vector in the world frame of the
//! poses and an initial navigation state for a downstream estimator.

pub mod geometry;
pub mod imu;
pub mod initialization;
pub mod optimizer;
pub mod simulation;
