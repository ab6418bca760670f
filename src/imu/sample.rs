use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Standard gravity magnitude (m/s^2).
pub const GRAVITY_MAGNITUDE: f64 = 9.81;

/// Gravity vector in a Z-up world frame (m/s^2).
pub const GRAVITY: Vector3<f64> = Vector3::new(0.0, 0.0, -GRAVITY_MAGNITUDE);

/// IMU white noise parameters (1-sigma, continuous time).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuNoise {
    /// Gyroscope noise density (rad/s/√Hz).
    pub sigma_gyro: f64,
    /// Accelerometer noise density (m/s²/√Hz).
    pub sigma_accel: f64,
}

impl ImuNoise {
    /// Noise-free IMU.
    pub fn zero() -> Self {
        Self {
            sigma_gyro: 0.0,
            sigma_accel: 0.0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.sigma_gyro == 0.0 && self.sigma_accel == 0.0
    }
}

impl Default for ImuNoise {
    fn default() -> Self {
        Self {
            // Approximate EuRoC noise values
            sigma_gyro: 1.7e-4,
            sigma_accel: 2.0e-3,
        }
    }
}

/// IMU biases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuBias {
    pub gyro: Vector3<f64>,
    pub accel: Vector3<f64>,
}

impl ImuBias {
    pub fn zero() -> Self {
        Self {
            gyro: Vector3::zeros(),
            accel: Vector3::zeros(),
        }
    }

    pub fn from_gyro(gyro: Vector3<f64>) -> Self {
        Self {
            gyro,
            accel: Vector3::zeros(),
        }
    }
}

impl Default for ImuBias {
    fn default() -> Self {
        Self::zero()
    }
}

/// Single IMU measurement.
#[derive(Debug, Clone, Copy)]
pub struct ImuSample {
    pub timestamp_s: f64,
    pub accel: Vector3<f64>,
    pub gyro: Vector3<f64>,
}
