//! Synthetic alignment windows.
//!
//! Generates keyframe poses and raw IMU samples from a smooth ground-truth
//! trajectory, then preintegrates the samples between consecutive keyframes.
//! Useful for testing the alignment pipeline without a camera front end.
//!
//! The trajectory rotates at a constant body rate and translates along a
//! smooth curve, so that both the gyroscope bias and gravity are observable.

use nalgebra::{UnitQuaternion, Vector3};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use crate::geometry::{exp_so3, SE3};
use crate::imu::{GRAVITY, ImuBias, ImuNoise, ImuSample, Preintegrator};

/// Parameters of a synthetic window.
#[derive(Debug, Clone)]
pub struct SyntheticWindowConfig {
    /// Number of keyframe poses (N). The window has N-1 measurements.
    pub num_poses: usize,
    /// Time between keyframes (s).
    pub keyframe_interval: f64,
    /// IMU sampling rate (Hz).
    pub imu_rate: f64,
    /// Constant body angular velocity (rad/s).
    pub angular_velocity: Vector3<f64>,
    /// Gravity in the world frame of the poses (m/s²).
    pub gravity: Vector3<f64>,
    /// Initial body orientation.
    pub initial_rotation: UnitQuaternion<f64>,
    /// Bias added to every IMU sample.
    pub bias: ImuBias,
    /// White noise added to every IMU sample.
    pub noise: ImuNoise,
    /// Seed of the noise generator.
    pub seed: u64,
}

impl Default for SyntheticWindowConfig {
    fn default() -> Self {
        Self {
            num_poses: 10,
            keyframe_interval: 0.1,
            imu_rate: 1000.0,
            angular_velocity: Vector3::new(0.3, -0.25, 0.4),
            gravity: GRAVITY,
            initial_rotation: UnitQuaternion::from_euler_angles(0.2, -0.1, 0.7),
            bias: ImuBias::zero(),
            noise: ImuNoise::zero(),
            seed: 42,
        }
    }
}

/// Ground truth and measurements of a generated window.
#[derive(Debug, Clone)]
pub struct SyntheticWindow {
    /// Keyframe poses (T_wb).
    pub poses: Vec<SE3>,
    /// Time between consecutive keyframes.
    pub delta_t: Vec<f64>,
    /// Preintegrated IMU between consecutive keyframes, at zero bias.
    pub pims: Vec<Preintegrator>,
    /// True world-frame velocity at every keyframe.
    pub velocities: Vec<Vector3<f64>>,
    /// True gravity in the world frame of the poses.
    pub gravity: Vector3<f64>,
    /// True IMU bias.
    pub bias: ImuBias,
}

/// Smooth position curve of the trajectory.
fn position(t: f64) -> Vector3<f64> {
    Vector3::new(
        0.5 * t + 0.3 * (1.3 * t).sin(),
        0.2 * t * t,
        0.4 * (0.9 * t).cos() - 0.1 * t,
    )
}

fn velocity(t: f64) -> Vector3<f64> {
    Vector3::new(
        0.5 + 0.39 * (1.3 * t).cos(),
        0.4 * t,
        -0.36 * (0.9 * t).sin() - 0.1,
    )
}

fn acceleration(t: f64) -> Vector3<f64> {
    Vector3::new(-0.507 * (1.3 * t).sin(), 0.4, -0.324 * (0.9 * t).cos())
}

impl SyntheticWindow {
    /// Generate a window from the given parameters.
    pub fn generate(config: &SyntheticWindowConfig) -> Self {
        assert!(config.num_poses > 0, "window needs at least one pose");
        assert!(config.imu_rate > 0.0 && config.keyframe_interval > 0.0);

        let steps_per_keyframe =
            (config.keyframe_interval * config.imu_rate).round().max(1.0) as usize;
        let imu_dt = 1.0 / config.imu_rate;
        let keyframe_dt = steps_per_keyframe as f64 * imu_dt;

        let rotation_at =
            |t: f64| config.initial_rotation * exp_so3(&(config.angular_velocity * t));

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let gyro_sigma = config.noise.sigma_gyro * config.imu_rate.sqrt();
        let accel_sigma = config.noise.sigma_accel * config.imu_rate.sqrt();
        let gyro_noise = Normal::new(0.0, gyro_sigma).ok();
        let accel_noise = Normal::new(0.0, accel_sigma).ok();
        let mut sample_noise = |dist: &Option<Normal<f64>>| match dist {
            Some(normal) if !config.noise.is_zero() => {
                Vector3::from_fn(|_, _| normal.sample(&mut rng))
            }
            _ => Vector3::zeros(),
        };

        let num_samples = (config.num_poses - 1) * steps_per_keyframe + 1;
        let samples: Vec<ImuSample> = (0..num_samples)
            .map(|k| {
                let t = k as f64 * imu_dt;
                let rot = rotation_at(t);
                let specific_force = rot.inverse() * (acceleration(t) - config.gravity);
                ImuSample {
                    timestamp_s: t,
                    accel: specific_force + config.bias.accel + sample_noise(&accel_noise),
                    gyro: config.angular_velocity + config.bias.gyro + sample_noise(&gyro_noise),
                }
            })
            .collect();

        let times: Vec<f64> = (0..config.num_poses).map(|i| i as f64 * keyframe_dt).collect();
        let poses = times
            .iter()
            .map(|&t| SE3 {
                rotation: rotation_at(t),
                translation: position(t),
            })
            .collect();
        let velocities = times.iter().map(|&t| velocity(t)).collect();

        let pims = (0..config.num_poses - 1)
            .map(|i| {
                let start = i * steps_per_keyframe;
                let mut preint = Preintegrator::new(ImuBias::zero());
                preint.integrate_samples(&samples[start..=start + steps_per_keyframe]);
                preint
            })
            .collect();

        Self {
            poses,
            delta_t: vec![keyframe_dt; config.num_poses - 1],
            pims,
            velocities,
            gravity: config.gravity,
            bias: config.bias,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imu::PreintegratedMeasurement;
    use crate::initialization::{AlignmentError, OnlineGravityAlignment};
    use approx::assert_relative_eq;

    #[test]
    fn test_trajectory_derivatives_are_consistent() {
        let h = 1e-5;
        for t in [0.0, 0.37, 1.2] {
            let dp = (position(t + h) - position(t - h)) / (2.0 * h);
            let dv = (velocity(t + h) - velocity(t - h)) / (2.0 * h);
            assert_relative_eq!(dp, velocity(t), epsilon = 1e-8);
            assert_relative_eq!(dv, acceleration(t), epsilon = 1e-8);
        }
    }

    #[test]
    fn test_window_shape() {
        let config = SyntheticWindowConfig {
            num_poses: 6,
            ..SyntheticWindowConfig::default()
        };
        let window = SyntheticWindow::generate(&config);

        assert_eq!(window.poses.len(), 6);
        assert_eq!(window.delta_t.len(), 5);
        assert_eq!(window.pims.len(), 5);
        for (pim, dt) in window.pims.iter().zip(&window.delta_t) {
            assert_relative_eq!(pim.delta_time(), *dt, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_noiseless_preintegration_matches_ground_truth() {
        let window = SyntheticWindow::generate(&SyntheticWindowConfig::default());

        for (i, pim) in window.pims.iter().enumerate() {
            let (rot, pos, vel) = pim.propagate(
                window.poses[i].rotation,
                window.poses[i].translation,
                window.velocities[i],
                &window.gravity,
            );
            assert!((rot.inverse() * window.poses[i + 1].rotation).angle() < 1e-10);
            assert_relative_eq!(vel, window.velocities[i + 1], epsilon = 1e-5);
            assert_relative_eq!(pos, window.poses[i + 1].translation, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_end_to_end_with_injected_bias() {
        let bias = Vector3::new(0.01, -0.015, 0.008);
        let gravity = Vector3::new(0.6, 0.3, -9.78).normalize() * 9.81;
        let config = SyntheticWindowConfig {
            bias: ImuBias::from_gyro(bias),
            gravity,
            ..SyntheticWindowConfig::default()
        };
        let window = SyntheticWindow::generate(&config);
        let aligner =
            OnlineGravityAlignment::new(&window.poses, &window.delta_t, &window.pims, &GRAVITY);

        let estimate = aligner.align_visual_inertial_estimates(true).unwrap();

        assert_relative_eq!(estimate.gyro_bias, bias, epsilon = 1e-4);
        assert_relative_eq!(estimate.gravity.norm(), 9.81, epsilon = 1e-9);
        assert!(estimate.gravity.angle(&gravity) < 1e-3);
        for (est, truth) in estimate.velocities.iter().zip(&window.velocities) {
            assert_relative_eq!(*est, *truth, epsilon = 1e-2);
        }
    }

    #[test]
    fn test_end_to_end_with_noise() {
        let bias = Vector3::new(-0.02, 0.01, 0.005);
        let config = SyntheticWindowConfig {
            num_poses: 15,
            keyframe_interval: 0.2,
            imu_rate: 200.0,
            bias: ImuBias::from_gyro(bias),
            noise: ImuNoise::default(),
            seed: 7,
            ..SyntheticWindowConfig::default()
        };
        let window = SyntheticWindow::generate(&config);
        let aligner =
            OnlineGravityAlignment::new(&window.poses, &window.delta_t, &window.pims, &GRAVITY);

        let estimate = aligner.align_visual_inertial_estimates(true).unwrap();

        assert_relative_eq!(estimate.gyro_bias, bias, epsilon = 2e-3);
        assert_relative_eq!(estimate.gravity.norm(), 9.81, epsilon = 1e-9);
        assert!(estimate.gravity.angle(&GRAVITY) < 2e-2);
    }

    #[test]
    fn test_same_seed_same_estimate() {
        let config = SyntheticWindowConfig {
            noise: ImuNoise::default(),
            seed: 3,
            ..SyntheticWindowConfig::default()
        };
        let a = SyntheticWindow::generate(&config);
        let b = SyntheticWindow::generate(&config);

        let est_a = OnlineGravityAlignment::new(&a.poses, &a.delta_t, &a.pims, &GRAVITY)
            .align_visual_inertial_estimates(true)
            .unwrap();
        let est_b = OnlineGravityAlignment::new(&b.poses, &b.delta_t, &b.pims, &GRAVITY)
            .align_visual_inertial_estimates(true)
            .unwrap();

        assert_eq!(est_a, est_b);
    }

    #[test]
    fn test_bias_only_on_real_preintegration() {
        let bias = Vector3::new(0.005, 0.012, -0.01);
        let config = SyntheticWindowConfig {
            bias: ImuBias::from_gyro(bias),
            ..SyntheticWindowConfig::default()
        };
        let window = SyntheticWindow::generate(&config);
        let aligner =
            OnlineGravityAlignment::new(&window.poses, &window.delta_t, &window.pims, &GRAVITY);

        let estimate = aligner.estimate_gyroscope_bias_only().unwrap();

        assert_relative_eq!(estimate, bias, epsilon = 1e-4);
    }

    #[test]
    fn test_short_window_fails() {
        let config = SyntheticWindowConfig {
            num_poses: 2,
            ..SyntheticWindowConfig::default()
        };
        let window = SyntheticWindow::generate(&config);
        let aligner =
            OnlineGravityAlignment::new(&window.poses, &window.delta_t, &window.pims, &GRAVITY);

        assert!(matches!(
            aligner.align_visual_inertial_estimates(true),
            Err(AlignmentError::InsufficientFrames { .. })
        ));
    }
}
