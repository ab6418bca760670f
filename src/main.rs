use anyhow::{Context, Result, bail};
use nalgebra::Vector3;

use rust_vio_init::imu::{GRAVITY, ImuBias, ImuNoise};
use rust_vio_init::initialization::OnlineGravityAlignment;
use rust_vio_init::simulation::{SyntheticWindow, SyntheticWindowConfig};

fn main() -> Result<()> {
    let num_poses: usize = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse()
            .with_context(|| format!("invalid number of poses: {arg}"))?,
        None => 10,
    };
    if num_poses < 3 {
        bail!("need at least 3 poses, got {num_poses}");
    }

    let true_bias = Vector3::new(0.012, -0.006, 0.009);
    let true_gravity = Vector3::new(0.8, -0.4, -9.74).normalize() * GRAVITY.norm();
    let config = SyntheticWindowConfig {
        num_poses,
        keyframe_interval: 0.2,
        imu_rate: 200.0,
        gravity: true_gravity,
        bias: ImuBias::from_gyro(true_bias),
        noise: ImuNoise::default(),
        ..SyntheticWindowConfig::default()
    };
    let window = SyntheticWindow::generate(&config);
    println!(
        "Generated window: {} poses over {:.2}s, IMU at {:.0} Hz",
        window.poses.len(),
        window.delta_t.iter().sum::<f64>(),
        config.imu_rate
    );

    let aligner =
        OnlineGravityAlignment::new(&window.poses, &window.delta_t, &window.pims, &GRAVITY);

    let bias_only = aligner
        .estimate_gyroscope_bias_only()
        .context("bias-only estimation failed")?;
    println!(
        "Bias only:   bg = [{:.5}, {:.5}, {:.5}]",
        bias_only.x, bias_only.y, bias_only.z
    );

    let estimate = aligner
        .align_visual_inertial_estimates(true)
        .context("gravity alignment failed")?;
    println!(
        "Full:        bg = [{:.5}, {:.5}, {:.5}] (true [{:.5}, {:.5}, {:.5}])",
        estimate.gyro_bias.x,
        estimate.gyro_bias.y,
        estimate.gyro_bias.z,
        true_bias.x,
        true_bias.y,
        true_bias.z
    );
    println!(
        "Gravity:     g = [{:.4}, {:.4}, {:.4}] |g| = {:.6}, error {:.3} deg, {} refinement rounds",
        estimate.gravity.x,
        estimate.gravity.y,
        estimate.gravity.z,
        estimate.gravity.norm(),
        estimate.gravity.angle(&true_gravity).to_degrees(),
        estimate.refinement_iterations
    );

    let nav = &estimate.nav_state;
    let (roll, pitch, yaw) = nav.rotation.euler_angles();
    println!(
        "Init state:  rpy = [{:.2}, {:.2}, {:.2}] deg, v = [{:.3}, {:.3}, {:.3}] m/s",
        roll.to_degrees(),
        pitch.to_degrees(),
        yaw.to_degrees(),
        nav.velocity.x,
        nav.velocity.y,
        nav.velocity.z
    );

    Ok(())
}
