//! Visual-inertial initialization by online gravity alignment.
//!
//! The entry point is [`OnlineGravityAlignment`], bound to one window of poses
//! and preintegrated measurements. The individual stages are exposed as well,
//! for callers that need only part of the pipeline.

pub mod config;
pub mod error;
pub mod frames;
pub mod gravity_refinement;
pub mod gyro_bias;
pub mod linear_alignment;
mod online_alignment;

pub use config::AlignmentConfig;
pub use error::{AlignmentError, AlignmentStage};
pub use frames::{build_frames, gyroscope_residuals, update_delta_states, VisualInertialFrame};
pub use gravity_refinement::{create_tangent_basis, refine_gravity, RefinedGravity};
pub use gyro_bias::{estimate_bias_and_update_states, estimate_gyroscope_bias};
pub use linear_alignment::{align_estimates_linearly, AlignmentSolution, GravityParameterization};
pub use online_alignment::{AlignmentEstimate, OnlineGravityAlignment};
