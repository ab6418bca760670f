use thiserror::Error;

/// Stage of the alignment pipeline that produced a least-squares failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentStage {
    GyroscopeBias,
    LinearAlignment,
    GravityRefinement,
}

impl std::fmt::Display for AlignmentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::GyroscopeBias => "gyroscope bias estimation",
            Self::LinearAlignment => "linear alignment",
            Self::GravityRefinement => "gravity refinement",
        };
        f.write_str(name)
    }
}

/// Expected failure modes of an alignment attempt.
///
/// None of these carry a partial result; the caller may retry later with a
/// longer or more excited window.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlignmentError {
    #[error("alignment window has {frames} frames, at least {required} required")]
    InsufficientFrames { frames: usize, required: usize },

    #[error("insufficient rotational excitation: {total_angle:.3e} rad observed over the window")]
    InsufficientExcitation { total_angle: f64 },

    #[error("rank-deficient least-squares system in {stage}")]
    RankDeficient { stage: AlignmentStage },

    #[error("gravity magnitude {estimated:.4} m/s^2 deviates from reference {reference:.4} m/s^2")]
    GravityMagnitude { estimated: f64, reference: f64 },

    #[error("cannot build a tangent basis for a zero gravity vector")]
    DegenerateGravity,
}
