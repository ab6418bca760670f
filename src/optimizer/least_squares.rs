//! Dense linear least-squares solve used by the alignment stages.
//!
//! Solves `min ‖A x − b‖²` with a singular value decomposition. The numerical
//! rank is measured relative to the largest singular value, so that the check
//! does not depend on the units of the unknowns.

use nalgebra::{DMatrix, DVector};

/// Smallest relative singular value accepted when none is configured.
pub const DEFAULT_RANK_TOLERANCE: f64 = 1e-10;

/// Outcome of a least-squares solve.
#[derive(Debug, Clone)]
pub struct LeastSquaresSolution {
    /// Minimizer of ‖A x − b‖².
    pub x: DVector<f64>,
    /// Ratio of the smallest to the largest singular value of `A`.
    pub inverse_condition: f64,
    /// Root-mean-square of the residual `A x − b`.
    pub rms_residual: f64,
}

/// Solve `A x ≈ b` in the least-squares sense.
///
/// Returns `None` when `A` is empty, contains non-finite values, or has
/// numerical rank below its column count (singular values smaller than
/// `rank_tolerance · σ_max` are treated as zero).
pub fn solve_least_squares(
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    rank_tolerance: f64,
) -> Option<LeastSquaresSolution> {
    assert_eq!(a.nrows(), b.len(), "row count of A must match length of b");

    let cols = a.ncols();
    if cols == 0 || a.nrows() < cols {
        return None;
    }
    if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        return None;
    }

    let svd = a.clone().svd(true, true);
    let sigma_max = svd.singular_values.max();
    if sigma_max <= 0.0 {
        return None;
    }

    let threshold = rank_tolerance * sigma_max;
    if svd.rank(threshold) < cols {
        return None;
    }

    let x = svd.solve(b, threshold).ok()?;
    let residual = a * &x - b;
    let rms_residual = (residual.norm_squared() / residual.len() as f64).sqrt();

    Some(LeastSquaresSolution {
        x,
        inverse_condition: svd.singular_values.min() / sigma_max,
        rms_residual,
    })
}
