//! Numerical solvers shared by the initialization stages.
//!
//! The alignment problems are small and dense (3 unknowns for the gyro bias,
//! 3N + 3 for velocities and gravity), so a dense SVD solve is used throughout.

pub mod least_squares;

pub use least_squares::{solve_least_squares, LeastSquaresSolution};
