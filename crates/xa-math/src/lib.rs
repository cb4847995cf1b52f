//! # xa-math
//!
//! Mathematical utilities: matrix/array newtypes (over nalgebra), matrix
//! decompositions and correlation salvaging, the normal distribution (via
//! statrs), Gauss-Legendre quadrature, root finding, Levenberg-Marquardt
//! least squares, random number generation and streaming statistics.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// `Array`: dense real vector.
pub mod array;

/// Floating-point comparison utilities.
pub mod comparison;

/// Normal distribution.
pub mod distributions;

/// Gauss-Legendre quadrature.
pub mod integrals;

/// 1D interpolation schemes.
pub mod interpolations;

/// `Matrix`: dense real matrix.
pub mod matrix;

/// Decompositions, pseudo square roots and correlation salvaging.
pub mod matrix_utilities;

/// Least-squares optimisation.
pub mod optimization;

/// Random number generators.
pub mod random_numbers;

/// 1D root-finding solvers.
pub mod solvers1d;

/// Statistics accumulators.
pub mod statistics;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use array::Array;
pub use comparison::close;
pub use distributions::{normal_cdf, normal_cdf_inverse, normal_pdf};
pub use integrals::GaussLegendre;
pub use interpolations::{Interpolation1D, LinearInterpolation, LogLinearInterpolation};
pub use matrix::Matrix;
pub use optimization::{
    CostFunction, EndCriteria, EndCriteriaType, LevenbergMarquardt, OptimizationResult,
};
pub use random_numbers::{GaussianSequenceGenerator, MersenneTwisterUniformRng};
pub use statistics::{SequenceStatistics, Statistics};
