//! Matrix decompositions, square roots and correlation salvaging.
//!
//! Wraps nalgebra's decompositions. The square-root helpers return a matrix
//! `S` with `S·Sᵀ = M`; they are used to turn correlation matrices into
//! Brownian loadings and transition covariances into path increments.

use crate::array::Array;
use crate::matrix::Matrix;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use xa_core::{
    errors::{Error, Result},
    Real,
};

/// Tolerance used when checking symmetry and unit diagonals of
/// correlation matrices.
pub const CORRELATION_TOLERANCE: Real = 1e-12;

/// Policy applied to correlation matrices that are not positive
/// semi-definite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Salvaging {
    /// Reject an invalid matrix.
    #[default]
    None,
    /// Project onto the nearest valid correlation matrix by clipping
    /// negative eigenvalues and renormalising the rows of the root.
    NearestValid,
}

/// Cholesky decomposition of a symmetric positive-definite matrix.
///
/// Returns the lower-triangular factor `L` such that `A = L * Lᵀ`.
pub fn cholesky_decomposition(m: &Matrix) -> Result<Matrix> {
    if !m.is_square() {
        return Err(Error::InvalidArgument("matrix must be square".into()));
    }
    match m.inner().clone().cholesky() {
        Some(chol) => Ok(Matrix::from(chol.l())),
        None => Err(Error::Runtime(
            "Cholesky decomposition failed: matrix is not positive-definite".into(),
        )),
    }
}

/// Eigenvalue decomposition of a symmetric real matrix.
///
/// Returns `(eigenvalues, eigenvectors)`; each column of the eigenvector
/// matrix belongs to the eigenvalue at the same position. The order is the
/// one produced by nalgebra and is not sorted.
pub fn symmetric_eigen(m: &Matrix) -> Result<(Array, Matrix)> {
    if !m.is_square() {
        return Err(Error::InvalidArgument("matrix must be square".into()));
    }
    let eigen = m.inner().clone().symmetric_eigen();
    Ok((
        Array::from(eigen.eigenvalues.clone_owned()),
        Matrix::from(eigen.eigenvectors),
    ))
}

/// Smallest eigenvalue of a symmetric matrix.
pub fn min_eigenvalue(m: &Matrix) -> Result<Real> {
    let (values, _) = symmetric_eigen(m)?;
    Ok(values.iter().cloned().fold(Real::INFINITY, Real::min))
}

/// Pseudo square-root of a symmetric positive-semidefinite matrix.
///
/// Computes `S = E·√Λ⁺` with negative eigenvalues clipped at zero, so that
/// `S·Sᵀ` is the closest PSD matrix in the spectral sense.
pub fn pseudo_sqrt(m: &Matrix) -> Result<Matrix> {
    let (eigenvalues, eigenvectors) = symmetric_eigen(m)?;
    let n = eigenvalues.len();
    let mut diag = DMatrix::<Real>::zeros(n, n);
    for i in 0..n {
        diag[(i, i)] = eigenvalues[i].max(0.0).sqrt();
    }
    Ok(Matrix::from(eigenvectors.into_inner() * diag))
}

/// Square root of a covariance-like matrix: Cholesky when the matrix is
/// positive definite, pseudo square root otherwise (singular blocks such as
/// perfectly correlated auxiliary states).
pub fn covariance_sqrt(m: &Matrix) -> Result<Matrix> {
    match cholesky_decomposition(m) {
        Ok(l) => Ok(l),
        Err(Error::Runtime(_)) => pseudo_sqrt(m),
        Err(e) => Err(e),
    }
}

/// Check the structural properties of a correlation matrix: square,
/// symmetric, unit diagonal and entries in `[-1, 1]`.
pub fn check_correlation_structure(m: &Matrix) -> Result<()> {
    xa_core::ensure_dim!(
        m.is_square(),
        "correlation matrix must be square, got {}x{}",
        m.rows(),
        m.cols()
    );
    xa_core::ensure_dim!(
        m.is_symmetric(CORRELATION_TOLERANCE),
        "correlation matrix is not symmetric"
    );
    for i in 0..m.rows() {
        xa_core::ensure_dim!(
            (m[(i, i)] - 1.0).abs() <= CORRELATION_TOLERANCE,
            "correlation matrix diagonal entry {i} is {} (expected 1)",
            m[(i, i)]
        );
        for j in 0..i {
            xa_core::ensure_dim!(
                m[(i, j)].abs() <= 1.0 + CORRELATION_TOLERANCE,
                "correlation ({i},{j}) = {} outside [-1,1]",
                m[(i, j)]
            );
        }
    }
    Ok(())
}

/// Spectral projection onto the set of valid correlation matrices.
///
/// Negative eigenvalues are clipped, the rows of `E·√Λ⁺` are normalised to
/// unit length and the result is `B·Bᵀ`. A valid input is returned
/// unchanged up to rounding.
pub fn nearest_correlation(m: &Matrix) -> Result<Matrix> {
    let root = pseudo_sqrt(m)?;
    let n = root.rows();
    let mut b = root.into_inner();
    for i in 0..n {
        let norm = b.row(i).norm();
        xa_core::ensure_dim!(
            norm > 0.0,
            "cannot salvage correlation matrix: row {i} has no positive spectral weight"
        );
        for j in 0..n {
            b[(i, j)] /= norm;
        }
    }
    let mut r = &b * b.transpose();
    // exact symmetry and unit diagonal after rounding
    for i in 0..n {
        r[(i, i)] = 1.0;
        for j in 0..i {
            let avg = 0.5 * (r[(i, j)] + r[(j, i)]);
            r[(i, j)] = avg;
            r[(j, i)] = avg;
        }
    }
    Ok(Matrix::from(r))
}

/// Validate a correlation matrix under `policy`, returning the matrix to
/// use and a flag telling whether salvaging changed it.
pub fn salvage_correlation(m: &Matrix, policy: Salvaging) -> Result<(Matrix, bool)> {
    check_correlation_structure(m)?;
    let lambda = min_eigenvalue(m)?;
    if lambda >= -CORRELATION_TOLERANCE {
        return Ok((m.clone(), false));
    }
    match policy {
        Salvaging::None => Err(Error::Dimension(format!(
            "correlation matrix is not positive semi-definite (smallest eigenvalue {lambda:e})"
        ))),
        Salvaging::NearestValid => {
            let fixed = nearest_correlation(m)?;
            tracing::warn!(
                min_eigenvalue = lambda,
                max_change = fixed.max_abs_diff(m),
                "correlation matrix salvaged"
            );
            Ok((fixed, true))
        }
    }
}
