//! `Matrix`: a dense two-dimensional matrix of reals.
//!
//! A thin newtype around `nalgebra::DMatrix<f64>` with the handful of
//! operations the correlation and covariance code needs.

use crate::array::Array;
use nalgebra::DMatrix;
use std::ops::{Add, Index, IndexMut, Mul};
use xa_core::Real;

/// A dynamically-sized 2D matrix of `Real` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix(DMatrix<Real>);

impl Matrix {
    /// Create a zero-filled `rows × cols` matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self(DMatrix::zeros(rows, cols))
    }

    /// Create an `n × n` identity matrix.
    pub fn identity(n: usize) -> Self {
        Self(DMatrix::identity(n, n))
    }

    /// Create a matrix from row-major data.
    pub fn from_row_slice(rows: usize, cols: usize, data: &[Real]) -> Self {
        Self(DMatrix::from_row_slice(rows, cols, data))
    }

    /// Create a matrix by evaluating `f(i, j)` for every entry.
    pub fn from_fn<F: FnMut(usize, usize) -> Real>(rows: usize, cols: usize, f: F) -> Self {
        Self(DMatrix::from_fn(rows, cols, f))
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.0.nrows()
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.0.ncols()
    }

    /// Return `true` if the matrix is square.
    pub fn is_square(&self) -> bool {
        self.0.is_square()
    }

    /// Return `true` if square and `|m_ij - m_ji| <= tolerance` everywhere.
    pub fn is_symmetric(&self, tolerance: Real) -> bool {
        if !self.is_square() {
            return false;
        }
        let n = self.rows();
        (0..n).all(|i| (0..i).all(|j| (self.0[(i, j)] - self.0[(j, i)]).abs() <= tolerance))
    }

    /// Borrow the inner `DMatrix`.
    pub fn inner(&self) -> &DMatrix<Real> {
        &self.0
    }

    /// Consume and return the inner `DMatrix`.
    pub fn into_inner(self) -> DMatrix<Real> {
        self.0
    }

    /// Transpose.
    pub fn transpose(&self) -> Self {
        Self(self.0.transpose())
    }

    /// Diagonal entries.
    pub fn diagonal(&self) -> Array {
        Array::from(self.0.diagonal())
    }

    /// Matrix-vector product.
    pub fn mul_vec(&self, v: &Array) -> Array {
        Array::from(&self.0 * v.inner())
    }

    /// Multiply every entry by `scalar`.
    pub fn scale(&self, scalar: Real) -> Self {
        Self(&self.0 * scalar)
    }

    /// Square sub-matrix on the given row/column `indices`.
    pub fn select(&self, indices: &[usize]) -> Self {
        let n = indices.len();
        Self::from_fn(n, n, |i, j| self.0[(indices[i], indices[j])])
    }

    /// Largest absolute entry-wise difference to `other`.
    pub fn max_abs_diff(&self, other: &Matrix) -> Real {
        self.0
            .iter()
            .zip(other.0.iter())
            .fold(0.0, |m, (a, b)| m.max((a - b).abs()))
    }
}

impl From<DMatrix<Real>> for Matrix {
    fn from(m: DMatrix<Real>) -> Self {
        Self(m)
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = Real;
    fn index(&self, idx: (usize, usize)) -> &Real {
        &self.0[idx]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, idx: (usize, usize)) -> &mut Real {
        &mut self.0[idx]
    }
}

impl Add for &Matrix {
    type Output = Matrix;
    fn add(self, rhs: &Matrix) -> Matrix {
        Matrix(&self.0 + &rhs.0)
    }
}

impl Mul for &Matrix {
    type Output = Matrix;
    fn mul(self, rhs: &Matrix) -> Matrix {
        Matrix(&self.0 * &rhs.0)
    }
}

impl std::fmt::Display for Matrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for i in 0..self.rows() {
            write!(f, "|")?;
            for j in 0..self.cols() {
                write!(f, " {:>9.6}", self.0[(i, j)])?;
            }
            writeln!(f, " |")?;
        }
        Ok(())
    }
}
