//! 1D interpolation trait and the two schemes used by the term structures:
//! linear (zero rates, inflation zero rates, hazard rates) and log-linear
//! (discount factors, survival probabilities).

use xa_core::{errors::Result, Real};

/// A 1D interpolation `f: R → R` defined by a set of known points.
pub trait Interpolation1D: std::fmt::Debug + Send + Sync {
    /// Evaluate the interpolation at `x`. Outside the node range the end
    /// segment is extended.
    fn operator(&self, x: Real) -> Real;

    /// Lower bound of the node range.
    fn x_min(&self) -> Real;

    /// Upper bound of the node range.
    fn x_max(&self) -> Real;

    /// Return `true` if `x` is within the node range.
    fn is_in_range(&self, x: Real) -> bool {
        x >= self.x_min() && x <= self.x_max()
    }
}

// ── Linear ────────────────────────────────────────────────────────────────────

/// Linear interpolation.
///
/// `f(x) = y[i] + (y[i+1] - y[i]) * (x - x[i]) / (x[i+1] - x[i])`
#[derive(Debug, Clone)]
pub struct LinearInterpolation {
    xs: Vec<Real>,
    ys: Vec<Real>,
}

impl LinearInterpolation {
    /// Construct a linear interpolation from strictly increasing `xs` and
    /// the corresponding `ys`.
    ///
    /// # Errors
    /// Returns an error if the slices have different lengths, fewer than 2
    /// points or non-increasing abscissae.
    pub fn new(xs: &[Real], ys: &[Real]) -> Result<Self> {
        xa_core::ensure!(xs.len() >= 2, "need at least 2 points for interpolation");
        xa_core::ensure!(xs.len() == ys.len(), "xs and ys must have the same length");
        xa_core::ensure!(
            crate::comparison::is_strictly_increasing(xs),
            "interpolation abscissae must be strictly increasing"
        );
        Ok(Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
        })
    }

    /// Index `i` of the segment `[x_i, x_{i+1}]` used for `x`.
    fn locate(&self, x: Real) -> usize {
        let n = self.xs.len();
        if x <= self.xs[0] {
            return 0;
        }
        if x >= self.xs[n - 1] {
            return n - 2;
        }
        // first node strictly above x, minus one
        self.xs.partition_point(|&xi| xi <= x) - 1
    }

    /// Derivative at `x` (slope of the enclosing segment).
    pub fn derivative(&self, x: Real) -> Real {
        let i = self.locate(x);
        (self.ys[i + 1] - self.ys[i]) / (self.xs[i + 1] - self.xs[i])
    }
}

impl Interpolation1D for LinearInterpolation {
    fn x_min(&self) -> Real {
        self.xs[0]
    }

    fn x_max(&self) -> Real {
        self.xs[self.xs.len() - 1]
    }

    fn operator(&self, x: Real) -> Real {
        let i = self.locate(x);
        self.ys[i] + (x - self.xs[i]) * (self.ys[i + 1] - self.ys[i]) / (self.xs[i + 1] - self.xs[i])
    }
}

// ── Log-linear ────────────────────────────────────────────────────────────────

/// Log-linear interpolation: interpolates `ln y` linearly and exponentiates
/// the result.
#[derive(Debug, Clone)]
pub struct LogLinearInterpolation {
    inner: LinearInterpolation,
}

impl LogLinearInterpolation {
    /// Construct a log-linear interpolation. All `ys` must be strictly
    /// positive.
    pub fn new(xs: &[Real], ys: &[Real]) -> Result<Self> {
        xa_core::ensure!(
            ys.iter().all(|&y| y > 0.0),
            "all y values must be positive for log-linear interpolation"
        );
        let log_ys: Vec<Real> = ys.iter().map(|&y| y.ln()).collect();
        Ok(Self {
            inner: LinearInterpolation::new(xs, &log_ys)?,
        })
    }

    /// Derivative of `ln f` at `x`.
    pub fn log_derivative(&self, x: Real) -> Real {
        self.inner.derivative(x)
    }
}

impl Interpolation1D for LogLinearInterpolation {
    fn x_min(&self) -> Real {
        self.inner.x_min()
    }

    fn x_max(&self) -> Real {
        self.inner.x_max()
    }

    fn operator(&self, x: Real) -> Real {
        self.inner.operator(x).exp()
    }
}
