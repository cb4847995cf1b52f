//! Statistics accumulators for Monte Carlo output.
//!
//! Both accumulators use Welford updates, so they are stable for samples
//! with a large mean (log FX levels, long-dated states), and they can be
//! merged, which lets path batches be accumulated independently.

use crate::matrix::Matrix;
use xa_core::Real;

/// Scalar statistics accumulator.
#[derive(Debug, Clone)]
pub struct Statistics {
    count: usize,
    mean: Real,
    m2: Real,
    min: Real,
    max: Real,
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

impl Statistics {
    /// Create a new empty accumulator.
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Add a sample.
    pub fn add(&mut self, x: Real) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as Real;
        self.m2 += delta * (x - self.mean);
        self.min = self.min.min(x);
        self.max = self.max.max(x);
    }

    /// Number of samples.
    pub fn samples(&self) -> usize {
        self.count
    }

    /// Sample mean. `None` if no samples have been added.
    pub fn mean(&self) -> Option<Real> {
        (self.count > 0).then_some(self.mean)
    }

    /// Unbiased sample variance. `None` for fewer than 2 samples.
    pub fn variance(&self) -> Option<Real> {
        (self.count > 1).then(|| self.m2 / (self.count as Real - 1.0))
    }

    /// Standard deviation. `None` for fewer than 2 samples.
    pub fn std_dev(&self) -> Option<Real> {
        self.variance().map(Real::sqrt)
    }

    /// Standard error of the mean.
    pub fn error_estimate(&self) -> Option<Real> {
        self.variance().map(|v| (v / self.count as Real).sqrt())
    }

    /// Minimum sample value.
    pub fn minimum(&self) -> Option<Real> {
        (self.count > 0).then_some(self.min)
    }

    /// Maximum sample value.
    pub fn maximum(&self) -> Option<Real> {
        (self.count > 0).then_some(self.max)
    }

    /// Fold the samples of `other` into `self`.
    pub fn merge(&mut self, other: &Statistics) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }
        let n = (self.count + other.count) as Real;
        let delta = other.mean - self.mean;
        self.m2 += other.m2 + delta * delta * self.count as Real * other.count as Real / n;
        self.mean += delta * other.count as Real / n;
        self.count += other.count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Reset the accumulator to its initial state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Multivariate statistics accumulator: mean vector and covariance.
#[derive(Debug, Clone)]
pub struct SequenceStatistics {
    count: usize,
    mean: Vec<Real>,
    m2: Matrix,
}

impl SequenceStatistics {
    /// Accumulator for samples of the given `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self {
            count: 0,
            mean: vec![0.0; dimension],
            m2: Matrix::zeros(dimension, dimension),
        }
    }

    /// Sample dimension.
    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    /// Number of samples.
    pub fn samples(&self) -> usize {
        self.count
    }

    /// Add one sample.
    ///
    /// # Errors
    /// Returns an error if `x` does not have the accumulator's dimension.
    pub fn add(&mut self, x: &[Real]) -> xa_core::Result<()> {
        let n = self.dimension();
        xa_core::ensure_dim!(x.len() == n, "sample size {} differs from dimension {n}", x.len());
        self.count += 1;
        let c = self.count as Real;
        let before: Vec<Real> = x.iter().zip(&self.mean).map(|(xi, mi)| xi - mi).collect();
        for (m, d) in self.mean.iter_mut().zip(&before) {
            *m += d / c;
        }
        for i in 0..n {
            let after_i = x[i] - self.mean[i];
            for j in 0..n {
                self.m2[(i, j)] += after_i * before[j];
            }
        }
        Ok(())
    }

    /// Sample mean vector.
    pub fn mean(&self) -> Vec<Real> {
        self.mean.clone()
    }

    /// Unbiased sample covariance (zero matrix for fewer than 2 samples).
    pub fn covariance(&self) -> Matrix {
        if self.count < 2 {
            return Matrix::zeros(self.dimension(), self.dimension());
        }
        let inv = 1.0 / (self.count as Real - 1.0);
        let n = self.dimension();
        // symmetrise the accumulated cross products
        Matrix::from_fn(n, n, |i, j| 0.5 * (self.m2[(i, j)] + self.m2[(j, i)]) * inv)
    }

    /// Sample correlation. Entries involving a component with zero variance
    /// are 0 off the diagonal.
    pub fn correlation(&self) -> Matrix {
        let cov = self.covariance();
        let n = self.dimension();
        Matrix::from_fn(n, n, |i, j| {
            if i == j {
                return 1.0;
            }
            let d = (cov[(i, i)] * cov[(j, j)]).sqrt();
            if d > 0.0 {
                cov[(i, j)] / d
            } else {
                0.0
            }
        })
    }

    /// Fold the samples of `other` into `self`.
    pub fn merge(&mut self, other: &SequenceStatistics) -> xa_core::Result<()> {
        xa_core::ensure_dim!(
            other.dimension() == self.dimension(),
            "cannot merge statistics of dimension {} into {}",
            other.dimension(),
            self.dimension()
        );
        if other.count == 0 {
            return Ok(());
        }
        if self.count == 0 {
            *self = other.clone();
            return Ok(());
        }
        let na = self.count as Real;
        let nb = other.count as Real;
        let n = na + nb;
        let delta: Vec<Real> = other.mean.iter().zip(&self.mean).map(|(b, a)| b - a).collect();
        let dim = self.dimension();
        for i in 0..dim {
            for j in 0..dim {
                self.m2[(i, j)] += other.m2[(i, j)] + delta[i] * delta[j] * na * nb / n;
            }
        }
        for (m, d) in self.mean.iter_mut().zip(&delta) {
            *m += d * nb / n;
        }
        self.count += other.count;
        Ok(())
    }
}
