//! Least-squares optimisation: cost functions, end criteria and a
//! Levenberg-Marquardt solver.
//!
//! The solver follows the classical MINPACK recipe: a forward-difference
//! Jacobian with step `√epsfcn·|x|`, Marquardt diagonal scaling, and the
//! `ftol` / `xtol` / `gtol` convergence tests, where `ftol` is the
//! function epsilon of the [`EndCriteria`].

use crate::array::Array;
use crate::matrix::Matrix;
use nalgebra::{DMatrix, DVector};
use xa_core::{errors::Result, Real};

// ── Cost function trait ───────────────────────────────────────────────────────

/// A vector-valued objective whose squared norm is minimised.
pub trait CostFunction {
    /// Residual vector at `x`.
    fn values(&self, x: &Array) -> Result<Array>;

    /// Scalar cost `½ Σ r²(x)`.
    fn value(&self, x: &Array) -> Result<Real> {
        Ok(0.5 * self.values(x)?.norm_squared())
    }

    /// Jacobian `∂r_i/∂x_j` given the residuals `f0` at `x`. The default
    /// uses forward differences with relative step `√epsfcn`.
    fn jacobian(&self, x: &Array, f0: &Array, epsfcn: Real) -> Result<Matrix> {
        let eps = epsfcn.max(f64::EPSILON).sqrt();
        let n = x.len();
        let m = f0.len();
        let mut jac = Matrix::zeros(m, n);
        for j in 0..n {
            let mut h = eps * x[j].abs();
            if h == 0.0 {
                h = eps;
            }
            let mut xp = x.clone();
            xp[j] += h;
            // use the representable step
            let h = xp[j] - x[j];
            let fp = self.values(&xp)?;
            for i in 0..m {
                jac[(i, j)] = (fp[i] - f0[i]) / h;
            }
        }
        Ok(jac)
    }
}

// ── End criteria ──────────────────────────────────────────────────────────────

/// Criteria to stop an optimisation.
#[derive(Debug, Clone, PartialEq)]
pub struct EndCriteria {
    /// Maximum number of iterations.
    pub max_iterations: usize,
    /// Maximum number of consecutive iterations without an accepted step.
    pub max_stationary_state_iterations: usize,
    /// Stop once every residual is below this in absolute value.
    pub root_epsilon: Real,
    /// Relative reduction of the cost below which the solver stops.
    pub function_epsilon: Real,
    /// Cosine between residuals and Jacobian columns below which the solver
    /// stops.
    pub gradient_norm_epsilon: Real,
}

impl EndCriteria {
    /// Create new end criteria.
    pub fn new(
        max_iterations: usize,
        max_stationary_state_iterations: usize,
        root_epsilon: Real,
        function_epsilon: Real,
        gradient_norm_epsilon: Real,
    ) -> Self {
        Self {
            max_iterations,
            max_stationary_state_iterations,
            root_epsilon,
            function_epsilon,
            gradient_norm_epsilon,
        }
    }
}

impl Default for EndCriteria {
    fn default() -> Self {
        Self::new(1000, 500, 1e-8, 1e-8, 1e-8)
    }
}

/// The reason an optimisation terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndCriteriaType {
    /// Maximum iterations reached.
    MaxIterations,
    /// All residuals below the root epsilon.
    RootEpsilon,
    /// Relative cost reduction below the function epsilon.
    FunctionEpsilon,
    /// Residuals orthogonal to the Jacobian columns.
    GradientNormEpsilon,
    /// Step below `xtol`, or too many consecutive rejected steps.
    StationaryPoint,
}

impl EndCriteriaType {
    /// `true` for the terminations that indicate convergence.
    pub fn converged(self) -> bool {
        !matches!(self, EndCriteriaType::MaxIterations)
    }
}

/// Result of an optimisation.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Final parameter values.
    pub x: Array,
    /// Final cost `½ Σ r²`.
    pub value: Real,
    /// Final residuals.
    pub residuals: Array,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Number of residual evaluations, Jacobian columns included.
    pub function_evaluations: usize,
    /// Reason for termination.
    pub end_type: EndCriteriaType,
}

// ── Levenberg–Marquardt ───────────────────────────────────────────────────────

/// Levenberg–Marquardt least-squares optimizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevenbergMarquardt {
    epsfcn: Real,
    xtol: Real,
    gtol: Real,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self::new(1e-8, 1e-8, 1e-8)
    }
}

impl LevenbergMarquardt {
    /// Create a new solver. `epsfcn` drives the finite-difference step,
    /// `xtol` the relative step test and `gtol` the orthogonality test.
    pub fn new(epsfcn: Real, xtol: Real, gtol: Real) -> Self {
        Self { epsfcn, xtol, gtol }
    }

    /// Minimise `½‖r(x)‖²` starting from `initial_values`.
    pub fn minimize<C: CostFunction + ?Sized>(
        &self,
        cost_fn: &C,
        initial_values: &Array,
        end_criteria: &EndCriteria,
    ) -> Result<OptimizationResult> {
        let n = initial_values.len();
        let mut x = initial_values.clone();
        let mut r = cost_fn.values(&x)?;
        let mut evaluations = 1;
        let mut cost = 0.5 * r.norm_squared();
        let mut lambda = 1e-3;
        let mut rejected = 0;

        if n == 0 || r.max_abs() <= end_criteria.root_epsilon {
            return finished(x, r, 0, evaluations, EndCriteriaType::RootEpsilon);
        }

        let mut jac = cost_fn.jacobian(&x, &r, self.epsfcn)?;
        evaluations += n;

        for iteration in 1..=end_criteria.max_iterations {
            let j = jac.inner();
            let rv = r.inner();
            let jtj: DMatrix<Real> = j.transpose() * j;
            let jtr: DVector<Real> = j.transpose() * rv;

            // orthogonality of the residual to the Jacobian columns
            let r_norm = rv.norm();
            let cosine = (0..n)
                .map(|k| {
                    let col = j.column(k).norm();
                    if col == 0.0 || r_norm == 0.0 {
                        0.0
                    } else {
                        jtr[k].abs() / (col * r_norm)
                    }
                })
                .fold(0.0, Real::max);
            if cosine <= self.gtol.min(end_criteria.gradient_norm_epsilon) {
                return finished(x, r, iteration, evaluations, EndCriteriaType::GradientNormEpsilon);
            }

            let mut a = jtj.clone();
            for k in 0..n {
                let d = jtj[(k, k)].max(1e-300);
                a[(k, k)] += lambda * d;
            }
            let step = match a.cholesky() {
                Some(chol) => chol.solve(&(-&jtr)),
                None => {
                    lambda *= 4.0;
                    rejected += 1;
                    if rejected >= end_criteria.max_stationary_state_iterations {
                        return finished(x, r, iteration, evaluations, EndCriteriaType::StationaryPoint);
                    }
                    continue;
                }
            };

            let trial = Array::from(x.inner() + &step);
            let r_trial = cost_fn.values(&trial)?;
            evaluations += 1;
            let cost_trial = 0.5 * r_trial.norm_squared();

            // predicted reduction of the linear model
            let predicted = -(step.dot(&jtr) + 0.5 * step.dot(&(&jtj * &step)));

            if cost_trial.is_finite() && cost_trial < cost {
                let actual_rel = (cost - cost_trial) / cost;
                let predicted_rel = if cost > 0.0 { predicted / cost } else { 0.0 };
                let step_norm = step.norm();
                x = trial;
                r = r_trial;
                cost = cost_trial;
                lambda = (lambda / 3.0).max(1e-15);
                rejected = 0;

                if r.max_abs() <= end_criteria.root_epsilon {
                    return finished(x, r, iteration, evaluations, EndCriteriaType::RootEpsilon);
                }
                if actual_rel.abs() <= end_criteria.function_epsilon
                    && predicted_rel.abs() <= end_criteria.function_epsilon
                {
                    return finished(x, r, iteration, evaluations, EndCriteriaType::FunctionEpsilon);
                }
                if step_norm <= self.xtol * (x.norm() + self.xtol) {
                    return finished(x, r, iteration, evaluations, EndCriteriaType::StationaryPoint);
                }
                jac = cost_fn.jacobian(&x, &r, self.epsfcn)?;
                evaluations += n;
            } else {
                lambda *= 4.0;
                rejected += 1;
                if rejected >= end_criteria.max_stationary_state_iterations || lambda > 1e300 {
                    return finished(x, r, iteration, evaluations, EndCriteriaType::StationaryPoint);
                }
            }
        }
        finished(x, r, end_criteria.max_iterations, evaluations, EndCriteriaType::MaxIterations)
    }
}

fn finished(
    x: Array,
    residuals: Array,
    iterations: usize,
    function_evaluations: usize,
    end_type: EndCriteriaType,
) -> Result<OptimizationResult> {
    let value = 0.5 * residuals.norm_squared();
    tracing::debug!(iterations, function_evaluations, value, ?end_type, "levenberg-marquardt finished");
    Ok(OptimizationResult {
        x,
        value,
        residuals,
        iterations,
        function_evaluations,
        end_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Rosenbrock written as residuals `(1 - x, 10 (y - x²))`.
    struct Rosenbrock;

    impl CostFunction for Rosenbrock {
        fn values(&self, x: &Array) -> Result<Array> {
            Ok(Array::from_slice(&[1.0 - x[0], 10.0 * (x[1] - x[0] * x[0])]))
        }
    }

    /// Fit `a·exp(b t)` to exact data.
    struct ExpFit {
        t: Vec<Real>,
        y: Vec<Real>,
    }

    impl CostFunction for ExpFit {
        fn values(&self, x: &Array) -> Result<Array> {
            Ok(self
                .t
                .iter()
                .zip(&self.y)
                .map(|(t, y)| x[0] * (x[1] * t).exp() - y)
                .collect::<Vec<_>>()
                .into())
        }
    }

    #[test]
    fn rosenbrock_minimum() {
        let res = LevenbergMarquardt::default()
            .minimize(&Rosenbrock, &Array::from_slice(&[-1.2, 1.0]), &EndCriteria::default())
            .unwrap();
        assert!(res.end_type.converged());
        assert_abs_diff_eq!(res.x[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(res.x[1], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn zero_residual_fit_reaches_root_epsilon() {
        let t: Vec<Real> = (0..8).map(|i| i as Real * 0.5).collect();
        let y = t.iter().map(|t| 2.0 * (-0.3 * t).exp()).collect();
        let f = ExpFit { t, y };
        let res = LevenbergMarquardt::new(1e-8, 1e-16, 1e-16)
            .minimize(&f, &Array::from_slice(&[1.0, 0.0]), &EndCriteria::new(200, 50, 1e-12, 1e-16, 1e-16))
            .unwrap();
        assert_eq!(res.end_type, EndCriteriaType::RootEpsilon);
        assert!(res.residuals.max_abs() <= 1e-12);
        assert_abs_diff_eq!(res.x[1], -0.3, epsilon = 1e-9);
    }

    #[test]
    fn max_iterations_reported() {
        let res = LevenbergMarquardt::default()
            .minimize(&Rosenbrock, &Array::from_slice(&[-1.2, 1.0]), &EndCriteria::new(1, 1, 0.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(res.iterations, 1);
        assert!(!res.end_type.converged() || res.end_type == EndCriteriaType::StationaryPoint);
    }
}
