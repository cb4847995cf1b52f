//! `StochasticProcess`: a multi-dimensional diffusion
//! `dX = μ(t,X) dt + σ(t,X) dW`.
//!
//! The process exposes drift, diffusion and the conditional moments of one
//! step; `evolve` maps a vector of independent standard normals to the next
//! state. The defaults implement the Euler scheme; processes with known
//! transition moments override `expectation`, `covariance` and
//! `std_deviation`.

use serde::{Deserialize, Serialize};
use xa_core::Time;
use xa_math::{Array, Matrix};

/// Discretization of a process over one time step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Discretization {
    /// Closed-form transition moments.
    #[default]
    Exact,
    /// First-order Euler step with drift and diffusion frozen at the start of
    /// the step.
    Euler,
}

/// A general multi-dimensional stochastic process.
pub trait StochasticProcess: std::fmt::Debug + Send + Sync {
    /// Number of state variables.
    fn size(&self) -> usize;

    /// Number of independent normals consumed by [`evolve`](Self::evolve).
    fn factors(&self) -> usize {
        self.size()
    }

    /// Initial state.
    fn initial_values(&self) -> Array;

    /// Drift vector `μ(t, x)`.
    fn drift(&self, t: Time, x: &Array) -> Array;

    /// Diffusion matrix `σ(t, x)`, dimensioned `size() × factors()`, such
    /// that the instantaneous covariance is `σ σᵀ`.
    fn diffusion(&self, t: Time, x: &Array) -> Matrix;

    /// Expectation `E[x(t+Δt) | x(t) = x]`.
    ///
    /// Default: Euler `x + μ(t,x)·Δt`.
    fn expectation(&self, t: Time, x: &Array, dt: Time) -> Array {
        &(&self.drift(t, x) * dt) + x
    }

    /// Standard deviation over `Δt`, a `size() × factors()` matrix `S` with
    /// `S Sᵀ = covariance`.
    ///
    /// Default: `σ(t,x)·√Δt`.
    fn std_deviation(&self, t: Time, x: &Array, dt: Time) -> Matrix {
        self.diffusion(t, x).scale(dt.sqrt())
    }

    /// Covariance of `x(t+Δt)` given `x(t) = x`.
    ///
    /// Default: `σ σᵀ Δt`.
    fn covariance(&self, t: Time, x: &Array, dt: Time) -> Matrix {
        let sigma = self.diffusion(t, x);
        (&sigma * &sigma.transpose()).scale(dt)
    }

    /// Advance the state: `E[x(t+Δt)|x(t)] + S·dw`.
    fn evolve(&self, t: Time, x: &Array, dt: Time, dw: &Array) -> Array {
        let e = self.expectation(t, x, dt);
        let s = self.std_deviation(t, x, dt);
        &e + &s.mul_vec(dw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Two correlated arithmetic Brownian motions with constant coefficients.
    #[derive(Debug)]
    struct CorrelatedAbm {
        mu: [f64; 2],
        root: Matrix,
    }

    impl StochasticProcess for CorrelatedAbm {
        fn size(&self) -> usize {
            2
        }

        fn initial_values(&self) -> Array {
            Array::from_slice(&[1.0, -1.0])
        }

        fn drift(&self, _t: Time, _x: &Array) -> Array {
            Array::from_slice(&self.mu)
        }

        fn diffusion(&self, _t: Time, _x: &Array) -> Matrix {
            self.root.clone()
        }
    }

    fn process() -> CorrelatedAbm {
        CorrelatedAbm {
            mu: [0.1, -0.2],
            root: Matrix::from_row_slice(2, 2, &[0.2, 0.0, 0.15, 0.1]),
        }
    }

    #[test]
    fn euler_defaults() {
        let p = process();
        let x = p.initial_values();
        let e = p.expectation(0.0, &x, 0.5);
        assert_abs_diff_eq!(e[0], 1.05, epsilon = 1e-15);
        assert_abs_diff_eq!(e[1], -1.1, epsilon = 1e-15);
        let c = p.covariance(0.0, &x, 0.5);
        assert_abs_diff_eq!(c[(0, 1)], 0.5 * 0.2 * 0.15, epsilon = 1e-15);
        assert_abs_diff_eq!(c[(1, 1)], 0.5 * (0.15 * 0.15 + 0.01), epsilon = 1e-15);
    }

    #[test]
    fn evolve_applies_std_deviation() {
        let p = process();
        let x = p.initial_values();
        let next = p.evolve(0.0, &x, 0.25, &Array::from_slice(&[1.0, 2.0]));
        assert_abs_diff_eq!(next[0], 1.0 + 0.025 + 0.5 * 0.2, epsilon = 1e-15);
        assert_abs_diff_eq!(next[1], -1.0 - 0.05 + 0.5 * (0.15 + 0.2), epsilon = 1e-15);
    }

    #[test]
    fn discretization_default_is_exact() {
        assert_eq!(Discretization::default(), Discretization::Exact);
    }
}
