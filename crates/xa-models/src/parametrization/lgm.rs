//! Linear Gauss-Markov (LGM) parametrization.
//!
//! Used for rate factors, for the real-rate-like factor of the
//! Dodgson-Kainth inflation model and for Gaussian credit intensities.
//!
//! ```text
//! H(t) = c·∫₀ᵗ exp(−∫₀ˢ κ(u) du) ds + s       ζ(t) = ∫₀ᵗ α(u)² du / c²
//! H′(t) = c·exp(−∫₀ᵗ κ(u) du)                 α(t) = α_raw(t) / c
//! ```
//!
//! The shift `s` and scaling `c` re-express the model without changing any
//! price: the state variable is rescaled by `1/c` and the numeraire moves
//! with the shift.

use super::time_function::{ParamShape, TimeFunction};
use xa_core::{errors::Result, Real, Time};
use xa_math::GaussLegendre;

/// Quadrature order for `H` under piecewise-linear reversion.
const H_QUADRATURE_ORDER: usize = 16;

/// LGM volatility `α` and reversion `κ`, plus shift and scaling.
#[derive(Debug, Clone)]
pub struct Lgm {
    name: String,
    currency: String,
    alpha: TimeFunction,
    kappa: TimeFunction,
    shift: Real,
    scaling: Real,
    gauss: GaussLegendre,
}

impl Lgm {
    /// Create a parametrization. `alpha` must be a volatility-type
    /// function, `kappa` a reversion-type function.
    pub fn new(
        name: impl Into<String>,
        currency: impl Into<String>,
        alpha: TimeFunction,
        kappa: TimeFunction,
    ) -> Self {
        Self {
            name: name.into(),
            currency: currency.into(),
            alpha,
            kappa,
            shift: 0.0,
            scaling: 1.0,
            gauss: GaussLegendre::new(H_QUADRATURE_ORDER),
        }
    }

    /// Constant `α` and `κ`.
    pub fn constant(
        name: impl Into<String>,
        currency: impl Into<String>,
        alpha: Real,
        kappa: Real,
    ) -> Result<Self> {
        Ok(Self::new(
            name,
            currency,
            TimeFunction::constant_volatility(alpha)?,
            TimeFunction::constant_reversion(kappa)?,
        ))
    }

    /// Factor name (currency code for rate factors, index or entity name
    /// otherwise).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Currency the factor is denominated in.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// The volatility function.
    pub fn alpha_function(&self) -> &TimeFunction {
        &self.alpha
    }

    /// Mutable volatility function.
    pub fn alpha_function_mut(&mut self) -> &mut TimeFunction {
        &mut self.alpha
    }

    /// The reversion function.
    pub fn kappa_function(&self) -> &TimeFunction {
        &self.kappa
    }

    /// Mutable reversion function.
    pub fn kappa_function_mut(&mut self) -> &mut TimeFunction {
        &mut self.kappa
    }

    /// Shift `s` of `H`.
    pub fn shift(&self) -> Real {
        self.shift
    }

    /// Set the shift.
    pub fn set_shift(&mut self, shift: Real) {
        self.shift = shift;
    }

    /// Scaling `c`.
    pub fn scaling(&self) -> Real {
        self.scaling
    }

    /// Set the scaling; must be positive.
    pub fn set_scaling(&mut self, scaling: Real) -> Result<()> {
        xa_core::ensure!(scaling > 0.0, "LGM scaling must be positive, got {scaling}");
        self.scaling = scaling;
        Ok(())
    }

    /// Choose the shift so that `H(horizon) = 0`.
    pub fn set_shift_horizon(&mut self, horizon: Time) {
        self.shift = -self.h_raw(horizon) * self.scaling;
    }

    /// `α(t)`.
    pub fn alpha(&self, t: Time) -> Real {
        self.alpha.value(t) / self.scaling
    }

    /// `κ(t)`.
    pub fn kappa(&self, t: Time) -> Real {
        self.kappa.value(t)
    }

    /// `H(t)`.
    pub fn h(&self, t: Time) -> Real {
        self.scaling * self.h_raw(t) + self.shift
    }

    /// `H′(t)`.
    pub fn h_prime(&self, t: Time) -> Real {
        self.scaling * (-self.kappa.integral(0.0, t)).exp()
    }

    /// `H″(t) = −κ(t)·H′(t)`.
    pub fn h_prime_prime(&self, t: Time) -> Real {
        -self.kappa(t) * self.h_prime(t)
    }

    /// `ζ(t) = ∫₀ᵗ α²`.
    pub fn zeta(&self, t: Time) -> Real {
        self.alpha.integral_of_square(0.0, t) / (self.scaling * self.scaling)
    }

    /// Breakpoints of `α` and `κ`, merged.
    pub fn breakpoints(&self) -> Vec<Time> {
        let mut t: Vec<Time> = self.alpha.times().iter().chain(self.kappa.times()).copied().collect();
        t.sort_by(|a, b| a.total_cmp(b));
        t.dedup();
        t
    }

    /// `∫₀ᵗ exp(−∫₀ˢ κ) ds`, before shift and scaling.
    fn h_raw(&self, t: Time) -> Real {
        if t <= 0.0 {
            return 0.0;
        }
        if self.kappa.shape() == ParamShape::PiecewiseLinear {
            return self.gauss.integrate_segments(
                |s| (-self.kappa.integral(0.0, s)).exp(),
                0.0,
                t,
                self.kappa.times(),
            );
        }
        let mut acc: Real = 0.0;
        let mut cum_kappa: Real = 0.0;
        for (a, b) in self.kappa.pieces(0.0, t) {
            let k = self.kappa.value(a);
            let dt = b - a;
            acc += (-cum_kappa).exp() * one_minus_exp_over(k, dt);
            cum_kappa += k * dt;
        }
        acc
    }
}

/// `(1 − e^{−k·dt}) / k`, continuous at `k = 0`.
fn one_minus_exp_over(k: Real, dt: Time) -> Real {
    if k.abs() < 1e-14 {
        dt
    } else {
        -(-k * dt).exp_m1() / k
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn constant_reversion_closed_form() {
        let p = Lgm::constant("EUR", "EUR", 0.01, 0.03).unwrap();
        let t = 7.0;
        assert_abs_diff_eq!(p.h(t), (1.0 - (-0.03 * t).exp()) / 0.03, epsilon = 1e-14);
        assert_abs_diff_eq!(p.h_prime(t), (-0.03 * t).exp(), epsilon = 1e-15);
        assert_abs_diff_eq!(p.zeta(t), 1e-4 * t, epsilon = 1e-16);
        let z = Lgm::constant("USD", "USD", 0.01, 0.0).unwrap();
        assert_abs_diff_eq!(z.h(t), t, epsilon = 1e-14);
    }

    #[test]
    fn piecewise_reversion_h_matches_quadrature() {
        let gl = GaussLegendre::new(32);
        for shape in [ParamShape::PiecewiseConstant, ParamShape::PiecewiseLinear] {
            let kappa = TimeFunction::reversion(shape, &[1.0, 4.0], &[0.05, -0.02, 0.1]).unwrap();
            let p = Lgm::new("GBP", "GBP", TimeFunction::constant_volatility(0.01).unwrap(), kappa);
            for t in [0.5, 2.0, 6.0] {
                let q = gl.integrate_segments(|s| p.h_prime(s), 0.0, t, &[1.0, 4.0]);
                assert_abs_diff_eq!(p.h(t), q, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn shift_and_scaling() {
        let mut p = Lgm::constant("EUR", "EUR", 0.01, 0.02).unwrap();
        let (h, hp, zeta, alpha) = (p.h(5.0), p.h_prime(5.0), p.zeta(5.0), p.alpha(5.0));
        p.set_scaling(2.0).unwrap();
        p.set_shift(-1.0);
        assert_abs_diff_eq!(p.h(5.0), 2.0 * h - 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(p.h_prime(5.0), 2.0 * hp, epsilon = 1e-14);
        assert_abs_diff_eq!(p.zeta(5.0), zeta / 4.0, epsilon = 1e-16);
        assert_abs_diff_eq!(p.alpha(5.0), alpha / 2.0, epsilon = 1e-16);
        p.set_shift_horizon(20.0);
        assert_abs_diff_eq!(p.h(20.0), 0.0, epsilon = 1e-13);
        assert!(p.set_scaling(0.0).is_err());
    }
}
