//! `YieldTermStructure`: discount curves as functions of time.
//!
//! Implementors provide the discount factor; zero rates, period forwards
//! and the instantaneous forward are derived from it unless a curve has a
//! cheaper exact form.

use xa_core::{errors::Result, DiscountFactor, Rate, Real, Time};
use xa_math::interpolations::{Interpolation1D, LogLinearInterpolation};

/// Small time step used for numerical instantaneous forwards.
const DT: Real = 1.0e-4;

/// A yield (interest-rate) term structure.
pub trait YieldTermStructure: std::fmt::Debug + Send + Sync {
    /// Discount factor `P(0,t)`.
    fn discount(&self, t: Time) -> DiscountFactor;

    /// Continuously-compounded zero rate for maturity `t`.
    fn zero_rate(&self, t: Time) -> Rate {
        if t <= 0.0 {
            return self.instantaneous_forward(0.0);
        }
        -self.discount(t).ln() / t
    }

    /// Continuously-compounded forward rate between `t1` and `t2`.
    fn forward_rate(&self, t1: Time, t2: Time) -> Rate {
        if (t2 - t1).abs() < DT {
            return self.instantaneous_forward(0.5 * (t1 + t2));
        }
        (self.discount(t1) / self.discount(t2)).ln() / (t2 - t1)
    }

    /// Instantaneous forward rate `f(0,t) = −∂ ln P(0,t)/∂t`.
    ///
    /// Default: central difference of `ln P`.
    fn instantaneous_forward(&self, t: Time) -> Rate {
        let t1 = (t - 0.5 * DT).max(0.0);
        let t2 = t1 + DT;
        (self.discount(t1).ln() - self.discount(t2).ln()) / (t2 - t1)
    }
}

// ── FlatForward ───────────────────────────────────────────────────────────────

/// A curve with a constant continuously-compounded forward rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatForward {
    rate: Rate,
}

impl FlatForward {
    /// Create a flat curve at the continuously-compounded `rate`.
    pub fn new(rate: Rate) -> Self {
        Self { rate }
    }

    /// The flat rate.
    pub fn rate(&self) -> Rate {
        self.rate
    }
}

impl YieldTermStructure for FlatForward {
    fn discount(&self, t: Time) -> DiscountFactor {
        (-self.rate * t).exp()
    }

    fn zero_rate(&self, _t: Time) -> Rate {
        self.rate
    }

    fn instantaneous_forward(&self, _t: Time) -> Rate {
        self.rate
    }
}

// ── InterpolatedDiscountCurve ─────────────────────────────────────────────────

/// A discount curve given by pillar discount factors, interpolated
/// log-linearly (piecewise-flat forwards). Beyond the last pillar the last
/// forward is extended.
#[derive(Debug, Clone)]
pub struct InterpolatedDiscountCurve {
    times: Vec<Time>,
    interp: LogLinearInterpolation,
}

impl InterpolatedDiscountCurve {
    /// Build from pillar times and discount factors.
    ///
    /// A pillar at `t = 0` with discount factor 1 is prepended when absent.
    ///
    /// # Errors
    /// Fails if the times are not strictly increasing and positive, the
    /// lengths differ, or a discount factor is not positive.
    pub fn new(times: &[Time], discounts: &[DiscountFactor]) -> Result<Self> {
        xa_core::ensure!(
            times.len() == discounts.len(),
            "{} pillar times but {} discount factors",
            times.len(),
            discounts.len()
        );
        xa_core::ensure!(!times.is_empty(), "discount curve needs at least one pillar");
        let (mut ts, mut dfs) = (Vec::with_capacity(times.len() + 1), Vec::with_capacity(times.len() + 1));
        if times[0] > 0.0 {
            ts.push(0.0);
            dfs.push(1.0);
        } else {
            xa_core::ensure!(
                times[0] == 0.0 && (discounts[0] - 1.0).abs() < 1e-14,
                "the first pillar must be t = 0 with discount factor 1"
            );
        }
        ts.extend_from_slice(times);
        dfs.extend_from_slice(discounts);
        let interp = LogLinearInterpolation::new(&ts, &dfs)?;
        Ok(Self { times: ts, interp })
    }

    /// Build from pillar times and continuously-compounded zero rates.
    pub fn from_zero_rates(times: &[Time], zero_rates: &[Rate]) -> Result<Self> {
        let dfs: Vec<DiscountFactor> = times
            .iter()
            .zip(zero_rates)
            .map(|(t, r)| (-r * t).exp())
            .collect();
        Self::new(times, &dfs)
    }

    /// Pillar times (including `t = 0`).
    pub fn times(&self) -> &[Time] {
        &self.times
    }
}

impl YieldTermStructure for InterpolatedDiscountCurve {
    fn discount(&self, t: Time) -> DiscountFactor {
        if t <= 0.0 {
            return 1.0;
        }
        self.interp.operator(t)
    }

    fn instantaneous_forward(&self, t: Time) -> Rate {
        -self.interp.log_derivative(t.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn flat_forward_relations() {
        let c = FlatForward::new(0.02);
        assert_abs_diff_eq!(c.discount(10.0), (-0.2f64).exp(), epsilon = 1e-15);
        assert_abs_diff_eq!(c.forward_rate(1.0, 3.0), 0.02, epsilon = 1e-14);
        assert_abs_diff_eq!(c.zero_rate(4.0), 0.02, epsilon = 1e-15);
    }

    #[test]
    fn interpolated_curve_has_flat_forwards_between_pillars() {
        let c = InterpolatedDiscountCurve::from_zero_rates(&[1.0, 2.0, 5.0], &[0.01, 0.015, 0.02]).unwrap();
        assert_abs_diff_eq!(c.discount(0.0), 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(c.zero_rate(2.0), 0.015, epsilon = 1e-14);
        // forward between pillars 2 and 5
        let f = (0.02 * 5.0 - 0.015 * 2.0) / 3.0;
        assert_abs_diff_eq!(c.instantaneous_forward(3.0), f, epsilon = 1e-12);
        assert_abs_diff_eq!(c.forward_rate(2.5, 4.0), f, epsilon = 1e-12);
        assert_eq!(c.times().len(), 4);
    }

    #[test]
    fn default_numerical_forward_matches_exact() {
        #[derive(Debug)]
        struct Quadratic;
        impl YieldTermStructure for Quadratic {
            fn discount(&self, t: Time) -> DiscountFactor {
                (-0.01 * t - 0.001 * t * t).exp()
            }
        }
        assert_abs_diff_eq!(Quadratic.instantaneous_forward(2.0), 0.014, epsilon = 1e-9);
        assert_abs_diff_eq!(Quadratic.zero_rate(2.0), 0.012, epsilon = 1e-14);
    }

    #[test]
    fn rejects_bad_pillars() {
        assert!(InterpolatedDiscountCurve::new(&[1.0, 1.0], &[0.99, 0.98]).is_err());
        assert!(InterpolatedDiscountCurve::new(&[0.0, 1.0], &[0.9, 0.98]).is_err());
        assert!(InterpolatedDiscountCurve::new(&[1.0], &[0.0]).is_err());
    }
}
