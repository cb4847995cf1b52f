//! Default-probability term structures.
//!
//! Provides the `DefaultProbabilityTermStructure` trait plus:
//! * `FlatHazardRate`: constant hazard-rate curve
//! * `PiecewiseHazardRate`: piecewise-flat hazard rates with exact
//!   survival integrals

use xa_core::{errors::Result, Probability, Real, Time};

/// Hazard rate type alias.
pub type HazardRate = Real;

/// A default-probability term structure.
///
/// Implementors provide the survival probability; the hazard rate is
/// derived numerically unless overridden.
pub trait DefaultProbabilityTermStructure: std::fmt::Debug + Send + Sync {
    /// Survival probability `S(t) = P(τ > t)`.
    fn survival_probability(&self, t: Time) -> Probability;

    /// Default probability `1 − S(t)`.
    fn default_probability(&self, t: Time) -> Probability {
        1.0 - self.survival_probability(t)
    }

    /// Hazard rate `h(t) = −d ln S(t)/dt`.
    fn hazard_rate(&self, t: Time) -> HazardRate {
        let dt = 1.0e-4;
        let t1 = (t - 0.5 * dt).max(0.0);
        let t2 = t1 + dt;
        let s2 = self.survival_probability(t2);
        if s2 <= 0.0 {
            return 0.0;
        }
        (self.survival_probability(t1).ln() - s2.ln()) / (t2 - t1)
    }
}

// ── FlatHazardRate ────────────────────────────────────────────────────────────

/// A constant hazard-rate curve, `S(t) = exp(−h·t)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatHazardRate {
    hazard_rate: HazardRate,
}

impl FlatHazardRate {
    /// Create a flat hazard-rate curve.
    pub fn new(hazard_rate: HazardRate) -> Self {
        Self { hazard_rate }
    }
}

impl DefaultProbabilityTermStructure for FlatHazardRate {
    fn survival_probability(&self, t: Time) -> Probability {
        (-self.hazard_rate * t.max(0.0)).exp()
    }

    fn hazard_rate(&self, _t: Time) -> HazardRate {
        self.hazard_rate
    }
}

// ── PiecewiseHazardRate ───────────────────────────────────────────────────────

/// Piecewise-flat hazard rates: `h_i` applies on `[t_{i-1}, t_i)` with
/// `t_{-1} = 0`, and the last rate is extended beyond the last time.
#[derive(Debug, Clone)]
pub struct PiecewiseHazardRate {
    times: Vec<Time>,
    rates: Vec<HazardRate>,
}

impl PiecewiseHazardRate {
    /// Build from segment end times and hazard rates of equal length.
    pub fn new(times: &[Time], rates: &[HazardRate]) -> Result<Self> {
        xa_core::ensure!(!times.is_empty(), "hazard curve needs at least one segment");
        xa_core::ensure!(times.len() == rates.len(), "segment times and rates differ in length");
        xa_core::ensure!(
            times[0] > 0.0 && xa_math::comparison::is_strictly_increasing(times),
            "segment end times must be positive and strictly increasing"
        );
        xa_core::ensure!(rates.iter().all(|&h| h >= 0.0), "hazard rates must be non-negative");
        Ok(Self {
            times: times.to_vec(),
            rates: rates.to_vec(),
        })
    }

    /// Cumulative hazard `∫₀ᵗ h(s) ds`.
    pub fn cumulative_hazard(&self, t: Time) -> Real {
        let mut acc = 0.0;
        let mut left = 0.0;
        for (&ti, &hi) in self.times.iter().zip(&self.rates) {
            if t <= ti {
                return acc + hi * (t - left).max(0.0);
            }
            acc += hi * (ti - left);
            left = ti;
        }
        acc + self.rates[self.rates.len() - 1] * (t - left)
    }
}

impl DefaultProbabilityTermStructure for PiecewiseHazardRate {
    fn survival_probability(&self, t: Time) -> Probability {
        (-self.cumulative_hazard(t)).exp()
    }

    fn hazard_rate(&self, t: Time) -> HazardRate {
        let i = self.times.partition_point(|&ti| ti <= t);
        self.rates[i.min(self.rates.len() - 1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn flat_hazard() {
        let c = FlatHazardRate::new(0.01);
        assert_abs_diff_eq!(c.survival_probability(5.0), (-0.05f64).exp(), epsilon = 1e-15);
        assert_abs_diff_eq!(c.default_probability(0.0), 0.0);
    }

    #[test]
    fn piecewise_hazard_integral() {
        let c = PiecewiseHazardRate::new(&[1.0, 3.0], &[0.01, 0.03]).unwrap();
        assert_abs_diff_eq!(c.cumulative_hazard(0.5), 0.005, epsilon = 1e-15);
        assert_abs_diff_eq!(c.cumulative_hazard(2.0), 0.01 + 0.03, epsilon = 1e-15);
        assert_abs_diff_eq!(c.cumulative_hazard(5.0), 0.01 + 0.06 + 0.06, epsilon = 1e-15);
        assert_abs_diff_eq!(c.hazard_rate(0.5), 0.01);
        assert_abs_diff_eq!(c.hazard_rate(2.0), 0.03);
        assert_abs_diff_eq!(c.hazard_rate(7.0), 0.03);
    }

    proptest! {
        #[test]
        fn numerical_hazard_matches_piecewise(t in 0.2f64..0.8) {
            let c = PiecewiseHazardRate::new(&[1.0, 3.0], &[0.02, 0.05]).unwrap();
            let h = 1e-5;
            let numeric = (c.survival_probability(t - h).ln() - c.survival_probability(t + h).ln()) / (2.0 * h);
            prop_assert!((numeric - 0.02).abs() < 1e-9);
        }
    }
}
