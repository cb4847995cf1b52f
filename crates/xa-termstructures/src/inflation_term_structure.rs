//! Zero-coupon inflation term structures.
//!
//! A zero-inflation curve carries the base CPI fixing together with
//! annually-compounded zero-coupon inflation rates, so that the forward CPI
//! for maturity `t` is `base_cpi · (1 + z(t))^t`.

use xa_core::{errors::Result, Rate, Real, Time};
use xa_math::interpolations::{Interpolation1D, LinearInterpolation};

/// A zero-coupon inflation curve.
pub trait ZeroInflationTermStructure: std::fmt::Debug + Send + Sync {
    /// The base CPI fixing the curve is anchored to.
    fn base_cpi(&self) -> Real;

    /// The annually-compounded zero-coupon inflation rate for maturity `t`.
    fn zero_rate(&self, t: Time) -> Rate;

    /// Inflation growth factor `G(t) = (1 + z(t))^t`.
    fn growth(&self, t: Time) -> Real {
        if t <= 0.0 {
            return 1.0;
        }
        (1.0 + self.zero_rate(t)).powf(t)
    }

    /// Forward CPI for maturity `t`.
    fn forward_cpi(&self, t: Time) -> Real {
        self.base_cpi() * self.growth(t)
    }
}

/// Constant zero-inflation rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatZeroInflationCurve {
    base_cpi: Real,
    rate: Rate,
}

impl FlatZeroInflationCurve {
    /// Create a flat zero-inflation curve.
    ///
    /// # Errors
    /// Fails if the base CPI is not positive or the rate is not above −100%.
    pub fn new(base_cpi: Real, rate: Rate) -> Result<Self> {
        xa_core::ensure!(base_cpi > 0.0, "base CPI must be positive, got {base_cpi}");
        xa_core::ensure!(rate > -1.0, "zero inflation rate must exceed -1, got {rate}");
        Ok(Self { base_cpi, rate })
    }
}

impl ZeroInflationTermStructure for FlatZeroInflationCurve {
    fn base_cpi(&self) -> Real {
        self.base_cpi
    }

    fn zero_rate(&self, _t: Time) -> Rate {
        self.rate
    }
}

/// Zero-inflation rates at pillar maturities, linearly interpolated and
/// flat outside the pillars.
#[derive(Debug, Clone)]
pub struct InterpolatedZeroInflationCurve {
    base_cpi: Real,
    first: (Time, Rate),
    last: (Time, Rate),
    interp: Option<LinearInterpolation>,
}

impl InterpolatedZeroInflationCurve {
    /// Build from pillar maturities and zero-inflation rates.
    pub fn new(base_cpi: Real, times: &[Time], rates: &[Rate]) -> Result<Self> {
        xa_core::ensure!(base_cpi > 0.0, "base CPI must be positive, got {base_cpi}");
        xa_core::ensure!(!times.is_empty(), "zero inflation curve needs at least one pillar");
        xa_core::ensure!(times.len() == rates.len(), "pillar times and rates differ in length");
        xa_core::ensure!(
            rates.iter().all(|&r| r > -1.0),
            "zero inflation rates must exceed -1"
        );
        let interp = if times.len() > 1 {
            Some(LinearInterpolation::new(times, rates)?)
        } else {
            None
        };
        let n = times.len() - 1;
        Ok(Self {
            base_cpi,
            first: (times[0], rates[0]),
            last: (times[n], rates[n]),
            interp,
        })
    }
}

impl ZeroInflationTermStructure for InterpolatedZeroInflationCurve {
    fn base_cpi(&self) -> Real {
        self.base_cpi
    }

    fn zero_rate(&self, t: Time) -> Rate {
        if t <= self.first.0 {
            return self.first.1;
        }
        if t >= self.last.0 {
            return self.last.1;
        }
        match &self.interp {
            Some(i) => i.operator(t),
            None => self.first.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn flat_growth() {
        let c = FlatZeroInflationCurve::new(100.0, 0.02).unwrap();
        assert_abs_diff_eq!(c.growth(0.0), 1.0);
        assert_abs_diff_eq!(c.forward_cpi(5.0), 100.0 * 1.02f64.powi(5), epsilon = 1e-12);
        assert!(FlatZeroInflationCurve::new(0.0, 0.02).is_err());
    }

    #[test]
    fn interpolated_is_flat_outside_pillars() {
        let c = InterpolatedZeroInflationCurve::new(120.0, &[1.0, 5.0], &[0.01, 0.03]).unwrap();
        assert_abs_diff_eq!(c.zero_rate(0.5), 0.01);
        assert_abs_diff_eq!(c.zero_rate(3.0), 0.02, epsilon = 1e-15);
        assert_abs_diff_eq!(c.zero_rate(10.0), 0.03);
        assert_abs_diff_eq!(c.base_cpi(), 120.0);
    }
}
