//! Deterministic functions of time with constant, piecewise-constant or
//! piecewise-linear shape.
//!
//! A [`TimeFunction`] stores *raw* values. Volatility-type functions are
//! kept through the positivity transform `value = raw²`, so an optimizer
//! working on the raw values can never produce a negative volatility;
//! reversion-type functions store their values as they are.
//!
//! | shape | breakpoints | semantics |
//! |-------|-------------|-----------|
//! | `Constant` | none | `v_0` everywhere |
//! | `PiecewiseConstant` | `t_1 < … < t_n` | `v_i` on `[t_i, t_{i+1})` with `t_0 = 0` |
//! | `PiecewiseLinear` | `t_1 < … < t_n` | linear through `(0, v_0), (t_1, v_1), …`, flat after `t_n` |

use serde::{Deserialize, Serialize};
use xa_core::{errors::Result, Real, Time};

/// Time dependence of a model parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ParamShape {
    /// A single value for all times.
    #[default]
    Constant,
    /// Step function, right-continuous at the breakpoints.
    PiecewiseConstant,
    /// Continuous, linear between the breakpoints.
    PiecewiseLinear,
}

impl ParamShape {
    /// `true` for the shapes with breakpoints.
    pub fn is_piecewise(self) -> bool {
        !matches!(self, ParamShape::Constant)
    }
}

/// Map between raw (optimizer) values and parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// `value = raw`.
    Identity,
    /// `value = raw²`, `raw = √value`.
    Square,
}

impl Transform {
    fn direct(self, raw: Real) -> Real {
        match self {
            Transform::Identity => raw,
            Transform::Square => raw * raw,
        }
    }

    fn inverse(self, value: Real) -> Real {
        match self {
            Transform::Identity => value,
            Transform::Square => value.sqrt(),
        }
    }
}

/// A parameter as a function of time.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeFunction {
    shape: ParamShape,
    times: Vec<Time>,
    raw: Vec<Real>,
    transform: Transform,
}

impl TimeFunction {
    /// Build a function of the given `shape` from breakpoint `times` and
    /// parameter `values` (not raw values).
    ///
    /// # Errors
    /// Configuration error if the breakpoints are not strictly increasing
    /// and positive, if the number of values is not `times.len() + 1`, if a
    /// constant function is given breakpoints, or if a value is negative
    /// under the square transform.
    pub fn new(shape: ParamShape, times: &[Time], values: &[Real], transform: Transform) -> Result<Self> {
        if shape == ParamShape::Constant {
            xa_core::ensure_config!(
                times.is_empty(),
                "constant parameter given {} breakpoints",
                times.len()
            );
        }
        xa_core::ensure_config!(
            values.len() == times.len() + 1,
            "{} parameter values for {} breakpoints (expected {})",
            values.len(),
            times.len(),
            times.len() + 1
        );
        xa_core::ensure_config!(
            times.first().map_or(true, |&t| t > 0.0) && times.windows(2).all(|w| w[0] < w[1]),
            "breakpoints must be positive and strictly increasing: {times:?}"
        );
        for &v in values {
            xa_core::ensure_config!(v.is_finite(), "parameter value {v} is not finite");
            if transform == Transform::Square {
                xa_core::ensure_config!(v >= 0.0, "volatility value {v} is negative");
            }
        }
        Ok(Self {
            shape,
            times: times.to_vec(),
            raw: values.iter().map(|&v| transform.inverse(v)).collect(),
            transform,
        })
    }

    /// Volatility-type function (stored as `raw²`).
    pub fn volatility(shape: ParamShape, times: &[Time], values: &[Real]) -> Result<Self> {
        Self::new(shape, times, values, Transform::Square)
    }

    /// Reversion-type function (stored untransformed).
    pub fn reversion(shape: ParamShape, times: &[Time], values: &[Real]) -> Result<Self> {
        Self::new(shape, times, values, Transform::Identity)
    }

    /// Constant volatility.
    pub fn constant_volatility(value: Real) -> Result<Self> {
        Self::volatility(ParamShape::Constant, &[], &[value])
    }

    /// Constant reversion.
    pub fn constant_reversion(value: Real) -> Result<Self> {
        Self::reversion(ParamShape::Constant, &[], &[value])
    }

    /// Shape of the function.
    pub fn shape(&self) -> ParamShape {
        self.shape
    }

    /// Breakpoint times.
    pub fn times(&self) -> &[Time] {
        &self.times
    }

    /// Number of parameter values.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Always `false`; a function has at least one value.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Raw values, as seen by an optimizer.
    pub fn raw(&self) -> &[Real] {
        &self.raw
    }

    /// Parameter values.
    pub fn values(&self) -> Vec<Real> {
        self.raw.iter().map(|&r| self.transform.direct(r)).collect()
    }

    /// Parameter value `i`.
    pub fn value_at(&self, i: usize) -> Real {
        self.transform.direct(self.raw[i])
    }

    /// Overwrite raw value `i`.
    pub fn set_raw(&mut self, i: usize, raw: Real) -> Result<()> {
        let n = self.raw.len();
        let slot = self
            .raw
            .get_mut(i)
            .ok_or(xa_core::Error::IndexOutOfRange { index: i, size: n })?;
        *slot = raw;
        Ok(())
    }

    /// Overwrite parameter value `i`.
    pub fn set_value(&mut self, i: usize, value: Real) -> Result<()> {
        if self.transform == Transform::Square {
            xa_core::ensure!(value >= 0.0, "volatility value {value} is negative");
        }
        self.set_raw(i, self.transform.inverse(value))
    }

    /// Index of the piece containing `t` (piecewise-constant semantics).
    fn piece(&self, t: Time) -> usize {
        self.times.partition_point(|&ti| ti <= t)
    }

    /// Value at time `t`.
    pub fn value(&self, t: Time) -> Real {
        match self.shape {
            ParamShape::Constant => self.value_at(0),
            ParamShape::PiecewiseConstant => self.value_at(self.piece(t)),
            ParamShape::PiecewiseLinear => {
                let i = self.piece(t);
                if i >= self.times.len() {
                    return self.value_at(self.times.len());
                }
                let t0 = if i == 0 { 0.0 } else { self.times[i - 1] };
                let t1 = self.times[i];
                let w = ((t - t0) / (t1 - t0)).clamp(0.0, 1.0);
                (1.0 - w) * self.value_at(i) + w * self.value_at(i + 1)
            }
        }
    }

    /// Sub-intervals of `[t0, t1]` on which the function is smooth.
    pub fn pieces(&self, t0: Time, t1: Time) -> Vec<(Time, Time)> {
        let mut out = Vec::with_capacity(self.times.len() + 1);
        if t1 <= t0 {
            return out;
        }
        let mut left = t0;
        for &t in self.times.iter().filter(|&&t| t > t0 && t < t1) {
            out.push((left, t));
            left = t;
        }
        out.push((left, t1));
        out
    }

    /// Exact `∫_{t0}^{t1} v(s) ds`.
    pub fn integral(&self, t0: Time, t1: Time) -> Real {
        if t1 < t0 {
            return -self.integral(t1, t0);
        }
        self.pieces(t0, t1)
            .into_iter()
            .map(|(a, b)| match self.shape {
                ParamShape::PiecewiseLinear => 0.5 * (self.value(a) + self.value(b)) * (b - a),
                _ => self.value(a) * (b - a),
            })
            .sum()
    }

    /// Exact `∫_{t0}^{t1} v(s)² ds`.
    pub fn integral_of_square(&self, t0: Time, t1: Time) -> Real {
        if t1 < t0 {
            return -self.integral_of_square(t1, t0);
        }
        self.pieces(t0, t1)
            .into_iter()
            .map(|(a, b)| {
                let fa = self.value(a);
                match self.shape {
                    ParamShape::PiecewiseLinear => {
                        let fb = self.value(b);
                        (b - a) * (fa * fa + fa * fb + fb * fb) / 3.0
                    }
                    _ => fa * fa * (b - a),
                }
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;
    use xa_math::GaussLegendre;

    fn pwc() -> TimeFunction {
        TimeFunction::volatility(ParamShape::PiecewiseConstant, &[1.0, 2.0], &[0.01, 0.02, 0.03]).unwrap()
    }

    #[test]
    fn piecewise_constant_is_right_continuous() {
        let f = pwc();
        assert_abs_diff_eq!(f.value(0.5), 0.01, epsilon = 1e-15);
        assert_abs_diff_eq!(f.value(1.0), 0.02, epsilon = 1e-15);
        assert_abs_diff_eq!(f.value(5.0), 0.03, epsilon = 1e-15);
        assert_abs_diff_eq!(f.integral(0.5, 2.5), 0.5 * 0.01 + 0.02 + 0.5 * 0.03, epsilon = 1e-15);
    }

    #[test]
    fn square_transform_round_trips() {
        let mut f = pwc();
        assert_abs_diff_eq!(f.raw()[1], 0.02f64.sqrt(), epsilon = 1e-15);
        f.set_raw(1, 0.2).unwrap();
        assert_abs_diff_eq!(f.value_at(1), 0.04, epsilon = 1e-15);
        // a negative raw value still maps to a positive volatility
        f.set_raw(0, -0.1).unwrap();
        assert!(f.value(0.0) > 0.0);
        assert!(f.set_raw(3, 0.1).is_err());
        assert!(f.set_value(0, -1.0).is_err());
    }

    #[test]
    fn piecewise_linear_knots() {
        let f = TimeFunction::reversion(ParamShape::PiecewiseLinear, &[1.0, 3.0], &[0.0, 1.0, -1.0]).unwrap();
        assert_abs_diff_eq!(f.value(0.5), 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(f.value(2.0), 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(f.value(10.0), -1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(f.integral(0.0, 3.0), 0.5, epsilon = 1e-15);
    }

    #[test]
    fn invalid_definitions_are_configuration_errors() {
        use xa_core::Error;
        let bad = [
            TimeFunction::volatility(ParamShape::PiecewiseConstant, &[1.0, 1.0], &[0.1; 3]),
            TimeFunction::volatility(ParamShape::PiecewiseConstant, &[0.0], &[0.1; 2]),
            TimeFunction::volatility(ParamShape::PiecewiseConstant, &[1.0], &[0.1; 3]),
            TimeFunction::volatility(ParamShape::Constant, &[1.0], &[0.1; 2]),
            TimeFunction::volatility(ParamShape::Constant, &[], &[-0.1]),
        ];
        for b in bad {
            assert!(matches!(b, Err(Error::Configuration(_))), "{b:?}");
        }
        // reversions may be negative
        assert!(TimeFunction::constant_reversion(-0.01).is_ok());
    }

    fn shape() -> impl Strategy<Value = ParamShape> {
        prop_oneof![
            Just(ParamShape::Constant),
            Just(ParamShape::PiecewiseConstant),
            Just(ParamShape::PiecewiseLinear),
        ]
    }

    proptest! {
        #[test]
        fn integrals_match_quadrature(
            shape in shape(),
            values in proptest::collection::vec(0.001f64..0.05, 4),
            t0 in 0.0f64..4.0,
            len in 0.0f64..6.0,
        ) {
            let times: &[Time] = if shape == ParamShape::Constant { &[] } else { &[0.7, 1.9, 3.1] };
            let values = &values[..times.len() + 1];
            let f = TimeFunction::volatility(shape, times, values).unwrap();
            let t1 = t0 + len;
            let gl = GaussLegendre::new(8);
            let q1 = gl.integrate_segments(|s| f.value(s), t0, t1, times);
            let q2 = gl.integrate_segments(|s| f.value(s).powi(2), t0, t1, times);
            prop_assert!((f.integral(t0, t1) - q1).abs() < 1e-13);
            prop_assert!((f.integral_of_square(t0, t1) - q2).abs() < 1e-14);
            prop_assert!((f.integral(t1, t0) + q1).abs() < 1e-13);
        }
    }
}
