//! Black-Scholes parametrization of a log-normal factor (FX rate or equity
//! price) with time-dependent volatility `σ(t)`.

use super::time_function::TimeFunction;
use xa_core::{errors::Result, Real, Time};

/// Volatility of a log-normal factor.
#[derive(Debug, Clone)]
pub struct BlackScholes {
    name: String,
    currency: String,
    sigma: TimeFunction,
}

impl BlackScholes {
    /// Create a parametrization from a volatility-type `sigma`.
    pub fn new(name: impl Into<String>, currency: impl Into<String>, sigma: TimeFunction) -> Self {
        Self {
            name: name.into(),
            currency: currency.into(),
            sigma,
        }
    }

    /// Constant volatility.
    pub fn constant(name: impl Into<String>, currency: impl Into<String>, sigma: Real) -> Result<Self> {
        Ok(Self::new(name, currency, TimeFunction::constant_volatility(sigma)?))
    }

    /// Factor name: the foreign currency code for FX, the equity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Currency of the factor.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// `σ(t)`.
    pub fn sigma(&self, t: Time) -> Real {
        self.sigma.value(t)
    }

    /// `∫_{t0}^{t1} σ²`.
    pub fn variance(&self, t0: Time, t1: Time) -> Real {
        self.sigma.integral_of_square(t0, t1)
    }

    /// The volatility function.
    pub fn sigma_function(&self) -> &TimeFunction {
        &self.sigma
    }

    /// Mutable volatility function.
    pub fn sigma_function_mut(&mut self) -> &mut TimeFunction {
        &mut self.sigma
    }
}
