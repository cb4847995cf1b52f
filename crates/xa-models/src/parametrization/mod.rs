//! Per-factor parametrizations.
//!
//! Every factor of the joint model is described by one [`Parametrization`],
//! a tagged union over the asset classes. All variants share a small
//! capability set (name, currency, state size, parameter access by
//! [`ParameterKind`], breakpoints) so that the model, the state process and
//! the calibration code can treat factors uniformly.

use serde::{Deserialize, Serialize};
use std::fmt;
use xa_core::Time;

mod black_scholes;
mod lgm;
mod time_function;

pub use black_scholes::BlackScholes;
pub use lgm::Lgm;
pub use time_function::{ParamShape, TimeFunction, Transform};

/// Asset class of a factor. The declaration order is the factor order of
/// the joint model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetClass {
    /// Interest rates (LGM).
    Ir,
    /// Foreign exchange (Black-Scholes).
    Fx,
    /// Equity (Black-Scholes).
    Equity,
    /// Inflation (Dodgson-Kainth).
    Inflation,
    /// Credit (LGM intensity).
    Credit,
}

impl AssetClass {
    /// All classes in factor order.
    pub const ALL: [AssetClass; 5] = [
        AssetClass::Ir,
        AssetClass::Fx,
        AssetClass::Equity,
        AssetClass::Inflation,
        AssetClass::Credit,
    ];

    /// Position in [`AssetClass::ALL`].
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Short label used in factor names (`IR`, `FX`, `EQ`, `INF`, `CR`).
    pub fn label(self) -> &'static str {
        match self {
            AssetClass::Ir => "IR",
            AssetClass::Fx => "FX",
            AssetClass::Equity => "EQ",
            AssetClass::Inflation => "INF",
            AssetClass::Credit => "CR",
        }
    }

    /// Number of state variables of one factor of this class.
    pub fn state_size(self) -> usize {
        match self {
            AssetClass::Inflation | AssetClass::Credit => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Named parameter families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    /// `α` for LGM-type factors, `σ` for Black-Scholes factors.
    Volatility,
    /// `κ` for LGM-type factors.
    Reversion,
}

/// Parametrization of one factor.
#[derive(Debug, Clone)]
pub enum Parametrization {
    /// Rate factor.
    Ir(Lgm),
    /// FX rate of a foreign currency against the domestic currency.
    Fx(BlackScholes),
    /// Equity price.
    Equity(BlackScholes),
    /// Dodgson-Kainth inflation factor.
    Inflation(Lgm),
    /// Credit intensity factor.
    Credit(Lgm),
}

impl Parametrization {
    /// Asset class of the factor.
    pub fn asset_class(&self) -> AssetClass {
        match self {
            Parametrization::Ir(_) => AssetClass::Ir,
            Parametrization::Fx(_) => AssetClass::Fx,
            Parametrization::Equity(_) => AssetClass::Equity,
            Parametrization::Inflation(_) => AssetClass::Inflation,
            Parametrization::Credit(_) => AssetClass::Credit,
        }
    }

    /// Factor name.
    pub fn name(&self) -> &str {
        match self {
            Parametrization::Fx(p) | Parametrization::Equity(p) => p.name(),
            Parametrization::Ir(p) | Parametrization::Inflation(p) | Parametrization::Credit(p) => {
                p.name()
            }
        }
    }

    /// Currency of the factor.
    pub fn currency(&self) -> &str {
        match self {
            Parametrization::Fx(p) | Parametrization::Equity(p) => p.currency(),
            Parametrization::Ir(p) | Parametrization::Inflation(p) | Parametrization::Credit(p) => {
                p.currency()
            }
        }
    }

    /// Number of state variables.
    pub fn state_size(&self) -> usize {
        self.asset_class().state_size()
    }

    /// Number of Brownian drivers.
    pub fn brownians(&self) -> usize {
        1
    }

    /// Parameter families of the factor.
    pub fn kinds(&self) -> &'static [ParameterKind] {
        match self {
            Parametrization::Fx(_) | Parametrization::Equity(_) => &[ParameterKind::Volatility],
            _ => &[ParameterKind::Volatility, ParameterKind::Reversion],
        }
    }

    /// Parameter function of the given kind, if the factor has one.
    pub fn parameter(&self, kind: ParameterKind) -> Option<&TimeFunction> {
        match (self, kind) {
            (Parametrization::Fx(p) | Parametrization::Equity(p), ParameterKind::Volatility) => {
                Some(p.sigma_function())
            }
            (
                Parametrization::Ir(p) | Parametrization::Inflation(p) | Parametrization::Credit(p),
                ParameterKind::Volatility,
            ) => Some(p.alpha_function()),
            (
                Parametrization::Ir(p) | Parametrization::Inflation(p) | Parametrization::Credit(p),
                ParameterKind::Reversion,
            ) => Some(p.kappa_function()),
            _ => None,
        }
    }

    /// Mutable parameter function of the given kind.
    pub fn parameter_mut(&mut self, kind: ParameterKind) -> Option<&mut TimeFunction> {
        match (self, kind) {
            (Parametrization::Fx(p) | Parametrization::Equity(p), ParameterKind::Volatility) => {
                Some(p.sigma_function_mut())
            }
            (
                Parametrization::Ir(p) | Parametrization::Inflation(p) | Parametrization::Credit(p),
                ParameterKind::Volatility,
            ) => Some(p.alpha_function_mut()),
            (
                Parametrization::Ir(p) | Parametrization::Inflation(p) | Parametrization::Credit(p),
                ParameterKind::Reversion,
            ) => Some(p.kappa_function_mut()),
            _ => None,
        }
    }

    /// Union of the breakpoints of all parameter functions.
    pub fn breakpoints(&self) -> Vec<Time> {
        match self {
            Parametrization::Fx(p) | Parametrization::Equity(p) => p.sigma_function().times().to_vec(),
            Parametrization::Ir(p) | Parametrization::Inflation(p) | Parametrization::Credit(p) => {
                p.breakpoints()
            }
        }
    }

    /// The LGM parametrization of an IR, inflation or credit factor.
    pub fn as_lgm(&self) -> Option<&Lgm> {
        match self {
            Parametrization::Ir(p) | Parametrization::Inflation(p) | Parametrization::Credit(p) => Some(p),
            _ => None,
        }
    }

    /// Mutable LGM parametrization.
    pub fn as_lgm_mut(&mut self) -> Option<&mut Lgm> {
        match self {
            Parametrization::Ir(p) | Parametrization::Inflation(p) | Parametrization::Credit(p) => Some(p),
            _ => None,
        }
    }

    /// The Black-Scholes parametrization of an FX or equity factor.
    pub fn as_black_scholes(&self) -> Option<&BlackScholes> {
        match self {
            Parametrization::Fx(p) | Parametrization::Equity(p) => Some(p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_set() {
        let ir = Parametrization::Ir(Lgm::constant("EUR", "EUR", 0.01, 0.02).unwrap());
        let fx = Parametrization::Fx(BlackScholes::constant("USD", "USD", 0.1).unwrap());
        let inf = Parametrization::Inflation(Lgm::constant("EUHICP", "EUR", 0.005, 0.5).unwrap());
        assert_eq!(ir.state_size(), 1);
        assert_eq!(inf.state_size(), 2);
        assert_eq!(inf.brownians(), 1);
        assert_eq!(fx.kinds(), &[ParameterKind::Volatility]);
        assert!(fx.parameter(ParameterKind::Reversion).is_none());
        assert_eq!(inf.currency(), "EUR");
        assert_eq!(inf.name(), "EUHICP");
        assert!(AssetClass::Ir < AssetClass::Credit);
        assert_eq!(AssetClass::Inflation.to_string(), "INF");
    }

    #[test]
    fn parameter_mutation_is_visible() {
        let mut p = Parametrization::Fx(
            BlackScholes::new(
                "GBP",
                "GBP",
                TimeFunction::volatility(ParamShape::PiecewiseConstant, &[1.0], &[0.1, 0.2]).unwrap(),
            ),
        );
        p.parameter_mut(ParameterKind::Volatility).unwrap().set_value(1, 0.3).unwrap();
        assert!((p.as_black_scholes().unwrap().sigma(2.0) - 0.3).abs() < 1e-15);
        assert_eq!(p.breakpoints(), vec![1.0]);
    }
}
