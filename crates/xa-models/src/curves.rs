//! Market curves seen by the model, resolved per configuration context.
//!
//! The model never holds a mutable curve slot. Instead a [`CurveProvider`]
//! resolves curves by `(factor, context)`, and every closed form is
//! evaluated against an explicit [`ModelCurves`] set. A calibration stage
//! that must see a different curve configuration resolves its own set with
//! [`crate::CrossAssetModel::curves_for`] and passes it down.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use xa_core::{errors::Result, Error, Real};
use xa_termstructures::{DefaultProbabilityTermStructure, YieldTermStructure, ZeroInflationTermStructure};

use crate::parametrization::{AssetClass, Parametrization};

/// Source of market curves keyed by name and configuration context.
pub trait CurveProvider: fmt::Debug + Send + Sync {
    /// Discount curve of a currency.
    fn discount_curve(&self, currency: &str, context: &str) -> Result<Arc<dyn YieldTermStructure>>;

    /// FX spot in units of `domestic` per unit of `foreign`.
    fn fx_spot(&self, foreign: &str, domestic: &str, context: &str) -> Result<Real>;

    /// Equity spot price.
    fn equity_spot(&self, name: &str, context: &str) -> Result<Real>;

    /// Dividend discount curve of an equity.
    fn dividend_curve(&self, name: &str, context: &str) -> Result<Arc<dyn YieldTermStructure>>;

    /// Zero-inflation curve of an index.
    fn inflation_curve(&self, index: &str, context: &str) -> Result<Arc<dyn ZeroInflationTermStructure>>;

    /// Default-probability curve of a credit name.
    fn default_curve(&self, name: &str, context: &str) -> Result<Arc<dyn DefaultProbabilityTermStructure>>;
}

/// The curves of all factors of a model under one context, indexed like
/// the factors of each asset class.
#[derive(Clone)]
pub struct ModelCurves {
    context: String,
    discount: Vec<Arc<dyn YieldTermStructure>>,
    fx_spots: Vec<Real>,
    equity_spots: Vec<Real>,
    dividend: Vec<Arc<dyn YieldTermStructure>>,
    inflation: Vec<Arc<dyn ZeroInflationTermStructure>>,
    default: Vec<Arc<dyn DefaultProbabilityTermStructure>>,
}

impl ModelCurves {
    /// Resolve the curves for `parametrizations` (in model order) under
    /// `context`. FX spots are quoted against the first rate currency.
    pub fn resolve(
        provider: &dyn CurveProvider,
        parametrizations: &[Parametrization],
        context: &str,
    ) -> Result<Self> {
        let domestic = parametrizations
            .iter()
            .find(|p| p.asset_class() == AssetClass::Ir)
            .map(|p| p.currency().to_string())
            .ok_or_else(|| Error::Configuration("model has no rate factor".into()))?;
        let mut curves = Self {
            context: context.to_string(),
            discount: Vec::new(),
            fx_spots: Vec::new(),
            equity_spots: Vec::new(),
            dividend: Vec::new(),
            inflation: Vec::new(),
            default: Vec::new(),
        };
        for p in parametrizations {
            match p.asset_class() {
                AssetClass::Ir => curves.discount.push(provider.discount_curve(p.currency(), context)?),
                AssetClass::Fx => curves.fx_spots.push(provider.fx_spot(p.name(), &domestic, context)?),
                AssetClass::Equity => {
                    curves.equity_spots.push(provider.equity_spot(p.name(), context)?);
                    curves.dividend.push(provider.dividend_curve(p.name(), context)?);
                }
                AssetClass::Inflation => curves.inflation.push(provider.inflation_curve(p.name(), context)?),
                AssetClass::Credit => curves.default.push(provider.default_curve(p.name(), context)?),
            }
        }
        Ok(curves)
    }

    /// Context the curves were resolved under.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Discount curve of rate factor `i`.
    pub fn discount(&self, i: usize) -> &dyn YieldTermStructure {
        self.discount[i].as_ref()
    }

    /// FX spot of FX factor `i`.
    pub fn fx_spot(&self, i: usize) -> Real {
        self.fx_spots[i]
    }

    /// Spot of equity factor `i`.
    pub fn equity_spot(&self, i: usize) -> Real {
        self.equity_spots[i]
    }

    /// Dividend curve of equity factor `i`.
    pub fn dividend(&self, i: usize) -> &dyn YieldTermStructure {
        self.dividend[i].as_ref()
    }

    /// Inflation curve of inflation factor `i`.
    pub fn inflation(&self, i: usize) -> &dyn ZeroInflationTermStructure {
        self.inflation[i].as_ref()
    }

    /// Default curve of credit factor `i`.
    pub fn default_curve(&self, i: usize) -> &dyn DefaultProbabilityTermStructure {
        self.default[i].as_ref()
    }
}

impl fmt::Debug for ModelCurves {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCurves")
            .field("context", &self.context)
            .field("discount", &self.discount.len())
            .field("fx_spots", &self.fx_spots)
            .field("equity_spots", &self.equity_spots)
            .field("inflation", &self.inflation.len())
            .field("default", &self.default.len())
            .finish()
    }
}

/// A context-independent provider over fixed curves.
///
/// Useful when every calibration stage sees the same market, e.g. in
/// tests or for a model assembled by hand.
#[derive(Debug, Clone, Default)]
pub struct StaticCurves {
    discount: BTreeMap<String, Arc<dyn YieldTermStructure>>,
    fx: BTreeMap<(String, String), Real>,
    equity: BTreeMap<String, (Real, Arc<dyn YieldTermStructure>)>,
    inflation: BTreeMap<String, Arc<dyn ZeroInflationTermStructure>>,
    default: BTreeMap<String, Arc<dyn DefaultProbabilityTermStructure>>,
}

impl StaticCurves {
    /// An empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a discount curve.
    pub fn with_discount(mut self, currency: &str, curve: Arc<dyn YieldTermStructure>) -> Self {
        self.discount.insert(currency.to_string(), curve);
        self
    }

    /// Add an FX spot (units of `domestic` per `foreign`).
    pub fn with_fx_spot(mut self, foreign: &str, domestic: &str, spot: Real) -> Self {
        self.fx.insert((foreign.to_string(), domestic.to_string()), spot);
        self
    }

    /// Add an equity spot and dividend curve.
    pub fn with_equity(mut self, name: &str, spot: Real, dividend: Arc<dyn YieldTermStructure>) -> Self {
        self.equity.insert(name.to_string(), (spot, dividend));
        self
    }

    /// Add a zero-inflation curve.
    pub fn with_inflation(mut self, index: &str, curve: Arc<dyn ZeroInflationTermStructure>) -> Self {
        self.inflation.insert(index.to_string(), curve);
        self
    }

    /// Add a default curve.
    pub fn with_default_curve(mut self, name: &str, curve: Arc<dyn DefaultProbabilityTermStructure>) -> Self {
        self.default.insert(name.to_string(), curve);
        self
    }
}

fn missing(what: &str, key: &str, context: &str) -> Error {
    Error::MissingMarketData(format!("{what} {key} (context {context})"))
}

impl CurveProvider for StaticCurves {
    fn discount_curve(&self, currency: &str, context: &str) -> Result<Arc<dyn YieldTermStructure>> {
        self.discount
            .get(currency)
            .cloned()
            .ok_or_else(|| missing("discount curve", currency, context))
    }

    fn fx_spot(&self, foreign: &str, domestic: &str, context: &str) -> Result<Real> {
        if foreign == domestic {
            return Ok(1.0);
        }
        if let Some(&s) = self.fx.get(&(foreign.to_string(), domestic.to_string())) {
            return Ok(s);
        }
        self.fx
            .get(&(domestic.to_string(), foreign.to_string()))
            .map(|s| 1.0 / s)
            .ok_or_else(|| missing("fx spot", &format!("{foreign}{domestic}"), context))
    }

    fn equity_spot(&self, name: &str, context: &str) -> Result<Real> {
        self.equity
            .get(name)
            .map(|(s, _)| *s)
            .ok_or_else(|| missing("equity spot", name, context))
    }

    fn dividend_curve(&self, name: &str, context: &str) -> Result<Arc<dyn YieldTermStructure>> {
        self.equity
            .get(name)
            .map(|(_, d)| d.clone())
            .ok_or_else(|| missing("dividend curve", name, context))
    }

    fn inflation_curve(&self, index: &str, context: &str) -> Result<Arc<dyn ZeroInflationTermStructure>> {
        self.inflation
            .get(index)
            .cloned()
            .ok_or_else(|| missing("inflation curve", index, context))
    }

    fn default_curve(&self, name: &str, context: &str) -> Result<Arc<dyn DefaultProbabilityTermStructure>> {
        self.default
            .get(name)
            .cloned()
            .ok_or_else(|| missing("default curve", name, context))
    }
}
