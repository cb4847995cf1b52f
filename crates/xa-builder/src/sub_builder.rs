//! The protocol shared by the per-factor builders.
//!
//! A sub-builder turns one configuration record into a parametrization and
//! a calibration basket, remembers which market entries it read, and
//! answers whether any of them moved since it was built.

use std::fmt;
use std::sync::Arc;

use xa_core::{errors::Result, DependencySet, Real, Snapshot, Time};
use xa_math::OptimizationResult;
use xa_models::{
    AnalyticEngine, AssetClass, CalibrationBasket, CrossAssetModel, ModelCurves, ParamShape, ParameterKind,
    Parametrization, TimeFunction,
};
use xa_quotes::{Quote, QuoteRevision};

use crate::config::{CalibrationType, OptimizerData, ParamData};
use crate::correlation::FactorName;
use crate::market::{Market, MarketKey};

/// A builder of one factor.
pub trait SubBuilder: fmt::Debug + Send + Sync {
    /// Factor name (currency, pair, index or asset name).
    fn name(&self) -> &str;

    /// Asset class of the factor.
    fn asset_class(&self) -> AssetClass;

    /// The parametrization as built, or as calibrated once the cascade
    /// has fitted the factor.
    fn parametrization(&self) -> &Parametrization;

    /// Replace the parametrization with the one fitted by the cascade.
    fn set_parametrization(&mut self, parametrization: Parametrization);

    /// Calibration instruments; empty when the factor is not calibrated.
    fn basket(&self) -> &CalibrationBasket;

    /// Mutable access to the basket, to attach engines.
    fn basket_mut(&mut self) -> &mut CalibrationBasket;

    /// Engine pricing the basket instruments, if the factor has any.
    fn engine(&self) -> Option<AnalyticEngine>;

    /// Configured calibration type.
    fn calibration_type(&self) -> CalibrationType;

    /// Parameter kinds to fit; empty when nothing is calibrated.
    fn calibration_kinds(&self) -> Vec<ParameterKind>;

    /// Largest accepted bootstrap error.
    fn bootstrap_tolerance(&self) -> Real;

    /// What the builder read from the market.
    fn dependencies(&self) -> &Dependencies;

    /// `true` if a curve or quote read at build time has changed since.
    fn requires_recalibration(&self) -> bool {
        self.dependencies().has_changed()
    }

    /// `true` if calibration is requested.
    fn calibrates(&self) -> bool {
        self.calibration_type() != CalibrationType::None && !self.calibration_kinds().is_empty()
    }

    /// The factor as named in correlation data.
    fn factor(&self) -> FactorName {
        FactorName::new(self.asset_class(), self.name())
    }

    /// Factor label used in logs and errors, e.g. `FX:USDEUR`.
    fn label(&self) -> String {
        self.factor().to_string()
    }
}

/// Market entries read by a sub-builder, with their revisions at build
/// time.
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    set: DependencySet,
    snapshot: Snapshot,
}

impl Dependencies {
    /// Record a market entry.
    pub fn track(&mut self, market: &dyn Market, key: MarketKey, context: &str) -> Result<()> {
        let revision = market.dependency(&key, context)?;
        self.set.add(format!("{key} ({context})"), revision);
        Ok(())
    }

    /// Record a quote.
    pub fn track_quote(&mut self, label: impl Into<String>, quote: &Arc<dyn Quote>) {
        self.set.add(label, Arc::new(QuoteRevision(quote.clone())));
    }

    /// Take the build-time snapshot.
    pub fn freeze(&mut self) {
        self.snapshot = self.set.snapshot();
    }

    /// Number of tracked entries.
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// `true` if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// `true` if anything moved since [`freeze`](Self::freeze).
    pub fn has_changed(&self) -> bool {
        self.set.has_changed_since(&self.snapshot)
    }

    /// Labels of the entries that moved.
    pub fn changed(&self) -> Vec<String> {
        self.set.changed_since(&self.snapshot).map(str::to_string).collect()
    }
}

/// Build a parameter function from its configuration.
///
/// With `bootstrap_times`, a piecewise parameter without configured
/// breakpoints takes them from the basket (every expiry but the last), and
/// a single configured value is repeated on every piece.
///
/// # Errors
/// `Configuration` if a piecewise bootstrap grid does not give one piece
/// per instrument, or values and breakpoints do not match.
pub(crate) fn time_function(
    label: &str,
    data: &ParamData,
    volatility: bool,
    bootstrap_times: Option<&[Time]>,
) -> Result<TimeFunction> {
    let times: Vec<Time> = match bootstrap_times {
        Some(expiries) if data.shape.is_piecewise() && data.times.is_empty() && !expiries.is_empty() => {
            expiries[..expiries.len() - 1].to_vec()
        }
        Some(expiries) if data.shape.is_piecewise() && !expiries.is_empty() => {
            xa_core::ensure_config!(
                data.times.len() + 1 == expiries.len(),
                "{label}: {} instruments for {} parameter pieces",
                expiries.len(),
                data.times.len() + 1
            );
            data.times.clone()
        }
        _ if data.shape == ParamShape::Constant => Vec::new(),
        _ => data.times.clone(),
    };
    let values = match data.values.as_slice() {
        [v] => vec![*v; times.len() + 1],
        vs => vs.to_vec(),
    };
    xa_core::ensure_config!(
        values.len() == times.len() + 1,
        "{label}: {} values for {} breakpoints",
        values.len(),
        times.len()
    );
    let built = if volatility {
        TimeFunction::volatility(data.shape, &times, &values)
    } else {
        TimeFunction::reversion(data.shape, &times, &values)
    };
    built.map_err(|e| xa_core::Error::Configuration(format!("{label}: {e}")))
}

/// Check that instrument expiries increase strictly.
pub(crate) fn check_expiries(label: &str, expiries: &[Time]) -> Result<()> {
    xa_core::ensure_config!(
        expiries.windows(2).all(|w| w[0] < w[1]),
        "{label}: basket expiries must increase strictly, got {expiries:?}"
    );
    xa_core::ensure_config!(expiries.iter().all(|&t| t > 0.0), "{label}: basket expiries must be positive");
    Ok(())
}

/// Strike of instrument `i` from a list holding none, one, or one per
/// instrument.
pub(crate) fn strike_at(label: &str, strikes: &[Real], i: usize, n: usize) -> Result<Option<Real>> {
    match strikes.len() {
        0 => Ok(None),
        1 => Ok(Some(strikes[0])),
        m if m == n => Ok(Some(strikes[i])),
        m => Err(xa_core::Error::Configuration(format!("{label}: {m} strikes for {n} instruments"))),
    }
}

/// Calibrate one factor of `model` to `basket`.
///
/// A bootstrap of a single piecewise-constant parameter kind runs the
/// iterative calibration; everything else (several kinds, piecewise-linear
/// or constant shapes, global calibration) runs one joint fit. Returns
/// `None` when nothing is to be calibrated.
#[allow(clippy::too_many_arguments)]
pub(crate) fn calibrate_factor(
    model: &mut CrossAssetModel,
    class: AssetClass,
    index: usize,
    kinds: &[ParameterKind],
    calibration_type: CalibrationType,
    basket: &CalibrationBasket,
    curves: &ModelCurves,
    optimizer: &OptimizerData,
) -> Result<Option<OptimizationResult>> {
    if calibration_type == CalibrationType::None || kinds.is_empty() {
        return Ok(None);
    }
    let method = optimizer.method();
    let end_criteria = optimizer.end_criteria();
    let iterative = calibration_type == CalibrationType::Bootstrap
        && kinds.len() == 1
        && model
            .parametrization(class, index)
            .parameter(kinds[0])
            .is_some_and(|f| f.shape() == ParamShape::PiecewiseConstant);
    let result = if iterative {
        model.calibrate_iterative(class, index, kinds[0], basket, curves, &method, &end_criteria)?
    } else {
        model.calibrate_global(class, index, kinds, basket, curves, &method, &end_criteria)?
    };
    Ok(Some(result))
}
