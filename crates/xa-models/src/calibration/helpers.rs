//! Calibration instruments: a market volatility quote turned into a target
//! premium, plus an attached closed-form engine giving the model premium.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use xa_core::{errors::Result, Error, Real, Time};
use xa_quotes::Quote;

use super::engines::{
    AnalyticEngine, CcLgmFxOptionEngine, CpiCapFloorTerms, DkCpiCapFloorEngine, LgmSwaptionEngine, SwaptionTerms,
    VanillaTerms, XAssetEquityOptionEngine,
};
use crate::black_formula::{bachelier_formula, black_formula, OptionType};
use crate::cross_asset_model::CrossAssetModel;
use crate::curves::ModelCurves;
use crate::parametrization::AssetClass;

/// Quotation of a market volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VolatilityType {
    /// Black (log-normal) volatility.
    #[default]
    Lognormal,
    /// Bachelier (normal) volatility.
    Normal,
}

/// A calibration instrument.
pub trait CalibrationHelper: fmt::Debug + Send + Sync {
    /// Expiry (or maturity) of the instrument.
    fn maturity(&self) -> Time;

    /// Market premium implied by the volatility quote.
    fn market_value(&self, model: &CrossAssetModel, curves: &ModelCurves) -> Result<Real>;

    /// Model premium from the attached engine.
    fn model_value(&self, model: &CrossAssetModel, curves: &ModelCurves) -> Result<Real>;

    /// Relative premium error `(model − market) / market`.
    fn calibration_error(&self, model: &CrossAssetModel, curves: &ModelCurves) -> Result<Real> {
        let market = self.market_value(model, curves)?;
        Ok((self.model_value(model, curves)? - market) / market)
    }

    /// Attach a pricing engine. Fails if the engine prices another
    /// instrument type.
    fn attach_engine(&mut self, engine: AnalyticEngine) -> Result<()>;

    /// Whether an engine is attached.
    fn has_engine(&self) -> bool;
}

fn quote_value(quote: &dyn Quote, what: &dyn fmt::Display) -> Result<Real> {
    quote
        .value()
        .ok_or_else(|| Error::MissingMarketData(format!("volatility quote for {what} has no value")))
}

fn no_engine(what: &dyn fmt::Display) -> Error {
    Error::Runtime(format!("no pricing engine attached to {what}"))
}

fn wrong_engine(engine: &AnalyticEngine, what: &dyn fmt::Display) -> Error {
    Error::InvalidArgument(format!("{} cannot price {what}", engine.kind()))
}

// ── swaptions ─────────────────────────────────────────────────────────────

/// European swaption quoted by volatility; ATM when no strike is given.
#[derive(Debug, Clone)]
pub struct SwaptionHelper {
    currency: String,
    expiry: Time,
    term: Time,
    strike: Option<Real>,
    volatility: Arc<dyn Quote>,
    volatility_type: VolatilityType,
    engine: Option<LgmSwaptionEngine>,
}

impl SwaptionHelper {
    /// Create a helper.
    pub fn new(
        currency: impl Into<String>,
        expiry: Time,
        term: Time,
        strike: Option<Real>,
        volatility: Arc<dyn Quote>,
        volatility_type: VolatilityType,
    ) -> Self {
        Self {
            currency: currency.into(),
            expiry,
            term,
            strike,
            volatility,
            volatility_type,
            engine: None,
        }
    }

    /// Swap tenor in years.
    pub fn term(&self) -> Time {
        self.term
    }

    /// Swaption terms under `curves`, with the ATM strike resolved.
    pub fn terms(&self, model: &CrossAssetModel, curves: &ModelCurves) -> Result<SwaptionTerms> {
        let k = model.ccy_index(&self.currency)?;
        let mut terms = SwaptionTerms {
            expiry: self.expiry,
            term: self.term,
            strike: 0.0,
            option_type: OptionType::Call,
        };
        terms.strike = match self.strike {
            Some(s) => s,
            None => terms.forward_rate(|t| curves.discount(k).discount(t)),
        };
        Ok(terms)
    }
}

impl fmt::Display for SwaptionHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} swaption {}x{}", self.currency, self.expiry, self.term)
    }
}

impl CalibrationHelper for SwaptionHelper {
    fn maturity(&self) -> Time {
        self.expiry
    }

    fn market_value(&self, model: &CrossAssetModel, curves: &ModelCurves) -> Result<Real> {
        let k = model.ccy_index(&self.currency)?;
        let vol = quote_value(self.volatility.as_ref(), self)?;
        let terms = self.terms(model, curves)?;
        let discount = |t: Time| curves.discount(k).discount(t);
        let annuity = terms.annuity(discount);
        let forward = terms.forward_rate(discount);
        let sd = vol * self.expiry.sqrt();
        Ok(match self.volatility_type {
            VolatilityType::Lognormal => black_formula(terms.option_type, terms.strike, forward, sd, annuity),
            VolatilityType::Normal => bachelier_formula(terms.option_type, terms.strike, forward, sd, annuity),
        })
    }

    fn model_value(&self, model: &CrossAssetModel, curves: &ModelCurves) -> Result<Real> {
        let engine = self.engine.as_ref().ok_or_else(|| no_engine(self))?;
        engine.price(model, curves, &self.terms(model, curves)?)
    }

    fn attach_engine(&mut self, engine: AnalyticEngine) -> Result<()> {
        match engine {
            AnalyticEngine::LgmSwaption(e) => {
                self.engine = Some(e);
                Ok(())
            }
            other => Err(wrong_engine(&other, self)),
        }
    }

    fn has_engine(&self) -> bool {
        self.engine.is_some()
    }
}

// ── FX options ────────────────────────────────────────────────────────────

/// European FX option quoted by Black volatility; ATM-forward when no
/// strike is given.
#[derive(Debug, Clone)]
pub struct FxOptionHelper {
    foreign: String,
    expiry: Time,
    strike: Option<Real>,
    volatility: Arc<dyn Quote>,
    engine: Option<CcLgmFxOptionEngine>,
}

impl FxOptionHelper {
    /// Create a helper on the FX rate of `foreign` against the domestic
    /// currency.
    pub fn new(foreign: impl Into<String>, expiry: Time, strike: Option<Real>, volatility: Arc<dyn Quote>) -> Self {
        Self {
            foreign: foreign.into(),
            expiry,
            strike,
            volatility,
            engine: None,
        }
    }

    fn terms(&self, model: &CrossAssetModel, curves: &ModelCurves) -> Result<(VanillaTerms, Real, Real)> {
        let i = model.fx_index(&self.foreign)?;
        let dom = curves.discount(0).discount(self.expiry);
        let forward = curves.fx_spot(i) * curves.discount(i + 1).discount(self.expiry) / dom;
        Ok((vanilla(self.expiry, self.strike, forward), forward, dom))
    }
}

/// Out-of-the-money vanilla terms, ATM-forward by default.
fn vanilla(expiry: Time, strike: Option<Real>, forward: Real) -> VanillaTerms {
    let strike = strike.unwrap_or(forward);
    VanillaTerms {
        expiry,
        strike,
        option_type: if strike >= forward { OptionType::Call } else { OptionType::Put },
    }
}

impl fmt::Display for FxOptionHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fx option {}", self.foreign, self.expiry)
    }
}

impl CalibrationHelper for FxOptionHelper {
    fn maturity(&self) -> Time {
        self.expiry
    }

    fn market_value(&self, model: &CrossAssetModel, curves: &ModelCurves) -> Result<Real> {
        let vol = quote_value(self.volatility.as_ref(), self)?;
        let (terms, forward, dom) = self.terms(model, curves)?;
        Ok(black_formula(terms.option_type, terms.strike, forward, vol * self.expiry.sqrt(), dom))
    }

    fn model_value(&self, model: &CrossAssetModel, curves: &ModelCurves) -> Result<Real> {
        let engine = self.engine.as_ref().ok_or_else(|| no_engine(self))?;
        engine.price(model, curves, &self.terms(model, curves)?.0)
    }

    fn attach_engine(&mut self, engine: AnalyticEngine) -> Result<()> {
        match engine {
            AnalyticEngine::FxOption(e) => {
                self.engine = Some(e);
                Ok(())
            }
            other => Err(wrong_engine(&other, self)),
        }
    }

    fn has_engine(&self) -> bool {
        self.engine.is_some()
    }
}

// ── equity options ────────────────────────────────────────────────────────

/// European equity option quoted by Black volatility; ATM-forward when no
/// strike is given.
#[derive(Debug, Clone)]
pub struct EquityOptionHelper {
    name: String,
    expiry: Time,
    strike: Option<Real>,
    volatility: Arc<dyn Quote>,
    engine: Option<XAssetEquityOptionEngine>,
}

impl EquityOptionHelper {
    /// Create a helper.
    pub fn new(name: impl Into<String>, expiry: Time, strike: Option<Real>, volatility: Arc<dyn Quote>) -> Self {
        Self {
            name: name.into(),
            expiry,
            strike,
            volatility,
            engine: None,
        }
    }

    fn terms(&self, model: &CrossAssetModel, curves: &ModelCurves) -> Result<(VanillaTerms, Real, Real)> {
        let i = model.eq_index(&self.name)?;
        let k = model.currency_index(AssetClass::Equity, i);
        let discount = curves.discount(k).discount(self.expiry);
        let forward = curves.equity_spot(i) * curves.dividend(i).discount(self.expiry) / discount;
        Ok((vanilla(self.expiry, self.strike, forward), forward, discount))
    }
}

impl fmt::Display for EquityOptionHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} equity option {}", self.name, self.expiry)
    }
}

impl CalibrationHelper for EquityOptionHelper {
    fn maturity(&self) -> Time {
        self.expiry
    }

    fn market_value(&self, model: &CrossAssetModel, curves: &ModelCurves) -> Result<Real> {
        let vol = quote_value(self.volatility.as_ref(), self)?;
        let (terms, forward, discount) = self.terms(model, curves)?;
        Ok(black_formula(terms.option_type, terms.strike, forward, vol * self.expiry.sqrt(), discount))
    }

    fn model_value(&self, model: &CrossAssetModel, curves: &ModelCurves) -> Result<Real> {
        let engine = self.engine.as_ref().ok_or_else(|| no_engine(self))?;
        engine.price(model, curves, &self.terms(model, curves)?.0)
    }

    fn attach_engine(&mut self, engine: AnalyticEngine) -> Result<()> {
        match engine {
            AnalyticEngine::EquityOption(e) => {
                self.engine = Some(e);
                Ok(())
            }
            other => Err(wrong_engine(&other, self)),
        }
    }

    fn has_engine(&self) -> bool {
        self.engine.is_some()
    }
}

// ── CPI caps and floors ───────────────────────────────────────────────────

/// Zero-coupon CPI cap or floor quoted by a Black volatility of the index
/// ratio.
#[derive(Debug, Clone)]
pub struct CpiCapFloorHelper {
    index: String,
    terms: CpiCapFloorTerms,
    volatility: Arc<dyn Quote>,
    engine: Option<DkCpiCapFloorEngine>,
}

impl CpiCapFloorHelper {
    /// Create a helper; `option_type` is `Call` for a cap.
    pub fn new(
        index: impl Into<String>,
        maturity: Time,
        strike: Real,
        option_type: OptionType,
        volatility: Arc<dyn Quote>,
    ) -> Self {
        Self {
            index: index.into(),
            terms: CpiCapFloorTerms {
                maturity,
                strike,
                option_type,
            },
            volatility,
            engine: None,
        }
    }
}

impl fmt::Display for CpiCapFloorHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.terms.option_type {
            OptionType::Call => "cap",
            OptionType::Put => "floor",
        };
        write!(f, "{} cpi {kind} {} @ {}", self.index, self.terms.maturity, self.terms.strike)
    }
}

impl CalibrationHelper for CpiCapFloorHelper {
    fn maturity(&self) -> Time {
        self.terms.maturity
    }

    fn market_value(&self, model: &CrossAssetModel, curves: &ModelCurves) -> Result<Real> {
        let i = model.inf_index(&self.index)?;
        let k = model.currency_index(AssetClass::Inflation, i);
        let vol = quote_value(self.volatility.as_ref(), self)?;
        let t = self.terms.maturity;
        Ok(black_formula(
            self.terms.option_type,
            self.terms.strike_ratio(),
            curves.inflation(i).growth(t),
            vol * t.sqrt(),
            curves.discount(k).discount(t),
        ))
    }

    fn model_value(&self, model: &CrossAssetModel, curves: &ModelCurves) -> Result<Real> {
        let engine = self.engine.as_ref().ok_or_else(|| no_engine(self))?;
        engine.price(model, curves, &self.terms)
    }

    fn attach_engine(&mut self, engine: AnalyticEngine) -> Result<()> {
        match engine {
            AnalyticEngine::CpiCapFloor(e) => {
                self.engine = Some(e);
                Ok(())
            }
            other => Err(wrong_engine(&other, self)),
        }
    }

    fn has_engine(&self) -> bool {
        self.engine.is_some()
    }
}

// ── basket ────────────────────────────────────────────────────────────────

/// Ordered calibration instruments of one factor.
#[derive(Debug, Default)]
pub struct CalibrationBasket {
    helpers: Vec<Box<dyn CalibrationHelper>>,
}

impl CalibrationBasket {
    /// An empty basket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instrument.
    pub fn push(&mut self, helper: Box<dyn CalibrationHelper>) {
        self.helpers.push(helper);
    }

    /// Number of instruments.
    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    /// Whether the basket is empty.
    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }

    /// The instruments in order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn CalibrationHelper> {
        self.helpers.iter().map(|h| h.as_ref())
    }

    /// Maturities in order.
    pub fn maturities(&self) -> Vec<Time> {
        self.iter().map(|h| h.maturity()).collect()
    }

    /// Attach a copy of `engine` to every instrument.
    pub fn attach_engine(&mut self, engine: &AnalyticEngine) -> Result<()> {
        for h in &mut self.helpers {
            h.attach_engine(engine.clone())?;
        }
        Ok(())
    }

    /// Relative premium error of every instrument.
    pub fn errors(&self, model: &CrossAssetModel, curves: &ModelCurves) -> Result<Vec<Real>> {
        self.iter().map(|h| h.calibration_error(model, curves)).collect()
    }

    /// Root mean square of the relative premium errors; zero for an empty
    /// basket.
    pub fn rmse(&self, model: &CrossAssetModel, curves: &ModelCurves) -> Result<Real> {
        if self.is_empty() {
            return Ok(0.0);
        }
        let errors = self.errors(model, curves)?;
        Ok((errors.iter().map(|e| e * e).sum::<Real>() / errors.len() as Real).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cross_asset_model::tests::three_currency_model;
    use approx::assert_relative_eq;
    use xa_quotes::SimpleQuote;

    #[test]
    fn atm_swaption_market_value() {
        let m = three_currency_model();
        let quote = Arc::new(SimpleQuote::new(0.01));
        let h = SwaptionHelper::new("EUR", 5.0, 5.0, None, quote, VolatilityType::Normal);
        let terms = h.terms(&m, m.curves()).unwrap();
        let d = |t: Time| m.curves().discount(0).discount(t);
        let annuity = terms.annuity(d);
        let expected = annuity * 0.01 * 5f64.sqrt() / (2.0 * std::f64::consts::PI).sqrt();
        assert_relative_eq!(h.market_value(&m, m.curves()).unwrap(), expected, max_relative = 1e-14);
    }

    #[test]
    fn engine_must_match_and_be_present() {
        let m = three_currency_model();
        let quote = Arc::new(SimpleQuote::new(0.1));
        let mut h = FxOptionHelper::new("USD", 1.0, None, quote);
        assert!(matches!(h.model_value(&m, m.curves()), Err(Error::Runtime(_))));
        let err = h.attach_engine(AnalyticEngine::LgmSwaption(LgmSwaptionEngine::new("EUR")));
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
        h.attach_engine(AnalyticEngine::FxOption(CcLgmFxOptionEngine::new("USD"))).unwrap();
        assert!(h.has_engine());
        assert!(h.calibration_error(&m, m.curves()).unwrap().is_finite());
    }

    #[test]
    fn empty_quote_is_missing_market_data() {
        let m = three_currency_model();
        let h = FxOptionHelper::new("GBP", 1.0, None, Arc::new(SimpleQuote::empty()));
        assert!(matches!(h.market_value(&m, m.curves()), Err(Error::MissingMarketData(_))));
    }
}
