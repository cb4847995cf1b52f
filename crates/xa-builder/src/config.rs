//! Configuration records of the model builder.
//!
//! Every record derives `serde` and can be read from TOML through
//! [`CrossAssetModelData::from_toml_str`]. Only the shape of the data is
//! checked here; consistency (factor counts, currencies, basket sizes) is
//! checked by the builders and reported as configuration errors.
//!
//! ```toml
//! gate_ir_bootstrap = true
//!
//! [[ir]]
//! currency = "EUR"
//! calibration_type = "Bootstrap"
//! swaption_expiries = [1.0, 2.0, 3.0]
//! swaption_maturity = 4.0
//!
//! [[fx]]
//! foreign = "USD"
//! domestic = "EUR"
//! sigma = { shape = "Constant", values = [0.1] }
//!
//! [[correlations]]
//! factor1 = "IR:EUR"
//! factor2 = "FX:USDEUR"
//! value = -0.2
//! ```

use serde::{Deserialize, Serialize};
use xa_core::{errors::Result, Error, Real, Time};
use xa_math::matrix_utilities::Salvaging;
use xa_math::{EndCriteria, LevenbergMarquardt};
use xa_models::{OptionType, ParamShape, VolatilityType};
use xa_processes::Discretization;

use crate::market::DEFAULT_CONTEXT;

/// How a factor is calibrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CalibrationType {
    /// Parameters stay as configured.
    #[default]
    None,
    /// One parameter piece per instrument, fitted in expiry order. Gated by
    /// the bootstrap tolerance.
    Bootstrap,
    /// One least-squares fit over the whole basket.
    #[serde(alias = "BestFit")]
    Global,
}

/// A time-dependent parameter: shape, breakpoints and values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamData {
    /// Time shape.
    pub shape: ParamShape,
    /// Breakpoints; empty for a constant, or when a bootstrap takes them
    /// from the basket.
    pub times: Vec<Time>,
    /// Values, one more than the breakpoints, or a single value to be
    /// repeated on every piece.
    pub values: Vec<Real>,
}

impl ParamData {
    /// A constant parameter.
    pub fn constant(value: Real) -> Self {
        Self {
            shape: ParamShape::Constant,
            times: Vec::new(),
            values: vec![value],
        }
    }

    /// A piecewise-constant parameter.
    pub fn piecewise(times: Vec<Time>, values: Vec<Real>) -> Self {
        Self {
            shape: ParamShape::PiecewiseConstant,
            times,
            values,
        }
    }
}

impl Default for ParamData {
    fn default() -> Self {
        Self::constant(0.0)
    }
}

/// Market configuration labels used by the calibration stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contexts {
    /// Rate calibration (swaption baskets).
    pub ir_calibration: String,
    /// FX calibration.
    pub fx_calibration: String,
    /// Equity calibration.
    pub eq_calibration: String,
    /// The final model, also used by the inflation stage.
    pub final_model: String,
}

impl Default for Contexts {
    fn default() -> Self {
        Self {
            ir_calibration: DEFAULT_CONTEXT.into(),
            fx_calibration: DEFAULT_CONTEXT.into(),
            eq_calibration: DEFAULT_CONTEXT.into(),
            final_model: DEFAULT_CONTEXT.into(),
        }
    }
}

/// Levenberg-Marquardt settings and end criteria.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerData {
    /// Maximum iterations.
    pub max_iterations: usize,
    /// Maximum iterations without an accepted step.
    pub max_stationary_iterations: usize,
    /// Residual target.
    pub root_epsilon: Real,
    /// Relative cost reduction target.
    pub function_epsilon: Real,
    /// Gradient orthogonality target.
    pub gradient_norm_epsilon: Real,
    /// Finite-difference step driver.
    pub epsfcn: Real,
    /// Relative step test.
    pub xtol: Real,
    /// Orthogonality test.
    pub gtol: Real,
}

impl Default for OptimizerData {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            max_stationary_iterations: 500,
            root_epsilon: 1e-8,
            function_epsilon: 1e-8,
            gradient_norm_epsilon: 1e-8,
            epsfcn: 1e-8,
            xtol: 1e-8,
            gtol: 1e-8,
        }
    }
}

impl OptimizerData {
    /// End criteria.
    pub fn end_criteria(&self) -> EndCriteria {
        EndCriteria::new(
            self.max_iterations,
            self.max_stationary_iterations,
            self.root_epsilon,
            self.function_epsilon,
            self.gradient_norm_epsilon,
        )
    }

    /// The optimizer.
    pub fn method(&self) -> LevenbergMarquardt {
        LevenbergMarquardt::new(self.epsfcn, self.xtol, self.gtol)
    }
}

fn default_tolerance() -> Real {
    1e-4
}

fn default_true() -> bool {
    true
}

fn default_scaling() -> Real {
    1.0
}

/// Interest-rate LGM factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrLgmData {
    /// Currency code.
    pub currency: String,
    /// Calibration type.
    #[serde(default)]
    pub calibration_type: CalibrationType,
    /// Calibrate the volatility α.
    #[serde(default = "default_true")]
    pub calibrate_a: bool,
    /// Calibrate the reversion κ.
    #[serde(default)]
    pub calibrate_h: bool,
    /// Volatility α.
    #[serde(default = "IrLgmData::default_alpha")]
    pub alpha: ParamData,
    /// Reversion κ.
    #[serde(default)]
    pub kappa: ParamData,
    /// If set, the shift puts `H(horizon) = 0` after calibration.
    #[serde(default)]
    pub shift_horizon: Option<Time>,
    /// Scaling applied after calibration.
    #[serde(default = "default_scaling")]
    pub scaling: Real,
    /// Swaption expiries, increasing.
    #[serde(default)]
    pub swaption_expiries: Vec<Time>,
    /// Underlying terms, one per expiry. Ignored for a coterminal basket.
    #[serde(default)]
    pub swaption_terms: Vec<Time>,
    /// Common final maturity of a coterminal basket.
    #[serde(default)]
    pub swaption_maturity: Option<Time>,
    /// Quotation of the swaption volatilities.
    #[serde(default)]
    pub volatility_type: VolatilityType,
    /// Largest accepted bootstrap error.
    #[serde(default = "default_tolerance")]
    pub bootstrap_tolerance: Real,
}

impl IrLgmData {
    fn default_alpha() -> ParamData {
        ParamData::constant(0.01)
    }

    /// An uncalibrated factor with constant α and κ.
    pub fn new(currency: impl Into<String>, alpha: Real, kappa: Real) -> Self {
        Self {
            currency: currency.into(),
            calibration_type: CalibrationType::None,
            calibrate_a: true,
            calibrate_h: false,
            alpha: ParamData::constant(alpha),
            kappa: ParamData::constant(kappa),
            shift_horizon: None,
            scaling: 1.0,
            swaption_expiries: Vec::new(),
            swaption_terms: Vec::new(),
            swaption_maturity: None,
            volatility_type: VolatilityType::default(),
            bootstrap_tolerance: default_tolerance(),
        }
    }

    /// `(expiry, term)` of every basket swaption.
    pub fn swaptions(&self) -> Result<Vec<(Time, Time)>> {
        match self.swaption_maturity {
            Some(end) => {
                xa_core::ensure_config!(
                    self.swaption_expiries.iter().all(|&e| e < end),
                    "IR:{}: coterminal maturity {end} is not after every expiry",
                    self.currency
                );
                Ok(self.swaption_expiries.iter().map(|&e| (e, end - e)).collect())
            }
            None => {
                xa_core::ensure_config!(
                    self.swaption_terms.len() == self.swaption_expiries.len(),
                    "IR:{}: {} swaption expiries but {} terms",
                    self.currency,
                    self.swaption_expiries.len(),
                    self.swaption_terms.len()
                );
                Ok(self.swaption_expiries.iter().copied().zip(self.swaption_terms.iter().copied()).collect())
            }
        }
    }
}

/// FX Black-Scholes factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxBsData {
    /// Foreign currency.
    pub foreign: String,
    /// Domestic currency.
    pub domestic: String,
    /// Calibration type.
    #[serde(default)]
    pub calibration_type: CalibrationType,
    /// Calibrate σ.
    #[serde(default = "default_true")]
    pub calibrate_sigma: bool,
    /// Volatility σ.
    #[serde(default)]
    pub sigma: ParamData,
    /// Option expiries, increasing.
    #[serde(default)]
    pub option_expiries: Vec<Time>,
    /// Strikes: empty for ATM-forward, one for all expiries or one per
    /// expiry.
    #[serde(default)]
    pub option_strikes: Vec<Real>,
    /// Largest accepted bootstrap error.
    #[serde(default = "default_tolerance")]
    pub bootstrap_tolerance: Real,
}

impl FxBsData {
    /// An uncalibrated factor with constant σ.
    pub fn new(foreign: impl Into<String>, domestic: impl Into<String>, sigma: Real) -> Self {
        Self {
            foreign: foreign.into(),
            domestic: domestic.into(),
            calibration_type: CalibrationType::None,
            calibrate_sigma: true,
            sigma: ParamData::constant(sigma),
            option_expiries: Vec::new(),
            option_strikes: Vec::new(),
            bootstrap_tolerance: default_tolerance(),
        }
    }
}

/// Equity Black-Scholes factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqBsData {
    /// Equity name.
    pub name: String,
    /// Currency of the equity.
    pub currency: String,
    /// Calibration type.
    #[serde(default)]
    pub calibration_type: CalibrationType,
    /// Calibrate σ.
    #[serde(default = "default_true")]
    pub calibrate_sigma: bool,
    /// Volatility σ.
    #[serde(default)]
    pub sigma: ParamData,
    /// Option expiries, increasing.
    #[serde(default)]
    pub option_expiries: Vec<Time>,
    /// Strikes: empty for ATM-forward, one for all expiries or one per
    /// expiry.
    #[serde(default)]
    pub option_strikes: Vec<Real>,
    /// Largest accepted bootstrap error.
    #[serde(default = "default_tolerance")]
    pub bootstrap_tolerance: Real,
}

impl EqBsData {
    /// An uncalibrated factor with constant σ.
    pub fn new(name: impl Into<String>, currency: impl Into<String>, sigma: Real) -> Self {
        Self {
            name: name.into(),
            currency: currency.into(),
            calibration_type: CalibrationType::None,
            calibrate_sigma: true,
            sigma: ParamData::constant(sigma),
            option_expiries: Vec::new(),
            option_strikes: Vec::new(),
            bootstrap_tolerance: default_tolerance(),
        }
    }
}

/// Cap or floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CapFloor {
    /// Zero-coupon CPI cap.
    #[default]
    Cap,
    /// Zero-coupon CPI floor.
    Floor,
}

impl CapFloor {
    /// Option type of the payoff on the index ratio.
    pub fn option_type(self) -> OptionType {
        match self {
            CapFloor::Cap => OptionType::Call,
            CapFloor::Floor => OptionType::Put,
        }
    }
}

/// Inflation Dodgson-Kainth factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfDkData {
    /// Index name.
    pub index: String,
    /// Currency of the index.
    pub currency: String,
    /// Calibration type.
    #[serde(default)]
    pub calibration_type: CalibrationType,
    /// Calibrate the volatility α.
    #[serde(default = "default_true")]
    pub calibrate_a: bool,
    /// Calibrate the reversion κ.
    #[serde(default)]
    pub calibrate_h: bool,
    /// Volatility α.
    #[serde(default)]
    pub alpha: ParamData,
    /// Reversion κ.
    #[serde(default)]
    pub kappa: ParamData,
    /// Instrument type of the basket.
    #[serde(default)]
    pub cap_floor: CapFloor,
    /// Cap/floor maturities, increasing.
    #[serde(default)]
    pub maturities: Vec<Time>,
    /// Strikes as annual zero rates: one for all maturities or one per
    /// maturity.
    #[serde(default)]
    pub strikes: Vec<Real>,
    /// Largest accepted bootstrap error.
    #[serde(default = "default_tolerance")]
    pub bootstrap_tolerance: Real,
}

impl InfDkData {
    /// An uncalibrated factor with constant α and κ.
    pub fn new(index: impl Into<String>, currency: impl Into<String>, alpha: Real, kappa: Real) -> Self {
        Self {
            index: index.into(),
            currency: currency.into(),
            calibration_type: CalibrationType::None,
            calibrate_a: true,
            calibrate_h: false,
            alpha: ParamData::constant(alpha),
            kappa: ParamData::constant(kappa),
            cap_floor: CapFloor::Cap,
            maturities: Vec::new(),
            strikes: Vec::new(),
            bootstrap_tolerance: default_tolerance(),
        }
    }
}

/// Credit LGM factor. Never calibrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrLgmData {
    /// Credit name.
    pub name: String,
    /// Currency of the name.
    pub currency: String,
    /// Volatility α.
    #[serde(default)]
    pub alpha: ParamData,
    /// Reversion κ.
    #[serde(default)]
    pub kappa: ParamData,
}

/// One correlation between two factors, named like `IR:EUR` or `FX:USDEUR`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationData {
    /// First factor.
    pub factor1: String,
    /// Second factor.
    pub factor2: String,
    /// Correlation.
    pub value: Real,
}

/// Configuration of a whole cross-asset model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossAssetModelData {
    /// Rate factors; the first currency is the domestic one.
    #[serde(default)]
    pub ir: Vec<IrLgmData>,
    /// FX factors, one per foreign rate currency, in the same order.
    #[serde(default)]
    pub fx: Vec<FxBsData>,
    /// Equity factors.
    #[serde(default)]
    pub eq: Vec<EqBsData>,
    /// Inflation factors.
    #[serde(default)]
    pub inf: Vec<InfDkData>,
    /// Credit factors.
    #[serde(default)]
    pub cr: Vec<CrLgmData>,
    /// Pairwise correlations; missing pairs are zero.
    #[serde(default)]
    pub correlations: Vec<CorrelationData>,
    /// Reject missing correlation pairs instead of defaulting them to zero.
    #[serde(default)]
    pub strict_correlations: bool,
    /// Treatment of an invalid correlation matrix.
    #[serde(default)]
    pub salvaging: Salvaging,
    /// Default discretization of the state process.
    #[serde(default)]
    pub discretization: Discretization,
    /// Apply the bootstrap tolerance to rate factors too.
    #[serde(default = "default_true")]
    pub gate_ir_bootstrap: bool,
    /// Market configuration labels.
    #[serde(default)]
    pub contexts: Contexts,
    /// Optimizer settings.
    #[serde(default)]
    pub optimizer: OptimizerData,
}

impl Default for CrossAssetModelData {
    fn default() -> Self {
        Self {
            ir: Vec::new(),
            fx: Vec::new(),
            eq: Vec::new(),
            inf: Vec::new(),
            cr: Vec::new(),
            correlations: Vec::new(),
            strict_correlations: false,
            salvaging: Salvaging::None,
            discretization: Discretization::Exact,
            gate_ir_bootstrap: true,
            contexts: Contexts::default(),
            optimizer: OptimizerData::default(),
        }
    }
}

impl CrossAssetModelData {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Configuration(format!("invalid model configuration: {e}")))
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Configuration(format!("cannot serialize model configuration: {e}")))
    }

    /// Rate currencies in factor order.
    pub fn currencies(&self) -> Vec<&str> {
        self.ir.iter().map(|d| d.currency.as_str()).collect()
    }

    /// Check factor counts and currencies.
    ///
    /// # Errors
    /// `Configuration` unless there is at least one rate factor, one FX
    /// factor per foreign rate currency (foreign = rate currency `i+1`,
    /// domestic = rate currency 0), and every equity, inflation and credit
    /// currency is a rate currency.
    pub fn validate(&self) -> Result<()> {
        let ccys = self.currencies();
        xa_core::ensure_config!(!ccys.is_empty(), "at least one rate factor is required");
        xa_core::ensure_config!(
            self.fx.len() + 1 == ccys.len(),
            "{} rate factors need {} fx factors, got {}",
            ccys.len(),
            ccys.len() - 1,
            self.fx.len()
        );
        for (i, fx) in self.fx.iter().enumerate() {
            xa_core::ensure_config!(
                fx.foreign == ccys[i + 1] && fx.domestic == ccys[0],
                "fx factor {i} is {}{}, expected {}{}",
                fx.foreign,
                fx.domestic,
                ccys[i + 1],
                ccys[0]
            );
        }
        let others = self
            .eq
            .iter()
            .map(|d| (&d.name, &d.currency))
            .chain(self.inf.iter().map(|d| (&d.index, &d.currency)))
            .chain(self.cr.iter().map(|d| (&d.name, &d.currency)));
        for (name, ccy) in others {
            xa_core::ensure_config!(ccys.contains(&ccy.as_str()), "{name}: currency {ccy} has no rate factor");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_currencies() -> CrossAssetModelData {
        CrossAssetModelData {
            ir: vec![IrLgmData::new("EUR", 0.01, 0.0), IrLgmData::new("USD", 0.01, 0.0)],
            fx: vec![FxBsData::new("USD", "EUR", 0.1)],
            ..Default::default()
        }
    }

    #[test]
    fn fx_count_and_currencies_are_checked() {
        let mut data = two_currencies();
        data.validate().unwrap();
        data.fx.clear();
        assert!(matches!(data.validate(), Err(Error::Configuration(_))));

        let mut data = two_currencies();
        data.fx[0].domestic = "GBP".into();
        assert!(matches!(data.validate(), Err(Error::Configuration(_))));

        let mut data = two_currencies();
        data.eq.push(EqBsData::new("NKY", "JPY", 0.2));
        assert!(matches!(data.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn coterminal_swaptions() {
        let mut d = IrLgmData::new("EUR", 0.01, 0.0);
        d.swaption_expiries = vec![1.0, 2.0, 3.0];
        d.swaption_maturity = Some(4.0);
        assert_eq!(d.swaptions().unwrap(), vec![(1.0, 3.0), (2.0, 2.0), (3.0, 1.0)]);
        d.swaption_maturity = None;
        d.swaption_terms = vec![5.0];
        assert!(matches!(d.swaptions(), Err(Error::Configuration(_))));
    }

    #[test]
    fn toml_defaults() {
        let data = CrossAssetModelData::from_toml_str(
            r#"
            [[ir]]
            currency = "EUR"
            calibration_type = "BestFit"
            swaption_expiries = [1.0, 2.0]
            swaption_terms = [5.0, 5.0]
            "#,
        )
        .unwrap();
        assert_eq!(data.ir[0].calibration_type, CalibrationType::Global);
        assert_eq!(data.ir[0].alpha, ParamData::constant(0.01));
        assert!(data.gate_ir_bootstrap);
        assert_eq!(data.contexts.fx_calibration, DEFAULT_CONTEXT);
        assert_eq!(data.optimizer, OptimizerData::default());
        assert!(CrossAssetModelData::from_toml_str("ir = 3").is_err());
    }
}
