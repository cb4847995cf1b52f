//! Closed-form pricing engines used by the calibration helpers.
//!
//! Engines store the names of the factors they price and resolve model
//! indices at pricing time, so the same engine can be attached before the
//! joint model exists and keeps working after a rebuild.

use serde::{Deserialize, Serialize};
use xa_core::{errors::Result, Real, Time};
use xa_math::normal_cdf;
use xa_math::solvers1d::brent_bracketed;

use crate::black_formula::{black_formula, OptionType};
use crate::cross_asset_model::CrossAssetModel;
use crate::curves::ModelCurves;

/// Accuracy of the Jamshidian critical state.
const JAMSHIDIAN_ACCURACY: Real = 1e-14;

/// Below this `ζ(T₀)` a swaption is priced at intrinsic value.
const MIN_ZETA: Real = 1e-20;

/// Terms of a European swaption on a fixed-vs-float swap with an annual
/// fixed schedule starting at expiry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwaptionTerms {
    /// Expiry `T₀`, also the swap start.
    pub expiry: Time,
    /// Swap tenor in years; a non-integral tenor ends with a short period.
    pub term: Time,
    /// Fixed rate.
    pub strike: Real,
    /// `Call` for a payer swaption, `Put` for a receiver swaption.
    pub option_type: OptionType,
}

impl SwaptionTerms {
    /// Fixed-leg payment times and accrual fractions.
    pub fn schedule(&self) -> Vec<(Time, Real)> {
        let periods = (self.term - 1e-8).ceil().max(1.0) as usize;
        let mut out = Vec::with_capacity(periods);
        let mut prev = self.expiry;
        for i in 1..=periods {
            let t = self.expiry + (i as Real).min(self.term);
            out.push((t, t - prev));
            prev = t;
        }
        out
    }

    /// Fixed-leg annuity `Σ τᵢ P(0, tᵢ)`.
    pub fn annuity(&self, discount: impl Fn(Time) -> Real) -> Real {
        self.schedule().iter().map(|&(t, tau)| tau * discount(t)).sum()
    }

    /// Par swap rate `(P(0,T₀) − P(0,Tₙ)) / annuity`.
    pub fn forward_rate(&self, discount: impl Fn(Time) -> Real) -> Real {
        let end = self.expiry + self.term;
        (discount(self.expiry) - discount(end)) / self.annuity(&discount)
    }
}

/// Terms of a European option on an FX rate or an equity price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VanillaTerms {
    /// Expiry.
    pub expiry: Time,
    /// Strike in units of the option currency.
    pub strike: Real,
    /// Call or put.
    pub option_type: OptionType,
}

/// Terms of a zero-coupon CPI caplet or floorlet paying
/// `(ω(I(T)/I₀ − (1+k)^T))⁺`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpiCapFloorTerms {
    /// Maturity.
    pub maturity: Time,
    /// Strike as an annual zero-coupon rate `k`.
    pub strike: Real,
    /// `Call` for a cap, `Put` for a floor.
    pub option_type: OptionType,
}

impl CpiCapFloorTerms {
    /// Strike as an index ratio, `(1+k)^T`.
    pub fn strike_ratio(&self) -> Real {
        (1.0 + self.strike).powf(self.maturity)
    }
}

/// Jamshidian swaption engine for the LGM factor of one currency,
/// evaluated under that currency's own LGM measure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LgmSwaptionEngine {
    currency: String,
}

impl LgmSwaptionEngine {
    /// Engine for the rate factor of `currency`.
    pub fn new(currency: impl Into<String>) -> Self {
        Self { currency: currency.into() }
    }

    /// Currency priced by the engine.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Swaption premium per unit notional.
    pub fn price(&self, model: &CrossAssetModel, curves: &ModelCurves, terms: &SwaptionTerms) -> Result<Real> {
        let k = model.ccy_index(&self.currency)?;
        let lgm = model.ir(k);
        let curve = curves.discount(k);
        let t0 = terms.expiry;
        let schedule = terms.schedule();
        let last = schedule.len() - 1;
        let coupons: Vec<(Time, Real)> = schedule
            .iter()
            .enumerate()
            .map(|(i, &(t, tau))| (t, terms.strike * tau + if i == last { 1.0 } else { 0.0 }))
            .collect();
        let w = terms.option_type.sign();

        let zeta = lgm.zeta(t0);
        if zeta < MIN_ZETA {
            let fixed: Real = coupons.iter().map(|&(t, c)| c * curve.discount(t)).sum();
            return Ok((w * (curve.discount(t0) - fixed)).max(0.0));
        }

        let coupon_bond = |z: Real| -> Real {
            coupons
                .iter()
                .map(|&(t, c)| c * model.discount_bond_in(curves, k, t0, t, z))
                .sum::<Real>()
                - 1.0
        };
        let sd = zeta.sqrt();
        let z_star = brent_bracketed(coupon_bond, 0.0, sd, JAMSHIDIAN_ACCURACY)?;

        let leg = |t: Time| normal_cdf(-w * (z_star + lgm.h(t) * zeta) / sd);
        let floating = curve.discount(t0) * leg(t0);
        let fixed: Real = coupons.iter().map(|&(t, c)| c * curve.discount(t) * leg(t)).sum();
        Ok(w * (floating - fixed))
    }
}

/// Cross-currency LGM engine for a European FX option, paid in the
/// domestic currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CcLgmFxOptionEngine {
    foreign: String,
}

impl CcLgmFxOptionEngine {
    /// Engine for the FX factor of `foreign`.
    pub fn new(foreign: impl Into<String>) -> Self {
        Self { foreign: foreign.into() }
    }

    /// Foreign currency priced by the engine.
    pub fn foreign(&self) -> &str {
        &self.foreign
    }

    /// Option premium in domestic currency per unit of foreign notional.
    pub fn price(&self, model: &CrossAssetModel, curves: &ModelCurves, terms: &VanillaTerms) -> Result<Real> {
        let i = model.fx_index(&self.foreign)?;
        let t = terms.expiry;
        let dom = curves.discount(0).discount(t);
        let forward = curves.fx_spot(i) * curves.discount(i + 1).discount(t) / dom;
        let variance = model.fx_variance(i, 0.0, t);
        Ok(black_formula(terms.option_type, terms.strike, forward, variance.max(0.0).sqrt(), dom))
    }
}

/// Cross-asset engine for a European equity option, paid in the equity's
/// currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XAssetEquityOptionEngine {
    name: String,
}

impl XAssetEquityOptionEngine {
    /// Engine for the equity factor `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Equity priced by the engine.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Option premium in the equity currency.
    pub fn price(&self, model: &CrossAssetModel, curves: &ModelCurves, terms: &VanillaTerms) -> Result<Real> {
        let i = model.eq_index(&self.name)?;
        let k = model.currency_index(crate::AssetClass::Equity, i);
        let t = terms.expiry;
        let discount = curves.discount(k).discount(t);
        let forward = curves.equity_spot(i) * curves.dividend(i).discount(t) / discount;
        let variance = model.equity_variance(i, 0.0, t);
        Ok(black_formula(terms.option_type, terms.strike, forward, variance.max(0.0).sqrt(), discount))
    }
}

/// Dodgson-Kainth engine for a zero-coupon CPI cap or floor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DkCpiCapFloorEngine {
    index: String,
}

impl DkCpiCapFloorEngine {
    /// Engine for the inflation factor `index`.
    pub fn new(index: impl Into<String>) -> Self {
        Self { index: index.into() }
    }

    /// Inflation index priced by the engine.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Premium per unit notional in the index currency. The index is
    /// measured against the base CPI of the inflation curve.
    pub fn price(&self, model: &CrossAssetModel, curves: &ModelCurves, terms: &CpiCapFloorTerms) -> Result<Real> {
        let i = model.inf_index(&self.index)?;
        let k = model.currency_index(crate::AssetClass::Inflation, i);
        let t = terms.maturity;
        let forward = curves.inflation(i).growth(t);
        let variance = model.inflation_variance(i, t);
        Ok(black_formula(
            terms.option_type,
            terms.strike_ratio(),
            forward,
            variance.max(0.0).sqrt(),
            curves.discount(k).discount(t),
        ))
    }
}

/// An engine attachable to a calibration helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyticEngine {
    /// Swaptions on an LGM rate factor.
    LgmSwaption(LgmSwaptionEngine),
    /// FX options.
    FxOption(CcLgmFxOptionEngine),
    /// Equity options.
    EquityOption(XAssetEquityOptionEngine),
    /// CPI caps and floors.
    CpiCapFloor(DkCpiCapFloorEngine),
}

impl AnalyticEngine {
    /// Short description used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyticEngine::LgmSwaption(_) => "LGM swaption engine",
            AnalyticEngine::FxOption(_) => "FX option engine",
            AnalyticEngine::EquityOption(_) => "equity option engine",
            AnalyticEngine::CpiCapFloor(_) => "CPI cap/floor engine",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cross_asset_model::tests::three_currency_model;
    use approx::assert_relative_eq;

    fn payer(expiry: Time, term: Time, strike: Real) -> SwaptionTerms {
        SwaptionTerms {
            expiry,
            term,
            strike,
            option_type: OptionType::Call,
        }
    }

    #[test]
    fn schedule_with_short_last_period() {
        let s = payer(2.0, 3.5, 0.02).schedule();
        assert_eq!(s.len(), 4);
        assert_relative_eq!(s[3].0, 5.5);
        assert_relative_eq!(s[3].1, 0.5);
        assert_eq!(payer(1.0, 5.0, 0.0).schedule().len(), 5);
    }

    #[test]
    fn swaption_payer_receiver_parity() {
        let m = three_currency_model();
        let curves = m.curves().clone();
        let engine = LgmSwaptionEngine::new("USD");
        let mut terms = payer(3.0, 7.0, 0.045);
        let p = engine.price(&m, &curves, &terms).unwrap();
        terms.option_type = OptionType::Put;
        let r = engine.price(&m, &curves, &terms).unwrap();
        let d = |t: Time| curves.discount(1).discount(t);
        let swap = d(3.0) - d(10.0) - 0.045 * terms.annuity(d);
        assert_relative_eq!(p - r, swap, epsilon = 1e-12);
        assert!(p > 0.0 && r > 0.0);
    }

    #[test]
    fn fx_option_put_call_parity() {
        let m = three_currency_model();
        let curves = m.curves().clone();
        let engine = CcLgmFxOptionEngine::new("GBP");
        let mut terms = VanillaTerms {
            expiry: 2.0,
            strike: 1.3,
            option_type: OptionType::Call,
        };
        let c = engine.price(&m, &curves, &terms).unwrap();
        terms.option_type = OptionType::Put;
        let p = engine.price(&m, &curves, &terms).unwrap();
        let fwd = 1.35 * curves.discount(2).discount(2.0);
        assert_relative_eq!(c - p, fwd - 1.3 * curves.discount(0).discount(2.0), epsilon = 1e-12);
        assert!(CcLgmFxOptionEngine::new("JPY").price(&m, &curves, &terms).is_err());
    }
}
