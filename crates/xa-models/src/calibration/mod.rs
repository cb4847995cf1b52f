//! Calibration of single factors inside the joint model.
//!
//! A factor is calibrated in place: its raw parameter values are the
//! optimisation variables, the residuals are the relative premium errors of
//! a [`CalibrationBasket`] priced by closed-form engines. The rest of the
//! model, correlations included, stays fixed, so a factor calibrated inside
//! a large model gives the same result as inside the smallest sub-model
//! containing the factors its engine depends on.
//!
//! * [`CrossAssetModel::calibrate_global`] fits all parameters of the
//!   requested kinds to all instruments at once.
//! * [`CrossAssetModel::calibrate_iterative`] bootstraps a piecewise-constant
//!   parameter: instrument `i` alone fixes parameter `i`, earlier pieces
//!   stay fixed.

use std::cell::RefCell;

use xa_core::{errors::Result, Error, Real};
use xa_math::{Array, CostFunction, EndCriteria, EndCriteriaType, LevenbergMarquardt, OptimizationResult};

use crate::cross_asset_model::CrossAssetModel;
use crate::curves::ModelCurves;
use crate::parametrization::{AssetClass, ParamShape, ParameterKind};

pub mod engines;
pub mod helpers;

pub use engines::{
    AnalyticEngine, CcLgmFxOptionEngine, CpiCapFloorTerms, DkCpiCapFloorEngine, LgmSwaptionEngine, SwaptionTerms,
    VanillaTerms, XAssetEquityOptionEngine,
};
pub use helpers::{
    CalibrationBasket, CalibrationHelper, CpiCapFloorHelper, EquityOptionHelper, FxOptionHelper, SwaptionHelper,
    VolatilityType,
};

/// Tolerance on the alignment of instrument maturities with breakpoints.
const ALIGNMENT_TOLERANCE: Real = 1e-10;

/// Relative premium errors as a function of some raw parameters of one
/// factor.
struct FactorCost<'a> {
    model: RefCell<&'a mut CrossAssetModel>,
    class: AssetClass,
    index: usize,
    slots: Vec<(ParameterKind, usize)>,
    helpers: Vec<&'a dyn CalibrationHelper>,
    market: Vec<Real>,
    curves: &'a ModelCurves,
}

impl FactorCost<'_> {
    fn apply(&self, x: &Array) -> Result<()> {
        let mut model = self.model.borrow_mut();
        for (&(kind, i), &raw) in self.slots.iter().zip(x.iter()) {
            model
                .parameter_mut(self.class, self.index, kind)
                .ok_or_else(|| Error::InvalidArgument(format!("{} factor has no {kind:?} parameter", self.class)))?
                .set_raw(i, raw)?;
        }
        Ok(())
    }
}

impl CostFunction for FactorCost<'_> {
    fn values(&self, x: &Array) -> Result<Array> {
        self.apply(x)?;
        let model = self.model.borrow();
        let mut r = Array::zeros(self.helpers.len());
        for (j, (h, &market)) in self.helpers.iter().zip(&self.market).enumerate() {
            r[j] = (h.model_value(&model, self.curves)? - market) / market;
        }
        Ok(r)
    }
}

impl CrossAssetModel {
    /// Fit all parameters of `kinds` of factor `(class, index)` to all
    /// instruments of `basket`, with curves `curves`.
    ///
    /// The fitted values stay in the model. Non-convergence is not an
    /// error; it shows in the returned residuals and end type.
    #[allow(clippy::too_many_arguments)]
    pub fn calibrate_global(
        &mut self,
        class: AssetClass,
        index: usize,
        kinds: &[ParameterKind],
        basket: &CalibrationBasket,
        curves: &ModelCurves,
        method: &LevenbergMarquardt,
        end_criteria: &EndCriteria,
    ) -> Result<OptimizationResult> {
        xa_core::ensure!(!basket.is_empty(), "empty calibration basket for {class} factor {index}");
        let mut slots = Vec::new();
        let mut x0 = Vec::new();
        for &kind in kinds {
            let f = self.parametrization(class, index).parameter(kind).ok_or_else(|| {
                Error::InvalidArgument(format!("{class} factor {index} has no {kind:?} parameter"))
            })?;
            for (i, &raw) in f.raw().iter().enumerate() {
                slots.push((kind, i));
                x0.push(raw);
            }
        }
        let helpers: Vec<&dyn CalibrationHelper> = basket.iter().collect();
        let x0 = Array::from_vec(x0);
        let result = self.minimize_factor(class, index, slots, helpers, curves, &x0, method, end_criteria)?;
        tracing::debug!(
            factor = %format_args!("{class}:{}", self.parametrization(class, index).name()),
            parameters = result.x.len(),
            instruments = basket.len(),
            iterations = result.iterations,
            end = ?result.end_type,
            max_error = result.residuals.max_abs(),
            "global calibration finished"
        );
        Ok(result)
    }

    /// Bootstrap the piecewise-constant parameter `kind` of factor
    /// `(class, index)`: for every `i`, parameter piece `i` alone is fitted
    /// to instrument `i`.
    ///
    /// # Errors
    /// Configuration error unless the parameter is piecewise constant, the
    /// basket has one instrument per piece and instrument `i` expires in
    /// piece `i` (after breakpoint `i − 1` and, except for the last piece,
    /// no later than breakpoint `i`).
    #[allow(clippy::too_many_arguments)]
    pub fn calibrate_iterative(
        &mut self,
        class: AssetClass,
        index: usize,
        kind: ParameterKind,
        basket: &CalibrationBasket,
        curves: &ModelCurves,
        method: &LevenbergMarquardt,
        end_criteria: &EndCriteria,
    ) -> Result<OptimizationResult> {
        let f = self
            .parametrization(class, index)
            .parameter(kind)
            .ok_or_else(|| Error::InvalidArgument(format!("{class} factor {index} has no {kind:?} parameter")))?;
        xa_core::ensure_config!(
            f.shape() == ParamShape::PiecewiseConstant,
            "iterative calibration of {class} factor {index} needs a piecewise constant {kind:?}, got {:?}",
            f.shape()
        );
        xa_core::ensure_config!(
            basket.len() == f.len(),
            "{class} factor {index}: basket has {} instruments for {} {kind:?} pieces",
            basket.len(),
            f.len()
        );
        let times = f.times().to_vec();
        let n = f.len();
        for (i, t) in basket.maturities().into_iter().enumerate() {
            let after_previous = i == 0 || t > times[i - 1];
            let within_piece = i + 1 == n || t <= times[i] + ALIGNMENT_TOLERANCE;
            xa_core::ensure_config!(
                after_previous && within_piece,
                "{class} factor {index}: instrument {i} expiring at {t} does not lie in parameter piece {i}"
            );
        }

        let mut iterations = 0;
        let mut evaluations = 0;
        let mut end_type = EndCriteriaType::RootEpsilon;
        for (i, helper) in basket.iter().enumerate() {
            let x0 = self
                .parametrization(class, index)
                .parameter(kind)
                .map(|f| f.raw()[i])
                .unwrap_or_default();
            let step = self.minimize_factor(
                class,
                index,
                vec![(kind, i)],
                vec![helper],
                curves,
                &Array::from_slice(&[x0]),
                method,
                end_criteria,
            )?;
            iterations += step.iterations;
            evaluations += step.function_evaluations;
            if end_type.converged() {
                end_type = step.end_type;
            }
            tracing::trace!(piece = i, error = step.residuals[0], end = ?step.end_type, "bootstrap step");
        }

        let raw = self
            .parametrization(class, index)
            .parameter(kind)
            .map(|f| f.raw().to_vec())
            .unwrap_or_default();
        let residuals = Array::from_vec(basket.errors(self, curves)?);
        tracing::debug!(
            factor = %format_args!("{class}:{}", self.parametrization(class, index).name()),
            pieces = n,
            iterations,
            max_error = residuals.max_abs(),
            "iterative calibration finished"
        );
        Ok(OptimizationResult {
            x: Array::from_vec(raw),
            value: 0.5 * residuals.norm_squared(),
            residuals,
            iterations,
            function_evaluations: evaluations,
            end_type,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn minimize_factor(
        &mut self,
        class: AssetClass,
        index: usize,
        slots: Vec<(ParameterKind, usize)>,
        helpers: Vec<&dyn CalibrationHelper>,
        curves: &ModelCurves,
        x0: &Array,
        method: &LevenbergMarquardt,
        end_criteria: &EndCriteria,
    ) -> Result<OptimizationResult> {
        let market = helpers
            .iter()
            .map(|h| h.market_value(self, curves))
            .collect::<Result<Vec<_>>>()?;
        let cost = FactorCost {
            model: RefCell::new(self),
            class,
            index,
            slots,
            helpers,
            market,
            curves,
        };
        let result = method.minimize(&cost, x0, end_criteria)?;
        // the last trial point is not necessarily the optimum
        cost.apply(&result.x)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cross_asset_model::tests::three_currency_model;
    use std::sync::Arc;
    use xa_quotes::SimpleQuote;

    fn fx_basket(expiries: &[f64], vol: f64) -> CalibrationBasket {
        let mut basket = CalibrationBasket::new();
        for &t in expiries {
            basket.push(Box::new(FxOptionHelper::new("USD", t, None, Arc::new(SimpleQuote::new(vol)))));
        }
        basket
            .attach_engine(&AnalyticEngine::FxOption(CcLgmFxOptionEngine::new("USD")))
            .unwrap();
        basket
    }

    #[test]
    fn iterative_needs_aligned_basket() {
        let mut m = three_currency_model();
        let curves = m.curves().clone();
        let lm = LevenbergMarquardt::default();
        let ec = EndCriteria::default();
        // fx vol times: 0.96, 1.21, 1.79, 2.12, 2.96
        let short = fx_basket(&[0.5, 1.0], 0.12);
        let err = m
            .calibrate_iterative(AssetClass::Fx, 0, ParameterKind::Volatility, &short, &curves, &lm, &ec)
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "{err}");
        let misaligned = fx_basket(&[0.5, 1.5, 1.7, 2.0, 2.5, 4.0], 0.12);
        let err = m
            .calibrate_iterative(AssetClass::Fx, 0, ParameterKind::Volatility, &misaligned, &curves, &lm, &ec)
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "{err}");
    }

    #[test]
    fn iterative_fx_calibration_reprices_basket() {
        let mut m = three_currency_model();
        let curves = m.curves().clone();
        let basket = fx_basket(&[0.5, 1.0, 1.5, 2.0, 2.5, 4.0], 0.12);
        let result = m
            .calibrate_iterative(
                AssetClass::Fx,
                0,
                ParameterKind::Volatility,
                &basket,
                &curves,
                &LevenbergMarquardt::default(),
                &EndCriteria::default(),
            )
            .unwrap();
        assert_eq!(result.x.len(), 6);
        for e in basket.errors(&m, &curves).unwrap() {
            assert!(e.abs() < 1e-8, "{e}");
        }
        assert!(basket.rmse(&m, &curves).unwrap() < 1e-8);
    }

    #[test]
    fn global_calibration_leaves_fit_in_model() {
        let mut m = three_currency_model();
        let curves = m.curves().clone();
        let basket = fx_basket(&[1.0, 2.0, 3.0], 0.11);
        let result = m
            .calibrate_global(
                AssetClass::Fx,
                0,
                &[ParameterKind::Volatility],
                &basket,
                &curves,
                &LevenbergMarquardt::default(),
                &EndCriteria::default(),
            )
            .unwrap();
        let sigma = m.parametrization(AssetClass::Fx, 0).parameter(ParameterKind::Volatility).unwrap();
        let raw = sigma.raw().to_vec();
        assert_eq!(raw, result.x.as_slice());
        assert!(result.residuals.max_abs() < 1e-6);
        let no_reversion = m.calibrate_global(
            AssetClass::Fx,
            0,
            &[ParameterKind::Reversion],
            &basket,
            &curves,
            &LevenbergMarquardt::default(),
            &EndCriteria::default(),
        );
        assert!(matches!(no_reversion, Err(Error::InvalidArgument(_))));
    }
}
