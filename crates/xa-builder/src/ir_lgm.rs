//! Builder of an interest-rate LGM factor.
//!
//! Rate factors calibrate themselves when built, on a one-factor model in
//! the rate calibration context: the swaption baskets of the other asset
//! classes price off the rate dynamics, so these must be final first.

use std::sync::Arc;

use xa_core::{errors::Result, Error, Real, Time};
use xa_math::matrix_utilities::Salvaging;
use xa_math::{Matrix, OptimizationResult};
use xa_models::{
    AnalyticEngine, AssetClass, CalibrationBasket, CrossAssetModel, Lgm, LgmSwaptionEngine, ParameterKind,
    Parametrization, SwaptionHelper,
};

use crate::config::{CalibrationType, IrLgmData, OptimizerData};
use crate::market::{Market, MarketKey};
use crate::sub_builder::{calibrate_factor, check_expiries, time_function, Dependencies, SubBuilder};

/// Builds and self-calibrates the LGM parametrization of one currency.
#[derive(Debug)]
pub struct IrLgmBuilder {
    data: IrLgmData,
    parametrization: Parametrization,
    basket: CalibrationBasket,
    dependencies: Dependencies,
    result: Option<OptimizationResult>,
    errors: Vec<Real>,
    error: Real,
}

impl IrLgmBuilder {
    /// Build the factor of `data.currency` and calibrate it in `context`.
    ///
    /// # Errors
    /// `Configuration` for an inconsistent basket or parameter grid,
    /// `MissingMarketData` for an absent curve or swaption volatility.
    pub fn new(market: Arc<dyn Market>, data: IrLgmData, context: &str, optimizer: &OptimizerData) -> Result<Self> {
        let label = format!("IR:{}", data.currency);
        let mut dependencies = Dependencies::default();
        dependencies.track(market.as_ref(), MarketKey::Discount(data.currency.clone()), context)?;

        let kinds = Self::kinds_of(&data);
        let calibrated = data.calibration_type != CalibrationType::None && !kinds.is_empty();
        let mut basket = CalibrationBasket::new();
        let mut expiries: Vec<Time> = Vec::new();
        if calibrated {
            let swaptions = data.swaptions()?;
            xa_core::ensure_config!(!swaptions.is_empty(), "{label}: calibration requested without swaptions");
            expiries = swaptions.iter().map(|&(e, _)| e).collect();
            check_expiries(&label, &expiries)?;
            dependencies.track(market.as_ref(), MarketKey::SwaptionVol(data.currency.clone()), context)?;
            for &(expiry, term) in &swaptions {
                let quote = market.swaption_vol(&data.currency, expiry, term, context)?;
                dependencies.track_quote(format!("{label} swaption {expiry}x{term}"), &quote);
                basket.push(Box::new(SwaptionHelper::new(
                    data.currency.clone(),
                    expiry,
                    term,
                    None,
                    quote,
                    data.volatility_type,
                )));
            }
            basket.attach_engine(&AnalyticEngine::LgmSwaption(LgmSwaptionEngine::new(data.currency.clone())))?;
        }

        let bootstrap = data.calibration_type == CalibrationType::Bootstrap;
        let grid = |kind| (bootstrap && kinds.contains(&kind)).then_some(expiries.as_slice());
        let alpha = time_function(&label, &data.alpha, true, grid(ParameterKind::Volatility))?;
        let kappa = time_function(&label, &data.kappa, false, grid(ParameterKind::Reversion))?;
        let lgm = Lgm::new(data.currency.clone(), data.currency.clone(), alpha, kappa);

        let mut builder = Self {
            parametrization: Parametrization::Ir(lgm),
            basket,
            dependencies,
            result: None,
            errors: Vec::new(),
            error: 0.0,
            data,
        };
        if calibrated {
            builder.calibrate(market, context, optimizer)?;
        }
        builder.apply_shift_and_scaling()?;
        builder.dependencies.freeze();
        Ok(builder)
    }

    fn kinds_of(data: &IrLgmData) -> Vec<ParameterKind> {
        let mut kinds = Vec::new();
        if data.calibrate_a {
            kinds.push(ParameterKind::Volatility);
        }
        if data.calibrate_h {
            kinds.push(ParameterKind::Reversion);
        }
        kinds
    }

    fn calibrate(&mut self, market: Arc<dyn Market>, context: &str, optimizer: &OptimizerData) -> Result<()> {
        let mut model = CrossAssetModel::new(
            vec![self.parametrization.clone()],
            Matrix::identity(1),
            Salvaging::None,
            market.curve_provider(),
            context,
        )?;
        let curves = model.curves().clone();
        let kinds = Self::kinds_of(&self.data);
        self.result = calibrate_factor(
            &mut model,
            AssetClass::Ir,
            0,
            &kinds,
            self.data.calibration_type,
            &self.basket,
            &curves,
            optimizer,
        )?;
        self.errors = self.basket.errors(&model, &curves)?;
        self.error = self.basket.rmse(&model, &curves)?;
        self.parametrization = model
            .parametrizations()
            .first()
            .cloned()
            .ok_or_else(|| Error::Runtime("one-factor calibration model lost its factor".into()))?;
        tracing::debug!(
            factor = %self.label(),
            instruments = self.basket.len(),
            rmse = self.error,
            "rate factor calibrated"
        );
        Ok(())
    }

    // Prices are invariant under both, so the errors stay valid.
    fn apply_shift_and_scaling(&mut self) -> Result<()> {
        if let Parametrization::Ir(lgm) = &mut self.parametrization {
            if self.data.scaling != 1.0 {
                lgm.set_scaling(self.data.scaling)
                    .map_err(|e| Error::Configuration(format!("IR:{}: {e}", self.data.currency)))?;
            }
            if let Some(horizon) = self.data.shift_horizon {
                lgm.set_shift_horizon(horizon);
            }
        }
        Ok(())
    }

    /// Configuration the factor was built from.
    pub fn data(&self) -> &IrLgmData {
        &self.data
    }

    /// Root mean square of the relative premium errors after calibration;
    /// zero when the factor was not calibrated.
    pub fn error(&self) -> Real {
        self.error
    }

    /// Relative premium error of each basket instrument.
    pub fn instrument_errors(&self) -> &[Real] {
        &self.errors
    }

    /// Optimizer outcome of the self-calibration.
    pub fn optimization(&self) -> Option<&OptimizationResult> {
        self.result.as_ref()
    }
}

impl SubBuilder for IrLgmBuilder {
    fn name(&self) -> &str {
        &self.data.currency
    }

    fn asset_class(&self) -> AssetClass {
        AssetClass::Ir
    }

    fn parametrization(&self) -> &Parametrization {
        &self.parametrization
    }

    fn set_parametrization(&mut self, parametrization: Parametrization) {
        self.parametrization = parametrization;
    }

    fn basket(&self) -> &CalibrationBasket {
        &self.basket
    }

    fn basket_mut(&mut self) -> &mut CalibrationBasket {
        &mut self.basket
    }

    fn engine(&self) -> Option<AnalyticEngine> {
        Some(AnalyticEngine::LgmSwaption(LgmSwaptionEngine::new(self.data.currency.clone())))
    }

    fn calibration_type(&self) -> CalibrationType {
        self.data.calibration_type
    }

    fn calibration_kinds(&self) -> Vec<ParameterKind> {
        Self::kinds_of(&self.data)
    }

    fn bootstrap_tolerance(&self) -> Real {
        self.data.bootstrap_tolerance
    }

    fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParamData;
    use crate::market::{InMemoryMarket, VolPoint, DEFAULT_CONTEXT};
    use approx::assert_relative_eq;
    use xa_models::ParamShape;
    use xa_termstructures::FlatForward;

    fn market(vol: Real) -> Arc<InMemoryMarket> {
        let m = InMemoryMarket::new();
        m.set_discount_curve("EUR", DEFAULT_CONTEXT, Arc::new(FlatForward::new(0.02)));
        m.set_vol(MarketKey::SwaptionVol("EUR".into()), DEFAULT_CONTEXT, VolPoint::Flat, vol)
            .unwrap();
        Arc::new(m)
    }

    fn bootstrap_data() -> IrLgmData {
        let mut d = IrLgmData::new("EUR", 0.01, 0.01);
        d.calibration_type = CalibrationType::Bootstrap;
        d.alpha = ParamData::piecewise(Vec::new(), vec![0.01]);
        d.swaption_expiries = (1..=5).map(Real::from).collect();
        d.swaption_maturity = Some(6.0);
        d.volatility_type = xa_models::VolatilityType::Normal;
        d
    }

    #[test]
    fn bootstrap_reprices_coterminals() {
        let b = IrLgmBuilder::new(market(0.0075), bootstrap_data(), DEFAULT_CONTEXT, &OptimizerData::default())
            .unwrap();
        assert_eq!(b.basket().len(), 5);
        assert!(b.error() < 1e-8);
        assert!(b.instrument_errors().iter().all(|e| e.abs() < 1e-8));
        let alpha = b.parametrization().parameter(ParameterKind::Volatility).unwrap();
        assert_eq!(alpha.shape(), ParamShape::PiecewiseConstant);
        assert_eq!(alpha.times(), &[1.0, 2.0, 3.0, 4.0]);
        assert!(!b.requires_recalibration());
    }

    #[test]
    fn shift_and_scaling_keep_the_fit() {
        let mut data = bootstrap_data();
        data.shift_horizon = Some(6.0);
        data.scaling = 2.0;
        let b = IrLgmBuilder::new(market(0.0075), data, DEFAULT_CONTEXT, &OptimizerData::default()).unwrap();
        let lgm = b.parametrization().as_lgm().unwrap();
        assert_relative_eq!(lgm.h(6.0), 0.0, epsilon = 1e-14);
        assert_relative_eq!(lgm.scaling(), 2.0);

        let model = CrossAssetModel::new(
            vec![b.parametrization().clone()],
            Matrix::identity(1),
            Salvaging::None,
            market(0.0075),
            DEFAULT_CONTEXT,
        )
        .unwrap();
        assert!(b.basket().rmse(&model, model.curves()).unwrap() < 1e-8);
    }

    #[test]
    fn quote_change_requires_recalibration() {
        let m = market(0.0075);
        let b = IrLgmBuilder::new(m.clone(), bootstrap_data(), DEFAULT_CONTEXT, &OptimizerData::default()).unwrap();
        m.set_vol(MarketKey::SwaptionVol("EUR".into()), DEFAULT_CONTEXT, VolPoint::Flat, 0.008)
            .unwrap();
        assert!(b.requires_recalibration());
        assert_eq!(b.dependencies().changed().len(), 5);
    }

    #[test]
    fn uncalibrated_factor_needs_no_vols() {
        let m = InMemoryMarket::new();
        m.set_discount_curve("USD", DEFAULT_CONTEXT, Arc::new(FlatForward::new(0.05)));
        let b = IrLgmBuilder::new(Arc::new(m), IrLgmData::new("USD", 0.01, 0.0), "x", &OptimizerData::default())
            .unwrap();
        assert!(b.basket().is_empty());
        assert_eq!(b.error(), 0.0);
        assert!(!b.calibrates());
        assert!(b.optimization().is_none());
    }

    #[test]
    fn missing_vol_is_reported() {
        let m = InMemoryMarket::new();
        m.set_discount_curve("EUR", DEFAULT_CONTEXT, Arc::new(FlatForward::new(0.02)));
        let err = IrLgmBuilder::new(Arc::new(m), bootstrap_data(), DEFAULT_CONTEXT, &OptimizerData::default())
            .unwrap_err();
        assert!(matches!(err, Error::MissingMarketData(_)), "{err}");
    }
}
