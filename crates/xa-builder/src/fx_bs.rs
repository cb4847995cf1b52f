//! Builder of an FX Black-Scholes factor.

use std::sync::Arc;

use xa_core::{errors::Result, Real};
use xa_models::{
    AnalyticEngine, AssetClass, BlackScholes, CalibrationBasket, CcLgmFxOptionEngine, FxOptionHelper, ParameterKind,
    Parametrization,
};

use crate::config::{CalibrationType, FxBsData};
use crate::correlation::FactorName;
use crate::market::{Market, MarketKey};
use crate::sub_builder::{check_expiries, strike_at, time_function, Dependencies, SubBuilder};

/// Builds the σ parametrization and option basket of one FX pair.
#[derive(Debug)]
pub struct FxBsBuilder {
    data: FxBsData,
    parametrization: Parametrization,
    basket: CalibrationBasket,
    dependencies: Dependencies,
}

impl FxBsBuilder {
    /// Build the factor; option volatilities are read in `context`.
    pub fn new(market: Arc<dyn Market>, data: FxBsData, context: &str) -> Result<Self> {
        let label = format!("FX:{}{}", data.foreign, data.domestic);
        let mut dependencies = Dependencies::default();
        for key in [
            MarketKey::FxSpot(data.foreign.clone(), data.domestic.clone()),
            MarketKey::Discount(data.foreign.clone()),
            MarketKey::Discount(data.domestic.clone()),
        ] {
            dependencies.track(market.as_ref(), key, context)?;
        }

        let calibrated = data.calibration_type != CalibrationType::None && data.calibrate_sigma;
        let mut basket = CalibrationBasket::new();
        if calibrated {
            let expiries = &data.option_expiries;
            xa_core::ensure_config!(!expiries.is_empty(), "{label}: calibration requested without options");
            check_expiries(&label, expiries)?;
            let surface = MarketKey::FxVol(data.foreign.clone(), data.domestic.clone());
            dependencies.track(market.as_ref(), surface, context)?;
            for (i, &expiry) in expiries.iter().enumerate() {
                let strike = strike_at(&label, &data.option_strikes, i, expiries.len())?;
                let quote = market.fx_vol(&data.foreign, &data.domestic, expiry, context)?;
                dependencies.track_quote(format!("{label} option {expiry}"), &quote);
                basket.push(Box::new(FxOptionHelper::new(data.foreign.clone(), expiry, strike, quote)));
            }
        }

        let grid = (calibrated && data.calibration_type == CalibrationType::Bootstrap)
            .then_some(data.option_expiries.as_slice());
        let sigma = time_function(&label, &data.sigma, true, grid)?;
        let parametrization = Parametrization::Fx(BlackScholes::new(data.foreign.clone(), data.domestic.clone(), sigma));
        dependencies.freeze();
        Ok(Self {
            data,
            parametrization,
            basket,
            dependencies,
        })
    }

    /// Configuration the factor was built from.
    pub fn data(&self) -> &FxBsData {
        &self.data
    }
}

impl SubBuilder for FxBsBuilder {
    fn name(&self) -> &str {
        &self.data.foreign
    }

    fn asset_class(&self) -> AssetClass {
        AssetClass::Fx
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
        Some(AnalyticEngine::FxOption(CcLgmFxOptionEngine::new(self.data.foreign.clone())))
    }

    fn calibration_type(&self) -> CalibrationType {
        self.data.calibration_type
    }

    fn calibration_kinds(&self) -> Vec<ParameterKind> {
        if self.data.calibrate_sigma {
            vec![ParameterKind::Volatility]
        } else {
            Vec::new()
        }
    }

    fn bootstrap_tolerance(&self) -> Real {
        self.data.bootstrap_tolerance
    }

    fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    fn factor(&self) -> FactorName {
        FactorName::new(AssetClass::Fx, format!("{}{}", self.data.foreign, self.data.domestic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParamData;
    use crate::market::{InMemoryMarket, VolPoint, DEFAULT_CONTEXT};
    use xa_termstructures::FlatForward;

    fn market() -> Arc<InMemoryMarket> {
        let m = InMemoryMarket::new();
        m.set_discount_curve("EUR", DEFAULT_CONTEXT, Arc::new(FlatForward::new(0.02)));
        m.set_discount_curve("USD", DEFAULT_CONTEXT, Arc::new(FlatForward::new(0.05)));
        m.set_fx_spot("USD", "EUR", DEFAULT_CONTEXT, 0.9);
        Arc::new(m)
    }

    #[test]
    fn bootstrap_basket_and_grid() {
        let m = market();
        let key = MarketKey::FxVol("USD".into(), "EUR".into());
        for (t, v) in [(1.0, 0.1), (2.0, 0.11), (3.0, 0.12)] {
            m.set_vol(key.clone(), "fxcal", VolPoint::Expiry(t), v).unwrap();
        }
        let mut data = FxBsData::new("USD", "EUR", 0.1);
        data.calibration_type = CalibrationType::Bootstrap;
        data.sigma = ParamData::piecewise(Vec::new(), vec![0.1]);
        data.option_expiries = vec![1.0, 2.0, 3.0];
        let b = FxBsBuilder::new(m.clone(), data, "fxcal").unwrap();
        assert_eq!(b.basket().len(), 3);
        assert_eq!(b.parametrization().breakpoints(), vec![1.0, 2.0]);
        assert_eq!(b.label(), "FX:USDEUR");
        assert!(b.calibrates());

        // the fx calibration context has no curves of its own
        m.set_discount_curve("USD", DEFAULT_CONTEXT, Arc::new(FlatForward::new(0.051)));
        assert!(b.requires_recalibration());
    }

    #[test]
    fn uncalibrated_factor_has_empty_basket() {
        let b = FxBsBuilder::new(market(), FxBsData::new("USD", "EUR", 0.1), DEFAULT_CONTEXT).unwrap();
        assert!(b.basket().is_empty());
        assert!(!b.calibrates());
        assert_eq!(b.dependencies().len(), 3);
    }

    #[test]
    fn strike_count_must_fit() {
        let m = market();
        m.set_vol(MarketKey::FxVol("USD".into(), "EUR".into()), DEFAULT_CONTEXT, VolPoint::Flat, 0.1)
            .unwrap();
        let mut data = FxBsData::new("USD", "EUR", 0.1);
        data.calibration_type = CalibrationType::Global;
        data.option_expiries = vec![1.0, 2.0, 3.0];
        data.option_strikes = vec![0.9, 0.95];
        let err = FxBsBuilder::new(m, data, DEFAULT_CONTEXT).unwrap_err();
        assert!(matches!(err, xa_core::Error::Configuration(_)));
    }
}
