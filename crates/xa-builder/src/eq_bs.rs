//! Builder of an equity Black-Scholes factor.

use std::sync::Arc;

use xa_core::{errors::Result, Real};
use xa_models::{
    AnalyticEngine, AssetClass, BlackScholes, CalibrationBasket, EquityOptionHelper, ParameterKind, Parametrization,
    XAssetEquityOptionEngine,
};

use crate::config::{CalibrationType, EqBsData};
use crate::market::{Market, MarketKey};
use crate::sub_builder::{check_expiries, strike_at, time_function, Dependencies, SubBuilder};

/// Builds the σ parametrization and option basket of one equity.
#[derive(Debug)]
pub struct EqBsBuilder {
    data: EqBsData,
    parametrization: Parametrization,
    basket: CalibrationBasket,
    dependencies: Dependencies,
}

impl EqBsBuilder {
    /// Build the factor; option volatilities are read in `context`.
    pub fn new(market: Arc<dyn Market>, data: EqBsData, context: &str) -> Result<Self> {
        let label = format!("EQ:{}", data.name);
        let mut dependencies = Dependencies::default();
        dependencies.track(market.as_ref(), MarketKey::Equity(data.name.clone()), context)?;
        dependencies.track(market.as_ref(), MarketKey::Discount(data.currency.clone()), context)?;

        let calibrated = data.calibration_type != CalibrationType::None && data.calibrate_sigma;
        let mut basket = CalibrationBasket::new();
        if calibrated {
            let expiries = &data.option_expiries;
            xa_core::ensure_config!(!expiries.is_empty(), "{label}: calibration requested without options");
            check_expiries(&label, expiries)?;
            dependencies.track(market.as_ref(), MarketKey::EquityVol(data.name.clone()), context)?;
            for (i, &expiry) in expiries.iter().enumerate() {
                let strike = strike_at(&label, &data.option_strikes, i, expiries.len())?;
                let quote = market.equity_vol(&data.name, expiry, context)?;
                dependencies.track_quote(format!("{label} option {expiry}"), &quote);
                basket.push(Box::new(EquityOptionHelper::new(data.name.clone(), expiry, strike, quote)));
            }
        }

        let grid = (calibrated && data.calibration_type == CalibrationType::Bootstrap)
            .then_some(data.option_expiries.as_slice());
        let sigma = time_function(&label, &data.sigma, true, grid)?;
        let parametrization = Parametrization::Equity(BlackScholes::new(data.name.clone(), data.currency.clone(), sigma));
        dependencies.freeze();
        Ok(Self {
            data,
            parametrization,
            basket,
            dependencies,
        })
    }

    /// Configuration the factor was built from.
    pub fn data(&self) -> &EqBsData {
        &self.data
    }
}

impl SubBuilder for EqBsBuilder {
    fn name(&self) -> &str {
        &self.data.name
    }

    fn asset_class(&self) -> AssetClass {
        AssetClass::Equity
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
        Some(AnalyticEngine::EquityOption(XAssetEquityOptionEngine::new(self.data.name.clone())))
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{InMemoryMarket, VolPoint, DEFAULT_CONTEXT};
    use xa_termstructures::FlatForward;

    #[test]
    fn global_basket_reads_quotes_per_expiry() {
        let m = InMemoryMarket::new();
        m.set_discount_curve("USD", DEFAULT_CONTEXT, Arc::new(FlatForward::new(0.05)));
        m.set_equity("SP5", DEFAULT_CONTEXT, 100.0, Arc::new(FlatForward::new(0.01)));
        let key = MarketKey::EquityVol("SP5".into());
        let q1 = m.set_vol(key.clone(), DEFAULT_CONTEXT, VolPoint::Expiry(1.0), 0.2).unwrap();
        m.set_vol(key.clone(), DEFAULT_CONTEXT, VolPoint::Expiry(2.0), 0.22).unwrap();
        let m = Arc::new(m);

        let mut data = EqBsData::new("SP5", "USD", 0.2);
        data.calibration_type = CalibrationType::Global;
        data.option_expiries = vec![1.0, 2.0];
        data.option_strikes = vec![100.0];
        let b = EqBsBuilder::new(m.clone(), data, DEFAULT_CONTEXT).unwrap();
        assert_eq!(b.basket().len(), 2);
        assert_eq!(b.label(), "EQ:SP5");
        // a global fit keeps σ constant
        assert!(b.parametrization().breakpoints().is_empty());
        assert!(b.calibrates());
        assert!(!b.requires_recalibration());

        q1.set_value(0.21);
        assert!(b.requires_recalibration());
        assert_eq!(b.dependencies().changed(), vec!["EQ:SP5 option 1".to_string()]);
    }

    #[test]
    fn missing_equity_is_reported() {
        let m = InMemoryMarket::new();
        m.set_discount_curve("USD", DEFAULT_CONTEXT, Arc::new(FlatForward::new(0.05)));
        let err = EqBsBuilder::new(Arc::new(m), EqBsData::new("SP5", "USD", 0.2), DEFAULT_CONTEXT).unwrap_err();
        assert!(matches!(err, xa_core::Error::MissingMarketData(_)));
    }
}
