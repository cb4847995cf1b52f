//! Builder of a Dodgson-Kainth inflation factor.
//!
//! The factor shares the LGM parametrization of the rate factors; its
//! basket is a strip of zero-coupon CPI caps or floors.

use std::sync::Arc;

use xa_core::{errors::Result, Error, Real, Time};
use xa_models::{
    AnalyticEngine, AssetClass, CalibrationBasket, CpiCapFloorHelper, DkCpiCapFloorEngine, Lgm, ParameterKind,
    Parametrization,
};

use crate::config::{CalibrationType, InfDkData};
use crate::market::{Market, MarketKey};
use crate::sub_builder::{check_expiries, strike_at, time_function, Dependencies, SubBuilder};

/// Builds the α/κ parametrization and CPI cap/floor basket of one index.
#[derive(Debug)]
pub struct InfDkBuilder {
    data: InfDkData,
    parametrization: Parametrization,
    basket: CalibrationBasket,
    dependencies: Dependencies,
}

impl InfDkBuilder {
    /// Build the factor; cap/floor volatilities are read in `context`.
    ///
    /// # Errors
    /// `Configuration` if a calibrated factor has no strikes.
    pub fn new(market: Arc<dyn Market>, data: InfDkData, context: &str) -> Result<Self> {
        let label = format!("INF:{}", data.index);
        let mut dependencies = Dependencies::default();
        dependencies.track(market.as_ref(), MarketKey::Inflation(data.index.clone()), context)?;
        dependencies.track(market.as_ref(), MarketKey::Discount(data.currency.clone()), context)?;

        let kinds = Self::kinds_of(&data);
        let calibrated = data.calibration_type != CalibrationType::None && !kinds.is_empty();
        let mut basket = CalibrationBasket::new();
        if calibrated {
            let maturities = &data.maturities;
            xa_core::ensure_config!(!maturities.is_empty(), "{label}: calibration requested without caps/floors");
            check_expiries(&label, maturities)?;
            dependencies.track(market.as_ref(), MarketKey::CpiVol(data.index.clone()), context)?;
            for (i, &maturity) in maturities.iter().enumerate() {
                let strike = strike_at(&label, &data.strikes, i, maturities.len())?
                    .ok_or_else(|| Error::Configuration(format!("{label}: CPI caps/floors need strikes")))?;
                let quote = market.cpi_vol(&data.index, maturity, context)?;
                dependencies.track_quote(format!("{label} cap/floor {maturity}"), &quote);
                basket.push(Box::new(CpiCapFloorHelper::new(
                    data.index.clone(),
                    maturity,
                    strike,
                    data.cap_floor.option_type(),
                    quote,
                )));
            }
        }

        let bootstrap = calibrated && data.calibration_type == CalibrationType::Bootstrap;
        let grid = |kind| (bootstrap && kinds.contains(&kind)).then_some(data.maturities.as_slice());
        let alpha = time_function(&label, &data.alpha, true, grid(ParameterKind::Volatility))?;
        let kappa = time_function(&label, &data.kappa, false, grid(ParameterKind::Reversion))?;
        let lgm = Lgm::new(data.index.clone(), data.currency.clone(), alpha, kappa);
        dependencies.freeze();
        Ok(Self {
            data,
            parametrization: Parametrization::Inflation(lgm),
            basket,
            dependencies,
        })
    }

    fn kinds_of(data: &InfDkData) -> Vec<ParameterKind> {
        [(data.calibrate_a, ParameterKind::Volatility), (data.calibrate_h, ParameterKind::Reversion)]
            .into_iter()
            .filter_map(|(on, kind)| on.then_some(kind))
            .collect()
    }

    /// Configuration the factor was built from.
    pub fn data(&self) -> &InfDkData {
        &self.data
    }

    /// Cap/floor maturities of the basket.
    pub fn maturities(&self) -> &[Time] {
        &self.data.maturities
    }
}

impl SubBuilder for InfDkBuilder {
    fn name(&self) -> &str {
        &self.data.index
    }

    fn asset_class(&self) -> AssetClass {
        AssetClass::Inflation
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
        Some(AnalyticEngine::CpiCapFloor(DkCpiCapFloorEngine::new(self.data.index.clone())))
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
