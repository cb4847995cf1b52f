//! Builder of a credit LGM factor. Credit factors are never calibrated.

use std::sync::Arc;

use xa_core::{errors::Result, Real};
use xa_models::{AnalyticEngine, AssetClass, CalibrationBasket, Lgm, ParameterKind, Parametrization};

use crate::config::{CalibrationType, CrLgmData};
use crate::market::{Market, MarketKey};
use crate::sub_builder::{time_function, Dependencies, SubBuilder};

/// Builds the fixed LGM intensity parametrization of one credit name.
#[derive(Debug)]
pub struct CrLgmBuilder {
    data: CrLgmData,
    parametrization: Parametrization,
    basket: CalibrationBasket,
    dependencies: Dependencies,
}

impl CrLgmBuilder {
    /// Build the factor, reading the default curve in `context`.
    pub fn new(market: Arc<dyn Market>, data: CrLgmData, context: &str) -> Result<Self> {
        let label = format!("CR:{}", data.name);
        let mut dependencies = Dependencies::default();
        dependencies.track(market.as_ref(), MarketKey::Default(data.name.clone()), context)?;
        let alpha = time_function(&label, &data.alpha, true, None)?;
        let kappa = time_function(&label, &data.kappa, false, None)?;
        let lgm = Lgm::new(data.name.clone(), data.currency.clone(), alpha, kappa);
        dependencies.freeze();
        Ok(Self {
            data,
            parametrization: Parametrization::Credit(lgm),
            basket: CalibrationBasket::new(),
            dependencies,
        })
    }
}

impl SubBuilder for CrLgmBuilder {
    fn name(&self) -> &str {
        &self.data.name
    }

    fn asset_class(&self) -> AssetClass {
        AssetClass::Credit
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
        None
    }

    fn calibration_type(&self) -> CalibrationType {
        CalibrationType::None
    }

    fn calibration_kinds(&self) -> Vec<ParameterKind> {
        Vec::new()
    }

    fn bootstrap_tolerance(&self) -> Real {
        Real::INFINITY
    }

    fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }
}
