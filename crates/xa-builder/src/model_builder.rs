//! Orchestration of the sub-builders into a calibrated cross-asset model.
//!
//! The builder is lazy. Nothing is built until a result is asked for, and
//! every accessor first checks whether a market input read by the last
//! build has moved. A stale builder rebuilds every factor, reassembles the
//! correlation matrix and runs the calibration cascade:
//!
//! 1. rate factors, which calibrated themselves when built;
//! 2. FX factors, in the FX calibration context;
//! 3. equity factors, in the equity calibration context;
//! 4. inflation factors, in the final model context;
//! 5. a final refresh of the model in the final context.
//!
//! All stages work on the one joint model, so the correlations are in
//! place while each factor is fitted.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};
use xa_core::{errors::Result, DependencySet, Error, Real, RelinkableHandle, Snapshot};
use xa_models::{AssetClass, CrossAssetModel, CrossAssetStateProcess, ModelCurves, Parametrization};
use xa_processes::Discretization;
use xa_quotes::{Quote, SimpleQuote};

use crate::config::{CalibrationType, CrossAssetModelData, OptimizerData};
use crate::correlation::{CorrelationMatrixBuilder, FactorName};
use crate::cr_lgm::CrLgmBuilder;
use crate::eq_bs::EqBsBuilder;
use crate::fx_bs::FxBsBuilder;
use crate::inf_dk::InfDkBuilder;
use crate::ir_lgm::IrLgmBuilder;
use crate::market::{Market, MarketKey};
use crate::sub_builder::{calibrate_factor, Dependencies, SubBuilder};

/// Life-cycle state of a [`CrossAssetModelBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    /// Nothing built yet, or the last build failed.
    Uninitialized,
    /// Factors and model assembled, cascade not yet run.
    Built,
    /// Model calibrated against the current market.
    Calibrated,
    /// Calibrated against a market that has since moved.
    Stale,
}

/// Observer of the builder's work, notified synchronously.
pub trait CalibrationListener: Send + Sync {
    /// A sub-builder was (re)built.
    fn sub_builder_built(&self, _class: AssetClass, _name: &str) {}

    /// A factor was calibrated.
    fn calibration_run(&self, _class: AssetClass, _name: &str, _calibration_type: CalibrationType) {}
}

/// Builds and calibrates a [`CrossAssetModel`] on demand.
pub struct CrossAssetModelBuilder {
    market: Arc<dyn Market>,
    data: CrossAssetModelData,
    correlations: CorrelationMatrixBuilder,
    listener: Option<Arc<dyn CalibrationListener>>,

    state: BuilderState,
    forced: bool,
    pending: Option<CrossAssetModel>,
    model: Option<Arc<CrossAssetModel>>,
    handle: RelinkableHandle<CrossAssetModel>,

    ir: Vec<IrLgmBuilder>,
    fx: Vec<FxBsBuilder>,
    eq: Vec<EqBsBuilder>,
    inf: Vec<InfDkBuilder>,
    cr: Vec<CrLgmBuilder>,

    ir_errors: Vec<Real>,
    fx_errors: Vec<Real>,
    eq_errors: Vec<Real>,
    inf_errors: Vec<Real>,

    correlation_dependencies: DependencySet,
    correlation_snapshot: Snapshot,
    curve_dependencies: Dependencies,
}

impl fmt::Debug for CrossAssetModelBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrossAssetModelBuilder")
            .field("state", &self.state)
            .field("currencies", &self.data.currencies())
            .field("correlations", &self.correlations.len())
            .finish_non_exhaustive()
    }
}

impl CrossAssetModelBuilder {
    /// Create a builder. Correlations from `data` become quotes that can be
    /// replaced or bumped later.
    ///
    /// # Errors
    /// `Configuration` if the factor lists are inconsistent (see
    /// [`CrossAssetModelData::validate`]) or a correlation names an unknown
    /// factor.
    pub fn new(market: Arc<dyn Market>, data: CrossAssetModelData) -> Result<Self> {
        data.validate()?;
        let mut correlations = if data.strict_correlations {
            CorrelationMatrixBuilder::strict()
        } else {
            CorrelationMatrixBuilder::new()
        };
        for c in &data.correlations {
            let quote: Arc<dyn Quote> = Arc::new(SimpleQuote::new(c.value));
            correlations.add_correlation(c.factor1.parse()?, c.factor2.parse()?, quote)?;
        }
        Ok(Self {
            market,
            data,
            correlations,
            listener: None,
            state: BuilderState::Uninitialized,
            forced: false,
            pending: None,
            model: None,
            handle: RelinkableHandle::null(),
            ir: Vec::new(),
            fx: Vec::new(),
            eq: Vec::new(),
            inf: Vec::new(),
            cr: Vec::new(),
            ir_errors: Vec::new(),
            fx_errors: Vec::new(),
            eq_errors: Vec::new(),
            inf_errors: Vec::new(),
            correlation_dependencies: DependencySet::new(),
            correlation_snapshot: Snapshot::default(),
            curve_dependencies: Dependencies::default(),
        })
    }

    /// Attach a listener.
    pub fn with_listener(mut self, listener: Arc<dyn CalibrationListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// The model configuration.
    pub fn data(&self) -> &CrossAssetModelData {
        &self.data
    }

    // ── state ─────────────────────────────────────────────────────────────

    /// Current state. A calibrated builder whose inputs moved reports
    /// [`BuilderState::Stale`]; asking does not trigger any work.
    pub fn state(&self) -> BuilderState {
        match self.state {
            BuilderState::Calibrated if self.is_stale() => BuilderState::Stale,
            s => s,
        }
    }

    fn is_stale(&self) -> bool {
        self.forced
            || self.correlation_dependencies.has_changed_since(&self.correlation_snapshot)
            || self.curve_dependencies.has_changed()
            || self.sub_builders().any(|b| b.requires_recalibration())
    }

    fn changed_inputs(&self) -> Vec<String> {
        let mut changed: Vec<String> = self
            .correlation_dependencies
            .changed_since(&self.correlation_snapshot)
            .map(str::to_string)
            .collect();
        changed.extend(self.curve_dependencies.changed());
        for b in self.sub_builders() {
            changed.extend(b.dependencies().changed());
        }
        changed
    }

    /// Rebuild and recalibrate on the next access, even if nothing moved.
    pub fn force_recalibration(&mut self) {
        self.forced = true;
    }

    fn sub_builders(&self) -> impl Iterator<Item = &dyn SubBuilder> {
        let ir = self.ir.iter().map(|b| b as &dyn SubBuilder);
        let fx = self.fx.iter().map(|b| b as &dyn SubBuilder);
        let eq = self.eq.iter().map(|b| b as &dyn SubBuilder);
        let inf = self.inf.iter().map(|b| b as &dyn SubBuilder);
        let cr = self.cr.iter().map(|b| b as &dyn SubBuilder);
        ir.chain(fx).chain(eq).chain(inf).chain(cr)
    }

    // ── correlations ──────────────────────────────────────────────────────

    /// Register (or replace) the correlation quote of two factors. The
    /// model is rebuilt on the next access.
    ///
    /// # Errors
    /// `Configuration` if `a == b`.
    pub fn set_correlation_quote(&mut self, a: FactorName, b: FactorName, quote: Arc<dyn Quote>) -> Result<()> {
        self.correlations.add_correlation(a, b, quote)?;
        self.forced = true;
        Ok(())
    }

    /// Correlation quote of two factors, in either order.
    pub fn correlation_quote(&self, a: &FactorName, b: &FactorName) -> Option<Arc<dyn Quote>> {
        self.correlations.quote(a, b).cloned()
    }

    // ── results ───────────────────────────────────────────────────────────

    /// The calibrated model.
    pub fn model(&mut self) -> Result<Arc<CrossAssetModel>> {
        self.ensure_calibrated()?;
        self.model
            .clone()
            .ok_or_else(|| Error::Runtime("calibrated builder holds no model".into()))
    }

    /// A handle relinked to every new model this builder produces.
    pub fn handle(&mut self) -> Result<RelinkableHandle<CrossAssetModel>> {
        self.ensure_calibrated()?;
        Ok(self.handle.clone())
    }

    /// Calibration error of each rate factor.
    pub fn ir_calibration_errors(&mut self) -> Result<Vec<Real>> {
        self.ensure_calibrated()?;
        Ok(self.ir_errors.clone())
    }

    /// Calibration error of each FX factor.
    pub fn fx_calibration_errors(&mut self) -> Result<Vec<Real>> {
        self.ensure_calibrated()?;
        Ok(self.fx_errors.clone())
    }

    /// Calibration error of each equity factor.
    pub fn eq_calibration_errors(&mut self) -> Result<Vec<Real>> {
        self.ensure_calibrated()?;
        Ok(self.eq_errors.clone())
    }

    /// Calibration error of each inflation factor.
    pub fn inf_calibration_errors(&mut self) -> Result<Vec<Real>> {
        self.ensure_calibrated()?;
        Ok(self.inf_errors.clone())
    }

    /// State process of the calibrated model.
    pub fn state_process(&mut self, discretization: Discretization) -> Result<CrossAssetStateProcess> {
        let model = self.model()?;
        CrossAssetStateProcess::new(model, discretization)
    }

    /// State process under the configured discretization.
    pub fn default_state_process(&mut self) -> Result<CrossAssetStateProcess> {
        self.state_process(self.data.discretization)
    }

    /// Rate sub-builders of the last build.
    pub fn ir_builders(&self) -> &[IrLgmBuilder] {
        &self.ir
    }

    /// FX sub-builders of the last build.
    pub fn fx_builders(&self) -> &[FxBsBuilder] {
        &self.fx
    }

    /// Equity sub-builders of the last build.
    pub fn eq_builders(&self) -> &[EqBsBuilder] {
        &self.eq
    }

    /// Inflation sub-builders of the last build.
    pub fn inf_builders(&self) -> &[InfDkBuilder] {
        &self.inf
    }

    /// Credit sub-builders of the last build.
    pub fn cr_builders(&self) -> &[CrLgmBuilder] {
        &self.cr
    }

    // ── build and cascade ─────────────────────────────────────────────────

    fn ensure_calibrated(&mut self) -> Result<()> {
        match self.state() {
            BuilderState::Calibrated => return Ok(()),
            BuilderState::Stale => info!(changed = ?self.changed_inputs(), forced = self.forced, "model is stale"),
            BuilderState::Uninitialized | BuilderState::Built => {}
        }
        let outcome = self.build().and_then(|()| self.calibrate());
        if let Err(e) = &outcome {
            warn!(error = %e, "cross asset model build failed");
            self.reset();
        }
        outcome
    }

    fn reset(&mut self) {
        self.state = BuilderState::Uninitialized;
        self.pending = None;
        self.model = None;
        self.handle.unlink();
        self.ir.clear();
        self.fx.clear();
        self.eq.clear();
        self.inf.clear();
        self.cr.clear();
        self.ir_errors.clear();
        self.fx_errors.clear();
        self.eq_errors.clear();
        self.inf_errors.clear();
        self.curve_dependencies = Dependencies::default();
    }

    fn notify_built(&self, b: &dyn SubBuilder) {
        if let Some(l) = &self.listener {
            l.sub_builder_built(b.asset_class(), b.name());
        }
    }

    fn build(&mut self) -> Result<()> {
        let contexts = self.data.contexts.clone();
        let optimizer = self.data.optimizer.clone();
        info!(
            ir = self.data.ir.len(),
            fx = self.data.fx.len(),
            eq = self.data.eq.len(),
            inf = self.data.inf.len(),
            cr = self.data.cr.len(),
            "building cross asset model"
        );

        self.ir = self
            .data
            .ir
            .iter()
            .map(|d| IrLgmBuilder::new(self.market.clone(), d.clone(), &contexts.ir_calibration, &optimizer))
            .collect::<Result<_>>()?;
        self.fx = self
            .data
            .fx
            .iter()
            .map(|d| FxBsBuilder::new(self.market.clone(), d.clone(), &contexts.fx_calibration))
            .collect::<Result<_>>()?;
        self.eq = self
            .data
            .eq
            .iter()
            .map(|d| EqBsBuilder::new(self.market.clone(), d.clone(), &contexts.eq_calibration))
            .collect::<Result<_>>()?;
        self.inf = self
            .data
            .inf
            .iter()
            .map(|d| InfDkBuilder::new(self.market.clone(), d.clone(), &contexts.final_model))
            .collect::<Result<_>>()?;
        self.cr = self
            .data
            .cr
            .iter()
            .map(|d| CrLgmBuilder::new(self.market.clone(), d.clone(), &contexts.final_model))
            .collect::<Result<_>>()?;
        for b in self.sub_builders() {
            self.notify_built(b);
        }
        if let Some(l) = &self.listener {
            for b in self.ir.iter().filter(|b| b.calibrates()) {
                l.calibration_run(AssetClass::Ir, b.name(), b.calibration_type());
            }
        }

        let correlation = self.correlations.correlation_matrix(
            &factors(&self.ir),
            &factors(&self.fx),
            &factors(&self.eq),
            &factors(&self.inf),
            &factors(&self.cr),
        )?;
        self.correlation_dependencies = self.correlations.dependencies();
        self.correlation_snapshot = self.correlation_dependencies.snapshot();

        let parametrizations: Vec<Parametrization> = self.sub_builders().map(|b| b.parametrization().clone()).collect();
        let model = CrossAssetModel::new(
            parametrizations,
            correlation.clone(),
            self.data.salvaging,
            self.market.clone().curve_provider(),
            &contexts.final_model,
        )?;
        if model.correlation() != &correlation {
            warn!(salvaging = ?self.data.salvaging, "correlation matrix was salvaged");
        }
        self.curve_dependencies = self.track_model_curves(model.parametrizations())?;
        self.pending = Some(model);
        self.forced = false;
        self.state = BuilderState::Built;
        Ok(())
    }

    /// Curves the model resolves in the final context, and in the FX and
    /// equity calibration contexts when those stages run.
    fn track_model_curves(&self, parametrizations: &[Parametrization]) -> Result<Dependencies> {
        let contexts = &self.data.contexts;
        let mut labels = vec![contexts.final_model.as_str()];
        if self.fx.iter().any(|b| b.calibrates()) {
            labels.push(contexts.fx_calibration.as_str());
        }
        if self.eq.iter().any(|b| b.calibrates()) {
            labels.push(contexts.eq_calibration.as_str());
        }
        labels.sort_unstable();
        labels.dedup();

        let domestic = self.data.ir.first().map(|d| d.currency.clone()).unwrap_or_default();
        let mut dependencies = Dependencies::default();
        for context in labels {
            for p in parametrizations {
                let key = match p.asset_class() {
                    AssetClass::Ir => MarketKey::Discount(p.currency().into()),
                    AssetClass::Fx => MarketKey::FxSpot(p.name().into(), domestic.clone()),
                    AssetClass::Equity => MarketKey::Equity(p.name().into()),
                    AssetClass::Inflation => MarketKey::Inflation(p.name().into()),
                    AssetClass::Credit => MarketKey::Default(p.name().into()),
                };
                dependencies.track(self.market.as_ref(), key, context)?;
            }
        }
        dependencies.freeze();
        Ok(dependencies)
    }

    fn calibrate(&mut self) -> Result<()> {
        let mut model = self
            .pending
            .take()
            .ok_or_else(|| Error::Runtime("calibration cascade run before the model was built".into()))?;
        let contexts = self.data.contexts.clone();
        let optimizer = self.data.optimizer.clone();

        self.ir_errors = self.ir.iter().map(IrLgmBuilder::error).collect();
        if self.data.gate_ir_bootstrap {
            for b in &self.ir {
                check_bootstrap(b, b.error())?;
            }
        }
        debug!(errors = ?self.ir_errors, "rate factors calibrated");

        let mut stage = Stage {
            model: &mut model,
            optimizer: &optimizer,
            listener: self.listener.as_deref(),
        };
        self.fx_errors = stage.run(AssetClass::Fx, &mut self.fx, &contexts.fx_calibration)?;
        self.eq_errors = stage.run(AssetClass::Equity, &mut self.eq, &contexts.eq_calibration)?;
        self.inf_errors = stage.run(AssetClass::Inflation, &mut self.inf, &contexts.final_model)?;

        model.update()?;
        let model = Arc::new(model);
        self.handle.link_to_arc(model.clone());
        self.model = Some(model);
        self.state = BuilderState::Calibrated;
        info!(
            ir = ?self.ir_errors,
            fx = ?self.fx_errors,
            eq = ?self.eq_errors,
            inf = ?self.inf_errors,
            "cross asset model calibrated"
        );
        Ok(())
    }
}

fn factors<B: SubBuilder>(builders: &[B]) -> Vec<FactorName> {
    builders.iter().map(SubBuilder::factor).collect()
}

fn check_bootstrap(b: &dyn SubBuilder, error: Real) -> Result<()> {
    let tolerance = b.bootstrap_tolerance();
    let breached = error.is_nan() || error > tolerance;
    if breached && b.calibrates() && b.calibration_type() == CalibrationType::Bootstrap {
        return Err(Error::CalibrationTolerance {
            factor: b.label(),
            error,
            tolerance,
        });
    }
    Ok(())
}

/// One stage of the cascade: calibrate every factor of a class against
/// curves of one context.
struct Stage<'a> {
    model: &'a mut CrossAssetModel,
    optimizer: &'a OptimizerData,
    listener: Option<&'a dyn CalibrationListener>,
}

impl Stage<'_> {
    fn run<B: SubBuilder>(&mut self, class: AssetClass, builders: &mut [B], context: &str) -> Result<Vec<Real>> {
        if builders.iter().all(|b| !b.calibrates()) {
            return Ok(vec![0.0; builders.len()]);
        }
        info!(class = %class, context, "calibration stage");
        let curves = self.model.curves_for(context)?;
        builders
            .iter_mut()
            .enumerate()
            .map(|(i, b)| self.calibrate_one(class, i, b, &curves))
            .collect()
    }

    fn calibrate_one<B: SubBuilder>(
        &mut self,
        class: AssetClass,
        index: usize,
        b: &mut B,
        curves: &ModelCurves,
    ) -> Result<Real> {
        if !b.calibrates() {
            return Ok(0.0);
        }
        if let Some(engine) = b.engine() {
            b.basket_mut().attach_engine(&engine)?;
        }
        if let Some(l) = self.listener {
            l.calibration_run(class, b.name(), b.calibration_type());
        }
        let kinds = b.calibration_kinds();
        let result = calibrate_factor(
            self.model,
            class,
            index,
            &kinds,
            b.calibration_type(),
            b.basket(),
            curves,
            self.optimizer,
        )?;
        let error = b.basket().rmse(self.model, curves)?;
        if let Some(r) = &result {
            debug!(
                factor = %b.label(),
                rmse = error,
                iterations = r.iterations,
                end = ?r.end_type,
                "factor calibrated"
            );
            if !r.end_type.converged() {
                warn!(factor = %b.label(), "optimizer stopped at the iteration limit");
            }
        }
        b.set_parametrization(self.model.parametrization(class, index).clone());
        check_bootstrap(&*b, error)?;
        if error > b.bootstrap_tolerance() {
            warn!(factor = %b.label(), rmse = error, "large calibration residual");
        }
        Ok(error)
    }
}
