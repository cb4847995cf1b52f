//! The cross-asset model: an ordered list of factor parametrizations
//! coupled by one correlation matrix.
//!
//! # Factor order and state layout
//!
//! Factors are ordered by asset class: rates (`n ≥ 1` currencies, the first
//! one domestic), FX (`n − 1`, FX factor `i` quoting currency `i + 1` in
//! units of the domestic currency), equities, inflation indices, credit
//! names. Every factor is driven by one Brownian motion; the correlation
//! matrix is indexed by these drivers in factor order.
//!
//! | class | state | dynamics under the domestic LGM measure |
//! |-------|-------|-----------------------------------------|
//! | IR    | `z`      | `dz = α dW (+ quanto drift for foreign currencies)` |
//! | FX    | `ln x`   | `d ln x = (r_d − r_f − ½σ² + ρ σ H_d α_d) dt + σ dW` |
//! | EQ    | `ln S`   | `d ln S = (r_k − q − ½σ² + quanto) dt + σ dW` |
//! | INF   | `(z, y)` | `dz = α dW (+ quanto)`, `dy = H dz` |
//! | CR    | `(z, y)` | `dz = α dW (+ quanto)`, `dy = H dz` |

use std::sync::Arc;
use xa_core::{errors::Result, Error, Real, Time};
use xa_math::matrix_utilities::{salvage_correlation, Salvaging};
use xa_math::{GaussLegendre, Matrix};

use crate::curves::{CurveProvider, ModelCurves};
use crate::parametrization::{AssetClass, BlackScholes, Lgm, ParameterKind, Parametrization, TimeFunction};

mod analytics;

/// Quadrature order used for the model integrals on every smooth segment.
const QUADRATURE_ORDER: usize = 24;

/// One state variable of one factor: `(class, index within class, offset
/// within the factor's state)`. The offset is 1 for the auxiliary `y` of
/// inflation and credit factors, 0 otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FactorRef {
    /// Asset class.
    pub class: AssetClass,
    /// Index among the factors of the class.
    pub index: usize,
    /// Offset within the factor's state vector.
    pub offset: usize,
}

impl FactorRef {
    /// The first state variable of a factor.
    pub fn new(class: AssetClass, index: usize) -> Self {
        Self { class, index, offset: 0 }
    }
}

/// Joint multi-factor model.
#[derive(Debug, Clone)]
pub struct CrossAssetModel {
    parametrizations: Vec<Parametrization>,
    correlation: Matrix,
    salvaging: Salvaging,
    provider: Arc<dyn CurveProvider>,
    curves: ModelCurves,
    counts: [usize; 5],
    first: [usize; 5],
    state_first: [usize; 5],
    /// Rate-factor index of each factor's currency, in factor order.
    ccy_of: Vec<usize>,
    breakpoints: Vec<Time>,
    gauss: GaussLegendre,
}

impl CrossAssetModel {
    /// Assemble a model.
    ///
    /// # Errors
    /// * configuration error if the factors are not ordered by asset class,
    ///   if the FX count is not the rate count minus one, if an FX factor
    ///   does not quote the matching rate currency, if a name is repeated,
    ///   or if a factor's currency is not a rate currency;
    /// * dimension error if the correlation matrix does not have one row
    ///   per factor or is not a valid correlation matrix under `salvaging`;
    /// * missing market data if a curve is not available in `context`.
    pub fn new(
        parametrizations: Vec<Parametrization>,
        correlation: Matrix,
        salvaging: Salvaging,
        provider: Arc<dyn CurveProvider>,
        context: &str,
    ) -> Result<Self> {
        xa_core::ensure_config!(
            parametrizations.windows(2).all(|w| w[0].asset_class() <= w[1].asset_class()),
            "factors must be ordered IR, FX, EQ, INF, CR"
        );
        let mut counts = [0usize; 5];
        for p in &parametrizations {
            counts[p.asset_class().ordinal()] += 1;
        }
        let n_ir = counts[AssetClass::Ir.ordinal()];
        let n_fx = counts[AssetClass::Fx.ordinal()];
        xa_core::ensure_config!(n_ir >= 1, "model needs at least one rate factor");
        xa_core::ensure_config!(
            n_fx + 1 == n_ir,
            "{n_fx} fx factors for {n_ir} rate factors (expected {})",
            n_ir - 1
        );

        let mut first = [0usize; 5];
        let mut state_first = [0usize; 5];
        for c in 1..5 {
            first[c] = first[c - 1] + counts[c - 1];
            state_first[c] = state_first[c - 1] + counts[c - 1] * AssetClass::ALL[c - 1].state_size();
        }

        let currencies: Vec<&str> = parametrizations[..n_ir].iter().map(|p| p.currency()).collect();
        let mut ccy_of = Vec::with_capacity(parametrizations.len());
        for (pos, p) in parametrizations.iter().enumerate() {
            let class = p.asset_class();
            let same_class = &parametrizations[first[class.ordinal()]..pos];
            xa_core::ensure_config!(
                same_class.iter().all(|q| q.name() != p.name()),
                "duplicate {class} factor {}",
                p.name()
            );
            let ccy = match class {
                AssetClass::Fx => {
                    let i = pos - first[class.ordinal()];
                    xa_core::ensure_config!(
                        p.name() == currencies[i + 1],
                        "fx factor {i} is {} but rate factor {} is {}",
                        p.name(),
                        i + 1,
                        currencies[i + 1]
                    );
                    i + 1
                }
                _ => currencies.iter().position(|&c| c == p.currency()).ok_or_else(|| {
                    Error::Configuration(format!(
                        "{class} factor {} has currency {} which is not a rate factor",
                        p.name(),
                        p.currency()
                    ))
                })?,
            };
            ccy_of.push(ccy);
        }

        let n = parametrizations.len();
        xa_core::ensure_dim!(
            correlation.rows() == n && correlation.cols() == n,
            "correlation matrix is {}x{}, model has {n} factors",
            correlation.rows(),
            correlation.cols()
        );
        let (correlation, salvaged) = salvage_correlation(&correlation, salvaging)?;

        let curves = ModelCurves::resolve(provider.as_ref(), &parametrizations, context)?;
        let mut model = Self {
            parametrizations,
            correlation,
            salvaging,
            provider,
            curves,
            counts,
            first,
            state_first,
            ccy_of,
            breakpoints: Vec::new(),
            gauss: GaussLegendre::new(QUADRATURE_ORDER),
        };
        model.breakpoints = model.collect_breakpoints();
        tracing::debug!(
            factors = n,
            dimension = model.dimension(),
            salvaged,
            context,
            "cross asset model assembled"
        );
        Ok(model)
    }

    fn collect_breakpoints(&self) -> Vec<Time> {
        let mut t: Vec<Time> = self.parametrizations.iter().flat_map(|p| p.breakpoints()).collect();
        t.sort_by(|a, b| a.total_cmp(b));
        t.dedup();
        t
    }

    // ── structure ─────────────────────────────────────────────────────────

    /// Factor parametrizations in model order.
    pub fn parametrizations(&self) -> &[Parametrization] {
        &self.parametrizations
    }

    /// Number of factors of a class.
    pub fn count(&self, class: AssetClass) -> usize {
        self.counts[class.ordinal()]
    }

    /// Number of factors (= Brownian drivers).
    pub fn brownians(&self) -> usize {
        self.parametrizations.len()
    }

    /// Dimension of the state vector.
    pub fn dimension(&self) -> usize {
        self.parametrizations.iter().map(Parametrization::state_size).sum()
    }

    /// Position of factor `i` of `class` in [`parametrizations`](Self::parametrizations);
    /// this is also its Brownian index.
    pub fn brownian_index(&self, class: AssetClass, i: usize) -> usize {
        self.first[class.ordinal()] + i
    }

    /// Index of the first state variable of factor `i` of `class`.
    pub fn state_index(&self, class: AssetClass, i: usize) -> usize {
        self.state_first[class.ordinal()] + i * class.state_size()
    }

    /// Parametrization of factor `i` of `class`.
    ///
    /// # Panics
    /// Panics if the model has no factor `i` of `class`.
    pub fn parametrization(&self, class: AssetClass, i: usize) -> &Parametrization {
        &self.parametrizations[self.position(class, i)]
    }

    fn position(&self, class: AssetClass, i: usize) -> usize {
        let count = self.count(class);
        assert!(i < count, "{class} factor {i} out of range, the model has {count}");
        self.brownian_index(class, i)
    }

    /// Parameter function `kind` of factor `i` of `class`, for calibration.
    pub fn parameter_mut(&mut self, class: AssetClass, i: usize, kind: ParameterKind) -> Option<&mut TimeFunction> {
        let pos = self.brownian_index(class, i);
        self.parametrizations.get_mut(pos)?.parameter_mut(kind)
    }

    /// Mutable LGM parametrization of factor `i` of `class`, for shift and
    /// scaling adjustments.
    pub fn lgm_mut(&mut self, class: AssetClass, i: usize) -> Option<&mut Lgm> {
        let pos = self.brownian_index(class, i);
        self.parametrizations.get_mut(pos)?.as_lgm_mut()
    }

    fn lgm(&self, class: AssetClass, i: usize) -> &Lgm {
        match &self.parametrizations[self.position(class, i)] {
            Parametrization::Ir(p) | Parametrization::Inflation(p) | Parametrization::Credit(p) => p,
            other => unreachable!("{} factor {} has no LGM parametrization", other.asset_class(), other.name()),
        }
    }

    fn black_scholes(&self, class: AssetClass, i: usize) -> &BlackScholes {
        match &self.parametrizations[self.position(class, i)] {
            Parametrization::Fx(p) | Parametrization::Equity(p) => p,
            other => unreachable!("{} factor {} has no Black-Scholes parametrization", other.asset_class(), other.name()),
        }
    }

    /// LGM parametrization of rate factor `i`.
    ///
    /// # Panics
    /// Panics if `i` is not below [`count`](Self::count) of the class; the
    /// same holds for [`fx`](Self::fx), [`eq`](Self::eq), [`inf`](Self::inf)
    /// and [`cr`](Self::cr).
    pub fn ir(&self, i: usize) -> &Lgm {
        self.lgm(AssetClass::Ir, i)
    }

    /// Black-Scholes parametrization of FX factor `i`.
    pub fn fx(&self, i: usize) -> &BlackScholes {
        self.black_scholes(AssetClass::Fx, i)
    }

    /// Black-Scholes parametrization of equity factor `i`.
    pub fn eq(&self, i: usize) -> &BlackScholes {
        self.black_scholes(AssetClass::Equity, i)
    }

    /// Dodgson-Kainth parametrization of inflation factor `i`.
    pub fn inf(&self, i: usize) -> &Lgm {
        self.lgm(AssetClass::Inflation, i)
    }

    /// LGM parametrization of credit factor `i`.
    pub fn cr(&self, i: usize) -> &Lgm {
        self.lgm(AssetClass::Credit, i)
    }

    /// Rate-factor index of the currency of factor `i` of `class`. For FX
    /// factors this is the foreign currency, `i + 1`.
    pub fn currency_index(&self, class: AssetClass, i: usize) -> usize {
        self.ccy_of[self.brownian_index(class, i)]
    }

    fn index_of(&self, class: AssetClass, name: &str) -> Result<usize> {
        let start = self.first[class.ordinal()];
        self.parametrizations[start..start + self.count(class)]
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| Error::InvalidArgument(format!("no {class} factor {name} in the model")))
    }

    /// Rate-factor index of a currency.
    pub fn ccy_index(&self, currency: &str) -> Result<usize> {
        self.index_of(AssetClass::Ir, currency)
    }

    /// FX-factor index of a foreign currency.
    pub fn fx_index(&self, foreign: &str) -> Result<usize> {
        self.index_of(AssetClass::Fx, foreign)
    }

    /// Equity-factor index of a name.
    pub fn eq_index(&self, name: &str) -> Result<usize> {
        self.index_of(AssetClass::Equity, name)
    }

    /// Inflation-factor index of an index name.
    pub fn inf_index(&self, name: &str) -> Result<usize> {
        self.index_of(AssetClass::Inflation, name)
    }

    /// Credit-factor index of a name.
    pub fn cr_index(&self, name: &str) -> Result<usize> {
        self.index_of(AssetClass::Credit, name)
    }

    /// Union of all parameter breakpoints.
    pub fn breakpoints(&self) -> &[Time] {
        &self.breakpoints
    }

    // ── correlation ───────────────────────────────────────────────────────

    /// The (possibly salvaged) correlation matrix.
    pub fn correlation(&self) -> &Matrix {
        &self.correlation
    }

    /// Salvaging policy the model was built with.
    pub fn salvaging(&self) -> Salvaging {
        self.salvaging
    }

    /// Correlation between factor `i` of `a` and factor `j` of `b`.
    pub fn rho(&self, a: AssetClass, i: usize, b: AssetClass, j: usize) -> Real {
        self.correlation[(self.brownian_index(a, i), self.brownian_index(b, j))]
    }

    /// Correlation between the drivers of two state variables.
    pub fn correlation_between(&self, a: FactorRef, b: FactorRef) -> Real {
        self.rho(a.class, a.index, b.class, b.index)
    }

    /// IR-IR correlation.
    pub fn ir_ir(&self, i: usize, j: usize) -> Real {
        self.rho(AssetClass::Ir, i, AssetClass::Ir, j)
    }

    /// IR-FX correlation.
    pub fn ir_fx(&self, i: usize, j: usize) -> Real {
        self.rho(AssetClass::Ir, i, AssetClass::Fx, j)
    }

    /// FX-FX correlation.
    pub fn fx_fx(&self, i: usize, j: usize) -> Real {
        self.rho(AssetClass::Fx, i, AssetClass::Fx, j)
    }

    /// IR-EQ correlation.
    pub fn ir_eq(&self, i: usize, j: usize) -> Real {
        self.rho(AssetClass::Ir, i, AssetClass::Equity, j)
    }

    /// FX-EQ correlation.
    pub fn fx_eq(&self, i: usize, j: usize) -> Real {
        self.rho(AssetClass::Fx, i, AssetClass::Equity, j)
    }

    /// EQ-EQ correlation.
    pub fn eq_eq(&self, i: usize, j: usize) -> Real {
        self.rho(AssetClass::Equity, i, AssetClass::Equity, j)
    }

    /// IR-INF correlation.
    pub fn ir_inf(&self, i: usize, j: usize) -> Real {
        self.rho(AssetClass::Ir, i, AssetClass::Inflation, j)
    }

    /// IR-CR correlation.
    pub fn ir_cr(&self, i: usize, j: usize) -> Real {
        self.rho(AssetClass::Ir, i, AssetClass::Credit, j)
    }

    // ── curves ────────────────────────────────────────────────────────────

    /// Curves of the model's own context.
    pub fn curves(&self) -> &ModelCurves {
        &self.curves
    }

    /// Context the model's own curves were resolved in.
    pub fn context(&self) -> &str {
        self.curves.context()
    }

    /// Resolve the model's curves under another context.
    pub fn curves_for(&self, context: &str) -> Result<ModelCurves> {
        ModelCurves::resolve(self.provider.as_ref(), &self.parametrizations, context)
    }

    /// Refresh derived data: breakpoints and the curves of the model's own
    /// context. Parameters and correlations are left untouched.
    pub fn update(&mut self) -> Result<()> {
        self.breakpoints = self.collect_breakpoints();
        self.curves = self.curves_for(self.curves.context())?;
        Ok(())
    }

    // ── quadrature ────────────────────────────────────────────────────────

    /// `∫_{t0}^{t1} f`, split at the model breakpoints.
    pub(crate) fn integrate<F: FnMut(Time) -> Real>(&self, f: F, t0: Time, t1: Time) -> Real {
        self.gauss.integrate_segments(f, t0, t1, &self.breakpoints)
    }

    /// Quadrature nodes and weights on `[t0, t1]`, split at the model
    /// breakpoints.
    pub(crate) fn quadrature_nodes(&self, t0: Time, t1: Time) -> Vec<(Time, Real)> {
        self.gauss.segment_nodes(t0, t1, &self.breakpoints)
    }

    // ── measure change ────────────────────────────────────────────────────

    /// Drift rate, per unit of its own volatility, that a driver `j`
    /// (Brownian index) picks up when moving from the LGM measure of rate
    /// currency `k` to the domestic LGM measure.
    pub(crate) fn quanto_adjustment(&self, j: usize, k: usize, t: Time) -> Real {
        if k == 0 {
            return 0.0;
        }
        let r = &self.correlation;
        let b0 = self.brownian_index(AssetClass::Ir, 0);
        let bk = self.brownian_index(AssetClass::Ir, k);
        let bx = self.brownian_index(AssetClass::Fx, k - 1);
        let (d, f, x) = (self.ir(0), self.ir(k), self.fx(k - 1));
        r[(j, b0)] * d.h(t) * d.alpha(t) - r[(j, bk)] * f.h(t) * f.alpha(t) - r[(j, bx)] * x.sigma(t)
    }

    /// Drift rate, per unit of its own volatility, of driver `j` when moving
    /// from the risk-neutral measure of rate currency `k` to the domestic
    /// LGM measure.
    pub(crate) fn risk_neutral_adjustment(&self, j: usize, k: usize, t: Time) -> Real {
        let b0 = self.brownian_index(AssetClass::Ir, 0);
        let d = self.ir(0);
        let mut q = self.correlation[(j, b0)] * d.h(t) * d.alpha(t);
        if k > 0 {
            let bx = self.brownian_index(AssetClass::Fx, k - 1);
            q -= self.correlation[(j, bx)] * self.fx(k - 1).sigma(t);
        }
        q
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::curves::StaticCurves;
    use xa_termstructures::FlatForward;

    /// EUR/USD/GBP data used across the model tests: piecewise IR and FX
    /// volatilities and the 5x5 correlation of the three-currency setup.
    pub(crate) fn three_currency_model() -> CrossAssetModel {
        let ir_times = [0.96, 1.96, 2.96, 3.96, 4.96];
        let fx_times = [0.96, 1.21, 1.79, 2.12, 2.96];
        let vols = |a: f64, b: f64| -> Vec<f64> { (0..6).map(|i| a + b * (-0.3 * i as f64).exp()).collect() };
        let lgm = |ccy: &str, a, b, kappa| {
            Lgm::new(
                ccy,
                ccy,
                TimeFunction::volatility(crate::ParamShape::PiecewiseConstant, &ir_times, &vols(a, b)).unwrap(),
                TimeFunction::constant_reversion(kappa).unwrap(),
            )
        };
        let bs = |ccy: &str, a, b| {
            BlackScholes::new(
                ccy,
                ccy,
                TimeFunction::volatility(crate::ParamShape::PiecewiseConstant, &fx_times, &vols(a, b)).unwrap(),
            )
        };
        let params = vec![
            Parametrization::Ir(lgm("EUR", 0.005, 0.003, 0.02)),
            Parametrization::Ir(lgm("USD", 0.003, 0.008, 0.03)),
            Parametrization::Ir(lgm("GBP", 0.007, 0.0025, 0.04)),
            Parametrization::Fx(bs("USD", 0.15, 0.05)),
            Parametrization::Fx(bs("GBP", 0.10, 0.05)),
        ];
        #[rustfmt::skip]
        let rho = Matrix::from_row_slice(5, 5, &[
            1.0, 0.6, 0.3, 0.2, 0.3,
            0.6, 1.0, 0.1, -0.2, -0.1,
            0.3, 0.1, 1.0, 0.0, 0.1,
            0.2, -0.2, 0.0, 1.0, 0.3,
            0.3, -0.1, 0.1, 0.3, 1.0,
        ]);
        CrossAssetModel::new(params, rho, Salvaging::None, Arc::new(three_currency_curves()), "default").unwrap()
    }

    pub(crate) fn three_currency_curves() -> StaticCurves {
        StaticCurves::new()
            .with_discount("EUR", Arc::new(FlatForward::new(0.02)))
            .with_discount("USD", Arc::new(FlatForward::new(0.05)))
            .with_discount("GBP", Arc::new(FlatForward::new(0.04)))
            .with_fx_spot("USD", "EUR", 0.90)
            .with_fx_spot("GBP", "EUR", 1.35)
    }

    fn ir(ccy: &str) -> Parametrization {
        Parametrization::Ir(Lgm::constant(ccy, ccy, 0.01, 0.01).unwrap())
    }

    fn fx(ccy: &str) -> Parametrization {
        Parametrization::Fx(BlackScholes::constant(ccy, ccy, 0.1).unwrap())
    }

    fn build(params: Vec<Parametrization>, rho: Matrix) -> Result<CrossAssetModel> {
        CrossAssetModel::new(params, rho, Salvaging::None, Arc::new(three_currency_curves()), "default")
    }

    #[test]
    fn layout_and_indices() {
        let m = three_currency_model();
        assert_eq!(m.brownians(), 5);
        assert_eq!(m.dimension(), 5);
        assert_eq!(m.ccy_index("GBP").unwrap(), 2);
        assert_eq!(m.fx_index("GBP").unwrap(), 1);
        assert_eq!(m.state_index(AssetClass::Fx, 1), 4);
        assert_eq!(m.currency_index(AssetClass::Fx, 0), 1);
        assert!(m.eq_index("SP5").is_err());
        assert_eq!(m.ir_fx(0, 1), 0.3);
        assert_eq!(m.fx_fx(1, 0), 0.3);
        assert_eq!(
            m.correlation_between(FactorRef::new(AssetClass::Ir, 1), FactorRef::new(AssetClass::Fx, 0)),
            -0.2
        );
        assert_eq!(m.breakpoints().len(), 8);
    }

    #[test]
    fn fx_count_must_match() {
        let err = build(vec![ir("EUR"), ir("USD")], Matrix::identity(2)).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "{err}");
        let err = build(vec![ir("EUR"), ir("USD"), fx("GBP")], Matrix::identity(3)).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "{err}");
        let err = build(vec![ir("EUR"), fx("USD"), ir("USD")], Matrix::identity(3)).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "{err}");
    }

    #[test]
    fn correlation_dimension_is_checked() {
        let err = build(vec![ir("EUR"), ir("USD"), fx("USD")], Matrix::identity(4)).unwrap_err();
        assert!(matches!(err, Error::Dimension(_)), "{err}");
        let invalid = Matrix::from_row_slice(3, 3, &[1.0, 0.9, -0.9, 0.9, 1.0, 0.9, -0.9, 0.9, 1.0]);
        let err = build(vec![ir("EUR"), ir("USD"), fx("USD")], invalid.clone()).unwrap_err();
        assert!(matches!(err, Error::Dimension(_)), "{err}");
        let m = CrossAssetModel::new(
            vec![ir("EUR"), ir("USD"), fx("USD")],
            invalid,
            Salvaging::NearestValid,
            Arc::new(three_currency_curves()),
            "default",
        )
        .unwrap();
        assert!(xa_math::matrix_utilities::min_eigenvalue(m.correlation()).unwrap() > -1e-12);
        assert!((m.correlation()[(1, 1)] - 1.0).abs() < 1e-15);
    }

    #[test]
    fn foreign_currency_must_be_modelled() {
        let eq = Parametrization::Equity(BlackScholes::constant("SP5", "USD", 0.2).unwrap());
        let err = build(vec![ir("EUR"), eq], Matrix::identity(2)).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)), "{err}");
    }

    #[test]
    fn update_keeps_parameters() {
        let mut m = three_currency_model();
        let zeta = m.ir(1).zeta(3.0);
        m.update().unwrap();
        assert_eq!(m.ir(1).zeta(3.0), zeta);
        assert_eq!(m.context(), "default");
        assert!(m.curves_for("other").is_ok());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn factor_index_beyond_class_panics() {
        let model = three_currency_model();
        assert_eq!(model.count(AssetClass::Fx), 2);
        let _ = model.fx(2);
    }
}
