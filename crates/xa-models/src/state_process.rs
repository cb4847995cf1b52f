//! The joint state process of a [`CrossAssetModel`] under the domestic LGM
//! measure.
//!
//! All factor dynamics are affine with deterministic coefficients:
//!
//! ```text
//! dX = (a(t) + B(t) X) dt + Σ(t) dW,     d⟨W⟩ = R dt
//! ```
//!
//! where `B` only couples log FX rates and log equity prices to the rate
//! states. Under [`Discretization::Exact`] the transition over `[t0, t1]` is
//! Gaussian with
//!
//! ```text
//! mean       = Φ X(t0) + ∫ Φ(t1,u) a(u) du
//! covariance = ∫ Φ(t1,u) Σ R Σᵀ Φ(t1,u)ᵀ du
//! ```
//!
//! with `Φ(t1,u) = I + C(u)`, `C[asset, z] = ±(H(t1) − H(u))`. The moments
//! depend on `(t0, dt)` only and are cached. Under
//! [`Discretization::Euler`] the coefficients are frozen at the start of the
//! step and the Brownian increments are correlated explicitly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use xa_core::{errors::Result, Real, Time};
use xa_math::matrix_utilities::{cholesky_decomposition, covariance_sqrt, pseudo_sqrt};
use xa_math::{Array, Matrix};
use xa_processes::{Discretization, StochasticProcess};

use crate::cross_asset_model::CrossAssetModel;
use crate::parametrization::AssetClass;

/// Gaussian transition of one step.
#[derive(Debug, Clone)]
struct TransitionMoments {
    phi: Matrix,
    offset: Array,
    covariance: Matrix,
    root: Matrix,
}

/// One coupling of a log-asset row to a rate state: `B[row, col] = sign·H′`.
#[derive(Debug, Clone, Copy)]
struct Coupling {
    row: usize,
    col: usize,
    ccy: usize,
    sign: Real,
}

/// State process of a cross-asset model.
#[derive(Debug)]
pub struct CrossAssetStateProcess {
    model: Arc<CrossAssetModel>,
    discretization: Discretization,
    couplings: Vec<Coupling>,
    /// Square root of the correlation matrix (Euler increments).
    correlation_root: Matrix,
    cache: Mutex<HashMap<(u64, u64), Arc<TransitionMoments>>>,
}

impl CrossAssetStateProcess {
    /// Create the process of `model` under `discretization`.
    pub fn new(model: Arc<CrossAssetModel>, discretization: Discretization) -> Result<Self> {
        let correlation_root = match cholesky_decomposition(model.correlation()) {
            Ok(l) => l,
            Err(_) => pseudo_sqrt(model.correlation())?,
        };
        let mut couplings = Vec::new();
        for i in 0..model.count(AssetClass::Fx) {
            let row = model.state_index(AssetClass::Fx, i);
            couplings.push(Coupling { row, col: model.state_index(AssetClass::Ir, 0), ccy: 0, sign: 1.0 });
            couplings.push(Coupling {
                row,
                col: model.state_index(AssetClass::Ir, i + 1),
                ccy: i + 1,
                sign: -1.0,
            });
        }
        for i in 0..model.count(AssetClass::Equity) {
            let k = model.currency_index(AssetClass::Equity, i);
            couplings.push(Coupling {
                row: model.state_index(AssetClass::Equity, i),
                col: model.state_index(AssetClass::Ir, k),
                ccy: k,
                sign: 1.0,
            });
        }
        tracing::debug!(
            size = model.dimension(),
            brownians = model.brownians(),
            ?discretization,
            "cross asset state process created"
        );
        Ok(Self {
            model,
            discretization,
            couplings,
            correlation_root,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// The underlying model.
    pub fn model(&self) -> &Arc<CrossAssetModel> {
        &self.model
    }

    /// The discretization in use.
    pub fn discretization(&self) -> Discretization {
        self.discretization
    }

    /// Drop all cached transition moments.
    pub fn reset_cache(&self) {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Drift intercept `a(t)`. The curve forwards are included only when
    /// `with_curves` is set; the exact scheme integrates them analytically.
    fn intercept(&self, t: Time, with_curves: bool) -> Array {
        let m = self.model.as_ref();
        let curves = m.curves();
        let mut a = Array::zeros(m.dimension());
        let fwd = |k: usize| if with_curves { curves.discount(k).instantaneous_forward(t) } else { 0.0 };
        let hhz = |k: usize| {
            let p = m.ir(k);
            p.h(t) * p.h_prime(t) * p.zeta(t)
        };

        for i in 1..m.count(AssetClass::Ir) {
            let b = m.brownian_index(AssetClass::Ir, i);
            a[m.state_index(AssetClass::Ir, i)] = m.ir(i).alpha(t) * m.quanto_adjustment(b, i, t);
        }
        for i in 0..m.count(AssetClass::Fx) {
            let b = m.brownian_index(AssetClass::Fx, i);
            let sigma = m.fx(i).sigma(t);
            a[m.state_index(AssetClass::Fx, i)] = fwd(0) - fwd(i + 1) + hhz(0) - hhz(i + 1) - 0.5 * sigma * sigma
                + sigma * m.risk_neutral_adjustment(b, 0, t);
        }
        for i in 0..m.count(AssetClass::Equity) {
            let b = m.brownian_index(AssetClass::Equity, i);
            let k = m.currency_index(AssetClass::Equity, i);
            let sigma = m.eq(i).sigma(t);
            let q = if with_curves { curves.dividend(i).instantaneous_forward(t) } else { 0.0 };
            a[m.state_index(AssetClass::Equity, i)] =
                fwd(k) - q + hhz(k) - 0.5 * sigma * sigma + sigma * m.risk_neutral_adjustment(b, k, t);
        }
        for class in [AssetClass::Inflation, AssetClass::Credit] {
            for i in 0..m.count(class) {
                let Some(p) = m.parametrization(class, i).as_lgm() else { continue };
                let b = m.brownian_index(class, i);
                let k = m.currency_index(class, i);
                let az = p.alpha(t) * m.quanto_adjustment(b, k, t);
                let s = m.state_index(class, i);
                a[s] = az;
                a[s + 1] = p.h(t) * az;
            }
        }
        a
    }

    /// Loadings `Σ(t)` of the state on the (correlated) Brownian drivers.
    fn loadings(&self, t: Time) -> Matrix {
        let m = self.model.as_ref();
        let mut sigma = Matrix::zeros(m.dimension(), m.brownians());
        for (b, p) in m.parametrizations().iter().enumerate() {
            let class = p.asset_class();
            let s = m.state_index(class, b - m.brownian_index(class, 0));
            match (p.as_lgm(), p.as_black_scholes()) {
                (Some(lgm), _) => {
                    let alpha = lgm.alpha(t);
                    sigma[(s, b)] = alpha;
                    if class.state_size() == 2 {
                        sigma[(s + 1, b)] = lgm.h(t) * alpha;
                    }
                }
                (None, Some(bs)) => sigma[(s, b)] = bs.sigma(t),
                (None, None) => {}
            }
        }
        sigma
    }

    /// `Φ(t1, u)`.
    fn propagator(&self, t1: Time, u: Time) -> Matrix {
        let mut phi = Matrix::identity(self.model.dimension());
        for c in &self.couplings {
            let p = self.model.ir(c.ccy);
            phi[(c.row, c.col)] += c.sign * (p.h(t1) - p.h(u));
        }
        phi
    }

    fn moments(&self, t0: Time, dt: Time) -> Arc<TransitionMoments> {
        let key = (t0.to_bits(), dt.to_bits());
        if let Some(hit) = self.cache.lock().unwrap_or_else(PoisonError::into_inner).get(&key) {
            return hit.clone();
        }
        let moments = Arc::new(self.exact_moments(t0, t0 + dt));
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, moments.clone());
        moments
    }

    fn exact_moments(&self, t0: Time, t1: Time) -> TransitionMoments {
        let m = self.model.as_ref();
        let n = m.dimension();
        let rho = m.correlation();
        let mut offset = Array::zeros(n);
        let mut covariance = Matrix::zeros(n, n);
        for (u, w) in m.quadrature_nodes(t0, t1) {
            let phi = self.propagator(t1, u);
            offset = &offset + &(&phi.mul_vec(&self.intercept(u, false)) * w);
            let load = &phi * &self.loadings(u);
            let term = &(&load * rho) * &load.transpose();
            covariance = &covariance + &term.scale(w);
        }

        // deterministic curve drift, integrated as log discount ratios
        let curves = m.curves();
        let log_ratio = |c: &dyn xa_termstructures::YieldTermStructure| (c.discount(t0) / c.discount(t1)).ln();
        for i in 0..m.count(AssetClass::Fx) {
            offset[m.state_index(AssetClass::Fx, i)] += log_ratio(curves.discount(0)) - log_ratio(curves.discount(i + 1));
        }
        for i in 0..m.count(AssetClass::Equity) {
            let k = m.currency_index(AssetClass::Equity, i);
            offset[m.state_index(AssetClass::Equity, i)] +=
                log_ratio(curves.discount(k)) - log_ratio(curves.dividend(i));
        }

        let root = covariance_sqrt(&covariance).unwrap_or_else(|e| {
            tracing::warn!(t0, t1, error = %e, "transition covariance has no square root, using its diagonal");
            Matrix::from_fn(n, n, |i, j| if i == j { covariance[(i, i)].max(0.0).sqrt() } else { 0.0 })
        });
        TransitionMoments {
            phi: self.propagator(t1, t0),
            offset,
            covariance,
            root,
        }
    }
}

impl StochasticProcess for CrossAssetStateProcess {
    fn size(&self) -> usize {
        self.model.dimension()
    }

    fn factors(&self) -> usize {
        match self.discretization {
            Discretization::Exact => self.model.dimension(),
            Discretization::Euler => self.model.brownians(),
        }
    }

    fn initial_values(&self) -> Array {
        let m = self.model.as_ref();
        let mut x = Array::zeros(m.dimension());
        for i in 0..m.count(AssetClass::Fx) {
            x[m.state_index(AssetClass::Fx, i)] = m.curves().fx_spot(i).ln();
        }
        for i in 0..m.count(AssetClass::Equity) {
            x[m.state_index(AssetClass::Equity, i)] = m.curves().equity_spot(i).ln();
        }
        x
    }

    fn drift(&self, t: Time, x: &Array) -> Array {
        let mut mu = self.intercept(t, true);
        for c in &self.couplings {
            mu[c.row] += c.sign * self.model.ir(c.ccy).h_prime(t) * x[c.col];
        }
        mu
    }

    fn diffusion(&self, t: Time, _x: &Array) -> Matrix {
        &self.loadings(t) * &self.correlation_root
    }

    fn expectation(&self, t: Time, x: &Array, dt: Time) -> Array {
        match self.discretization {
            Discretization::Euler => &(&self.drift(t, x) * dt) + x,
            Discretization::Exact => {
                let mo = self.moments(t, dt);
                &mo.phi.mul_vec(x) + &mo.offset
            }
        }
    }

    fn std_deviation(&self, t: Time, x: &Array, dt: Time) -> Matrix {
        match self.discretization {
            Discretization::Euler => self.diffusion(t, x).scale(dt.sqrt()),
            Discretization::Exact => self.moments(t, dt).root.clone(),
        }
    }

    fn covariance(&self, t: Time, _x: &Array, dt: Time) -> Matrix {
        match self.discretization {
            Discretization::Euler => {
                let s = self.loadings(t);
                (&(&s * self.model.correlation()) * &s.transpose()).scale(dt)
            }
            Discretization::Exact => self.moments(t, dt).covariance.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cross_asset_model::tests::three_currency_model;
    use approx::assert_abs_diff_eq;

    #[test]
    fn exact_step_is_cached() {
        let p = CrossAssetStateProcess::new(Arc::new(three_currency_model()), Discretization::Exact).unwrap();
        let x = p.initial_values();
        let e1 = p.expectation(0.0, &x, 1.0);
        let e2 = p.expectation(0.0, &x, 1.0);
        assert_eq!(e1, e2);
        assert_eq!(p.cache.lock().unwrap().len(), 1);
        p.reset_cache();
        assert!(p.cache.lock().unwrap().is_empty());
    }

    #[test]
    fn small_step_matches_euler() {
        let model = Arc::new(three_currency_model());
        let exact = CrossAssetStateProcess::new(model.clone(), Discretization::Exact).unwrap();
        let euler = CrossAssetStateProcess::new(model, Discretization::Euler).unwrap();
        assert_eq!(exact.factors(), 5);
        assert_eq!(euler.factors(), 5);
        let x = exact.initial_values();
        let (t, dt) = (2.5, 1e-4);
        let ce = exact.covariance(t, &x, dt);
        let cu = euler.covariance(t, &x, dt);
        assert!(ce.max_abs_diff(&cu) < 1e-10, "{}", ce.max_abs_diff(&cu));
        let me = exact.expectation(t, &x, dt);
        let mu = euler.expectation(t, &x, dt);
        for i in 0..5 {
            assert_abs_diff_eq!(me[i], mu[i], epsilon = 1e-8);
        }
    }

    #[test]
    fn exact_root_reproduces_covariance() {
        let p = CrossAssetStateProcess::new(Arc::new(three_currency_model()), Discretization::Exact).unwrap();
        let x = p.initial_values();
        let c = p.covariance(1.0, &x, 2.0);
        let s = p.std_deviation(1.0, &x, 2.0);
        assert!((&s * &s.transpose()).max_abs_diff(&c) < 1e-14);
    }
}
