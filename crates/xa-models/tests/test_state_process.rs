//! Monte Carlo checks of the cross-asset state process: analytic moments
//! against sample moments, martingale tests for every asset class, and
//! recovery of the input correlation over a tiny step.

use std::sync::Arc;

use xa_math::matrix_utilities::Salvaging;
use xa_math::{Array, Matrix, MersenneTwisterUniformRng};
use xa_methods::{MonteCarloSimulation, MultiPath, SequencePathPricer, TimeGrid};
use xa_models::{
    AssetClass, BlackScholes, CrossAssetModel, CrossAssetStateProcess, Lgm, ParamShape, Parametrization,
    StaticCurves, TimeFunction,
};
use xa_processes::{Discretization, StochasticProcess};
use xa_termstructures::{FlatForward, FlatHazardRate, FlatZeroInflationCurve};

const SEED: u64 = 42;

/// Random valid correlation matrix: normalised random loadings times their
/// transpose.
fn random_correlation(n: usize, rng: &mut MersenneTwisterUniformRng) -> Matrix {
    let mut loadings = Matrix::from_fn(n, n, |_, _| 2.0 * rng.next_real() - 1.0);
    for i in 0..n {
        let norm = (0..n).map(|j| loadings[(i, j)].powi(2)).sum::<f64>().sqrt();
        for j in 0..n {
            loadings[(i, j)] /= norm;
        }
    }
    &loadings * &loadings.transpose()
}

fn pc_vol(times: &[f64], values: &[f64]) -> TimeFunction {
    TimeFunction::volatility(ParamShape::PiecewiseConstant, times, values).unwrap()
}

fn curves() -> StaticCurves {
    StaticCurves::new()
        .with_discount("EUR", Arc::new(FlatForward::new(0.02)))
        .with_discount("USD", Arc::new(FlatForward::new(0.05)))
        .with_fx_spot("USD", "EUR", 0.9)
        .with_equity("SP5", 100.0, Arc::new(FlatForward::new(0.01)))
        .with_inflation("EUHICP", Arc::new(FlatZeroInflationCurve::new(100.0, 0.015).unwrap()))
        .with_inflation("USCPI", Arc::new(FlatZeroInflationCurve::new(250.0, 0.025).unwrap()))
        .with_default_curve("ACME", Arc::new(FlatHazardRate::new(0.02)))
        .with_default_curve("WIDGET", Arc::new(FlatHazardRate::new(0.03)))
}

/// EUR, USD, FX USD, EQ SP5 (USD), INF EUHICP (EUR), INF USCPI (USD),
/// CR ACME (EUR), CR WIDGET (USD).
fn full_model(correlation: Matrix) -> CrossAssetModel {
    let params = vec![
        Parametrization::Ir(Lgm::new(
            "EUR",
            "EUR",
            pc_vol(&[1.0, 3.0], &[0.008, 0.01, 0.007]),
            TimeFunction::constant_reversion(0.02).unwrap(),
        )),
        Parametrization::Ir(Lgm::new(
            "USD",
            "USD",
            pc_vol(&[2.0], &[0.01, 0.012]),
            TimeFunction::constant_reversion(0.04).unwrap(),
        )),
        Parametrization::Fx(BlackScholes::new("USD", "EUR", pc_vol(&[1.5, 4.0], &[0.12, 0.1, 0.09]))),
        Parametrization::Equity(BlackScholes::constant("SP5", "USD", 0.2).unwrap()),
        Parametrization::Inflation(Lgm::constant("EUHICP", "EUR", 0.008, 0.5).unwrap()),
        Parametrization::Inflation(Lgm::constant("USCPI", "USD", 0.01, 0.3).unwrap()),
        Parametrization::Credit(Lgm::constant("ACME", "EUR", 0.01, 0.1).unwrap()),
        Parametrization::Credit(Lgm::constant("WIDGET", "USD", 0.015, 0.05).unwrap()),
    ];
    CrossAssetModel::new(params, correlation, Salvaging::None, Arc::new(curves()), "default").unwrap()
}

fn model() -> Arc<CrossAssetModel> {
    let mut rng = MersenneTwisterUniformRng::new(SEED);
    // damp the random correlations to keep the MC noise moderate
    let r = random_correlation(8, &mut rng);
    let damped = Matrix::from_fn(8, 8, |i, j| if i == j { 1.0 } else { 0.5 * r[(i, j)] });
    Arc::new(full_model(damped))
}

/// Terminal state of a path.
struct Terminal(usize);

impl SequencePathPricer for Terminal {
    fn dimension(&self) -> usize {
        self.0
    }

    fn values(&self, path: &MultiPath) -> Vec<f64> {
        path.back().as_slice().to_vec()
    }
}

fn check_moments(discretization: Discretization, mean_tol: &[f64]) {
    let model = model();
    let process = CrossAssetStateProcess::new(model.clone(), discretization).unwrap();
    let (horizon, steps, paths) = (5.0, 50, 20_000);
    let x0 = process.initial_values();
    // the analytic oracle always uses the exact moments
    let oracle = CrossAssetStateProcess::new(model, Discretization::Exact).unwrap();
    let expected_mean = oracle.expectation(0.0, &x0, horizon);
    let expected_cov = oracle.covariance(0.0, &x0, horizon);

    let n = process.size();
    let grid = TimeGrid::uniform(horizon, steps).unwrap();
    let mc = MonteCarloSimulation::new(&process, grid, SEED).with_antithetic(true);
    let stats = mc.simulate_sequence(&Terminal(n), paths).unwrap();
    let sample_mean = stats.mean();
    let sample_cov = stats.covariance();

    for i in 0..n {
        let tol = mean_tol[i.min(mean_tol.len() - 1)];
        assert!(
            (sample_mean[i] - expected_mean[i]).abs() < tol,
            "{discretization:?} mean[{i}]: {} vs {}",
            sample_mean[i],
            expected_mean[i]
        );
    }
    // antithetic pairs halve the effective sample size
    let effective = (paths / 2) as f64;
    for i in 0..n {
        for j in 0..n {
            let (cii, cjj, cij) = (expected_cov[(i, i)], expected_cov[(j, j)], expected_cov[(i, j)]);
            let se = ((cii * cjj + cij * cij) / effective).sqrt();
            assert!(
                (sample_cov[(i, j)] - cij).abs() < 5.0 * se + 1e-8,
                "{discretization:?} cov[{i},{j}]: {} vs {cij} (se {se})",
                sample_cov[(i, j)]
            );
        }
    }
}

#[test]
fn exact_moments_match_monte_carlo() {
    // antithetic sampling of a Gaussian step reproduces the mean exactly
    check_moments(Discretization::Exact, &[1e-10]);
}

#[test]
fn euler_moments_match_monte_carlo() {
    // z_eur, z_usd, ln x, ln S, inflation and credit states
    check_moments(
        Discretization::Euler,
        &[1e-4, 1e-4, 2e-3, 3e-3, 2e-4, 2e-4, 2e-4, 2e-4, 2e-4, 2e-4, 2e-4, 2e-4],
    );
}

/// `E[f(X_T)]` over paths, with its standard error.
fn expectation<F: Fn(&Array) -> f64>(process: &CrossAssetStateProcess, horizon: f64, steps: usize, f: F) -> (f64, f64) {
    let grid = TimeGrid::uniform(horizon, steps).unwrap();
    let mc = MonteCarloSimulation::new(process, grid, SEED).with_antithetic(true);
    let stats = mc.simulate(&|path: &MultiPath| f(path.back()), 20_000);
    (stats.mean().unwrap(), stats.error_estimate().unwrap())
}

fn check_martingales(discretization: Discretization, bias: f64) {
    let m = model();
    let process = CrossAssetStateProcess::new(m.clone(), discretization).unwrap();
    let c = m.curves();
    let (t, t2) = (5.0, 10.0);
    let z = |x: &Array, class, i| x[m.state_index(class, i)];
    let y = |x: &Array, class, i| x[m.state_index(class, i) + 1];
    let deflator = |x: &Array| 1.0 / m.numeraire(0, t, z(x, AssetClass::Ir, 0));
    let fx = |x: &Array| z(x, AssetClass::Fx, 0).exp();

    let checks: Vec<(&str, Box<dyn Fn(&Array) -> f64 + '_>, f64)> = vec![
        (
            "domestic bond",
            Box::new(|x: &Array| m.discount_bond(0, t, t2, z(x, AssetClass::Ir, 0)) * deflator(x)),
            c.discount(0).discount(t2),
        ),
        (
            "foreign bond",
            Box::new(|x: &Array| fx(x) * m.discount_bond(1, t, t2, z(x, AssetClass::Ir, 1)) * deflator(x)),
            c.fx_spot(0) * c.discount(1).discount(t2),
        ),
        (
            "foreign equity",
            Box::new(|x: &Array| fx(x) * z(x, AssetClass::Equity, 0).exp() * deflator(x)),
            c.fx_spot(0) * c.equity_spot(0) * c.dividend(0).discount(t),
        ),
        (
            "domestic inflation",
            Box::new(|x: &Array| {
                m.inflation_index(0, t, z(x, AssetClass::Inflation, 0), y(x, AssetClass::Inflation, 0)) * deflator(x)
            }),
            c.discount(0).discount(t) * c.inflation(0).forward_cpi(t),
        ),
        (
            "foreign inflation",
            Box::new(|x: &Array| {
                fx(x) * m.inflation_index(1, t, z(x, AssetClass::Inflation, 1), y(x, AssetClass::Inflation, 1))
                    * deflator(x)
            }),
            c.fx_spot(0) * c.discount(1).discount(t) * c.inflation(1).forward_cpi(t),
        ),
        (
            "domestic survival",
            Box::new(|x: &Array| m.realised_survival(0, t, z(x, AssetClass::Credit, 0), y(x, AssetClass::Credit, 0)) * deflator(x)),
            c.discount(0).discount(t) * c.default_curve(0).survival_probability(t),
        ),
        (
            "foreign survival",
            Box::new(|x: &Array| {
                fx(x) * m.realised_survival(1, t, z(x, AssetClass::Credit, 1), y(x, AssetClass::Credit, 1)) * deflator(x)
            }),
            c.fx_spot(0) * c.discount(1).discount(t) * c.default_curve(1).survival_probability(t),
        ),
    ];

    for (name, f, expected) in checks {
        let (mean, se) = expectation(&process, t, 50, f);
        assert!(
            (mean - expected).abs() < 4.0 * se + bias * expected,
            "{discretization:?} {name}: {mean} vs {expected} (se {se})"
        );
    }
}

#[test]
fn exact_scheme_martingales() {
    check_martingales(Discretization::Exact, 1e-12);
}

#[test]
fn euler_scheme_martingales() {
    check_martingales(Discretization::Euler, 2e-3);
}

#[test]
fn correlation_recovered_over_small_step() {
    let mut rng = MersenneTwisterUniformRng::new(SEED);
    for _ in 0..5 {
        let rho = random_correlation(8, &mut rng);
        let m = Arc::new(full_model(rho.clone()));
        let drivers: Vec<usize> = AssetClass::ALL
            .iter()
            .flat_map(|&class| (0..m.count(class)).map(move |i| (class, i)))
            .map(|(class, i)| m.state_index(class, i))
            .collect();
        for discretization in [Discretization::Exact, Discretization::Euler] {
            let p = CrossAssetStateProcess::new(m.clone(), discretization).unwrap();
            let x0 = p.initial_values();
            let cov = p.covariance(0.0, &x0, 1e-6);
            for (a, &i) in drivers.iter().enumerate() {
                for (b, &j) in drivers.iter().enumerate() {
                    let recovered = cov[(i, j)] / (cov[(i, i)] * cov[(j, j)]).sqrt();
                    assert!(
                        (recovered - rho[(a, b)]).abs() < 1e-6,
                        "{discretization:?} rho[{a},{b}]: {recovered} vs {}",
                        rho[(a, b)]
                    );
                }
            }
        }
    }
}

#[test]
fn exact_transition_composes() {
    let m = model();
    let p = CrossAssetStateProcess::new(m, Discretization::Exact).unwrap();
    let x0 = p.initial_values();
    // E[X_3] through an intermediate step equals the one-step mean
    let direct = p.expectation(0.0, &x0, 3.0);
    let mid = p.expectation(0.0, &x0, 1.25);
    let composed = p.expectation(1.25, &mid, 1.75);
    assert!((&direct - &composed).max_abs() < 1e-12);
}
