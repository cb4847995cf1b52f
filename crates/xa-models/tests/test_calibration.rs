//! Calibration of single factors inside the joint model.

use std::sync::Arc;

use approx::assert_relative_eq;
use proptest::prelude::*;
use xa_core::Real;
use xa_math::matrix_utilities::Salvaging;
use xa_math::{EndCriteria, LevenbergMarquardt, Matrix};
use xa_methods::{MonteCarloSimulation, MultiPath, TimeGrid};
use xa_models::calibration::engines::{CpiCapFloorTerms, SwaptionTerms, VanillaTerms};
use xa_models::{
    AnalyticEngine, AssetClass, BlackScholes, CalibrationBasket, CcLgmFxOptionEngine, CpiCapFloorHelper,
    CrossAssetModel, CrossAssetStateProcess, DkCpiCapFloorEngine, Lgm, LgmSwaptionEngine, OptionType, ParamShape,
    ParameterKind, Parametrization, StaticCurves, SwaptionHelper, TimeFunction, VolatilityType,
};
use xa_processes::Discretization;
use xa_quotes::SimpleQuote;
use xa_termstructures::{FlatForward, FlatZeroInflationCurve};

fn single_currency(alpha: TimeFunction, kappa: Real) -> CrossAssetModel {
    let curves = StaticCurves::new().with_discount("EUR", Arc::new(FlatForward::new(0.02)));
    let lgm = Lgm::new("EUR", "EUR", alpha, TimeFunction::constant_reversion(kappa).unwrap());
    CrossAssetModel::new(
        vec![Parametrization::Ir(lgm)],
        Matrix::identity(1),
        Salvaging::None,
        Arc::new(curves),
        "default",
    )
    .unwrap()
}

#[test]
fn coterminal_swaption_bootstrap() {
    let times: Vec<Real> = (1..=8).map(Real::from).collect();
    let alpha = TimeFunction::volatility(ParamShape::PiecewiseConstant, &times, &[0.01; 9]).unwrap();
    let mut m = single_currency(alpha, 0.01);
    let curves = m.curves().clone();

    let mut basket = CalibrationBasket::new();
    for expiry in 1..=9 {
        let expiry = Real::from(expiry);
        let quote = Arc::new(SimpleQuote::new(0.0070 + 0.0002 * expiry));
        basket.push(Box::new(SwaptionHelper::new(
            "EUR",
            expiry,
            10.0 - expiry,
            None,
            quote,
            VolatilityType::Normal,
        )));
    }
    basket
        .attach_engine(&AnalyticEngine::LgmSwaption(LgmSwaptionEngine::new("EUR")))
        .unwrap();

    let result = m
        .calibrate_iterative(
            AssetClass::Ir,
            0,
            ParameterKind::Volatility,
            &basket,
            &curves,
            &LevenbergMarquardt::default(),
            &EndCriteria::default(),
        )
        .unwrap();
    assert_eq!(result.x.len(), 9);
    for e in basket.errors(&m, &curves).unwrap() {
        assert!(e.abs() < 1e-8, "relative error {e}");
    }
    let alpha = m.ir(0).alpha_function();
    assert!(alpha.values().iter().all(|&a| a > 0.0));
}

fn three_currency(rho: &Matrix) -> CrossAssetModel {
    let curves = StaticCurves::new()
        .with_discount("EUR", Arc::new(FlatForward::new(0.02)))
        .with_discount("USD", Arc::new(FlatForward::new(0.05)))
        .with_discount("GBP", Arc::new(FlatForward::new(0.04)))
        .with_fx_spot("USD", "EUR", 0.9)
        .with_fx_spot("GBP", "EUR", 1.35);
    let params = vec![
        Parametrization::Ir(Lgm::constant("EUR", "EUR", 0.008, 0.02).unwrap()),
        Parametrization::Ir(Lgm::constant("USD", "USD", 0.011, 0.03).unwrap()),
        Parametrization::Ir(Lgm::constant("GBP", "GBP", 0.009, 0.04).unwrap()),
        Parametrization::Fx(BlackScholes::constant("USD", "EUR", 0.1).unwrap()),
        Parametrization::Fx(BlackScholes::new(
            "GBP",
            "EUR",
            TimeFunction::volatility(ParamShape::PiecewiseConstant, &[1.0, 2.0], &[0.08, 0.09, 0.1]).unwrap(),
        )),
    ];
    CrossAssetModel::new(params, rho.clone(), Salvaging::None, Arc::new(curves), "default").unwrap()
}

#[test]
fn fx_option_only_sees_its_own_currencies() {
    #[rustfmt::skip]
    let rho = Matrix::from_row_slice(5, 5, &[
        1.0, 0.6, 0.4, 0.2, -0.3,
        0.6, 1.0, 0.5, 0.1, 0.2,
        0.4, 0.5, 1.0, 0.3, 0.1,
        0.2, 0.1, 0.3, 1.0, 0.4,
        -0.3, 0.2, 0.1, 0.4, 1.0,
    ]);
    let full = three_currency(&rho);

    // EUR, GBP and FX GBP on their own
    let keep = [0, 2, 4];
    let sub_rho = Matrix::from_fn(3, 3, |i, j| rho[(keep[i], keep[j])]);
    let curves = StaticCurves::new()
        .with_discount("EUR", Arc::new(FlatForward::new(0.02)))
        .with_discount("GBP", Arc::new(FlatForward::new(0.04)))
        .with_fx_spot("GBP", "EUR", 1.35);
    let sub = CrossAssetModel::new(
        vec![
            full.parametrizations()[0].clone(),
            full.parametrizations()[2].clone(),
            full.parametrizations()[4].clone(),
        ],
        sub_rho,
        Salvaging::None,
        Arc::new(curves),
        "default",
    )
    .unwrap();

    let engine = CcLgmFxOptionEngine::new("GBP");
    for expiry in [0.5, 1.0, 2.5, 5.0, 10.0] {
        assert_relative_eq!(full.fx_variance(1, 0.0, expiry), sub.fx_variance(0, 0.0, expiry), max_relative = 1e-12);
        let terms = VanillaTerms {
            expiry,
            strike: 1.3,
            option_type: OptionType::Call,
        };
        let a = engine.price(&full, full.curves(), &terms).unwrap();
        let b = engine.price(&sub, sub.curves(), &terms).unwrap();
        assert_relative_eq!(a, b, max_relative = 1e-10);
    }
}

#[test]
fn cpi_cap_matches_monte_carlo() {
    let curves = StaticCurves::new()
        .with_discount("EUR", Arc::new(FlatForward::new(0.02)))
        .with_inflation("EUHICP", Arc::new(FlatZeroInflationCurve::new(100.0, 0.015).unwrap()));
    let params = vec![
        Parametrization::Ir(Lgm::constant("EUR", "EUR", 0.009, 0.02).unwrap()),
        Parametrization::Inflation(Lgm::constant("EUHICP", "EUR", 0.012, 0.4).unwrap()),
    ];
    let rho = Matrix::from_row_slice(2, 2, &[1.0, 0.4, 0.4, 1.0]);
    let model = Arc::new(CrossAssetModel::new(params, rho, Salvaging::None, Arc::new(curves), "default").unwrap());

    let terms = CpiCapFloorTerms {
        maturity: 5.0,
        strike: 0.015,
        option_type: OptionType::Call,
    };
    let analytic = DkCpiCapFloorEngine::new("EUHICP")
        .price(&model, model.curves(), &terms)
        .unwrap();

    let process = CrossAssetStateProcess::new(model.clone(), Discretization::Exact).unwrap();
    let grid = TimeGrid::uniform(terms.maturity, 1).unwrap();
    let mc = MonteCarloSimulation::new(&process, grid, 7).with_antithetic(true);
    let base = model.curves().inflation(0).base_cpi();
    let k = terms.strike_ratio();
    let t = terms.maturity;
    let payoff = |path: &MultiPath| {
        let x = path.back();
        let z = x[model.state_index(AssetClass::Inflation, 0)];
        let y = x[model.state_index(AssetClass::Inflation, 0) + 1];
        let index = model.inflation_index(0, t, z, y);
        (index / base - k).max(0.0) / model.numeraire(0, t, x[model.state_index(AssetClass::Ir, 0)])
    };
    let stats = mc.simulate(&payoff, 50_000);
    let (mean, se) = (stats.mean().unwrap(), stats.error_estimate().unwrap());
    assert!((mean - analytic).abs() < 4.0 * se, "MC {mean} ± {se} vs analytic {analytic}");
}

#[test]
fn cpi_volatility_fits_single_cap() {
    let curves = StaticCurves::new()
        .with_discount("EUR", Arc::new(FlatForward::new(0.02)))
        .with_inflation("EUHICP", Arc::new(FlatZeroInflationCurve::new(100.0, 0.015).unwrap()));
    let params = vec![
        Parametrization::Ir(Lgm::constant("EUR", "EUR", 0.009, 0.02).unwrap()),
        Parametrization::Inflation(Lgm::constant("EUHICP", "EUR", 0.005, 0.4).unwrap()),
    ];
    let mut model =
        CrossAssetModel::new(params, Matrix::identity(2), Salvaging::None, Arc::new(curves), "default").unwrap();
    let curves = model.curves().clone();

    let mut basket = CalibrationBasket::new();
    basket.push(Box::new(CpiCapFloorHelper::new(
        "EUHICP",
        5.0,
        0.02,
        OptionType::Call,
        Arc::new(SimpleQuote::new(0.02)),
    )));
    basket
        .attach_engine(&AnalyticEngine::CpiCapFloor(DkCpiCapFloorEngine::new("EUHICP")))
        .unwrap();
    model
        .calibrate_global(
            AssetClass::Inflation,
            0,
            &[ParameterKind::Volatility],
            &basket,
            &curves,
            &LevenbergMarquardt::default(),
            &EndCriteria::default(),
        )
        .unwrap();
    assert!(basket.rmse(&model, &curves).unwrap() < 1e-8);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Shifting and scaling `H` leaves swaption prices unchanged.
    #[test]
    fn swaption_price_is_shift_and_scale_invariant(
        shift in -3.0f64..3.0,
        scaling in 0.25f64..4.0,
        expiry in 1.0f64..10.0,
        term in 1.0f64..15.0,
        strike in 0.0f64..0.05,
    ) {
        let alpha = TimeFunction::volatility(ParamShape::PiecewiseConstant, &[2.0, 5.0], &[0.008, 0.01, 0.009]).unwrap();
        let plain = single_currency(alpha, 0.03);
        let mut moved = plain.clone();
        {
            let lgm = moved.lgm_mut(AssetClass::Ir, 0).unwrap();
            lgm.set_shift(shift);
            lgm.set_scaling(scaling).unwrap();
        }
        let engine = LgmSwaptionEngine::new("EUR");
        let terms = SwaptionTerms { expiry, term, strike, option_type: OptionType::Put };
        let a = engine.price(&plain, plain.curves(), &terms).unwrap();
        let b = engine.price(&moved, moved.curves(), &terms).unwrap();
        prop_assert!((a - b).abs() < 1e-8 * a.max(1e-2), "{a} vs {b}");
    }
}
