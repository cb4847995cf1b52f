//! # xa-models
//!
//! The cross-asset model and its calibration.
//!
//! ## Layout
//!
//! ```text
//! Parametrization (tagged union)
//! ├── Ir / Inflation / Credit → Lgm          (α, κ, shift, scaling)
//! └── Fx / Equity            → BlackScholes (σ)
//!
//! CrossAssetModel  = [Parametrization] + correlation + CurveProvider
//! ├── closed forms (bonds, forwards, inflation, survival)
//! ├── CrossAssetStateProcess (exact / Euler)
//! └── calibrate_global / calibrate_iterative over a CalibrationBasket
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Factors ──────────────────────────────────────────────────────────────
pub mod parametrization;

// ── Market inputs ────────────────────────────────────────────────────────
pub mod black_formula;
pub mod curves;

// ── Joint model ──────────────────────────────────────────────────────────
pub mod cross_asset_model;
pub mod state_process;

// ── Calibration ──────────────────────────────────────────────────────────
pub mod calibration;

pub use black_formula::{bachelier_formula, black_formula, OptionType};
pub use calibration::{
    AnalyticEngine, CalibrationBasket, CalibrationHelper, CcLgmFxOptionEngine, CpiCapFloorHelper,
    DkCpiCapFloorEngine, EquityOptionHelper, FxOptionHelper, LgmSwaptionEngine, SwaptionHelper, VolatilityType,
    XAssetEquityOptionEngine,
};
pub use cross_asset_model::{CrossAssetModel, FactorRef};
pub use curves::{CurveProvider, ModelCurves, StaticCurves};
pub use parametrization::{
    AssetClass, BlackScholes, Lgm, ParamShape, ParameterKind, Parametrization, TimeFunction, Transform,
};
pub use state_process::CrossAssetStateProcess;
