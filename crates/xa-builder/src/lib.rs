//! # xa-builder
//!
//! Builds a calibrated cross-asset model from configuration and market data.
//!
//! ```text
//! CrossAssetModelData ──► CrossAssetModelBuilder ◄── Market (curves, vols, contexts)
//!                           │
//!                           ├── IrLgmBuilder  (self-calibrating)
//!                           ├── FxBsBuilder / EqBsBuilder / InfDkBuilder
//!                           ├── CrLgmBuilder  (fixed)
//!                           ├── CorrelationMatrixBuilder
//!                           └── cascade ──► RelinkableHandle<CrossAssetModel>
//! ```
//!
//! Work is pulled: accessors on the model builder rebuild only when a
//! tracked curve, volatility or correlation quote has moved.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod correlation;
pub mod market;

// ── Factor builders ──────────────────────────────────────────────────────
pub mod cr_lgm;
pub mod eq_bs;
pub mod fx_bs;
pub mod inf_dk;
pub mod ir_lgm;
pub mod sub_builder;

pub mod model_builder;

pub use config::{
    CalibrationType, CapFloor, Contexts, CorrelationData, CrLgmData, CrossAssetModelData, EqBsData, FxBsData,
    InfDkData, IrLgmData, OptimizerData, ParamData,
};
pub use correlation::{CorrelationMatrixBuilder, FactorName};
pub use cr_lgm::CrLgmBuilder;
pub use eq_bs::EqBsBuilder;
pub use fx_bs::FxBsBuilder;
pub use inf_dk::InfDkBuilder;
pub use ir_lgm::IrLgmBuilder;
pub use market::{InMemoryMarket, Market, MarketKey, VolPoint, DEFAULT_CONTEXT};
pub use model_builder::{BuilderState, CalibrationListener, CrossAssetModelBuilder};
pub use sub_builder::{Dependencies, SubBuilder};
