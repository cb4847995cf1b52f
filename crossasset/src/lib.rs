//! # crossasset
//!
//! Assembly and calibration of a joint cross-asset model: one LGM rate
//! factor per currency, Black-Scholes FX and equity factors, Dodgson-Kainth
//! inflation factors and optional LGM credit factors, correlated through a
//! single matrix and simulated with an exact or Euler state process.
//!
//! This crate is a **façade** that re-exports the workspace crates.
//! Application code should depend on it rather than on the individual
//! `xa-*` crates.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use crossasset::builder::{CrossAssetModelBuilder, CrossAssetModelData, InMemoryMarket, IrLgmData, DEFAULT_CONTEXT};
//! use crossasset::termstructures::FlatForward;
//!
//! let market = Arc::new(InMemoryMarket::new());
//! market.set_discount_curve("EUR", DEFAULT_CONTEXT, Arc::new(FlatForward::new(0.02)));
//! let data = CrossAssetModelData {
//!     ir: vec![IrLgmData::new("EUR", 0.01, 0.03)],
//!     ..Default::default()
//! };
//! let mut builder = CrossAssetModelBuilder::new(market, data)?;
//! let model = builder.model()?;
//! assert_eq!(model.parametrizations().len(), 1);
//! # Ok::<(), crossasset::core::Error>(())
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Core types, aliases, errors, handles and revision tracking.
pub use xa_core as core;

/// Arrays, matrices, quadrature, optimisation, random numbers and statistics.
pub use xa_math as math;

/// Market quotes.
pub use xa_quotes as quotes;

/// Discount, inflation and default term structures.
pub use xa_termstructures as termstructures;

/// Stochastic process interface and discretizations.
pub use xa_processes as processes;

/// Time grids and Monte-Carlo simulation.
pub use xa_methods as methods;

/// Parametrizations, the cross-asset model and its calibration.
pub use xa_models as models;

/// Configuration, market access and the model builder.
pub use xa_builder as builder;
