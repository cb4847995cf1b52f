//! # xa-methods
//!
//! Numerical methods on top of the process layer: time grids and the
//! multi-dimensional Monte Carlo framework (path generation, path pricers
//! and the simulation driver).

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Monte Carlo simulation framework.
pub mod monte_carlo;

/// Simulation time grids.
pub mod time_grid;

pub use monte_carlo::{MonteCarloSimulation, MultiPath, MultiPathGenerator, PathPricer, SequencePathPricer};
pub use time_grid::TimeGrid;
