//! # xa-processes
//!
//! The multi-dimensional stochastic process abstraction consumed by the
//! Monte-Carlo layer, and the discretization selector used by processes
//! that offer more than one stepping scheme.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// `StochasticProcess` trait and `Discretization`.
pub mod stochastic_process;

pub use stochastic_process::{Discretization, StochasticProcess};
