//! # xa-termstructures
//!
//! Term structures keyed directly by year fractions from the valuation
//! date. The cross-asset model only ever evaluates curves at model times,
//! so no calendar or day-count machinery is carried here.
//!
//! * yield curves: [`FlatForward`], [`InterpolatedDiscountCurve`]
//! * zero-inflation curves with a base CPI: [`FlatZeroInflationCurve`],
//!   [`InterpolatedZeroInflationCurve`]
//! * default-probability curves: [`FlatHazardRate`], [`PiecewiseHazardRate`]

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Yield term structures.
pub mod yield_term_structure;

/// Zero-coupon inflation term structures.
pub mod inflation_term_structure;

/// Default-probability term structures.
pub mod default_probability_term_structure;

pub use default_probability_term_structure::{
    DefaultProbabilityTermStructure, FlatHazardRate, PiecewiseHazardRate,
};
pub use inflation_term_structure::{
    FlatZeroInflationCurve, InterpolatedZeroInflationCurve, ZeroInflationTermStructure,
};
pub use yield_term_structure::{FlatForward, InterpolatedDiscountCurve, YieldTermStructure};
