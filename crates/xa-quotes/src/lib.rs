//! # xa-quotes
//!
//! Market quotes. A quote is a shared, thread-safe cell holding one market
//! observable (an FX spot, a volatility) together with a revision counter,
//! so that model builders can detect that a value they calibrated to has
//! moved.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// `Quote` trait and `SimpleQuote`.
pub mod quote;

pub use quote::{Quote, QuoteRevision, SimpleQuote};
