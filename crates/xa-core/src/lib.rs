//! # xa-core
//!
//! Core types, traits, and error definitions for the cross-asset model
//! crates.
//!
//! This crate provides the foundational building blocks shared across all
//! other crates in the workspace – type aliases, the error hierarchy, the
//! `Handle` wrappers used to hand out re-bindable model references, and the
//! revision counters / dependency snapshots that drive lazy recalibration.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Public modules ───────────────────────────────────────────────────────────

/// Error types and the `ensure!` / `fail!` / `ensure_config!` macros.
pub mod errors;

/// Shared reference handle (`Handle<T>`, `RelinkableHandle<T>`).
pub mod handle;

/// Revision counters, dependency sets and snapshots.
pub mod revision;

// ── Primitive type aliases ────────────────────────────────────────────────────

/// Floating-point type used throughout the library.
pub type Real = f64;

/// Alias used for array sizes / indices.
pub type Size = usize;

/// A rate expressed as a decimal (e.g. 0.05 = 5 %).
pub type Rate = Real;

/// A discount factor in [0, 1].
pub type DiscountFactor = Real;

/// A probability in [0, 1].
pub type Probability = Real;

/// A volatility level expressed as a decimal.
pub type Volatility = Real;

/// A time measurement in years.
pub type Time = Real;

// ── Re-exports for convenience ────────────────────────────────────────────────

pub use errors::{Error, Result};
pub use handle::{Handle, RelinkableHandle};
pub use revision::{DependencySet, RevisionCounter, Snapshot, Versioned};
