//! `Quote` trait and `SimpleQuote` implementation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use xa_core::{Real, RevisionCounter, Versioned};

/// A market-observable value.
pub trait Quote: std::fmt::Debug + Versioned {
    /// Return the current value.
    ///
    /// Returns `None` if the quote is not currently valid / set.
    fn value(&self) -> Option<Real>;

    /// Return `true` if the quote is currently valid.
    fn is_valid(&self) -> bool {
        self.value().is_some()
    }
}

/// A simple market quote that can be updated through a shared reference.
///
/// Every effective change bumps the revision; writing the value the quote
/// already holds does not.
#[derive(Debug, Default)]
pub struct SimpleQuote {
    bits: AtomicU64,
    valid: AtomicBool,
    revision: RevisionCounter,
}

impl SimpleQuote {
    /// Create a new quote with the given value.
    pub fn new(value: Real) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
            valid: AtomicBool::new(true),
            revision: RevisionCounter::new(),
        }
    }

    /// Create an empty (invalid) quote.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Set a new value. Returns `true` if the value changed.
    pub fn set_value(&self, value: Real) -> bool {
        let old = self.bits.swap(value.to_bits(), Ordering::AcqRel);
        let was_valid = self.valid.swap(true, Ordering::AcqRel);
        let changed = !was_valid || old != value.to_bits();
        if changed {
            self.revision.bump();
        }
        changed
    }

    /// Clear the value, making the quote invalid.
    pub fn reset(&self) {
        if self.valid.swap(false, Ordering::AcqRel) {
            self.revision.bump();
        }
    }
}

impl Quote for SimpleQuote {
    fn value(&self) -> Option<Real> {
        self.valid
            .load(Ordering::Acquire)
            .then(|| Real::from_bits(self.bits.load(Ordering::Acquire)))
    }
}

impl Versioned for SimpleQuote {
    fn revision(&self) -> u64 {
        self.revision.revision()
    }
}

/// Revision view of a shared quote, for recording it in a
/// [`xa_core::DependencySet`].
#[derive(Debug, Clone)]
pub struct QuoteRevision(pub Arc<dyn Quote>);

impl Versioned for QuoteRevision {
    fn revision(&self) -> u64 {
        self.0.revision()
    }
}
