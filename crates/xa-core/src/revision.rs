//! Revision counters and dependency snapshots.
//!
//! Change tracking is pull-based. Every mutable market object (a quote, a
//! curve slot in a market container) owns a monotonically increasing
//! revision number that is bumped on every write. A consumer records the
//! objects it read in a [`DependencySet`], takes a [`Snapshot`] of their
//! revisions when it builds, and later asks
//! [`DependencySet::has_changed_since`] whether anything moved. Nothing is
//! pushed to the consumer and no global dirty flag exists.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// An object carrying a revision number that increases on every change.
pub trait Versioned: Send + Sync {
    /// Current revision.
    fn revision(&self) -> u64;
}

/// A thread-safe revision counter.
#[derive(Debug, Default)]
pub struct RevisionCounter(AtomicU64);

impl RevisionCounter {
    /// A counter starting at revision 0.
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Advance the revision, returning the new value.
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl Versioned for RevisionCounter {
    fn revision(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}

/// Revisions of a [`DependencySet`] at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    revisions: Vec<u64>,
}

impl Snapshot {
    /// Number of recorded dependencies.
    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    /// `true` if no dependency was recorded.
    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }
}

/// An ordered list of labelled dependencies.
#[derive(Clone, Default)]
pub struct DependencySet {
    items: Vec<(String, Arc<dyn Versioned>)>,
}

impl DependencySet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a dependency under a diagnostic label.
    pub fn add(&mut self, label: impl Into<String>, item: Arc<dyn Versioned>) {
        self.items.push((label.into(), item));
    }

    /// Append all dependencies of `other`.
    pub fn extend(&mut self, other: &DependencySet) {
        self.items.extend(other.items.iter().cloned());
    }

    /// Number of dependencies.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current revisions of all dependencies.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            revisions: self.items.iter().map(|(_, d)| d.revision()).collect(),
        }
    }

    /// `true` if any dependency moved since `snapshot` was taken, or if the
    /// snapshot belongs to a different dependency list.
    pub fn has_changed_since(&self, snapshot: &Snapshot) -> bool {
        self.changed_since(snapshot).next().is_some() || snapshot.len() != self.items.len()
    }

    /// Labels of the dependencies that moved since `snapshot`.
    pub fn changed_since<'a>(
        &'a self,
        snapshot: &'a Snapshot,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.items
            .iter()
            .zip(snapshot.revisions.iter())
            .filter(|((_, d), &r)| d.revision() != r)
            .map(|((label, _), _)| label.as_str())
    }
}

impl fmt::Debug for DependencySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.items.iter().map(|(l, d)| (l, d.revision())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn snapshot_detects_bump() {
        let a = Arc::new(RevisionCounter::new());
        let b = Arc::new(RevisionCounter::new());
        let mut deps = DependencySet::new();
        deps.add("a", a.clone());
        deps.add("b", b.clone());
        let snap = deps.snapshot();
        assert!(!deps.has_changed_since(&snap));
        b.bump();
        assert!(deps.has_changed_since(&snap));
        assert_eq!(deps.changed_since(&snap).collect::<Vec<_>>(), vec!["b"]);
        // a fresh snapshot is clean again
        assert!(!deps.has_changed_since(&deps.snapshot()));
    }

    #[test]
    fn foreign_snapshot_counts_as_change() {
        let mut deps = DependencySet::new();
        deps.add("a", Arc::new(RevisionCounter::new()));
        assert!(deps.has_changed_since(&Snapshot::default()));
    }

    proptest! {
        #[test]
        fn changed_iff_some_counter_bumped(bumps in proptest::collection::vec(0usize..3, 0..10)) {
            let counters: Vec<Arc<RevisionCounter>> =
                (0..3).map(|_| Arc::new(RevisionCounter::new())).collect();
            let mut deps = DependencySet::new();
            for (i, c) in counters.iter().enumerate() {
                deps.add(format!("q{i}"), c.clone());
            }
            let snap = deps.snapshot();
            for &i in &bumps {
                counters[i].bump();
            }
            prop_assert_eq!(deps.has_changed_since(&snap), !bumps.is_empty());
        }
    }
}
