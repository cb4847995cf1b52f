//! Correlation matrix assembly from pairwise quotes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use xa_core::{errors::Result, DependencySet, Error, Real};
use xa_math::Matrix;
use xa_models::AssetClass;
use xa_quotes::{Quote, QuoteRevision};

/// A factor as named in correlation data: asset class and name, written
/// `IR:EUR`, `FX:USDEUR`, `EQ:SP5`, `INF:EUHICP` or `CR:ACME`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FactorName {
    /// Asset class.
    pub class: AssetClass,
    /// Currency, pair, or asset name.
    pub name: String,
}

impl FactorName {
    /// Create a factor name.
    pub fn new(class: AssetClass, name: impl Into<String>) -> Self {
        Self {
            class,
            name: name.into(),
        }
    }

    fn prefix(class: AssetClass) -> &'static str {
        match class {
            AssetClass::Ir => "IR",
            AssetClass::Fx => "FX",
            AssetClass::Equity => "EQ",
            AssetClass::Inflation => "INF",
            AssetClass::Credit => "CR",
        }
    }
}

impl fmt::Display for FactorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", Self::prefix(self.class), self.name)
    }
}

impl FromStr for FactorName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (prefix, name) = s
            .split_once(':')
            .ok_or_else(|| Error::Configuration(format!("factor '{s}' is not of the form CLASS:NAME")))?;
        let class = AssetClass::ALL
            .into_iter()
            .find(|&c| Self::prefix(c) == prefix)
            .ok_or_else(|| Error::Configuration(format!("unknown asset class '{prefix}' in factor '{s}'")))?;
        xa_core::ensure_config!(!name.is_empty(), "factor '{s}' has no name");
        Ok(Self::new(class, name))
    }
}

/// Collects pairwise correlation quotes and assembles the matrix over an
/// ordered factor list.
///
/// Pairs are stored under an order-independent key, so `(a, b)` and
/// `(b, a)` are the same entry and the assembled matrix is symmetric by
/// construction. No positive-definiteness check happens here.
#[derive(Debug, Clone)]
pub struct CorrelationMatrixBuilder {
    entries: BTreeMap<(FactorName, FactorName), Arc<dyn Quote>>,
    default: Option<Real>,
}

impl Default for CorrelationMatrixBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationMatrixBuilder {
    /// A builder where unregistered pairs are uncorrelated.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            default: Some(0.0),
        }
    }

    /// A builder that rejects unregistered pairs.
    pub fn strict() -> Self {
        Self {
            entries: BTreeMap::new(),
            default: None,
        }
    }

    fn key(a: FactorName, b: FactorName) -> (FactorName, FactorName) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Register the correlation of `a` and `b`, replacing an earlier one.
    ///
    /// # Errors
    /// `Configuration` if `a == b`.
    pub fn add_correlation(&mut self, a: FactorName, b: FactorName, quote: Arc<dyn Quote>) -> Result<()> {
        xa_core::ensure_config!(a != b, "cannot set the correlation of {a} with itself");
        self.entries.insert(Self::key(a, b), quote);
        Ok(())
    }

    /// Number of registered pairs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no pair is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The quote registered for a pair, in either order.
    pub fn quote(&self, a: &FactorName, b: &FactorName) -> Option<&Arc<dyn Quote>> {
        self.entries.get(&Self::key(a.clone(), b.clone()))
    }

    /// Current correlation of a pair.
    ///
    /// # Errors
    /// `MissingMarketData` if the quote has no value, `Configuration` if
    /// the value lies outside `[-1, 1]` or the pair is unregistered in
    /// strict mode.
    pub fn correlation(&self, a: &FactorName, b: &FactorName) -> Result<Real> {
        if a == b {
            return Ok(1.0);
        }
        let value = match self.quote(a, b) {
            Some(q) => q
                .value()
                .ok_or_else(|| Error::MissingMarketData(format!("correlation quote {a}/{b} has no value")))?,
            None => self
                .default
                .ok_or_else(|| Error::Configuration(format!("no correlation given for {a}/{b}")))?,
        };
        xa_core::ensure_config!((-1.0..=1.0).contains(&value), "correlation {a}/{b} = {value} outside [-1, 1]");
        Ok(value)
    }

    /// Assemble the matrix over the factors in the order rates, FX,
    /// equity, inflation, credit.
    ///
    /// # Errors
    /// `Configuration` for a repeated factor, plus the errors of
    /// [`correlation`](Self::correlation).
    pub fn correlation_matrix(
        &self,
        ir: &[FactorName],
        fx: &[FactorName],
        eq: &[FactorName],
        inf: &[FactorName],
        cr: &[FactorName],
    ) -> Result<Matrix> {
        let factors: Vec<&FactorName> = ir.iter().chain(fx).chain(eq).chain(inf).chain(cr).collect();
        let n = factors.len();
        let mut m = Matrix::identity(n);
        for i in 0..n {
            for j in 0..i {
                xa_core::ensure_config!(factors[i] != factors[j], "factor {} appears twice", factors[i]);
                let rho = self.correlation(factors[i], factors[j])?;
                m[(i, j)] = rho;
                m[(j, i)] = rho;
            }
        }
        Ok(m)
    }

    /// Revisions of all registered quotes.
    pub fn dependencies(&self) -> DependencySet {
        let mut deps = DependencySet::new();
        for ((a, b), q) in &self.entries {
            deps.add(format!("correlation {a}/{b}"), Arc::new(QuoteRevision(q.clone())));
        }
        deps
    }
}
