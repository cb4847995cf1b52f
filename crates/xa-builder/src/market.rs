//! Market data seen by the builders.
//!
//! A [`Market`] extends the model's [`CurveProvider`] with the volatility
//! quotes the calibration baskets are built from, and exposes a revision
//! for every entry so that builders can record what they read and later
//! ask whether it moved.
//!
//! Every lookup is keyed by a configuration context. [`InMemoryMarket`]
//! falls back to [`DEFAULT_CONTEXT`] when a context has no entry of its own.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use xa_core::{errors::Result, Error, Real, RevisionCounter, Time, Versioned};
use xa_math::close;
use xa_models::CurveProvider;
use xa_quotes::{Quote, SimpleQuote};
use xa_termstructures::{DefaultProbabilityTermStructure, YieldTermStructure, ZeroInflationTermStructure};

/// Context used when a lookup finds nothing under the requested one.
pub const DEFAULT_CONTEXT: &str = "default";

/// Tolerance when matching expiries and terms of volatility points.
const TIME_TOLERANCE: Time = 1e-10;

/// Identifies one market entry, independently of the context.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MarketKey {
    /// Discount curve of a currency.
    Discount(String),
    /// FX spot, foreign then domestic currency.
    FxSpot(String, String),
    /// Equity spot and dividend curve.
    Equity(String),
    /// Zero-inflation curve of an index.
    Inflation(String),
    /// Default-probability curve of a credit name.
    Default(String),
    /// Swaption volatility surface of a currency.
    SwaptionVol(String),
    /// FX volatility surface, foreign then domestic currency.
    FxVol(String, String),
    /// Equity volatility surface.
    EquityVol(String),
    /// CPI cap/floor volatility surface of an index.
    CpiVol(String),
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketKey::Discount(c) => write!(f, "discount curve {c}"),
            MarketKey::FxSpot(a, b) => write!(f, "fx spot {a}{b}"),
            MarketKey::Equity(n) => write!(f, "equity {n}"),
            MarketKey::Inflation(n) => write!(f, "inflation curve {n}"),
            MarketKey::Default(n) => write!(f, "default curve {n}"),
            MarketKey::SwaptionVol(c) => write!(f, "swaption vol {c}"),
            MarketKey::FxVol(a, b) => write!(f, "fx vol {a}{b}"),
            MarketKey::EquityVol(n) => write!(f, "equity vol {n}"),
            MarketKey::CpiVol(n) => write!(f, "cpi vol {n}"),
        }
    }
}

/// Where on a volatility surface a quote sits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolPoint {
    /// One quote for the whole surface.
    Flat,
    /// Option expiry (or cap maturity).
    Expiry(Time),
    /// Swaption expiry and underlying term.
    ExpiryTerm(Time, Time),
}

impl VolPoint {
    fn matches(&self, other: &VolPoint) -> bool {
        let near = |a: Time, b: Time| close(a, b, TIME_TOLERANCE);
        match (self, other) {
            (VolPoint::Flat, VolPoint::Flat) => true,
            (VolPoint::Expiry(a), VolPoint::Expiry(b)) => near(*a, *b),
            (VolPoint::ExpiryTerm(a, s), VolPoint::ExpiryTerm(b, t)) => near(*a, *b) && near(*s, *t),
            _ => false,
        }
    }
}

/// Market data provider for the model builder.
pub trait Market: CurveProvider {
    /// Swaption volatility for an expiry and an underlying term.
    fn swaption_vol(&self, currency: &str, expiry: Time, term: Time, context: &str) -> Result<Arc<dyn Quote>>;

    /// FX option volatility for an expiry.
    fn fx_vol(&self, foreign: &str, domestic: &str, expiry: Time, context: &str) -> Result<Arc<dyn Quote>>;

    /// Equity option volatility for an expiry.
    fn equity_vol(&self, name: &str, expiry: Time, context: &str) -> Result<Arc<dyn Quote>>;

    /// CPI cap/floor volatility for a maturity.
    fn cpi_vol(&self, index: &str, maturity: Time, context: &str) -> Result<Arc<dyn Quote>>;

    /// Revision of an entry. Volatility keys report structural changes of
    /// the surface only; the quotes carry their own revisions.
    fn dependency(&self, key: &MarketKey, context: &str) -> Result<Arc<dyn Versioned>>;

    /// The same market seen as a plain curve provider.
    fn curve_provider(self: Arc<Self>) -> Arc<dyn CurveProvider>;
}

// ── in-memory market ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Entry {
    Yield(Arc<dyn YieldTermStructure>),
    Spot(Real),
    Equity(Real, Arc<dyn YieldTermStructure>),
    Inflation(Arc<dyn ZeroInflationTermStructure>),
    Default(Arc<dyn DefaultProbabilityTermStructure>),
}

#[derive(Debug)]
struct Slot {
    entry: Entry,
    revision: Arc<RevisionCounter>,
}

#[derive(Debug, Default)]
struct Surface {
    points: Vec<(VolPoint, Arc<SimpleQuote>)>,
    revision: Arc<RevisionCounter>,
}

impl Surface {
    fn find(&self, point: &VolPoint) -> Option<Arc<SimpleQuote>> {
        self.points
            .iter()
            .find(|(p, _)| matches!(p, VolPoint::Flat) || p.matches(point))
            .map(|(_, q)| q.clone())
    }
}

type Keyed = (String, MarketKey);

#[derive(Debug, Default)]
struct Entries {
    curves: BTreeMap<Keyed, Slot>,
    vols: BTreeMap<Keyed, Surface>,
}

impl Entries {
    fn slot(&self, key: &MarketKey, context: &str) -> Option<&Slot> {
        self.curves
            .get(&(context.to_string(), key.clone()))
            .or_else(|| self.curves.get(&(DEFAULT_CONTEXT.to_string(), key.clone())))
    }

    fn surface(&self, key: &MarketKey, context: &str) -> Option<&Surface> {
        self.vols
            .get(&(context.to_string(), key.clone()))
            .or_else(|| self.vols.get(&(DEFAULT_CONTEXT.to_string(), key.clone())))
    }

    /// A new slot for `key` in `context` hides whatever lookups of the key
    /// resolved to before: the default slot, or an inverted FX spot. Those
    /// slots are bumped so readers that tracked them see the change.
    fn bump_shadowed(&self, key: &MarketKey, context: &str) {
        let mut keys = vec![key.clone()];
        if let MarketKey::FxSpot(a, b) = key {
            keys.push(MarketKey::FxSpot(b.clone(), a.clone()));
        }
        for k in keys {
            for c in [context, DEFAULT_CONTEXT] {
                if let Some(slot) = self.curves.get(&(c.to_string(), k.clone())) {
                    slot.revision.bump();
                }
            }
        }
    }
}

fn missing(key: &MarketKey, context: &str) -> Error {
    Error::MissingMarketData(format!("{key} (context {context})"))
}

/// A thread-safe market held in memory.
///
/// Setters take `&self` so a market shared with a model builder can be
/// bumped from the outside. Replacing a curve bumps the revision of its
/// slot; updating a volatility point sets the value of the existing quote.
#[derive(Debug, Default)]
pub struct InMemoryMarket {
    entries: RwLock<Entries>,
}

impl InMemoryMarket {
    /// An empty market.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, key: MarketKey, context: &str, entry: Entry) {
        let mut entries = self.write();
        match entries.curves.get_mut(&(context.to_string(), key.clone())) {
            Some(slot) => {
                slot.entry = entry;
                slot.revision.bump();
            }
            None => {
                entries.bump_shadowed(&key, context);
                let slot = Slot {
                    entry,
                    revision: Arc::new(RevisionCounter::new()),
                };
                entries.curves.insert((context.to_string(), key), slot);
            }
        }
    }

    /// Set the discount curve of `currency`.
    pub fn set_discount_curve(&self, currency: &str, context: &str, curve: Arc<dyn YieldTermStructure>) {
        self.set(MarketKey::Discount(currency.into()), context, Entry::Yield(curve));
    }

    /// Set an FX spot in units of `domestic` per `foreign`.
    pub fn set_fx_spot(&self, foreign: &str, domestic: &str, context: &str, spot: Real) {
        self.set(MarketKey::FxSpot(foreign.into(), domestic.into()), context, Entry::Spot(spot));
    }

    /// Set an equity spot and its dividend curve.
    pub fn set_equity(&self, name: &str, context: &str, spot: Real, dividend: Arc<dyn YieldTermStructure>) {
        self.set(MarketKey::Equity(name.into()), context, Entry::Equity(spot, dividend));
    }

    /// Set the zero-inflation curve of `index`.
    pub fn set_inflation_curve(&self, index: &str, context: &str, curve: Arc<dyn ZeroInflationTermStructure>) {
        self.set(MarketKey::Inflation(index.into()), context, Entry::Inflation(curve));
    }

    /// Set the default curve of a credit name.
    pub fn set_default_curve(&self, name: &str, context: &str, curve: Arc<dyn DefaultProbabilityTermStructure>) {
        self.set(MarketKey::Default(name.into()), context, Entry::Default(curve));
    }

    /// Set a volatility point, returning its quote. An existing point keeps
    /// its quote and takes the new value; a new point is a structural
    /// change of the surface. A [`VolPoint::Flat`] quote answers every
    /// lookup on the surface.
    ///
    /// # Errors
    /// `InvalidArgument` if `key` is not a volatility key.
    pub fn set_vol(&self, key: MarketKey, context: &str, point: VolPoint, vol: Real) -> Result<Arc<SimpleQuote>> {
        xa_core::ensure!(
            matches!(
                key,
                MarketKey::SwaptionVol(_) | MarketKey::FxVol(..) | MarketKey::EquityVol(_) | MarketKey::CpiVol(_)
            ),
            "{key} is not a volatility surface"
        );
        let mut entries = self.write();
        let keyed = (context.to_string(), key);
        if context != DEFAULT_CONTEXT && !entries.vols.contains_key(&keyed) {
            if let Some(hidden) = entries.vols.get(&(DEFAULT_CONTEXT.to_string(), keyed.1.clone())) {
                hidden.revision.bump();
            }
        }
        let surface = entries.vols.entry(keyed).or_default();
        if let Some((_, q)) = surface.points.iter().find(|(p, _)| p.matches(&point)) {
            q.set_value(vol);
            return Ok(q.clone());
        }
        let quote = Arc::new(SimpleQuote::new(vol));
        surface.points.push((point, quote.clone()));
        surface.revision.bump();
        Ok(quote)
    }

    fn lookup(&self, key: &MarketKey, context: &str) -> Result<Entry> {
        self.read()
            .slot(key, context)
            .map(|s| s.entry.clone())
            .ok_or_else(|| missing(key, context))
    }

    fn vol(&self, key: MarketKey, point: VolPoint, context: &str) -> Result<Arc<dyn Quote>> {
        let entries = self.read();
        let quote = entries
            .surface(&key, context)
            .and_then(|s| s.find(&point))
            .ok_or_else(|| Error::MissingMarketData(format!("{key} at {point:?} (context {context})")))?;
        Ok(quote)
    }

    fn type_mismatch(key: &MarketKey) -> Error {
        Error::Runtime(format!("{key} holds an entry of another type"))
    }
}

impl CurveProvider for InMemoryMarket {
    fn discount_curve(&self, currency: &str, context: &str) -> Result<Arc<dyn YieldTermStructure>> {
        let key = MarketKey::Discount(currency.into());
        match self.lookup(&key, context)? {
            Entry::Yield(c) => Ok(c),
            _ => Err(Self::type_mismatch(&key)),
        }
    }

    fn fx_spot(&self, foreign: &str, domestic: &str, context: &str) -> Result<Real> {
        if foreign == domestic {
            return Ok(1.0);
        }
        let key = MarketKey::FxSpot(foreign.into(), domestic.into());
        let inverse = MarketKey::FxSpot(domestic.into(), foreign.into());
        match self.lookup(&key, context) {
            Ok(Entry::Spot(s)) => Ok(s),
            Ok(_) => Err(Self::type_mismatch(&key)),
            Err(_) => match self.lookup(&inverse, context) {
                Ok(Entry::Spot(s)) => Ok(1.0 / s),
                Ok(_) => Err(Self::type_mismatch(&inverse)),
                Err(_) => Err(missing(&key, context)),
            },
        }
    }

    fn equity_spot(&self, name: &str, context: &str) -> Result<Real> {
        let key = MarketKey::Equity(name.into());
        match self.lookup(&key, context)? {
            Entry::Equity(s, _) => Ok(s),
            _ => Err(Self::type_mismatch(&key)),
        }
    }

    fn dividend_curve(&self, name: &str, context: &str) -> Result<Arc<dyn YieldTermStructure>> {
        let key = MarketKey::Equity(name.into());
        match self.lookup(&key, context)? {
            Entry::Equity(_, d) => Ok(d),
            _ => Err(Self::type_mismatch(&key)),
        }
    }

    fn inflation_curve(&self, index: &str, context: &str) -> Result<Arc<dyn ZeroInflationTermStructure>> {
        let key = MarketKey::Inflation(index.into());
        match self.lookup(&key, context)? {
            Entry::Inflation(c) => Ok(c),
            _ => Err(Self::type_mismatch(&key)),
        }
    }

    fn default_curve(&self, name: &str, context: &str) -> Result<Arc<dyn DefaultProbabilityTermStructure>> {
        let key = MarketKey::Default(name.into());
        match self.lookup(&key, context)? {
            Entry::Default(c) => Ok(c),
            _ => Err(Self::type_mismatch(&key)),
        }
    }
}

impl Market for InMemoryMarket {
    fn swaption_vol(&self, currency: &str, expiry: Time, term: Time, context: &str) -> Result<Arc<dyn Quote>> {
        self.vol(MarketKey::SwaptionVol(currency.into()), VolPoint::ExpiryTerm(expiry, term), context)
    }

    fn fx_vol(&self, foreign: &str, domestic: &str, expiry: Time, context: &str) -> Result<Arc<dyn Quote>> {
        self.vol(MarketKey::FxVol(foreign.into(), domestic.into()), VolPoint::Expiry(expiry), context)
    }

    fn equity_vol(&self, name: &str, expiry: Time, context: &str) -> Result<Arc<dyn Quote>> {
        self.vol(MarketKey::EquityVol(name.into()), VolPoint::Expiry(expiry), context)
    }

    fn cpi_vol(&self, index: &str, maturity: Time, context: &str) -> Result<Arc<dyn Quote>> {
        self.vol(MarketKey::CpiVol(index.into()), VolPoint::Expiry(maturity), context)
    }

    fn dependency(&self, key: &MarketKey, context: &str) -> Result<Arc<dyn Versioned>> {
        let entries = self.read();
        if let Some(surface) = entries.surface(key, context) {
            return Ok(surface.revision.clone());
        }
        if let Some(slot) = entries.slot(key, context) {
            return Ok(slot.revision.clone());
        }
        // spots may be stored inverted
        if let MarketKey::FxSpot(a, b) = key {
            if let Some(slot) = entries.slot(&MarketKey::FxSpot(b.clone(), a.clone()), context) {
                return Ok(slot.revision.clone());
            }
        }
        Err(missing(key, context))
    }

    fn curve_provider(self: Arc<Self>) -> Arc<dyn CurveProvider> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xa_termstructures::FlatForward;

    #[test]
    fn context_falls_back_to_default() {
        let m = InMemoryMarket::new();
        m.set_discount_curve("EUR", DEFAULT_CONTEXT, Arc::new(FlatForward::new(0.02)));
        m.set_discount_curve("EUR", "fxcal", Arc::new(FlatForward::new(0.03)));
        let r = |ctx: &str| m.discount_curve("EUR", ctx).unwrap().zero_rate(1.0);
        assert!((r("fxcal") - 0.03).abs() < 1e-14);
        assert!((r("eqcal") - 0.02).abs() < 1e-14);
        match m.discount_curve("USD", "fxcal") {
            Err(Error::MissingMarketData(msg)) => assert!(msg.contains("USD") && msg.contains("fxcal")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn replacing_a_curve_bumps_its_revision() {
        let m = InMemoryMarket::new();
        m.set_fx_spot("USD", "EUR", DEFAULT_CONTEXT, 0.9);
        let dep = m.dependency(&MarketKey::FxSpot("EUR".into(), "USD".into()), "any").unwrap();
        let before = dep.revision();
        m.set_fx_spot("USD", "EUR", DEFAULT_CONTEXT, 0.91);
        assert_eq!(dep.revision(), before + 1);
        assert!((m.fx_spot("EUR", "USD", "any").unwrap() - 1.0 / 0.91).abs() < 1e-14);
    }

    #[test]
    fn new_context_entries_bump_what_they_hide() {
        let m = InMemoryMarket::new();
        m.set_discount_curve("USD", DEFAULT_CONTEXT, Arc::new(FlatForward::new(0.05)));
        m.set_fx_spot("EUR", "USD", DEFAULT_CONTEXT, 1.1);
        let curve = m.dependency(&MarketKey::Discount("USD".into()), "final").unwrap();
        let spot = m.dependency(&MarketKey::FxSpot("USD".into(), "EUR".into()), "final").unwrap();
        let (c0, s0) = (curve.revision(), spot.revision());

        m.set_discount_curve("USD", "final", Arc::new(FlatForward::new(0.07)));
        m.set_fx_spot("USD", "EUR", "final", 0.9);
        assert!(curve.revision() > c0);
        assert!(spot.revision() > s0);
        assert!((m.discount_curve("USD", "final").unwrap().zero_rate(1.0) - 0.07).abs() < 1e-14);

        let key = MarketKey::EquityVol("SX5E".into());
        m.set_vol(key.clone(), DEFAULT_CONTEXT, VolPoint::Flat, 0.2).unwrap();
        let surface = m.dependency(&key, "eq").unwrap();
        let v0 = surface.revision();
        m.set_vol(key, "eq", VolPoint::Flat, 0.25).unwrap();
        assert!(surface.revision() > v0);
        assert_eq!(m.equity_vol("SX5E", 1.0, "eq").unwrap().value(), Some(0.25));
    }

    #[test]
    fn vol_points_and_flat_surfaces() {
        let m = InMemoryMarket::new();
        let key = MarketKey::SwaptionVol("EUR".into());
        let q = m.set_vol(key.clone(), DEFAULT_CONTEXT, VolPoint::ExpiryTerm(1.0, 9.0), 0.007).unwrap();
        let surface = m.dependency(&key, DEFAULT_CONTEXT).unwrap();
        let structure = surface.revision();
        assert_eq!(m.swaption_vol("EUR", 1.0, 9.0, "x").unwrap().value(), Some(0.007));
        assert!(m.swaption_vol("EUR", 2.0, 8.0, "x").is_err());

        // updating keeps the quote and the surface structure
        let same = m.set_vol(key, DEFAULT_CONTEXT, VolPoint::ExpiryTerm(1.0, 9.0), 0.008).unwrap();
        assert!(Arc::ptr_eq(&q, &same));
        assert_eq!(q.revision(), 1);
        assert_eq!(surface.revision(), structure);

        m.set_vol(MarketKey::FxVol("USD".into(), "EUR".into()), DEFAULT_CONTEXT, VolPoint::Flat, 0.1)
            .unwrap();
        assert_eq!(m.fx_vol("USD", "EUR", 3.7, "x").unwrap().value(), Some(0.1));
        assert!(m.set_vol(MarketKey::Discount("EUR".into()), DEFAULT_CONTEXT, VolPoint::Flat, 0.1).is_err());
    }
}
