//! Predicates - the conditions a rule requires of a query.
//!
//! Two representations live side by side:
//!
//! - **Typed comparisons** (`Equal`, `NotEqual`, `GreaterThan`, `LessThan`)
//!   compare the stored value exactly, with the read type fixed at compile time.
//! - **Numeric intervals** project any value onto the real line (strings are
//!   hashed) and test membership in `[lower, upper]`, or its complement.

use npc_state::{Query, StateSource, StateValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A comparison operator usable in criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
}

impl Comparison {
    /// Parse a criteria operator character.
    pub fn from_operator(op: char) -> Option<Self> {
        match op {
            '=' => Some(Comparison::Equal),
            '!' => Some(Comparison::NotEqual),
            '>' => Some(Comparison::GreaterThan),
            '<' => Some(Comparison::LessThan),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Equal => "=",
            Comparison::NotEqual => "!=",
            Comparison::GreaterThan => ">",
            Comparison::LessThan => "<",
        }
    }

    /// Whether `lhs <op> rhs` holds.
    pub fn holds<T: PartialOrd>(&self, lhs: &T, rhs: &T) -> bool {
        match self {
            Comparison::Equal => lhs == rhs,
            Comparison::NotEqual => lhs != rhs,
            Comparison::GreaterThan => lhs > rhs,
            Comparison::LessThan => lhs < rhs,
        }
    }
}

/// A closed numeric interval, optionally complemented.
///
/// The complement form is how `!=` is expressed: a single closed interval
/// cannot exclude one point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
    /// Pass when the value lies outside `[lower, upper]` instead.
    pub complement: bool,
}

impl Interval {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self {
            lower,
            upper,
            complement: false,
        }
    }

    /// `[v, v]`
    pub fn exactly(v: f64) -> Self {
        Self::new(v, v)
    }

    /// `[v, +inf]`
    pub fn at_least(v: f64) -> Self {
        Self::new(v, f64::INFINITY)
    }

    /// `[-inf, v]`
    pub fn at_most(v: f64) -> Self {
        Self::new(f64::NEG_INFINITY, v)
    }

    /// Everything except `v`.
    pub fn excluding(v: f64) -> Self {
        Self {
            complement: true,
            ..Self::exactly(v)
        }
    }

    /// The interval form of a comparison against `v`.
    ///
    /// Ordering comparisons map to closed half-lines, so `>` and `<` include
    /// `v` itself in this representation.
    pub fn from_comparison(op: Comparison, v: f64) -> Self {
        match op {
            Comparison::Equal => Self::exactly(v),
            Comparison::NotEqual => Self::excluding(v),
            Comparison::GreaterThan => Self::at_least(v),
            Comparison::LessThan => Self::at_most(v),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        let inside = self.lower <= value && value <= self.upper;
        inside != self.complement
    }
}

type EvalFn = dyn Fn(&mut Query<'_>) -> bool + Send + Sync;

/// A compiled condition over a query.
#[derive(Clone)]
pub struct Predicate {
    label: String,
    eval: Arc<EvalFn>,
}

impl Predicate {
    /// Wrap an arbitrary condition.
    pub fn new<F>(label: impl Into<String>, eval: F) -> Self
    where
        F: Fn(&mut Query<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            eval: Arc::new(eval),
        }
    }

    /// Compare the value stored under `key` against `value`.
    ///
    /// The key is read as `T`; a miss or a value of another type reads as the
    /// zero value of `T`.
    pub fn compare<T>(key: impl Into<String>, source: StateSource, op: Comparison, value: T) -> Self
    where
        T: StateValue + PartialOrd + fmt::Debug + Send + Sync + 'static,
    {
        let key = key.into();
        let label = format!("{} {} {} {:?}", source.code(), key, op.symbol(), value);
        Self::new(label, move |query: &mut Query<'_>| {
            let current = query.value::<T>(&key, source);
            op.holds(&current, &value)
        })
    }

    pub fn equal<T>(key: impl Into<String>, source: StateSource, value: T) -> Self
    where
        T: StateValue + PartialOrd + fmt::Debug + Send + Sync + 'static,
    {
        Self::compare(key, source, Comparison::Equal, value)
    }

    pub fn not_equal<T>(key: impl Into<String>, source: StateSource, value: T) -> Self
    where
        T: StateValue + PartialOrd + fmt::Debug + Send + Sync + 'static,
    {
        Self::compare(key, source, Comparison::NotEqual, value)
    }

    pub fn greater_than<T>(key: impl Into<String>, source: StateSource, value: T) -> Self
    where
        T: StateValue + PartialOrd + fmt::Debug + Send + Sync + 'static,
    {
        Self::compare(key, source, Comparison::GreaterThan, value)
    }

    pub fn less_than<T>(key: impl Into<String>, source: StateSource, value: T) -> Self
    where
        T: StateValue + PartialOrd + fmt::Debug + Send + Sync + 'static,
    {
        Self::compare(key, source, Comparison::LessThan, value)
    }

    /// Compare a float key against the query's current game time.
    pub fn compare_now(key: impl Into<String>, source: StateSource, op: Comparison) -> Self {
        let key = key.into();
        let label = format!("{} {} {} timestamp", source.code(), key, op.symbol());
        Self::new(label, move |query: &mut Query<'_>| {
            let current = query.value::<f64>(&key, source);
            op.holds(&current, &query.now())
        })
    }

    /// Pass when the numeric projection of `key` lies in `interval`.
    pub fn within(key: impl Into<String>, source: StateSource, interval: Interval) -> Self {
        let key = key.into();
        let label = format!(
            "{} {} in {}[{}, {}]",
            source.code(),
            key,
            if interval.complement { "!" } else { "" },
            interval.lower,
            interval.upper
        );
        Self::new(label, move |query: &mut Query<'_>| {
            let (current, _) = query.get_number(&key, source);
            interval.contains(current)
        })
    }

    /// Pass when the numeric projection of `key` is anything but `value`.
    pub fn outside(key: impl Into<String>, source: StateSource, value: f64) -> Self {
        Self::within(key, source, Interval::excluding(value))
    }

    /// Evaluate against a query. May initialize missing keys in writable state.
    pub fn eval(&self, query: &mut Query<'_>) -> bool {
        (self.eval)(query)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.label).finish()
    }
}
