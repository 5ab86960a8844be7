//! Minimal tuple value representation — a narrow stand-in for the
//! engine's real tuple/value system, which this subsystem does not
//! redesign.

use std::cmp::Ordering as CmpOrdering;

/// A single column value. Deliberately small: just enough variants to
/// form index keys and evaluate equality predicates in tests and
/// benchmarks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i64),
    Text(String),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Text(_) => None,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            // Cross-variant ordering only matters for total-order
            // requirements of the skiplist key; it is never relied on
            // for predicate semantics.
            (Value::Int(_), Value::Text(_)) => CmpOrdering::Less,
            (Value::Text(_), Value::Int(_)) => CmpOrdering::Greater,
        }
    }
}
