//! Identifiers, idents, and the scalar value domain.

use chrono::{DateTime, Utc};
use std::fmt;

/// A system-issued entity identifier.
///
/// Ids are allocated monotonically and never reused within a database's
/// lifetime. `0` is not a valid id and stands for "absent".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(pub u64);

impl Id {
    /// The absent id.
    pub const NONE: Id = Id(0);

    /// Creates an id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns true if this is the absent id.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Returns true if this is a real id.
    #[must_use]
    pub const fn is_some(self) -> bool {
        self.0 != 0
    }

    pub(crate) const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id:{}", self.0)
    }
}

impl From<u64> for Id {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A globally unique, human-readable name for a system or user entity,
/// generally an attribute.
///
/// User idents are non-empty and must not begin with `sys/`; that prefix is
/// reserved for the bootstrap schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ident(String);

impl Ident {
    /// Creates an ident from a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the ident as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Ident {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for Ident {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// An immutable scalar value.
///
/// Equality is by tag and content; ordering is defined only within a tag,
/// by the storage layer. Reference values carry an entity id.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A UTF-8 string.
    Str(String),
    /// A signed 64-bit integer.
    Int(i64),
    /// A boolean.
    Bool(bool),
    /// An instant in time, millisecond precision, UTC.
    Inst(DateTime<Utc>),
    /// A 64-bit float. NaN is not a valid value.
    Float(f64),
    /// A reference to an entity.
    Ref(Id),
}

impl Value {
    /// Returns true if this is the zero or empty value of its tag.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Str(s) => s.is_empty(),
            Value::Int(i) => *i == 0,
            Value::Bool(b) => !b,
            Value::Inst(t) => *t == DateTime::UNIX_EPOCH,
            Value::Float(f) => *f == 0.0,
            Value::Ref(id) => id.is_none(),
        }
    }

    /// Floors instants to the millisecond precision of the storage encoding.
    /// Other tags are unchanged.
    #[must_use]
    pub fn normalize(self) -> Self {
        match self {
            Value::Inst(t) => match DateTime::from_timestamp_millis(t.timestamp_millis()) {
                Some(ms) => Value::Inst(ms),
                None => Value::Inst(t),
            },
            other => other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Inst(t) => write!(f, "{t}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Ref(id) => write!(f, "{id}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Inst(t)
    }
}

impl From<Id> for Value {
    fn from(id: Id) -> Self {
        Value::Ref(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn id_ordering_and_none() {
        assert!(Id::new(1) < Id::new(2));
        assert!(Id::NONE.is_none());
        assert!(Id::new(7).is_some());
    }

    #[test]
    fn empty_values() {
        assert!(Value::Str(String::new()).is_empty());
        assert!(Value::Int(0).is_empty());
        assert!(Value::Bool(false).is_empty());
        assert!(Value::Float(0.0).is_empty());
        assert!(Value::Ref(Id::NONE).is_empty());
        assert!(Value::Inst(DateTime::UNIX_EPOCH).is_empty());

        assert!(!Value::Str("x".into()).is_empty());
        assert!(!Value::Int(-1).is_empty());
        assert!(!Value::Bool(true).is_empty());
    }

    #[test]
    fn normalize_floors_instants_to_millis() {
        let t = Utc.with_ymd_and_hms(2020, 5, 17, 12, 30, 45).unwrap()
            + chrono::Duration::nanoseconds(1_234_567);
        let normalized = Value::Inst(t).normalize();
        match normalized {
            Value::Inst(n) => {
                assert_eq!(n.timestamp_millis(), t.timestamp_millis());
                assert_eq!(n.timestamp_subsec_micros() % 1000, 0);
            }
            other => panic!("expected Inst, got {other:?}"),
        }
    }

    #[test]
    fn normalize_leaves_other_tags() {
        assert_eq!(Value::Int(42).normalize(), Value::Int(42));
        assert_eq!(Value::from("a").normalize(), Value::from("a"));
    }

    #[test]
    fn ident_display() {
        let ident = Ident::from("person/name");
        assert_eq!(ident.to_string(), "person/name");
        assert_eq!(ident.as_str(), "person/name");
    }
}
