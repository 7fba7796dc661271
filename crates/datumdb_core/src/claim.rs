//! Claims, requests, and responses: the external write interface.

use crate::error::DbError;
use crate::snapshot::Snapshot;
use crate::value::{Id, Ident, Value};
use std::collections::HashMap;
use std::fmt;

/// A per-request placeholder that resolves to a fresh entity id at write
/// time, or to an existing id under an identity-unique rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TempId(String);

impl TempId {
    /// Creates a temp id with the given label.
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Returns the label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "temp:{}", self.0)
    }
}

impl From<&str> for TempId {
    fn from(label: &str) -> Self {
        Self(label.to_owned())
    }
}

impl From<String> for TempId {
    fn from(label: String) -> Self {
        Self(label)
    }
}

/// A resolver-form reference: a unique attribute plus a value identifying a
/// unique entity.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupRef {
    /// The unique attribute.
    pub a: Box<ARef>,
    /// The value to look up.
    pub v: Value,
}

impl LookupRef {
    /// Creates a lookup ref.
    pub fn new(a: impl Into<ARef>, v: impl Into<Value>) -> Self {
        Self {
            a: Box::new(a.into()),
            v: v.into(),
        }
    }
}

/// A reference that resolves to an entity id when a claim is evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum ERef {
    /// An existing entity id.
    Id(Id),
    /// An ident, resolved through the schema cache.
    Ident(Ident),
    /// A lookup ref, resolved through the AVE index.
    Lookup(LookupRef),
    /// A temp id, assigned a fresh id on first use in a request.
    Temp(TempId),
    /// The transaction entity of the current write.
    Txn,
}

impl From<Id> for ERef {
    fn from(id: Id) -> Self {
        ERef::Id(id)
    }
}

impl From<Ident> for ERef {
    fn from(ident: Ident) -> Self {
        ERef::Ident(ident)
    }
}

impl From<TempId> for ERef {
    fn from(temp: TempId) -> Self {
        ERef::Temp(temp)
    }
}

impl From<LookupRef> for ERef {
    fn from(lookup: LookupRef) -> Self {
        ERef::Lookup(lookup)
    }
}

/// A reference that resolves to an attribute id when a claim is evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum ARef {
    /// An existing attribute id.
    Id(Id),
    /// An ident, resolved through the schema cache.
    Ident(Ident),
    /// A lookup ref, resolved through the AVE index.
    Lookup(LookupRef),
}

impl From<Id> for ARef {
    fn from(id: Id) -> Self {
        ARef::Id(id)
    }
}

impl From<Ident> for ARef {
    fn from(ident: Ident) -> Self {
        ARef::Ident(ident)
    }
}

impl From<&str> for ARef {
    fn from(ident: &str) -> Self {
        ARef::Ident(Ident::from(ident))
    }
}

impl From<LookupRef> for ARef {
    fn from(lookup: LookupRef) -> Self {
        ARef::Lookup(lookup)
    }
}

/// A reference that resolves to a value when a claim is evaluated.
///
/// The id-bearing forms are only meaningful for ref-typed attributes; a
/// scalar must match the attribute's declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum VRef {
    /// An entity id, as a reference value.
    Id(Id),
    /// An ident, resolved to the named entity's id.
    Ident(Ident),
    /// A temp id, assigned a fresh id on first use in a request.
    Temp(TempId),
    /// A lookup ref, resolved through the AVE index.
    Lookup(LookupRef),
    /// A typed scalar value.
    Scalar(Value),
}

impl From<Id> for VRef {
    fn from(id: Id) -> Self {
        VRef::Id(id)
    }
}

impl From<Ident> for VRef {
    fn from(ident: Ident) -> Self {
        VRef::Ident(ident)
    }
}

impl From<TempId> for VRef {
    fn from(temp: TempId) -> Self {
        VRef::Temp(temp)
    }
}

impl From<LookupRef> for VRef {
    fn from(lookup: LookupRef) -> Self {
        VRef::Lookup(lookup)
    }
}

impl From<Value> for VRef {
    fn from(v: Value) -> Self {
        VRef::Scalar(v)
    }
}

impl From<&str> for VRef {
    fn from(s: &str) -> Self {
        VRef::Scalar(Value::from(s))
    }
}

impl From<String> for VRef {
    fn from(s: String) -> Self {
        VRef::Scalar(Value::Str(s))
    }
}

impl From<i64> for VRef {
    fn from(i: i64) -> Self {
        VRef::Scalar(Value::Int(i))
    }
}

impl From<bool> for VRef {
    fn from(b: bool) -> Self {
        VRef::Scalar(Value::Bool(b))
    }
}

impl From<f64> for VRef {
    fn from(x: f64) -> Self {
        VRef::Scalar(Value::Float(x))
    }
}

impl From<chrono::DateTime<chrono::Utc>> for VRef {
    fn from(t: chrono::DateTime<chrono::Utc>) -> Self {
        VRef::Scalar(Value::Inst(t))
    }
}

/// A proposed assertion or retraction of a single datum.
///
/// Write requests require all of `e`, `a`, and `v`. Snapshot queries accept
/// partial claims; the populated positions choose the index (see
/// [`Snapshot::select`]).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Claim {
    /// The entity position.
    pub e: Option<ERef>,
    /// The attribute position.
    pub a: Option<ARef>,
    /// The value position.
    pub v: Option<VRef>,
    /// True for a retraction, false for an assertion.
    pub retract: bool,
}

impl Claim {
    /// An assertion of a full datum.
    pub fn assert(e: impl Into<ERef>, a: impl Into<ARef>, v: impl Into<VRef>) -> Self {
        Self {
            e: Some(e.into()),
            a: Some(a.into()),
            v: Some(v.into()),
            retract: false,
        }
    }

    /// A retraction of a full datum.
    pub fn retract(e: impl Into<ERef>, a: impl Into<ARef>, v: impl Into<VRef>) -> Self {
        Self {
            e: Some(e.into()),
            a: Some(a.into()),
            v: Some(v.into()),
            retract: true,
        }
    }

    /// A query claim matching every datum of an entity.
    pub fn entity(e: impl Into<ERef>) -> Self {
        Self {
            e: Some(e.into()),
            ..Self::default()
        }
    }

    /// A query claim matching every datum of an entity and attribute.
    pub fn ea(e: impl Into<ERef>, a: impl Into<ARef>) -> Self {
        Self {
            e: Some(e.into()),
            a: Some(a.into()),
            ..Self::default()
        }
    }

    /// A query claim matching every datum with an attribute and value.
    pub fn av(a: impl Into<ARef>, v: impl Into<VRef>) -> Self {
        Self {
            a: Some(a.into()),
            v: Some(v.into()),
            ..Self::default()
        }
    }

    /// A query claim matching every datum of an attribute.
    pub fn attribute(a: impl Into<ARef>) -> Self {
        Self {
            a: Some(a.into()),
            ..Self::default()
        }
    }
}

/// A batch of claims applied atomically by [`crate::Database::write`].
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// The claims, evaluated in order.
    pub claims: Vec<Claim>,
}

impl Request {
    /// Creates a request from a list of claims.
    #[must_use]
    pub fn new(claims: Vec<Claim>) -> Self {
        Self { claims }
    }
}

/// The result of applying a request to a database.
#[derive(Debug, Clone)]
pub struct Response {
    /// The transaction id, or [`Id::NONE`] on failure.
    pub id: Id,
    /// The id assigned to each temp id in the request; `None` on failure.
    pub new_ids: Option<HashMap<TempId, Id>>,
    /// A snapshot of the database after the write, or of the unchanged
    /// database on failure. Always present.
    pub snapshot: Snapshot,
    /// The failure, if the request was rejected.
    pub error: Option<DbError>,
}

impl Response {
    /// Returns true if the write committed.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Returns the id assigned to a temp id label, if the write committed
    /// and the label appeared in the request.
    #[must_use]
    pub fn new_id(&self, label: &str) -> Option<Id> {
        self.new_ids
            .as_ref()
            .and_then(|ids| ids.get(&TempId::from(label)))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assert_claim_populates_all_positions() {
        let claim = Claim::assert(TempId::from("1"), "person/name", "Donald");
        assert!(claim.e.is_some());
        assert!(claim.a.is_some());
        assert!(matches!(claim.v, Some(VRef::Scalar(Value::Str(_)))));
        assert!(!claim.retract);
    }

    #[test]
    fn retract_claim_sets_flag() {
        let claim = Claim::retract(Id(5), "person/age", 49i64);
        assert!(claim.retract);
    }

    #[test]
    fn query_claims_are_partial() {
        let by_entity = Claim::entity(Id(5));
        assert!(by_entity.a.is_none());
        assert!(by_entity.v.is_none());

        let by_av = Claim::av("person/name", "Donald");
        assert!(by_av.e.is_none());
    }

    #[test]
    fn vref_from_id_is_a_reference() {
        assert_eq!(VRef::from(Id(9)), VRef::Id(Id(9)));
        assert_eq!(VRef::from(9i64), VRef::Scalar(Value::Int(9)));
    }
}
