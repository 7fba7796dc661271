//! Error types for datumdb.

use crate::claim::{ARef, ERef, VRef};
use crate::datum::Datum;
use crate::value::{Id, Ident};
use thiserror::Error;

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors produced by the write path and, for [`DbError::UnsupportedSelect`],
/// the read path.
///
/// Every write error is fatal to its request and to nothing else: the
/// database is structurally untouched, the id watermark is restored, and the
/// response carries a snapshot of the pre-write state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DbError {
    /// The entity position of a claim did not resolve, or an explicit id
    /// falls outside the valid range.
    #[error("invalid entity reference: {eref:?}")]
    InvalidE {
        /// The offending reference, if one was given.
        eref: Option<ERef>,
    },

    /// The attribute position of a claim did not resolve, or an explicit id
    /// falls outside the valid range.
    #[error("invalid attribute reference: {aref:?}")]
    InvalidA {
        /// The offending reference, if one was given.
        aref: Option<ARef>,
    },

    /// The value position of a claim did not resolve.
    #[error("invalid value reference: {vref:?}")]
    InvalidV {
        /// The offending reference, if one was given.
        vref: Option<VRef>,
    },

    /// The value's runtime type does not match the attribute's declared type.
    #[error("value does not match the attribute type: {datum:?}")]
    InconsistentAV {
        /// The evaluated datum.
        datum: Datum,
    },

    /// An asserted unique-value attribute's value is already present on a
    /// different entity.
    #[error("unique value already asserted on {extant}: {datum:?}")]
    UniqueValueCollision {
        /// The evaluated datum.
        datum: Datum,
        /// The entity that owns the value.
        extant: Id,
    },

    /// A unique-identity rewrite conflicts with a prior rewrite of the same
    /// entity in this request.
    #[error("conflicting identity rewrites for {e}: {datum:?}")]
    UniqueValueImpossible {
        /// The entity with conflicting rewrites.
        e: Id,
        /// The evaluated datum.
        datum: Datum,
    },

    /// An attribute's ident may not be retracted.
    #[error("attribute idents may not be retracted: {datum:?}")]
    AttrIdentRetractDisallowed {
        /// The evaluated datum.
        datum: Datum,
    },

    /// An attribute's ident may not be changed.
    #[error("attribute idents may not be changed: {datum:?}")]
    AttrIdentChangeDisallowed {
        /// The evaluated datum.
        datum: Datum,
    },

    /// User idents must be non-empty and must not begin with `sys/`.
    #[error("invalid user ident: {datum:?}")]
    InvalidUserIdent {
        /// The evaluated datum.
        datum: Datum,
    },

    /// Attribute-defining datums may not be retracted.
    #[error("attribute definitions may not be retracted: {datum:?}")]
    AttrRetractDisallowed {
        /// The evaluated datum.
        datum: Datum,
    },

    /// An attribute's value type may not be changed.
    #[error("attribute types may not be changed: {datum:?}")]
    AttrTypeChangeDisallowed {
        /// The evaluated datum.
        datum: Datum,
    },

    /// An attribute's cardinality may not be changed.
    #[error("attribute cardinalities may not be changed: {datum:?}")]
    AttrCardinalityChangeDisallowed {
        /// The evaluated datum.
        datum: Datum,
    },

    /// An attribute's uniqueness may not be changed.
    #[error("attribute uniqueness may not be changed: {datum:?}")]
    AttrUniqueChangeDisallowed {
        /// The evaluated datum.
        datum: Datum,
    },

    /// An attribute defined in this request was not given an ident.
    #[error("attribute {id} requires an ident")]
    AttrRequiresIdent {
        /// The attribute entity.
        id: Id,
    },

    /// An attribute was declared with an unknown value type.
    #[error("invalid value type {value_type} for attribute {ident}")]
    InvalidAttrType {
        /// The attribute's ident.
        ident: Ident,
        /// The declared type id.
        value_type: Id,
    },

    /// An attribute was declared with an unknown cardinality.
    #[error("invalid cardinality {cardinality} for attribute {ident}")]
    InvalidAttrCardinality {
        /// The attribute's ident.
        ident: Ident,
        /// The declared cardinality id.
        cardinality: Id,
    },

    /// An attribute was declared with an unknown uniqueness kind.
    #[error("invalid uniqueness {unique} for attribute {ident}")]
    InvalidAttrUnique {
        /// The attribute's ident.
        ident: Ident,
        /// The declared uniqueness id.
        unique: Id,
    },

    /// A select was issued with a claim shape no index supports.
    ///
    /// Supported shapes: `E`, `EA`, `EAV`, `AV`, and `A`.
    #[error("unsupported select shape: E+V without A, V alone, and empty claims are not indexed")]
    UnsupportedSelect,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn display_carries_context() {
        let err = DbError::UniqueValueCollision {
            datum: Datum::new(Id(20), Id(1), Value::from("x"), Id(21)),
            extant: Id(9),
        };
        let text = err.to_string();
        assert!(text.contains("id:9"), "{text}");
    }

    #[test]
    fn errors_are_comparable() {
        assert_eq!(
            DbError::UnsupportedSelect,
            DbError::UnsupportedSelect,
        );
        assert_ne!(
            DbError::InvalidE { eref: None },
            DbError::InvalidA { aref: None },
        );
    }
}
