//! The bootstrap schema: system ids, datums, and validity rules.
//!
//! The id assignments in this module are a fixed contract; collaborators
//! that depend on system entities observe these exact values.

use crate::datum::Datum;
use crate::schema::Attr;
use crate::value::{Id, Ident, Value};
use chrono::{DateTime, Utc};

/// `sys/db/ident`: the attribute naming an entity.
pub const DB_IDENT: Id = Id(1);
/// `sys/attr/type`: the attribute declaring an attribute's value type.
pub const ATTR_TYPE: Id = Id(2);
/// `sys/attr/unique`: the attribute declaring an attribute's uniqueness.
pub const ATTR_UNIQUE: Id = Id(3);
/// `sys/attr/cardinality`: the attribute declaring an attribute's cardinality.
pub const ATTR_CARDINALITY: Id = Id(4);
/// The bootstrap transaction entity.
pub const TX: Id = Id(5);
/// `sys/tx/at`: the attribute recording a transaction's instant.
pub const TX_AT: Id = Id(6);
/// `sys/attr/unique/identity`: colliding assertions resolve to the extant entity.
pub const ATTR_UNIQUE_IDENTITY: Id = Id(7);
/// `sys/attr/unique/value`: colliding assertions fail the write.
pub const ATTR_UNIQUE_VALUE: Id = Id(8);
/// `sys/attr/cardinality/one`: at most one value per entity and attribute.
pub const ATTR_CARDINALITY_ONE: Id = Id(9);
/// `sys/attr/cardinality/many`: any number of values per entity and attribute.
pub const ATTR_CARDINALITY_MANY: Id = Id(10);
/// `sys/attr/type/ref`: entity-reference values.
pub const ATTR_TYPE_REF: Id = Id(11);
/// `sys/attr/type/string`: string values.
pub const ATTR_TYPE_STRING: Id = Id(12);
/// `sys/attr/type/int`: signed integer values.
pub const ATTR_TYPE_INT: Id = Id(13);
/// `sys/attr/type/bool`: boolean values.
pub const ATTR_TYPE_BOOL: Id = Id(14);
/// `sys/attr/type/inst`: instant values.
pub const ATTR_TYPE_INST: Id = Id(15);
/// `sys/attr/type/float`: floating-point values.
pub const ATTR_TYPE_FLOAT: Id = Id(16);
/// `sys/attr/ref/type`: the attribute declaring a special reference type.
pub const ATTR_REF_TYPE: Id = Id(17);
/// `sys/attr/ref/type/dependent`: referents owned by their referrers.
pub const ATTR_REF_TYPE_DEPENDENT: Id = Id(18);
/// `sys/db/rank`: the ordering attribute for ordered collections.
pub const DB_RANK: Id = Id(19);
/// The first id available to user entities. Lower ids are reserved.
pub const FIRST_USER_ID: Id = Id(0x0010_0000);

fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

/// The system datums installed at database creation, all under the
/// bootstrap transaction.
pub fn datums() -> Vec<Datum> {
    let s = |name: &str| Value::from(name);
    let r = |id: Id| Value::Ref(id);
    vec![
        Datum::new(DB_IDENT, DB_IDENT, s("sys/db/ident"), TX),
        Datum::new(DB_IDENT, ATTR_TYPE, r(ATTR_TYPE_STRING), TX),
        Datum::new(DB_IDENT, ATTR_UNIQUE, r(ATTR_UNIQUE_IDENTITY), TX),
        Datum::new(ATTR_UNIQUE, DB_IDENT, s("sys/attr/unique"), TX),
        Datum::new(ATTR_UNIQUE, ATTR_TYPE, r(ATTR_TYPE_REF), TX),
        Datum::new(ATTR_UNIQUE_IDENTITY, DB_IDENT, s("sys/attr/unique/identity"), TX),
        Datum::new(ATTR_UNIQUE_VALUE, DB_IDENT, s("sys/attr/unique/value"), TX),
        Datum::new(TX_AT, DB_IDENT, s("sys/tx/at"), TX),
        Datum::new(TX_AT, ATTR_TYPE, r(ATTR_TYPE_INST), TX),
        Datum::new(ATTR_TYPE, DB_IDENT, s("sys/attr/type"), TX),
        Datum::new(ATTR_TYPE, ATTR_TYPE, r(ATTR_TYPE_REF), TX),
        Datum::new(ATTR_TYPE_REF, DB_IDENT, s("sys/attr/type/ref"), TX),
        Datum::new(ATTR_TYPE_STRING, DB_IDENT, s("sys/attr/type/string"), TX),
        Datum::new(ATTR_TYPE_INST, DB_IDENT, s("sys/attr/type/inst"), TX),
        Datum::new(ATTR_TYPE_INT, DB_IDENT, s("sys/attr/type/int"), TX),
        Datum::new(ATTR_TYPE_BOOL, DB_IDENT, s("sys/attr/type/bool"), TX),
        Datum::new(ATTR_TYPE_FLOAT, DB_IDENT, s("sys/attr/type/float"), TX),
        Datum::new(ATTR_CARDINALITY, DB_IDENT, s("sys/attr/cardinality"), TX),
        Datum::new(ATTR_CARDINALITY, ATTR_TYPE, r(ATTR_TYPE_REF), TX),
        Datum::new(ATTR_CARDINALITY_ONE, DB_IDENT, s("sys/attr/cardinality/one"), TX),
        Datum::new(ATTR_CARDINALITY_MANY, DB_IDENT, s("sys/attr/cardinality/many"), TX),
        Datum::new(ATTR_REF_TYPE, DB_IDENT, s("sys/attr/ref/type"), TX),
        Datum::new(ATTR_REF_TYPE, ATTR_TYPE, r(ATTR_TYPE_REF), TX),
        Datum::new(ATTR_REF_TYPE_DEPENDENT, DB_IDENT, s("sys/attr/ref/type/dependent"), TX),
        Datum::new(DB_RANK, DB_IDENT, s("sys/db/rank"), TX),
        Datum::new(DB_RANK, ATTR_TYPE, r(ATTR_TYPE_INT), TX),
        Datum::new(TX, TX_AT, Value::Inst(epoch()), TX),
    ]
}

/// The system attributes, precomputed rather than reduced from the datums.
pub fn attrs() -> Vec<Attr> {
    vec![
        Attr {
            id: DB_IDENT,
            ident: Ident::from("sys/db/ident"),
            value_type: ATTR_TYPE_STRING,
            cardinality: Id::NONE,
            unique: ATTR_UNIQUE_IDENTITY,
            ref_type: Id::NONE,
        },
        Attr {
            id: ATTR_UNIQUE,
            ident: Ident::from("sys/attr/unique"),
            value_type: ATTR_TYPE_REF,
            cardinality: Id::NONE,
            unique: Id::NONE,
            ref_type: Id::NONE,
        },
        Attr {
            id: ATTR_TYPE,
            ident: Ident::from("sys/attr/type"),
            value_type: ATTR_TYPE_REF,
            cardinality: Id::NONE,
            unique: Id::NONE,
            ref_type: Id::NONE,
        },
        Attr {
            id: ATTR_CARDINALITY,
            ident: Ident::from("sys/attr/cardinality"),
            value_type: ATTR_TYPE_REF,
            cardinality: Id::NONE,
            unique: Id::NONE,
            ref_type: Id::NONE,
        },
        Attr {
            id: ATTR_REF_TYPE,
            ident: Ident::from("sys/attr/ref/type"),
            value_type: ATTR_TYPE_REF,
            cardinality: Id::NONE,
            unique: Id::NONE,
            ref_type: Id::NONE,
        },
        Attr {
            id: TX_AT,
            ident: Ident::from("sys/tx/at"),
            value_type: ATTR_TYPE_INST,
            cardinality: Id::NONE,
            unique: Id::NONE,
            ref_type: Id::NONE,
        },
        Attr {
            id: DB_RANK,
            ident: Ident::from("sys/db/rank"),
            value_type: ATTR_TYPE_INT,
            cardinality: Id::NONE,
            unique: Id::NONE,
            ref_type: Id::NONE,
        },
    ]
}

/// The system idents, including the enumeration entities that are not
/// attributes.
pub fn idents() -> Vec<(Ident, Id)> {
    [
        ("sys/db/ident", DB_IDENT),
        ("sys/attr/unique", ATTR_UNIQUE),
        ("sys/attr/unique/identity", ATTR_UNIQUE_IDENTITY),
        ("sys/attr/unique/value", ATTR_UNIQUE_VALUE),
        ("sys/tx/at", TX_AT),
        ("sys/attr/type", ATTR_TYPE),
        ("sys/attr/type/ref", ATTR_TYPE_REF),
        ("sys/attr/type/string", ATTR_TYPE_STRING),
        ("sys/attr/type/inst", ATTR_TYPE_INST),
        ("sys/attr/type/int", ATTR_TYPE_INT),
        ("sys/attr/type/bool", ATTR_TYPE_BOOL),
        ("sys/attr/type/float", ATTR_TYPE_FLOAT),
        ("sys/attr/cardinality", ATTR_CARDINALITY),
        ("sys/attr/cardinality/one", ATTR_CARDINALITY_ONE),
        ("sys/attr/cardinality/many", ATTR_CARDINALITY_MANY),
        ("sys/attr/ref/type", ATTR_REF_TYPE),
        ("sys/attr/ref/type/dependent", ATTR_REF_TYPE_DEPENDENT),
        ("sys/db/rank", DB_RANK),
    ]
    .into_iter()
    .map(|(name, id)| (Ident::from(name), id))
    .collect()
}

/// Returns true if the value's tag matches the declared attribute type.
/// NaN floats are never valid.
#[must_use]
pub fn valid_value(value_type: Id, value: &Value) -> bool {
    match value {
        Value::Ref(_) => value_type == ATTR_TYPE_REF,
        Value::Str(_) => value_type == ATTR_TYPE_STRING,
        Value::Int(_) => value_type == ATTR_TYPE_INT,
        Value::Bool(_) => value_type == ATTR_TYPE_BOOL,
        Value::Inst(_) => value_type == ATTR_TYPE_INST,
        Value::Float(f) => value_type == ATTR_TYPE_FLOAT && !f.is_nan(),
    }
}

/// Returns true if the id names a uniqueness kind.
#[must_use]
pub fn valid_unique(id: Id) -> bool {
    matches!(id, ATTR_UNIQUE_IDENTITY | ATTR_UNIQUE_VALUE)
}

/// Returns true if the id names a value type.
#[must_use]
pub fn valid_attr_type(id: Id) -> bool {
    matches!(
        id,
        ATTR_TYPE_REF
            | ATTR_TYPE_STRING
            | ATTR_TYPE_INT
            | ATTR_TYPE_BOOL
            | ATTR_TYPE_INST
            | ATTR_TYPE_FLOAT
    )
}

/// Returns true if the id names a cardinality.
#[must_use]
pub fn valid_attr_cardinality(id: Id) -> bool {
    matches!(id, ATTR_CARDINALITY_ONE | ATTR_CARDINALITY_MANY)
}

/// Returns true if the id names a reference type.
#[must_use]
pub fn valid_attr_ref_type(id: Id) -> bool {
    id == ATTR_REF_TYPE_DEPENDENT
}

/// Returns true if the ident is valid for a user entity: non-empty and not
/// in the reserved `sys/` namespace.
#[must_use]
pub fn valid_user_ident(ident: &Ident) -> bool {
    !ident.as_str().is_empty() && !ident.as_str().starts_with("sys/")
}
