//! Composite indexes: one typed sub-index per storage representation.
//!
//! The attribute's declared type is the routing signal. Each value type maps
//! to exactly one storage representation:
//!
//! | Attribute type | Storage | Encoding                         |
//! |----------------|---------|----------------------------------|
//! | string         | string  | identity                         |
//! | int            | i64     | identity                         |
//! | ref            | u64     | identity                         |
//! | bool           | u64     | `false -> 0`, `true -> 1`        |
//! | inst           | i64     | Unix-epoch milliseconds, UTC     |
//! | float          | f64     | identity (NaN rejected upstream) |
//!
//! Booleans and references share the u64 sub-index, and integers and
//! instants share the i64 sub-index, without collision: routing goes
//! through the attribute's type, never a shared value namespace.

use crate::datum::Datum;
use crate::index::order::{Prefix, SortOrder};
use crate::index::typed::{StorageKey, TypedDatum, TypedIndex};
use crate::iter::Datums;
use crate::schema::Schema;
use crate::sys;
use crate::value::{Id, Value};
use chrono::DateTime;

/// A sorted multiset of datums in one sort order, spread across four typed
/// sub-indexes.
///
/// Safe for concurrent reads; cloning is O(1) and clones may be mutated
/// independently.
#[derive(Clone)]
pub struct CompositeIndex {
    order: SortOrder,
    strings: TypedIndex<String>,
    ints: TypedIndex<i64>,
    uints: TypedIndex<u64>,
    floats: TypedIndex<f64>,
}

enum TypedKey {
    Str(TypedDatum<String>),
    Int(TypedDatum<i64>),
    Uint(TypedDatum<u64>),
    Float(TypedDatum<f64>),
}

fn encode(value_type: Id, datum: &Datum) -> Option<TypedKey> {
    let key = match (value_type, &datum.v) {
        (sys::ATTR_TYPE_STRING, Value::Str(s)) => TypedKey::Str(typed(datum, s.clone())),
        (sys::ATTR_TYPE_INT, Value::Int(i)) => TypedKey::Int(typed(datum, *i)),
        (sys::ATTR_TYPE_REF, Value::Ref(id)) => TypedKey::Uint(typed(datum, id.as_u64())),
        (sys::ATTR_TYPE_BOOL, Value::Bool(b)) => TypedKey::Uint(typed(datum, u64::from(*b))),
        (sys::ATTR_TYPE_INST, Value::Inst(t)) => TypedKey::Int(typed(datum, t.timestamp_millis())),
        (sys::ATTR_TYPE_FLOAT, Value::Float(f)) => TypedKey::Float(typed(datum, *f)),
        _ => return None,
    };
    Some(key)
}

fn typed<X: StorageKey>(datum: &Datum, v: X) -> TypedDatum<X> {
    TypedDatum {
        e: datum.e,
        a: datum.a,
        v,
        t: datum.t,
    }
}

fn string_datum(td: &TypedDatum<String>) -> Datum {
    Datum::new(td.e, td.a, Value::Str(td.v.clone()), td.t)
}

fn int_datum(schema: &Schema, td: &TypedDatum<i64>) -> Datum {
    let v = match schema.value_type(td.a) {
        Some(sys::ATTR_TYPE_INT) => Value::Int(td.v),
        Some(sys::ATTR_TYPE_INST) => match DateTime::from_timestamp_millis(td.v) {
            Some(t) => Value::Inst(t),
            None => panic!("stored instant out of range: {}", td.v),
        },
        other => panic!("i64 sub-index holds attribute {} of type {other:?}", td.a),
    };
    Datum::new(td.e, td.a, v, td.t)
}

fn uint_datum(schema: &Schema, td: &TypedDatum<u64>) -> Datum {
    let v = match schema.value_type(td.a) {
        Some(sys::ATTR_TYPE_REF) => Value::Ref(Id(td.v)),
        Some(sys::ATTR_TYPE_BOOL) => Value::Bool(td.v == 1),
        other => panic!("u64 sub-index holds attribute {} of type {other:?}", td.a),
    };
    Datum::new(td.e, td.a, v, td.t)
}

fn float_datum(td: &TypedDatum<f64>) -> Datum {
    Datum::new(td.e, td.a, Value::Float(td.v), td.t)
}

impl CompositeIndex {
    /// Creates an empty composite index of the given tree degree and sort
    /// order.
    #[must_use]
    pub fn new(degree: usize, order: SortOrder) -> Self {
        Self {
            order,
            strings: TypedIndex::new(degree, order),
            ints: TypedIndex::new(degree, order),
            uints: TypedIndex::new(degree, order),
            floats: TypedIndex::new(degree, order),
        }
    }

    /// Returns the sort order of this index.
    #[must_use]
    pub fn order(&self) -> SortOrder {
        self.order
    }

    /// Returns the stored datum matching on (E, A, V), with its original
    /// transaction id.
    #[must_use]
    pub fn find(&self, schema: &Schema, datum: &Datum) -> Option<Datum> {
        match encode(schema.value_type(datum.a)?, datum)? {
            TypedKey::Str(td) => self.strings.get(&td).map(string_datum),
            TypedKey::Int(td) => self.ints.get(&td).map(|d| int_datum(schema, d)),
            TypedKey::Uint(td) => self.uints.get(&td).map(|d| uint_datum(schema, d)),
            TypedKey::Float(td) => self.floats.get(&td).map(float_datum),
        }
    }

    /// Ensures the datum is present, returning true if one matching on
    /// (E, A, V) already was. The stored datum's transaction id is retained.
    pub fn insert(&mut self, schema: &Schema, datum: &Datum) -> bool {
        let Some(value_type) = schema.value_type(datum.a) else {
            return false;
        };
        match encode(value_type, datum) {
            Some(TypedKey::Str(td)) => self.strings.insert(td),
            Some(TypedKey::Int(td)) => self.ints.insert(td),
            Some(TypedKey::Uint(td)) => self.uints.insert(td),
            Some(TypedKey::Float(td)) => self.floats.insert(td),
            None => false,
        }
    }

    /// Ensures no datum matching on (E, A, V) is present, returning true if
    /// one was removed.
    pub fn delete(&mut self, schema: &Schema, datum: &Datum) -> bool {
        let Some(value_type) = schema.value_type(datum.a) else {
            return false;
        };
        match encode(value_type, datum) {
            Some(TypedKey::Str(td)) => self.strings.delete(&td),
            Some(TypedKey::Int(td)) => self.ints.delete(&td),
            Some(TypedKey::Uint(td)) => self.uints.delete(&td),
            Some(TypedKey::Float(td)) => self.floats.delete(&td),
            None => false,
        }
    }

    /// Scans the datums matching the prefix of `seed`.
    ///
    /// A prefix of `E` cannot be routed by attribute type and fans out
    /// across all four sub-indexes; the result is per-type contiguous
    /// (strings, then ints, then uints, then floats), not globally sorted.
    /// A scan whose attribute type is unknown to the schema yields an empty
    /// sequence.
    pub fn select<'a>(&'a self, schema: &'a Schema, prefix: Prefix, seed: &Datum) -> Datums<'a> {
        if prefix == Prefix::E {
            let strings = self
                .strings
                .select(prefix, TypedDatum::seed(seed.e, Id::NONE))
                .map(string_datum);
            let ints = self
                .ints
                .select(prefix, TypedDatum::seed(seed.e, Id::NONE))
                .map(move |td| int_datum(schema, td));
            let uints = self
                .uints
                .select(prefix, TypedDatum::seed(seed.e, Id::NONE))
                .map(move |td| uint_datum(schema, td));
            let floats = self
                .floats
                .select(prefix, TypedDatum::seed(seed.e, Id::NONE))
                .map(float_datum);
            return Datums::new(strings.chain(ints).chain(uints).chain(floats));
        }
        let Some(value_type) = schema.value_type(seed.a) else {
            return Datums::empty();
        };
        match self.typed_seed(value_type, prefix, seed) {
            Some(TypedKey::Str(td)) => {
                Datums::new(self.strings.select(prefix, td).map(string_datum))
            }
            Some(TypedKey::Int(td)) => Datums::new(
                self.ints
                    .select(prefix, td)
                    .map(move |td| int_datum(schema, td)),
            ),
            Some(TypedKey::Uint(td)) => Datums::new(
                self.uints
                    .select(prefix, td)
                    .map(move |td| uint_datum(schema, td)),
            ),
            Some(TypedKey::Float(td)) => {
                Datums::new(self.floats.select(prefix, td).map(float_datum))
            }
            None => Datums::empty(),
        }
    }

    /// Returns the first datum matching the prefix, if any.
    #[must_use]
    pub fn first(&self, schema: &Schema, prefix: Prefix, seed: &Datum) -> Option<Datum> {
        self.select(schema, prefix, seed).next()
    }

    /// Counts the datums matching the prefix without materializing them.
    #[must_use]
    pub fn count(&self, schema: &Schema, prefix: Prefix, seed: &Datum) -> usize {
        if prefix == Prefix::E {
            return self.strings.count(prefix, TypedDatum::seed(seed.e, Id::NONE))
                + self.ints.count(prefix, TypedDatum::seed(seed.e, Id::NONE))
                + self.uints.count(prefix, TypedDatum::seed(seed.e, Id::NONE))
                + self.floats.count(prefix, TypedDatum::seed(seed.e, Id::NONE));
        }
        let Some(value_type) = schema.value_type(seed.a) else {
            return 0;
        };
        match self.typed_seed(value_type, prefix, seed) {
            Some(TypedKey::Str(td)) => self.strings.count(prefix, td),
            Some(TypedKey::Int(td)) => self.ints.count(prefix, td),
            Some(TypedKey::Uint(td)) => self.uints.count(prefix, td),
            Some(TypedKey::Float(td)) => self.floats.count(prefix, td),
            None => 0,
        }
    }

    /// Iterates over all datums in index order, per-type contiguous.
    pub fn scan<'a>(&'a self, schema: &'a Schema) -> Datums<'a> {
        let strings = self.strings.iter().map(string_datum);
        let ints = self.ints.iter().map(move |td| int_datum(schema, td));
        let uints = self.uints.iter().map(move |td| uint_datum(schema, td));
        let floats = self.floats.iter().map(float_datum);
        Datums::new(strings.chain(ints).chain(uints).chain(floats))
    }

    /// Returns the total number of datums across the sub-indexes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len() + self.ints.len() + self.uints.len() + self.floats.len()
    }

    /// Returns true if the index holds no datums.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Builds the typed seed for a routed prefix scan. Prefixes that
    // constrain V encode the seed's value; the others leave the value
    // position at its least element.
    fn typed_seed(&self, value_type: Id, prefix: Prefix, seed: &Datum) -> Option<TypedKey> {
        match prefix {
            Prefix::Av | Prefix::Va => encode(value_type, seed),
            Prefix::Ea | Prefix::Ae | Prefix::A => Some(match value_type {
                sys::ATTR_TYPE_STRING => TypedKey::Str(TypedDatum::seed(seed.e, seed.a)),
                sys::ATTR_TYPE_INT | sys::ATTR_TYPE_INST => {
                    TypedKey::Int(TypedDatum::seed(seed.e, seed.a))
                }
                sys::ATTR_TYPE_REF | sys::ATTR_TYPE_BOOL => {
                    TypedKey::Uint(TypedDatum::seed(seed.e, seed.a))
                }
                sys::ATTR_TYPE_FLOAT => TypedKey::Float(TypedDatum::seed(seed.e, seed.a)),
                _ => return None,
            }),
            Prefix::E => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attr;
    use chrono::{TimeZone, Utc};

    const NAME: Id = Id(0x0010_0001);
    const AGE: Id = Id(0x0010_0002);
    const FRIEND: Id = Id(0x0010_0003);
    const PICKLES: Id = Id(0x0010_0004);
    const BORN: Id = Id(0x0010_0005);
    const SCORE: Id = Id(0x0010_0006);

    fn schema() -> Schema {
        let mut schema = Schema::with_capacity(8, 8);
        for (id, ident, value_type, unique) in [
            (NAME, "person/name", sys::ATTR_TYPE_STRING, sys::ATTR_UNIQUE_IDENTITY),
            (AGE, "person/age", sys::ATTR_TYPE_INT, Id::NONE),
            (FRIEND, "person/friend", sys::ATTR_TYPE_REF, Id::NONE),
            (PICKLES, "person/likes-pickles", sys::ATTR_TYPE_BOOL, Id::NONE),
            (BORN, "person/born", sys::ATTR_TYPE_INST, Id::NONE),
            (SCORE, "person/score", sys::ATTR_TYPE_FLOAT, Id::NONE),
        ] {
            let attr = Attr {
                id,
                ..Attr::new(ident, value_type).unique(unique)
            };
            schema.add_attr(attr);
        }
        schema
    }

    fn datum(e: u64, a: Id, v: Value) -> Datum {
        Datum::new(Id(e), a, v, Id(77))
    }

    #[test]
    fn routes_by_attribute_type() {
        let schema = schema();
        let mut index = CompositeIndex::new(2, SortOrder::Eav);

        index.insert(&schema, &datum(1, NAME, Value::from("Donald")));
        index.insert(&schema, &datum(1, AGE, Value::Int(49)));
        index.insert(&schema, &datum(1, FRIEND, Value::Ref(Id(2))));
        index.insert(&schema, &datum(1, PICKLES, Value::Bool(true)));
        index.insert(&schema, &datum(1, SCORE, Value::Float(23.42)));

        assert_eq!(index.len(), 5);
        assert!(index.find(&schema, &datum(1, NAME, Value::from("Donald"))).is_some());
        assert!(index.find(&schema, &datum(1, AGE, Value::Int(49))).is_some());
        assert!(index.find(&schema, &datum(1, AGE, Value::Int(50))).is_none());
    }

    #[test]
    fn find_returns_stored_transaction() {
        let schema = schema();
        let mut index = CompositeIndex::new(2, SortOrder::Eav);
        index.insert(&schema, &Datum::new(Id(1), AGE, Value::Int(49), Id(100)));
        index.insert(&schema, &Datum::new(Id(1), AGE, Value::Int(49), Id(200)));

        let found = index.find(&schema, &datum(1, AGE, Value::Int(49)));
        assert_eq!(found.map(|d| d.t), Some(Id(100)));
    }

    #[test]
    fn bool_and_ref_do_not_collide() {
        let schema = schema();
        let mut index = CompositeIndex::new(2, SortOrder::Eav);
        // A true bool encodes as 1, the same storage key as entity id 1.
        index.insert(&schema, &datum(1, PICKLES, Value::Bool(true)));
        index.insert(&schema, &datum(1, FRIEND, Value::Ref(Id(1))));

        assert_eq!(index.len(), 2);
        let datums: Vec<Datum> = index.select(&schema, Prefix::E, &datum(1, Id::NONE, Value::Int(0))).collect();
        assert!(datums.contains(&datum(1, PICKLES, Value::Bool(true))));
        assert!(datums.contains(&datum(1, FRIEND, Value::Ref(Id(1)))));
    }

    #[test]
    fn inst_round_trips_at_millisecond_precision() {
        let schema = schema();
        let mut index = CompositeIndex::new(2, SortOrder::Eav);
        let born = Utc.with_ymd_and_hms(1969, 7, 20, 20, 17, 54).unwrap();
        index.insert(&schema, &datum(1, BORN, Value::Inst(born)));

        let found = index.find(&schema, &datum(1, BORN, Value::Inst(born)));
        assert_eq!(found.map(|d| d.v), Some(Value::Inst(born)));
    }

    #[test]
    fn empty_string_is_indexed() {
        let schema = schema();
        let mut index = CompositeIndex::new(2, SortOrder::Eav);
        index.insert(&schema, &datum(1, NAME, Value::from("")));
        assert!(index.find(&schema, &datum(1, NAME, Value::from(""))).is_some());
        assert_eq!(index.count(&schema, Prefix::Ea, &datum(1, NAME, Value::Int(0))), 1);
    }

    #[test]
    fn select_unknown_attribute_is_empty() {
        let schema = schema();
        let index = CompositeIndex::new(2, SortOrder::Eav);
        let seed = datum(1, Id(0x00FF_FFFF), Value::Int(0));
        assert_eq!(index.select(&schema, Prefix::Ea, &seed).count(), 0);
        assert_eq!(index.count(&schema, Prefix::Ea, &seed), 0);
    }

    #[test]
    fn ave_av_scan_is_value_ordered() {
        let schema = schema();
        let mut ave = CompositeIndex::new(2, SortOrder::Ave);
        for (e, name) in [(3, "carol"), (1, "alice"), (2, "bob")] {
            ave.insert(&schema, &datum(e, NAME, Value::from(name)));
        }
        let names: Vec<Value> = ave
            .select(&schema, Prefix::A, &datum(0, NAME, Value::Int(0)))
            .map(|d| d.v)
            .collect();
        assert_eq!(
            names,
            vec![Value::from("alice"), Value::from("bob"), Value::from("carol")]
        );

        let owners: Vec<Id> = ave
            .select(&schema, Prefix::Av, &datum(0, NAME, Value::from("bob")))
            .map(|d| d.e)
            .collect();
        assert_eq!(owners, vec![Id(2)]);
    }

    #[test]
    fn clone_isolates_mutations() {
        let schema = schema();
        let mut index = CompositeIndex::new(2, SortOrder::Eav);
        index.insert(&schema, &datum(1, AGE, Value::Int(49)));

        let mut clone = index.clone();
        clone.insert(&schema, &datum(1, AGE, Value::Int(50)));
        clone.delete(&schema, &datum(1, AGE, Value::Int(49)));

        assert!(index.find(&schema, &datum(1, AGE, Value::Int(49))).is_some());
        assert!(index.find(&schema, &datum(1, AGE, Value::Int(50))).is_none());
        assert!(clone.find(&schema, &datum(1, AGE, Value::Int(50))).is_some());
    }

    #[test]
    fn entity_fanout_is_per_type_contiguous() {
        let schema = schema();
        let mut index = CompositeIndex::new(2, SortOrder::Eav);
        index.insert(&schema, &datum(1, SCORE, Value::Float(1.5)));
        index.insert(&schema, &datum(1, NAME, Value::from("Donald")));
        index.insert(&schema, &datum(1, AGE, Value::Int(49)));
        index.insert(&schema, &datum(2, NAME, Value::from("Mickey")));

        let datums: Vec<Datum> = index
            .select(&schema, Prefix::E, &datum(1, Id::NONE, Value::Int(0)))
            .collect();
        // Strings first, then ints, then floats; entity 2 excluded.
        assert_eq!(datums.len(), 3);
        assert_eq!(datums[0].v, Value::from("Donald"));
        assert_eq!(datums[1].v, Value::Int(49));
        assert_eq!(datums[2].v, Value::Float(1.5));
    }
}
