//! Structural-invariant checks over snapshots.
//!
//! These are the engine's global invariants: index agreement, uniqueness,
//! cardinality, and the schema's ident bijection. Property tests run them
//! after arbitrary request sequences.

use datumdb_core::index::SortOrder;
use datumdb_core::{Datum, Id, Snapshot, Value};
use std::collections::HashMap;

// An orderable, hashable projection of a value for multiset comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum ValueKey {
    Str(String),
    Int(i64),
    Bool(bool),
    Inst(i64),
    Float(u64),
    Ref(u64),
}

fn value_key(v: &Value) -> ValueKey {
    match v {
        Value::Str(s) => ValueKey::Str(s.clone()),
        Value::Int(i) => ValueKey::Int(*i),
        Value::Bool(b) => ValueKey::Bool(*b),
        Value::Inst(t) => ValueKey::Inst(t.timestamp_millis()),
        Value::Float(f) => ValueKey::Float(f.to_bits()),
        Value::Ref(id) => ValueKey::Ref(id.as_u64()),
    }
}

fn datum_key(d: &Datum) -> (u64, u64, ValueKey) {
    (d.e.as_u64(), d.a.as_u64(), value_key(&d.v))
}

fn multiset(datums: impl Iterator<Item = Datum>) -> HashMap<(u64, u64, ValueKey), usize> {
    let mut set = HashMap::new();
    for datum in datums {
        *set.entry(datum_key(&datum)).or_insert(0) += 1;
    }
    set
}

/// Asserts every structural invariant of the engine against a snapshot.
///
/// Panics with a description of the first violation found.
pub fn check_invariants(snapshot: &Snapshot) {
    let schema = snapshot.schema();
    let eav: Vec<Datum> = snapshot.scan(SortOrder::Eav).collect();
    let eav_set = multiset(eav.iter().cloned());

    // EAV and AEV hold the same multiset of datums.
    let aev_set = multiset(snapshot.scan(SortOrder::Aev));
    assert_eq!(eav_set, aev_set, "EAV and AEV disagree");

    // Datums never repeat on (E, A, V).
    for (key, count) in &eav_set {
        assert_eq!(*count, 1, "duplicate datum {key:?}");
    }

    // AVE holds exactly the datums of unique attributes.
    let ave_set = multiset(snapshot.scan(SortOrder::Ave));
    let expected: HashMap<_, _> = eav
        .iter()
        .filter(|d| schema.is_unique(d.a))
        .map(|d| (datum_key(d), 1))
        .collect();
    assert_eq!(ave_set, expected, "AVE does not match unique datums");

    // VAE holds exactly the datums of ref attributes.
    let vae_set = multiset(snapshot.scan(SortOrder::Vae));
    let expected: HashMap<_, _> = eav
        .iter()
        .filter(|d| schema.is_ref(d.a))
        .map(|d| (datum_key(d), 1))
        .collect();
    assert_eq!(vae_set, expected, "VAE does not match ref datums");

    // Cardinality-one attributes carry at most one value per entity.
    let mut ea_counts: HashMap<(u64, u64), usize> = HashMap::new();
    for datum in &eav {
        if !schema.is_many(datum.a) {
            *ea_counts
                .entry((datum.e.as_u64(), datum.a.as_u64()))
                .or_insert(0) += 1;
        }
    }
    for ((e, a), count) in ea_counts {
        assert!(
            count <= 1,
            "cardinality-one attribute {a} has {count} values on entity {e}"
        );
    }

    // Unique attributes carry each value on at most one entity.
    let mut av_counts: HashMap<(u64, ValueKey), usize> = HashMap::new();
    for datum in &eav {
        if schema.is_unique(datum.a) {
            *av_counts
                .entry((datum.a.as_u64(), value_key(&datum.v)))
                .or_insert(0) += 1;
        }
    }
    for ((a, v), count) in av_counts {
        assert!(count <= 1, "unique attribute {a} value {v:?} on {count} entities");
    }

    // The ident tables form a bijection over attributes.
    for attr in schema.attrs() {
        assert_eq!(
            schema.ident_id(&attr.ident),
            Some(attr.id),
            "ident {} does not round-trip",
            attr.ident
        );
        assert_eq!(schema.attr_ident(attr.id), Some(&attr.ident));
    }

    // Every indexed attribute exists in the schema cache.
    for datum in &eav {
        assert!(
            schema.value_type(datum.a).is_some(),
            "datum {datum:?} has an unknown attribute"
        );
        assert!(datum.e != Id::NONE, "datum with absent entity");
        assert!(datum.t != Id::NONE, "datum with absent transaction");
    }
}
