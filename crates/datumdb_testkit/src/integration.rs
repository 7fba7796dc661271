//! End-to-end scenarios and property tests across the engine.

use crate::fixtures::{fresh_db, person_db, write_person};
use crate::generators::person_claim_strategy;
use crate::invariants::check_invariants;
use datumdb_core::index::SortOrder;
use datumdb_core::{
    sys, Claim, Datum, DbError, Id, Ident, LookupRef, Request, TempId, Value,
};
use proptest::prelude::*;

#[test]
fn simple_insert_and_read() {
    let db = fresh_db();
    let req = Request::new(vec![Claim::assert(
        TempId::from("1"),
        sys::DB_IDENT,
        "test/ident",
    )]);

    let res = db.write(req.clone());
    assert!(res.is_ok());
    assert!(res.id > Id::NONE);
    let e = res.new_id("1").unwrap();
    assert_eq!(e, Id(sys::FIRST_USER_ID.as_u64() + 1));
    assert!(res
        .snapshot
        .find(&Claim::assert(e, sys::DB_IDENT, "test/ident"))
        .is_some());

    let res2 = db.write(req);
    assert!(res2.is_ok());
    assert_eq!(res2.new_id("1"), Some(e));
    assert_ne!(res2.id, res.id);
    check_invariants(&db.read());
}

#[test]
fn schema_declaration_and_use() {
    let db = person_db();
    let res = write_person(&db, "1", "Donald", 49);
    assert!(res.new_id("1").unwrap() > Id::NONE);

    // Identical re-declaration is a no-op.
    db.declare(&crate::fixtures::person_schema()).unwrap();

    // A different type for an existing attribute is rejected.
    let err = db
        .declare(&[datumdb_core::Attr::new("person/name", sys::ATTR_TYPE_INT)
            .unique(sys::ATTR_UNIQUE_IDENTITY)])
        .unwrap_err();
    assert!(matches!(err, DbError::AttrTypeChangeDisallowed { .. }));
    check_invariants(&db.read());
}

#[test]
fn unique_value_collision_leaves_database_unchanged() {
    let db = person_db();
    let res = db.write(Request::new(vec![
        Claim::assert(TempId::from("1"), "person/name", "Donald"),
        Claim::assert(TempId::from("1"), "person/email", "donald@duckburg.example"),
    ]));
    assert!(res.is_ok());
    let first: Vec<Datum> = db.read().scan(SortOrder::Eav).collect();

    let res = db.write(Request::new(vec![
        Claim::assert(TempId::from("2"), "person/name", "Donny"),
        Claim::assert(TempId::from("2"), "person/email", "donald@duckburg.example"),
    ]));
    assert!(matches!(
        res.error,
        Some(DbError::UniqueValueCollision { .. })
    ));
    let after: Vec<Datum> = res.snapshot.scan(SortOrder::Eav).collect();
    assert_eq!(first, after);
    check_invariants(&res.snapshot);
}

#[test]
fn identity_unique_merge_preserves_other_attributes() {
    let db = person_db();
    let res = db.write(Request::new(vec![
        Claim::assert(TempId::from("1"), "person/name", "Donald"),
        Claim::assert(TempId::from("1"), "person/age", 49i64),
        Claim::assert(TempId::from("1"), "person/score", 23.42f64),
    ]));
    let p = res.new_id("1").unwrap();

    let res = db.write(Request::new(vec![
        Claim::assert(TempId::from("1"), "person/name", "Donald"),
        Claim::assert(TempId::from("1"), "person/age", 50i64),
    ]));
    assert!(res.is_ok());
    assert_eq!(res.new_id("1"), Some(p));
    let view = &res.snapshot;
    assert!(view.find(&Claim::assert(p, "person/age", 50i64)).is_some());
    assert!(view.find(&Claim::assert(p, "person/age", 49i64)).is_none());
    assert!(view
        .find(&Claim::assert(p, "person/score", 23.42f64))
        .is_some());
    check_invariants(view);
}

#[test]
fn retraction_clears_every_index() {
    let db = person_db();
    let res = db.write(Request::new(vec![
        Claim::assert(TempId::from("1"), "person/name", "Donald"),
        Claim::assert(TempId::from("2"), "person/name", "Mickey"),
        Claim::assert(TempId::from("1"), "person/friend", TempId::from("2")),
    ]));
    let donald = res.new_id("1").unwrap();
    let mickey = res.new_id("2").unwrap();

    let res = db.write(Request::new(vec![
        Claim::retract(donald, "person/friend", mickey),
        Claim::retract(donald, "person/name", "Donald"),
    ]));
    assert!(res.is_ok());
    let view = &res.snapshot;
    assert!(view
        .find(&Claim::assert(donald, "person/friend", mickey))
        .is_none());
    assert!(view
        .find(&Claim::assert(donald, "person/name", "Donald"))
        .is_none());
    assert!(view
        .find(&Claim::assert(mickey, "person/name", "Mickey"))
        .is_some());
    assert_eq!(view.select(&Claim::entity(donald)).unwrap().count(), 0);
    check_invariants(view);
}

#[test]
fn select_by_entity_is_per_type_contiguous() {
    let db = person_db();
    let res = db.write(Request::new(vec![
        Claim::assert(TempId::from("1"), "person/name", "Donald"),
        Claim::assert(TempId::from("1"), "person/age", 49i64),
        Claim::assert(TempId::from("1"), "person/score", 23.42f64),
        Claim::assert(TempId::from("1"), "person/likes-pickles", true),
    ]));
    let p = res.new_id("1").unwrap();

    let datums: Vec<Datum> = res.snapshot.select(&Claim::entity(p)).unwrap().collect();
    assert_eq!(datums.len(), 4);
    let tags: Vec<u8> = datums
        .iter()
        .map(|d| match d.v {
            Value::Str(_) => 0,
            Value::Int(_) | Value::Inst(_) => 1,
            Value::Ref(_) | Value::Bool(_) => 2,
            Value::Float(_) => 3,
        })
        .collect();
    let mut sorted = tags.clone();
    sorted.sort_unstable();
    assert_eq!(tags, sorted, "fan-out must be per-storage-type contiguous");
}

#[test]
fn lookup_refs_resolve_entities_and_values() {
    let db = person_db();
    write_person(&db, "1", "Donald", 49);
    write_person(&db, "2", "Mickey", 90);

    let donald = LookupRef::new(Ident::from("person/name"), "Donald");
    let mickey = LookupRef::new(Ident::from("person/name"), "Mickey");
    let res = db.write(Request::new(vec![Claim::assert(
        donald.clone(),
        "person/friend",
        mickey,
    )]));
    assert!(res.is_ok());

    let view = &res.snapshot;
    let d = view.resolve_lookup_ref(&donald).unwrap();
    let friend = view.resolve_ident(&Ident::from("person/friend")).unwrap();
    let datums: Vec<Datum> = view.select(&Claim::ea(d, friend)).unwrap().collect();
    assert_eq!(datums.len(), 1);
    assert!(matches!(datums[0].v, Value::Ref(_)));
    check_invariants(view);
}

#[test]
fn snapshots_never_observe_later_writes() {
    let db = person_db();
    write_person(&db, "1", "Donald", 49);
    let old = db.read();
    let old_datums: Vec<Datum> = old.scan(SortOrder::Eav).collect();

    for i in 0..20 {
        write_person(&db, "1", &format!("p{i}"), i);
    }
    db.write(Request::new(vec![Claim::retract(
        old.resolve_lookup_ref(&LookupRef::new(Ident::from("person/name"), "Donald"))
            .unwrap(),
        "person/age",
        49i64,
    )]));

    let replay: Vec<Datum> = old.scan(SortOrder::Eav).collect();
    assert_eq!(old_datums, replay);
    check_invariants(&db.read());
}

#[test]
fn empty_string_values_are_indexed() {
    let db = person_db();
    let res = db.write(Request::new(vec![Claim::assert(
        TempId::from("1"),
        "person/alias",
        "",
    )]));
    assert!(res.is_ok());
    let p = res.new_id("1").unwrap();
    assert!(res
        .snapshot
        .find(&Claim::assert(p, "person/alias", ""))
        .is_some());
}

#[test]
fn instants_floor_to_milliseconds() {
    use chrono::{Duration, TimeZone, Utc};
    let db = person_db();
    let precise = Utc.with_ymd_and_hms(1969, 7, 20, 20, 17, 54).unwrap()
        + Duration::microseconds(1500);
    let res = db.write(Request::new(vec![Claim::assert(
        TempId::from("1"),
        "person/born",
        precise,
    )]));
    let p = res.new_id("1").unwrap();

    let stored = res
        .snapshot
        .select(&Claim::ea(p, "person/born"))
        .unwrap()
        .next()
        .unwrap();
    match stored.v {
        Value::Inst(t) => {
            assert_eq!(t.timestamp_millis(), precise.timestamp_millis());
            assert!(t < precise);
        }
        other => panic!("expected instant, got {other:?}"),
    }
    // The floored form is the identity the index knows.
    assert!(res
        .snapshot
        .find(&Claim::assert(p, "person/born", precise))
        .is_some());
}

#[test]
fn count_agrees_with_select() {
    let db = person_db();
    for i in 0..10 {
        write_person(&db, &i.to_string(), &format!("p{i}"), i);
    }
    let snapshot = db.read();
    let age = Claim::attribute("person/age");
    assert_eq!(
        snapshot.count(&age).unwrap(),
        snapshot.select(&age).unwrap().count()
    );
    let by_av = Claim::av("person/name", "p3");
    assert_eq!(snapshot.count(&by_av).unwrap(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    // Structural invariants hold after arbitrary assertion batches.
    #[test]
    fn invariants_hold_after_random_writes(
        batches in prop::collection::vec(
            prop::collection::vec(person_claim_strategy(), 1..8),
            1..6,
        )
    ) {
        let db = person_db();
        for claims in batches {
            // Writes may fail (e.g. identity rewrites colliding); the
            // database must stay consistent either way.
            let res = db.write(Request::new(claims));
            check_invariants(&res.snapshot);
        }
        check_invariants(&db.read());
    }

    // Asserting then retracting a datum restores the EAV multiset.
    #[test]
    fn assert_retract_round_trips(age in any::<i64>(), name in "[a-z]{1,6}") {
        let db = person_db();
        write_person(&db, "1", &name, age);
        let before: Vec<Datum> = db.read().scan(SortOrder::Eav).collect();

        let extra = age.wrapping_add(1);
        let p = db
            .read()
            .resolve_lookup_ref(&LookupRef::new(Ident::from("person/name"), name.as_str()))
            .unwrap();
        let res = db.write(Request::new(vec![Claim::assert(
            p,
            "person/alias",
            format!("alias-{extra}"),
        )]));
        prop_assert!(res.is_ok());
        let res = db.write(Request::new(vec![Claim::retract(
            p,
            "person/alias",
            format!("alias-{extra}"),
        )]));
        prop_assert!(res.is_ok());

        let after: Vec<Datum> = db.read().scan(SortOrder::Eav).collect();
        let strip =
            |d: &Datum| (d.e.as_u64(), d.a.as_u64(), format!("{:?}", d.v));
        prop_assert_eq!(
            before.iter().map(strip).collect::<Vec<_>>(),
            after.iter().map(strip).collect::<Vec<_>>()
        );
    }
}
