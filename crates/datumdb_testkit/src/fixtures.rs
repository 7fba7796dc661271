//! Database fixtures.

use datumdb_core::{sys, Attr, Claim, Config, Database, Request, Response, TempId};

/// A fresh database with small tables, suitable for tests.
#[must_use]
pub fn fresh_db() -> Database {
    Database::new(Config::new().degree(4).attrs_capacity(32).idents_capacity(32))
}

/// The person schema used across the integration tests.
#[must_use]
pub fn person_schema() -> Vec<Attr> {
    vec![
        Attr::new("person/name", sys::ATTR_TYPE_STRING).unique(sys::ATTR_UNIQUE_IDENTITY),
        Attr::new("person/email", sys::ATTR_TYPE_STRING).unique(sys::ATTR_UNIQUE_VALUE),
        Attr::new("person/age", sys::ATTR_TYPE_INT),
        Attr::new("person/score", sys::ATTR_TYPE_FLOAT),
        Attr::new("person/likes-pickles", sys::ATTR_TYPE_BOOL),
        Attr::new("person/born", sys::ATTR_TYPE_INST),
        Attr::new("person/friend", sys::ATTR_TYPE_REF),
        Attr::new("person/alias", sys::ATTR_TYPE_STRING).cardinality(sys::ATTR_CARDINALITY_MANY),
    ]
}

/// A fresh database with the person schema declared.
#[must_use]
pub fn person_db() -> Database {
    let db = fresh_db();
    db.declare(&person_schema()).expect("person schema declares");
    db
}

/// Writes a person with the given temp label, name, and age, panicking on
/// failure.
pub fn write_person(db: &Database, label: &str, name: &str, age: i64) -> Response {
    let res = db.write(Request::new(vec![
        Claim::assert(TempId::from(label), "person/name", name),
        Claim::assert(TempId::from(label), "person/age", age),
    ]));
    assert!(res.is_ok(), "write failed: {:?}", res.error);
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn person_db_declares_schema() {
        let db = person_db();
        let snapshot = db.read();
        for attr in person_schema() {
            assert!(
                snapshot.resolve_ident(&attr.ident).is_some(),
                "{} missing",
                attr.ident
            );
        }
    }

    #[test]
    fn write_person_assigns_id() {
        let db = person_db();
        let res = write_person(&db, "1", "Donald", 49);
        assert!(res.new_id("1").is_some());
    }
}
