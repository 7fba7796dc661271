//! Immutable point-in-time views of the database.

use crate::claim::{ARef, Claim, ERef, LookupRef, VRef};
use crate::datum::Datum;
use crate::error::{DbError, DbResult};
use crate::index::{CompositeIndex, Prefix, SortOrder};
use crate::iter::Datums;
use crate::schema::Schema;
use crate::value::{Id, Ident, Value};
use std::fmt;
use std::sync::Arc;

/// An immutable snapshot of the database.
///
/// Snapshots bundle clones of the four indexes with the schema as of their
/// capture. They share storage with the live database and with each other
/// through the trees' node sharing, are cheap to clone, and stay internally
/// consistent for their lifetime regardless of subsequent writes.
#[derive(Clone)]
pub struct Snapshot {
    eav: CompositeIndex,
    aev: CompositeIndex,
    ave: CompositeIndex,
    vae: CompositeIndex,
    schema: Arc<Schema>,
}

// The positions of a query claim after reference resolution. A position is
// unresolved when a reference was given but named nothing; such queries
// match no datums rather than falling back to a smaller shape.
struct Resolved {
    e: Position,
    a: Position,
    v: Option<Value>,
    v_unresolved: bool,
}

enum Position {
    Absent,
    Bound(Id),
    Unresolved,
}

impl Snapshot {
    pub(crate) fn new(
        eav: CompositeIndex,
        aev: CompositeIndex,
        ave: CompositeIndex,
        vae: CompositeIndex,
        schema: Arc<Schema>,
    ) -> Self {
        Self {
            eav,
            aev,
            ave,
            vae,
            schema,
        }
    }

    /// Returns the stored datum exactly matching the claim's resolved
    /// entity, attribute, and value, with its original transaction id.
    #[must_use]
    pub fn find(&self, claim: &Claim) -> Option<Datum> {
        let resolved = self.resolve(claim);
        let (Position::Bound(e), Position::Bound(a), Some(v)) =
            (resolved.e, resolved.a, resolved.v)
        else {
            return None;
        };
        self.eav
            .find(&self.schema, &Datum::new(e, a, v, Id::NONE))
    }

    /// Scans the datums matching the claim, choosing the most selective
    /// index from the populated positions:
    ///
    /// | E | A | V | index | scan        |
    /// |---|---|---|-------|-------------|
    /// | x | x | x | EAV   | exact match |
    /// | x | x |   | EAV   | EA prefix   |
    /// | x |   |   | EAV   | E fan-out   |
    /// |   | x | x | AVE   | AV prefix   |
    /// |   | x |   | AEV   | A prefix    |
    ///
    /// Other shapes are not indexed and return
    /// [`DbError::UnsupportedSelect`]. A claim whose references resolve to
    /// nothing yields an empty sequence.
    pub fn select(&self, claim: &Claim) -> DbResult<Datums<'_>> {
        Self::check_shape(claim)?;
        let resolved = self.resolve(claim);
        if resolved.unresolvable() {
            return Ok(Datums::empty());
        }
        match (resolved.e, resolved.a, resolved.v) {
            (Position::Bound(e), Position::Bound(a), Some(v)) => {
                let datum = Datum::new(e, a, v, Id::NONE);
                Ok(match self.eav.find(&self.schema, &datum) {
                    Some(found) => Datums::once(found),
                    None => Datums::empty(),
                })
            }
            (Position::Bound(e), Position::Bound(a), None) => {
                let seed = Datum::new(e, a, Value::Int(0), Id::NONE);
                Ok(self.eav.select(&self.schema, Prefix::Ea, &seed))
            }
            (Position::Bound(e), Position::Absent, None) => {
                let seed = Datum::new(e, Id::NONE, Value::Int(0), Id::NONE);
                Ok(self.eav.select(&self.schema, Prefix::E, &seed))
            }
            (Position::Absent, Position::Bound(a), Some(v)) => {
                let seed = Datum::new(Id::NONE, a, v, Id::NONE);
                Ok(self.ave.select(&self.schema, Prefix::Av, &seed))
            }
            (Position::Absent, Position::Bound(a), None) => {
                let seed = Datum::new(Id::NONE, a, Value::Int(0), Id::NONE);
                Ok(self.aev.select(&self.schema, Prefix::A, &seed))
            }
            _ => Err(DbError::UnsupportedSelect),
        }
    }

    /// Counts the datums matching the claim without materializing them.
    /// The dispatch rules are those of [`Snapshot::select`].
    pub fn count(&self, claim: &Claim) -> DbResult<usize> {
        Self::check_shape(claim)?;
        let resolved = self.resolve(claim);
        if resolved.unresolvable() {
            return Ok(0);
        }
        match (resolved.e, resolved.a, resolved.v) {
            (Position::Bound(e), Position::Bound(a), Some(v)) => {
                let datum = Datum::new(e, a, v, Id::NONE);
                Ok(usize::from(self.eav.find(&self.schema, &datum).is_some()))
            }
            (Position::Bound(e), Position::Bound(a), None) => {
                let seed = Datum::new(e, a, Value::Int(0), Id::NONE);
                Ok(self.eav.count(&self.schema, Prefix::Ea, &seed))
            }
            (Position::Bound(e), Position::Absent, None) => {
                let seed = Datum::new(e, Id::NONE, Value::Int(0), Id::NONE);
                Ok(self.eav.count(&self.schema, Prefix::E, &seed))
            }
            (Position::Absent, Position::Bound(a), Some(v)) => {
                let seed = Datum::new(Id::NONE, a, v, Id::NONE);
                Ok(self.ave.count(&self.schema, Prefix::Av, &seed))
            }
            (Position::Absent, Position::Bound(a), None) => {
                let seed = Datum::new(Id::NONE, a, Value::Int(0), Id::NONE);
                Ok(self.aev.count(&self.schema, Prefix::A, &seed))
            }
            _ => Err(DbError::UnsupportedSelect),
        }
    }

    // Rejects claim shapes no index serves, before any resolution.
    fn check_shape(claim: &Claim) -> DbResult<()> {
        let shape = (claim.e.is_some(), claim.a.is_some(), claim.v.is_some());
        match shape {
            (true, true, _) | (true, false, false) | (false, true, _) => Ok(()),
            _ => Err(DbError::UnsupportedSelect),
        }
    }

    /// Resolves an ident to its entity id.
    #[must_use]
    pub fn resolve_ident(&self, ident: &Ident) -> Option<Id> {
        self.schema.ident_id(ident)
    }

    /// Resolves an attribute id to its ident.
    #[must_use]
    pub fn resolve_attr_ident(&self, id: Id) -> Option<&Ident> {
        self.schema.attr_ident(id)
    }

    /// The schema as of this snapshot.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Iterates over every datum in the chosen index's order. The sequence
    /// is per-storage-type contiguous, as with entity fan-out.
    pub fn scan(&self, order: SortOrder) -> Datums<'_> {
        let index = match order {
            SortOrder::Eav => &self.eav,
            SortOrder::Aev => &self.aev,
            SortOrder::Ave => &self.ave,
            SortOrder::Vae => &self.vae,
        };
        index.scan(&self.schema)
    }

    /// Returns the number of datums in the primary index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.eav.len()
    }

    /// Returns true if the snapshot holds no datums.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.eav.is_empty()
    }

    fn resolve(&self, claim: &Claim) -> Resolved {
        let e = match &claim.e {
            None => Position::Absent,
            Some(ERef::Id(id)) => Position::Bound(*id),
            Some(ERef::Ident(ident)) => match self.schema.ident_id(ident) {
                Some(id) => Position::Bound(id),
                None => Position::Unresolved,
            },
            Some(ERef::Lookup(lookup)) => match self.resolve_lookup_ref(lookup) {
                Some(id) => Position::Bound(id),
                None => Position::Unresolved,
            },
            Some(ERef::Temp(_)) | Some(ERef::Txn) => Position::Unresolved,
        };
        let a = match &claim.a {
            None => Position::Absent,
            Some(ARef::Id(id)) => Position::Bound(*id),
            Some(ARef::Ident(ident)) => match self.schema.ident_id(ident) {
                Some(id) => Position::Bound(id),
                None => Position::Unresolved,
            },
            Some(ARef::Lookup(lookup)) => match self.resolve_lookup_ref(lookup) {
                Some(id) => Position::Bound(id),
                None => Position::Unresolved,
            },
        };
        let (v, v_unresolved) = match &claim.v {
            None => (None, false),
            Some(VRef::Scalar(value)) => (Some(value.clone().normalize()), false),
            Some(VRef::Id(id)) => (Some(Value::Ref(*id)), false),
            Some(VRef::Ident(ident)) => match self.schema.ident_id(ident) {
                Some(id) => (Some(Value::Ref(id)), false),
                None => (None, true),
            },
            Some(VRef::Lookup(lookup)) => match self.resolve_lookup_ref(lookup) {
                Some(id) => (Some(Value::Ref(id)), false),
                None => (None, true),
            },
            Some(VRef::Temp(_)) => (None, true),
        };
        Resolved {
            e,
            a,
            v,
            v_unresolved,
        }
    }

    /// Resolves a lookup ref to the entity owning the value, through the
    /// AVE index.
    #[must_use]
    pub fn resolve_lookup_ref(&self, lookup: &LookupRef) -> Option<Id> {
        let a = match &*lookup.a {
            ARef::Id(id) => *id,
            ARef::Ident(ident) => self.schema.ident_id(ident)?,
            ARef::Lookup(inner) => self.resolve_lookup_ref(inner)?,
        };
        let seed = Datum::new(Id::NONE, a, lookup.v.clone().normalize(), Id::NONE);
        self.ave
            .first(&self.schema, Prefix::Av, &seed)
            .map(|datum| datum.e)
    }
}

impl Resolved {
    fn unresolvable(&self) -> bool {
        matches!(self.e, Position::Unresolved)
            || matches!(self.a, Position::Unresolved)
            || self.v_unresolved
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("datums", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::database::Database;
    use crate::sys;
    use crate::value::Value;

    fn db() -> Database {
        Database::new(Config::default())
    }

    #[test]
    fn find_system_datum() {
        let snapshot = db().read();
        let claim = Claim::assert(sys::DB_IDENT, sys::DB_IDENT, "sys/db/ident");
        let found = snapshot.find(&claim);
        assert_eq!(
            found,
            Some(Datum::new(
                sys::DB_IDENT,
                sys::DB_IDENT,
                Value::from("sys/db/ident"),
                sys::TX
            ))
        );
    }

    #[test]
    fn find_resolves_idents() {
        let snapshot = db().read();
        let claim = Claim::assert(
            Ident::from("sys/db/ident"),
            "sys/db/ident",
            "sys/db/ident",
        );
        assert!(snapshot.find(&claim).is_some());
    }

    #[test]
    fn find_missing_is_none() {
        let snapshot = db().read();
        let claim = Claim::assert(sys::DB_IDENT, sys::DB_IDENT, "nope");
        assert!(snapshot.find(&claim).is_none());
    }

    #[test]
    fn select_by_av_uses_ave() {
        let snapshot = db().read();
        let claim = Claim::av(sys::DB_IDENT, "sys/tx/at");
        let datums: Vec<Datum> = snapshot.select(&claim).unwrap().collect();
        assert_eq!(datums.len(), 1);
        assert_eq!(datums[0].e, sys::TX_AT);
    }

    #[test]
    fn select_by_attribute_uses_aev() {
        let snapshot = db().read();
        let claim = Claim::attribute(sys::ATTR_TYPE);
        let count = snapshot.select(&claim).unwrap().count();
        // Every typed system attribute declares its type.
        assert_eq!(count, 7);
        assert_eq!(snapshot.count(&claim).unwrap(), 7);
    }

    #[test]
    fn select_by_entity_fans_out() {
        let snapshot = db().read();
        let datums: Vec<Datum> = snapshot
            .select(&Claim::entity(sys::DB_IDENT))
            .unwrap()
            .collect();
        // sys/db/ident carries an ident, a type, and a uniqueness.
        assert_eq!(datums.len(), 3);
        assert!(datums.iter().all(|d| d.e == sys::DB_IDENT));
    }

    #[test]
    fn unsupported_shapes_error() {
        let snapshot = db().read();
        let ev = Claim {
            e: Some(ERef::Id(sys::DB_IDENT)),
            a: None,
            v: Some(VRef::Scalar(Value::Int(0))),
            retract: false,
        };
        assert_eq!(snapshot.select(&ev).unwrap_err(), DbError::UnsupportedSelect);

        let empty = Claim::default();
        assert_eq!(
            snapshot.select(&empty).unwrap_err(),
            DbError::UnsupportedSelect
        );
        assert_eq!(
            snapshot.count(&empty).unwrap_err(),
            DbError::UnsupportedSelect
        );
    }

    #[test]
    fn unresolved_references_yield_nothing() {
        let snapshot = db().read();
        let claim = Claim::ea(Ident::from("no/such"), sys::DB_IDENT);
        assert_eq!(snapshot.select(&claim).unwrap().count(), 0);
        assert_eq!(snapshot.count(&claim).unwrap(), 0);
        assert!(snapshot.find(&Claim::assert(Ident::from("no/such"), sys::DB_IDENT, "x")).is_none());
    }

    #[test]
    fn resolve_idents_both_ways() {
        let snapshot = db().read();
        assert_eq!(
            snapshot.resolve_ident(&Ident::from("sys/attr/type")),
            Some(sys::ATTR_TYPE)
        );
        assert_eq!(
            snapshot.resolve_attr_ident(sys::ATTR_TYPE),
            Some(&Ident::from("sys/attr/type"))
        );
        assert_eq!(snapshot.resolve_ident(&Ident::from("no/such")), None);
    }

    #[test]
    fn lookup_ref_resolves_through_ave() {
        let snapshot = db().read();
        let lookup = LookupRef::new(sys::DB_IDENT, "sys/attr/type");
        assert_eq!(snapshot.resolve_lookup_ref(&lookup), Some(sys::ATTR_TYPE));

        let claim = Claim::entity(lookup);
        let datums = snapshot.select(&claim).unwrap().count();
        assert!(datums >= 2);
    }

    #[test]
    fn scan_orders_cover_all_indexes() {
        let snapshot = db().read();
        let eav = snapshot.scan(SortOrder::Eav).count();
        let aev = snapshot.scan(SortOrder::Aev).count();
        assert_eq!(eav, aev);
        assert!(snapshot.scan(SortOrder::Ave).count() <= eav);
        assert!(snapshot.scan(SortOrder::Vae).count() <= eav);
    }
}
