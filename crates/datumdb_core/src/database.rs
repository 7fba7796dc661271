//! The database root and the transactor.

use crate::claim::{ARef, Claim, ERef, LookupRef, Request, Response, TempId, VRef};
use crate::config::Config;
use crate::datum::Datum;
use crate::error::{DbError, DbResult};
use crate::index::{CompositeIndex, Prefix, SortOrder};
use crate::schema::{Attr, Schema};
use crate::snapshot::Snapshot;
use crate::sys;
use crate::value::{Id, Ident, Value};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, trace};

/// An in-process, immutable-snapshot EAV database.
///
/// A single writer mutates the root atomically through [`Database::write`];
/// any number of concurrent readers obtain persistent snapshots through
/// [`Database::read`] that stay consistent regardless of later writes.
///
/// # Example
///
/// ```rust,ignore
/// use datumdb_core::{Claim, Config, Database, Request, TempId};
///
/// let db = Database::new(Config::default());
/// let res = db.write(Request::new(vec![
///     Claim::assert(TempId::from("1"), "sys/db/ident", "movie/title"),
/// ]));
/// assert!(res.is_ok());
/// ```
pub struct Database {
    root: RwLock<Root>,
}

struct Root {
    eav: CompositeIndex,
    aev: CompositeIndex,
    ave: CompositeIndex,
    vae: CompositeIndex,
    schema: Arc<Schema>,
    next_id: Id,
}

impl Database {
    /// Creates a database holding the bootstrap schema.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let config = config.resolved();
        let schema = Schema::with_capacity(config.attrs_capacity, config.idents_capacity);
        let mut eav = CompositeIndex::new(config.degree, SortOrder::Eav);
        let mut aev = CompositeIndex::new(config.degree, SortOrder::Aev);
        let mut ave = CompositeIndex::new(config.degree, SortOrder::Ave);
        let mut vae = CompositeIndex::new(config.degree, SortOrder::Vae);
        for datum in sys::datums() {
            eav.insert(&schema, &datum);
            aev.insert(&schema, &datum);
            if schema.is_unique(datum.a) {
                ave.insert(&schema, &datum);
            }
            if schema.is_ref(datum.a) {
                vae.insert(&schema, &datum);
            }
        }
        debug!(datums = eav.len(), "database bootstrapped");
        Self {
            root: RwLock::new(Root {
                eav,
                aev,
                ave,
                vae,
                schema: Arc::new(schema),
                next_id: sys::FIRST_USER_ID,
            }),
        }
    }

    /// Returns an immutable snapshot of the current state.
    ///
    /// The lock is held only long enough to clone the index handles; tree
    /// traversal happens outside it.
    pub fn read(&self) -> Snapshot {
        let root = self.root.read();
        root.snapshot()
    }

    /// Atomically applies the request's claims to the database.
    ///
    /// On success the response carries the transaction id, the ids assigned
    /// to the request's temp ids, and a snapshot of the new state. On
    /// failure the database is untouched: the response carries the error
    /// and a snapshot of the pre-write state, and the id watermark is
    /// restored.
    ///
    /// Writes are linearized by a writer-exclusive lock. Errors never
    /// partially apply: a request commits as a whole or not at all.
    pub fn write(&self, req: Request) -> Response {
        let mut root = self.root.write();
        let watermark = root.next_id;
        let tx = root.allocate_id();
        let mut txn = WriteTxn::new(tx);
        match txn.apply(&mut root, &req) {
            Ok(()) => {
                debug!(
                    tx = tx.as_u64(),
                    claims = req.claims.len(),
                    "write committed"
                );
                Response {
                    id: tx,
                    new_ids: Some(txn.new_ids),
                    snapshot: root.snapshot(),
                    error: None,
                }
            }
            Err(error) => {
                debug!(tx = tx.as_u64(), %error, "write aborted");
                root.next_id = watermark;
                Response {
                    id: Id::NONE,
                    new_ids: None,
                    snapshot: root.snapshot(),
                    error: Some(error),
                }
            }
        }
    }

    /// Registers a list of attribute definitions.
    ///
    /// This is a convenience over writing the ident, type, uniqueness, and
    /// cardinality claims directly. Re-declaring an attribute with the same
    /// properties is a no-op; re-declaring with different properties fails.
    pub fn declare(&self, attrs: &[Attr]) -> DbResult<()> {
        let mut claims = Vec::with_capacity(attrs.len() * 4);
        for (i, attr) in attrs.iter().enumerate() {
            let e = TempId::from(i.to_string());
            claims.push(Claim::assert(
                e.clone(),
                sys::DB_IDENT,
                Value::Str(attr.ident.as_str().to_owned()),
            ));
            claims.push(Claim::assert(e.clone(), sys::ATTR_TYPE, VRef::Id(attr.value_type)));
            if attr.unique.is_some() {
                claims.push(Claim::assert(e.clone(), sys::ATTR_UNIQUE, VRef::Id(attr.unique)));
            }
            if attr.cardinality.is_some() {
                claims.push(Claim::assert(
                    e,
                    sys::ATTR_CARDINALITY,
                    VRef::Id(attr.cardinality),
                ));
            }
        }
        match self.write(Request::new(claims)).error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let root = self.root.read();
        f.debug_struct("Database")
            .field("datums", &root.eav.len())
            .field("next_id", &root.next_id)
            .finish_non_exhaustive()
    }
}

impl Root {
    fn allocate_id(&mut self) -> Id {
        let id = self.next_id;
        self.next_id = self.next_id.next();
        id
    }

    fn snapshot(&self) -> Snapshot {
        trace!(datums = self.eav.len(), "snapshot captured");
        Snapshot::new(
            self.eav.clone(),
            self.aev.clone(),
            self.ave.clone(),
            self.vae.clone(),
            Arc::clone(&self.schema),
        )
    }

    fn resolve_lookup_ref(&self, lookup: &LookupRef) -> Option<Id> {
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

// The per-request state of the transactor: id assignments, identity
// rewrites, and pending schema changes, accumulated while claims are
// evaluated and applied at commit.
struct WriteTxn {
    tx: Id,
    new_ids: HashMap<TempId, Id>,
    // Reverse of new_ids, to route rewrites back to their temp ids.
    assigned: HashMap<Id, TempId>,
    // Identity-unique collisions: asserted entity -> extant entity.
    rewrites: HashMap<Id, Id>,
    // Unique (attribute, value) pairs asserted earlier in this request,
    // with their owning entity. Guards values the pre-write AVE cannot see.
    pending_unique: Vec<(Id, Value, Id)>,
    ident_creates: BTreeMap<Id, Ident>,
    ident_deletes: BTreeMap<Id, Ident>,
    attr_changes: BTreeMap<Id, Attr>,
    // Validated new attributes, ready for the schema swap.
    new_attrs: Vec<Attr>,
}

impl WriteTxn {
    fn new(tx: Id) -> Self {
        Self {
            tx,
            new_ids: HashMap::new(),
            assigned: HashMap::new(),
            rewrites: HashMap::new(),
            pending_unique: Vec::new(),
            ident_creates: BTreeMap::new(),
            ident_deletes: BTreeMap::new(),
            attr_changes: BTreeMap::new(),
            new_attrs: Vec::new(),
        }
    }

    fn apply(&mut self, root: &mut Root, req: &Request) -> DbResult<()> {
        let mut data = Vec::with_capacity(req.claims.len());
        for claim in &req.claims {
            let datum = self.evaluate_claim(root, claim)?;
            if !claim.retract {
                self.check_unique(root, &datum)?;
            }
            self.collect_schema_change(root, claim, &datum)?;
            data.push(datum);
        }
        self.validate_attr_changes(root)?;

        // Tentative index update: mutate clones, publish only on success.
        // Each index clones from its own prior state.
        let mut eav = root.eav.clone();
        let mut aev = root.aev.clone();
        let mut ave = root.ave.clone();
        let mut vae = root.vae.clone();
        let schema = Arc::clone(&root.schema);
        for (datum, claim) in data.iter_mut().zip(&req.claims) {
            self.apply_rewrites(datum);
            let unique = schema.is_unique(datum.a);
            let by_ref = schema.is_ref(datum.a);
            if claim.retract {
                eav.delete(&schema, datum);
                aev.delete(&schema, datum);
                if unique {
                    ave.delete(&schema, datum);
                }
                if by_ref {
                    vae.delete(&schema, datum);
                }
                continue;
            }
            if !schema.is_many(datum.a) {
                // Cardinality one: an extant datum with the same entity and
                // attribute but a different value is displaced.
                if let Some(extant) = eav.first(&schema, Prefix::Ea, datum) {
                    if extant.v == datum.v {
                        continue;
                    }
                    eav.delete(&schema, &extant);
                    aev.delete(&schema, &extant);
                    if unique {
                        ave.delete(&schema, &extant);
                    }
                    if by_ref {
                        vae.delete(&schema, &extant);
                    }
                }
            }
            eav.insert(&schema, datum);
            aev.insert(&schema, datum);
            if unique {
                ave.insert(&schema, datum);
            }
            if by_ref {
                vae.insert(&schema, datum);
            }
        }

        root.eav = eav;
        root.aev = aev;
        root.ave = ave;
        root.vae = vae;
        self.commit_schema(root);
        Ok(())
    }

    // Resolves a claim's references into a concrete datum under this
    // transaction. Claims are evaluated in request order; temp ids are
    // assigned on first use.
    fn evaluate_claim(&mut self, root: &mut Root, claim: &Claim) -> DbResult<Datum> {
        let e = match &claim.e {
            Some(ERef::Id(id)) => {
                if id.is_none() || *id >= self.tx {
                    return Err(DbError::InvalidE {
                        eref: claim.e.clone(),
                    });
                }
                *id
            }
            Some(ERef::Ident(ident)) => match root.schema.ident_id(ident) {
                Some(id) => id,
                None => {
                    return Err(DbError::InvalidE {
                        eref: claim.e.clone(),
                    })
                }
            },
            Some(ERef::Lookup(lookup)) => match root.resolve_lookup_ref(lookup) {
                Some(id) => id,
                None => {
                    return Err(DbError::InvalidE {
                        eref: claim.e.clone(),
                    })
                }
            },
            Some(ERef::Temp(temp)) => self.resolve_temp_id(root, temp),
            Some(ERef::Txn) => self.tx,
            None => return Err(DbError::InvalidE { eref: None }),
        };
        let a = match &claim.a {
            Some(ARef::Id(id)) => {
                if id.is_none() || *id >= self.tx {
                    return Err(DbError::InvalidA {
                        aref: claim.a.clone(),
                    });
                }
                *id
            }
            Some(ARef::Ident(ident)) => match root.schema.ident_id(ident) {
                Some(id) => id,
                None => {
                    return Err(DbError::InvalidA {
                        aref: claim.a.clone(),
                    })
                }
            },
            Some(ARef::Lookup(lookup)) => match root.resolve_lookup_ref(lookup) {
                Some(id) => id,
                None => {
                    return Err(DbError::InvalidA {
                        aref: claim.a.clone(),
                    })
                }
            },
            None => return Err(DbError::InvalidA { aref: None }),
        };
        let v = match &claim.v {
            Some(VRef::Id(id)) => Value::Ref(*id),
            Some(VRef::Ident(ident)) => match root.schema.ident_id(ident) {
                Some(id) => Value::Ref(id),
                None => {
                    return Err(DbError::InvalidV {
                        vref: claim.v.clone(),
                    })
                }
            },
            Some(VRef::Temp(temp)) => Value::Ref(self.resolve_temp_id(root, temp)),
            Some(VRef::Lookup(lookup)) => match root.resolve_lookup_ref(lookup) {
                Some(id) => Value::Ref(id),
                None => {
                    return Err(DbError::InvalidV {
                        vref: claim.v.clone(),
                    })
                }
            },
            Some(VRef::Scalar(value)) => value.clone().normalize(),
            None => return Err(DbError::InvalidV { vref: None }),
        };
        let datum = Datum::new(e, a, v, self.tx);
        let value_type = root.schema.value_type(a).unwrap_or(Id::NONE);
        if !sys::valid_value(value_type, &datum.v) {
            return Err(DbError::InconsistentAV { datum });
        }
        Ok(datum)
    }

    fn resolve_temp_id(&mut self, root: &mut Root, temp: &TempId) -> Id {
        if let Some(id) = self.new_ids.get(temp) {
            return *id;
        }
        let id = root.allocate_id();
        self.new_ids.insert(temp.clone(), id);
        self.assigned.insert(id, temp.clone());
        id
    }

    // Probes for a unique collision: first the pre-write AVE index, then
    // the uniqueness assertions already made by this request.
    fn check_unique(&mut self, root: &Root, datum: &Datum) -> DbResult<()> {
        let Some(kind) = root.schema.unique_kind(datum.a) else {
            return Ok(());
        };
        let owner = self.effective_e(datum.e);
        let extant = root
            .ave
            .first(&root.schema, Prefix::Av, datum)
            .map(|found| found.e)
            .or_else(|| {
                self.pending_unique
                    .iter()
                    .find(|(a, v, _)| *a == datum.a && *v == datum.v)
                    .map(|(_, _, e)| self.effective_e(*e))
            });
        match extant {
            None => {
                self.pending_unique.push((datum.a, datum.v.clone(), owner));
                Ok(())
            }
            Some(extant) if extant == owner => Ok(()),
            Some(extant) if kind == sys::ATTR_UNIQUE_VALUE => Err(DbError::UniqueValueCollision {
                datum: datum.clone(),
                extant,
            }),
            Some(extant) => match self.rewrites.get(&datum.e) {
                Some(prior) if *prior != extant => Err(DbError::UniqueValueImpossible {
                    e: datum.e,
                    datum: datum.clone(),
                }),
                _ => {
                    self.rewrites.insert(datum.e, extant);
                    Ok(())
                }
            },
        }
    }

    // Enforces the schema-evolution rules for claims on the defining system
    // attributes and accumulates prospective attributes and idents.
    fn collect_schema_change(
        &mut self,
        root: &Root,
        claim: &Claim,
        datum: &Datum,
    ) -> DbResult<()> {
        match datum.a {
            sys::DB_IDENT => {
                let Value::Str(name) = &datum.v else {
                    return Ok(());
                };
                let ident = Ident::from(name.as_str());
                let eff = self.effective_e(datum.e);
                if let Some(attr) = root.schema.attr_by_id(eff) {
                    if claim.retract {
                        return Err(DbError::AttrIdentRetractDisallowed {
                            datum: datum.clone(),
                        });
                    }
                    if ident != attr.ident {
                        return Err(DbError::AttrIdentChangeDisallowed {
                            datum: datum.clone(),
                        });
                    }
                } else {
                    if !sys::valid_user_ident(&ident) {
                        return Err(DbError::InvalidUserIdent {
                            datum: datum.clone(),
                        });
                    }
                    if claim.retract {
                        self.ident_deletes.insert(eff, ident);
                    } else {
                        self.ident_creates.insert(eff, ident);
                    }
                }
            }
            sys::ATTR_TYPE => {
                self.collect_attr_field(root, claim, datum, AttrField::Type)?;
            }
            sys::ATTR_CARDINALITY => {
                self.collect_attr_field(root, claim, datum, AttrField::Cardinality)?;
            }
            sys::ATTR_UNIQUE => {
                self.collect_attr_field(root, claim, datum, AttrField::Unique)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn collect_attr_field(
        &mut self,
        root: &Root,
        claim: &Claim,
        datum: &Datum,
        field: AttrField,
    ) -> DbResult<()> {
        let Value::Ref(value) = datum.v else {
            return Ok(());
        };
        if claim.retract {
            return Err(DbError::AttrRetractDisallowed {
                datum: datum.clone(),
            });
        }
        let eff = self.effective_e(datum.e);
        if let Some(attr) = root.schema.attr_by_id(eff) {
            if field.get(attr) != value {
                return Err(field.change_disallowed(datum.clone()));
            }
        } else {
            let entry = self.attr_changes.entry(eff).or_insert_with(|| Attr {
                id: eff,
                ..Attr::default()
            });
            *field.get_mut(entry) = value;
        }
        Ok(())
    }

    // Completes and validates the attributes defined by this request. Keys
    // are re-resolved through rewrites discovered after their claims, so a
    // re-declaration merges into the existing attribute and a mismatch
    // surfaces as a change-disallowed error.
    fn validate_attr_changes(&mut self, root: &Root) -> DbResult<()> {
        for (id, ident) in &self.ident_creates {
            let eff = self.effective_e(*id);
            if let Some(existing) = root.schema.attr_by_id(eff) {
                if *ident != existing.ident {
                    return Err(DbError::AttrIdentChangeDisallowed {
                        datum: Datum::new(
                            eff,
                            sys::DB_IDENT,
                            Value::Str(ident.as_str().to_owned()),
                            self.tx,
                        ),
                    });
                }
            }
        }
        let changes = std::mem::take(&mut self.attr_changes);
        for (id, mut attr) in changes {
            let eff = self.effective_e(id);
            if let Some(existing) = root.schema.attr_by_id(eff) {
                for field in [AttrField::Type, AttrField::Cardinality, AttrField::Unique] {
                    let declared = field.get(&attr);
                    if declared.is_some() && declared != field.get(existing) {
                        let datum =
                            Datum::new(eff, field.attribute(), Value::Ref(declared), self.tx);
                        return Err(field.change_disallowed(datum));
                    }
                }
                // A faithful re-declaration; nothing to install.
                continue;
            }
            let Some(ident) = self
                .ident_creates
                .get(&id)
                .or_else(|| self.ident_creates.get(&eff))
            else {
                return Err(DbError::AttrRequiresIdent { id: eff });
            };
            attr.id = eff;
            attr.ident = ident.clone();
            if !sys::valid_attr_type(attr.value_type) {
                return Err(DbError::InvalidAttrType {
                    ident: attr.ident,
                    value_type: attr.value_type,
                });
            }
            if attr.cardinality.is_some() && !sys::valid_attr_cardinality(attr.cardinality) {
                return Err(DbError::InvalidAttrCardinality {
                    ident: attr.ident,
                    cardinality: attr.cardinality,
                });
            }
            if attr.unique.is_some() && !sys::valid_unique(attr.unique) {
                return Err(DbError::InvalidAttrUnique {
                    ident: attr.ident,
                    unique: attr.unique,
                });
            }
            self.new_attrs.push(attr);
        }
        Ok(())
    }

    // Applies identity rewrites to a datum's entity and, for reference
    // values, its value. A rewrite that displaces a temp id's allocation is
    // reflected back into new_ids.
    fn apply_rewrites(&mut self, datum: &mut Datum) {
        if let Some(&target) = self.rewrites.get(&datum.e) {
            if let Some(temp) = self.assigned.get(&datum.e) {
                self.new_ids.insert(temp.clone(), target);
            }
            datum.e = target;
        }
        if let Value::Ref(v) = datum.v {
            if let Some(&target) = self.rewrites.get(&v) {
                if let Some(temp) = self.assigned.get(&v) {
                    self.new_ids.insert(temp.clone(), target);
                }
                datum.v = Value::Ref(target);
            }
        }
    }

    // Publishes ident and attribute additions. The schema is copied and
    // swapped rather than mutated, so snapshots keep their captured view.
    fn commit_schema(&mut self, root: &mut Root) {
        if self.ident_creates.is_empty()
            && self.ident_deletes.is_empty()
            && self.new_attrs.is_empty()
        {
            return;
        }
        let mut schema = (*root.schema).clone();
        for ident in self.ident_deletes.values() {
            schema.remove_ident(ident);
        }
        for (id, ident) in &self.ident_creates {
            let eff = self.effective_e(*id);
            schema.add_ident(ident.clone(), eff);
        }
        for attr in self.new_attrs.drain(..) {
            trace!(ident = %attr.ident, id = attr.id.as_u64(), "attribute defined");
            schema.add_attr(attr);
        }
        root.schema = Arc::new(schema);
    }

    fn effective_e(&self, e: Id) -> Id {
        self.rewrites.get(&e).copied().unwrap_or(e)
    }
}

// The three immutable attribute-definition fields beyond the ident.
#[derive(Clone, Copy)]
enum AttrField {
    Type,
    Cardinality,
    Unique,
}

impl AttrField {
    fn attribute(self) -> Id {
        match self {
            AttrField::Type => sys::ATTR_TYPE,
            AttrField::Cardinality => sys::ATTR_CARDINALITY,
            AttrField::Unique => sys::ATTR_UNIQUE,
        }
    }

    fn get(self, attr: &Attr) -> Id {
        match self {
            AttrField::Type => attr.value_type,
            AttrField::Cardinality => attr.cardinality,
            AttrField::Unique => attr.unique,
        }
    }

    fn get_mut(self, attr: &mut Attr) -> &mut Id {
        match self {
            AttrField::Type => &mut attr.value_type,
            AttrField::Cardinality => &mut attr.cardinality,
            AttrField::Unique => &mut attr.unique,
        }
    }

    fn change_disallowed(self, datum: Datum) -> DbError {
        match self {
            AttrField::Type => DbError::AttrTypeChangeDisallowed { datum },
            AttrField::Cardinality => DbError::AttrCardinalityChangeDisallowed { datum },
            AttrField::Unique => DbError::AttrUniqueChangeDisallowed { datum },
        }
    }
}
