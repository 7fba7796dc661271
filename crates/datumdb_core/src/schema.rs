//! Attribute definitions and the schema cache.

use crate::sys;
use crate::value::{Id, Ident};
use std::collections::{HashMap, HashSet};

/// The properties of an attribute.
///
/// Identity, type, cardinality, and uniqueness are immutable once an
/// attribute is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attr {
    /// The internal identifier.
    pub id: Id,
    /// The public identifier.
    pub ident: Ident,
    /// The type of values the attribute carries (`sys/attr/type/*`).
    pub value_type: Id,
    /// The number of values an entity may carry (`sys/attr/cardinality/*`),
    /// or [`Id::NONE`] for the default of one.
    pub cardinality: Id,
    /// The uniqueness kind (`sys/attr/unique/*`), or [`Id::NONE`].
    pub unique: Id,
    /// The reference type (`sys/attr/ref/type/*`), or [`Id::NONE`].
    pub ref_type: Id,
}

impl Attr {
    /// Creates an attribute definition with the given ident and value type.
    pub fn new(ident: impl Into<Ident>, value_type: Id) -> Self {
        Self {
            ident: ident.into(),
            value_type,
            ..Self::default()
        }
    }

    /// Declares the uniqueness kind.
    #[must_use]
    pub fn unique(mut self, kind: Id) -> Self {
        self.unique = kind;
        self
    }

    /// Declares the cardinality.
    #[must_use]
    pub fn cardinality(mut self, cardinality: Id) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// Declares the reference type.
    #[must_use]
    pub fn ref_type(mut self, ref_type: Id) -> Self {
        self.ref_type = ref_type;
        self
    }
}

/// The hot tables derived from system datums and user-asserted attribute
/// definitions.
///
/// The schema is append-only: attribute properties never change once
/// written, so a point-in-time reference stays consistent with any later
/// state for the entries it contains. The database swaps a fresh copy in
/// on schema-changing commits; snapshots keep the copy they captured.
#[derive(Debug, Clone)]
pub struct Schema {
    attrs_by_id: HashMap<Id, Attr>,
    attrs_by_ident: HashMap<Ident, Attr>,
    attr_types: HashMap<Id, Id>,
    idents: HashMap<Ident, Id>,
    unique_attrs: HashMap<Id, Id>,
    card_many: HashSet<Id>,
}

impl Schema {
    /// Creates a schema holding the system attributes, with table capacity
    /// for the expected number of user attributes and idents.
    #[must_use]
    pub fn with_capacity(attrs_capacity: usize, idents_capacity: usize) -> Self {
        let sys_attrs = sys::attrs();
        let attrs_capacity = attrs_capacity + sys_attrs.len();
        let mut schema = Self {
            attrs_by_id: HashMap::with_capacity(attrs_capacity),
            attrs_by_ident: HashMap::with_capacity(attrs_capacity),
            attr_types: HashMap::with_capacity(attrs_capacity),
            idents: HashMap::with_capacity(idents_capacity),
            unique_attrs: HashMap::with_capacity(attrs_capacity),
            card_many: HashSet::with_capacity(attrs_capacity),
        };
        for attr in sys_attrs {
            schema.add_attr(attr);
        }
        for (ident, id) in sys::idents() {
            schema.idents.insert(ident, id);
        }
        schema
    }

    /// Returns the declared value type of an attribute.
    #[must_use]
    pub fn value_type(&self, a: Id) -> Option<Id> {
        self.attr_types.get(&a).copied()
    }

    /// Returns the uniqueness kind of an attribute, if it has one.
    #[must_use]
    pub fn unique_kind(&self, a: Id) -> Option<Id> {
        self.unique_attrs.get(&a).copied()
    }

    /// Returns true if the attribute is unique (either kind).
    #[must_use]
    pub fn is_unique(&self, a: Id) -> bool {
        self.unique_attrs.contains_key(&a)
    }

    /// Returns true if the attribute has cardinality many.
    #[must_use]
    pub fn is_many(&self, a: Id) -> bool {
        self.card_many.contains(&a)
    }

    /// Returns true if the attribute carries reference values.
    #[must_use]
    pub fn is_ref(&self, a: Id) -> bool {
        self.value_type(a) == Some(sys::ATTR_TYPE_REF)
    }

    /// Resolves an ident to its entity id.
    #[must_use]
    pub fn ident_id(&self, ident: &Ident) -> Option<Id> {
        self.idents.get(ident).copied()
    }

    /// Returns the attribute with the given id.
    #[must_use]
    pub fn attr_by_id(&self, id: Id) -> Option<&Attr> {
        self.attrs_by_id.get(&id)
    }

    /// Returns the attribute with the given ident.
    #[must_use]
    pub fn attr_by_ident(&self, ident: &Ident) -> Option<&Attr> {
        self.attrs_by_ident.get(ident)
    }

    /// Resolves an attribute id to its ident.
    #[must_use]
    pub fn attr_ident(&self, id: Id) -> Option<&Ident> {
        self.attrs_by_id.get(&id).map(|attr| &attr.ident)
    }

    /// Iterates over all attributes.
    pub fn attrs(&self) -> impl Iterator<Item = &Attr> {
        self.attrs_by_id.values()
    }

    /// Iterates over all idents.
    pub fn idents(&self) -> impl Iterator<Item = (&Ident, Id)> {
        self.idents.iter().map(|(ident, id)| (ident, *id))
    }

    pub(crate) fn add_ident(&mut self, ident: Ident, id: Id) {
        self.idents.insert(ident, id);
    }

    pub(crate) fn remove_ident(&mut self, ident: &Ident) {
        self.idents.remove(ident);
    }

    pub(crate) fn add_attr(&mut self, attr: Attr) {
        self.idents.insert(attr.ident.clone(), attr.id);
        self.attr_types.insert(attr.id, attr.value_type);
        if attr.cardinality == sys::ATTR_CARDINALITY_MANY {
            self.card_many.insert(attr.id);
        }
        if attr.unique.is_some() {
            self.unique_attrs.insert(attr.id, attr.unique);
        }
        self.attrs_by_ident.insert(attr.ident.clone(), attr.clone());
        self.attrs_by_id.insert(attr.id, attr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::with_capacity(8, 8)
    }

    #[test]
    fn system_attrs_are_present() {
        let schema = schema();
        assert_eq!(schema.value_type(sys::DB_IDENT), Some(sys::ATTR_TYPE_STRING));
        assert_eq!(schema.unique_kind(sys::DB_IDENT), Some(sys::ATTR_UNIQUE_IDENTITY));
        assert!(schema.is_ref(sys::ATTR_TYPE));
        assert!(!schema.is_many(sys::DB_IDENT));
    }

    #[test]
    fn system_idents_resolve() {
        let schema = schema();
        assert_eq!(
            schema.ident_id(&Ident::from("sys/attr/cardinality/many")),
            Some(sys::ATTR_CARDINALITY_MANY)
        );
        assert_eq!(schema.ident_id(&Ident::from("nope")), None);
    }

    #[test]
    fn add_attr_updates_all_tables() {
        let mut schema = schema();
        let attr = Attr::new("person/aliases", sys::ATTR_TYPE_STRING)
            .cardinality(sys::ATTR_CARDINALITY_MANY)
            .unique(sys::ATTR_UNIQUE_VALUE);
        let attr = Attr {
            id: Id(0x0010_0001),
            ..attr
        };
        schema.add_attr(attr.clone());

        assert_eq!(schema.value_type(attr.id), Some(sys::ATTR_TYPE_STRING));
        assert!(schema.is_many(attr.id));
        assert_eq!(schema.unique_kind(attr.id), Some(sys::ATTR_UNIQUE_VALUE));
        assert_eq!(schema.ident_id(&attr.ident), Some(attr.id));
        assert_eq!(schema.attr_by_ident(&attr.ident), Some(&attr));
        assert_eq!(schema.attr_ident(attr.id), Some(&attr.ident));
    }

    #[test]
    fn ident_bijection_for_attrs() {
        let schema = schema();
        for attr in schema.attrs() {
            assert_eq!(schema.ident_id(&attr.ident), Some(attr.id));
        }
    }
}
