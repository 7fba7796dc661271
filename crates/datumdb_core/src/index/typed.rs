//! Typed indexes over a single storage representation.
//!
//! Storing datums with a concrete value type keeps tuples flat and lets the
//! tree compare values without tag dispatch. The composite index converts
//! between [`crate::Value`] and the four storage representations.

use crate::index::order::{Prefix, SortOrder};
use crate::index::tree::{Ascend, BTree};
use crate::value::Id;
use std::cmp::Ordering;

/// A storage representation for datum values: one of `String`, `i64`,
/// `u64`, or `f64`.
pub trait StorageKey: Clone + PartialEq {
    /// The least value of the representation, used for unpopulated prefix
    /// positions.
    fn min_value() -> Self;

    /// Total comparison. For floats this is `total_cmp`; NaN never reaches
    /// storage.
    fn key_cmp(&self, other: &Self) -> Ordering;
}

impl StorageKey for String {
    fn min_value() -> Self {
        String::new()
    }

    fn key_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl StorageKey for i64 {
    fn min_value() -> Self {
        i64::MIN
    }

    fn key_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl StorageKey for u64 {
    fn min_value() -> Self {
        0
    }

    fn key_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl StorageKey for f64 {
    fn min_value() -> Self {
        f64::NEG_INFINITY
    }

    fn key_cmp(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

/// A datum with a concrete storage type for its value.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedDatum<X> {
    /// The entity id.
    pub e: Id,
    /// The attribute id.
    pub a: Id,
    /// The value in its storage representation.
    pub v: X,
    /// The transaction id.
    pub t: Id,
}

impl<X: StorageKey> TypedDatum<X> {
    /// A seed for prefix scans: the unpopulated positions hold their least
    /// values.
    #[must_use]
    pub fn seed(e: Id, a: Id) -> Self {
        Self {
            e,
            a,
            v: X::min_value(),
            t: Id::NONE,
        }
    }
}

/// A sorted set of typed datums in one sort order.
///
/// The basis for identity is the (E, A, V) projection; `t` rides along. An
/// insert of an already-present datum keeps the stored one, preferring the
/// earliest transaction that introduced it.
#[derive(Clone)]
pub struct TypedIndex<X: StorageKey> {
    tree: BTree<TypedDatum<X>>,
}

impl<X: StorageKey> TypedIndex<X> {
    /// Creates an empty index of the given tree degree and sort order.
    #[must_use]
    pub fn new(degree: usize, order: SortOrder) -> Self {
        Self {
            tree: BTree::new(degree, order.comparator::<X>()),
        }
    }

    /// Returns the stored datum matching `datum` on (E, A, V).
    #[must_use]
    pub fn get(&self, datum: &TypedDatum<X>) -> Option<&TypedDatum<X>> {
        self.tree.get(datum)
    }

    /// Returns true if a datum matching on (E, A, V) is present.
    #[must_use]
    pub fn find(&self, datum: &TypedDatum<X>) -> bool {
        self.tree.contains(datum)
    }

    /// Ensures the datum is present, returning true if it already was.
    pub fn insert(&mut self, datum: TypedDatum<X>) -> bool {
        self.tree.insert(datum)
    }

    /// Ensures no datum matching on (E, A, V) is present, returning true if
    /// one was removed.
    pub fn delete(&mut self, datum: &TypedDatum<X>) -> bool {
        self.tree.delete(datum)
    }

    /// Scans the datums matching the prefix, in index order.
    pub fn select(
        &self,
        prefix: Prefix,
        seed: TypedDatum<X>,
    ) -> impl Iterator<Item = &TypedDatum<X>> + '_ {
        self.tree
            .ascend(&seed)
            .take_while(move |datum| prefix.compare(&seed, datum) == Ordering::Equal)
    }

    /// Returns the first datum matching the prefix, if any.
    #[must_use]
    pub fn first(&self, prefix: Prefix, seed: TypedDatum<X>) -> Option<&TypedDatum<X>> {
        self.select(prefix, seed).next()
    }

    /// Counts the datums matching the prefix without materializing them.
    #[must_use]
    pub fn count(&self, prefix: Prefix, seed: TypedDatum<X>) -> usize {
        self.select(prefix, seed).count()
    }

    /// Iterates over all datums in index order.
    pub fn iter(&self) -> Ascend<'_, TypedDatum<X>> {
        self.tree.iter()
    }

    /// Returns the number of datums.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns true if the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn td(e: u64, a: u64, v: i64, t: u64) -> TypedDatum<i64> {
        TypedDatum {
            e: Id(e),
            a: Id(a),
            v,
            t: Id(t),
        }
    }

    fn populated(order: SortOrder) -> TypedIndex<i64> {
        let mut index = TypedIndex::new(2, order);
        for (e, a, v) in [
            (1, 10, 5),
            (1, 10, 7),
            (1, 11, 5),
            (2, 10, 5),
            (2, 11, 9),
            (3, 10, 5),
        ] {
            index.insert(td(e, a, v, 100));
        }
        index
    }

    #[test]
    fn insert_retains_earliest_transaction() {
        let mut index = TypedIndex::new(2, SortOrder::Eav);
        assert!(!index.insert(td(1, 10, 5, 100)));
        assert!(index.insert(td(1, 10, 5, 200)));
        assert_eq!(index.get(&td(1, 10, 5, 0)).map(|d| d.t), Some(Id(100)));
    }

    #[test]
    fn find_ignores_transaction() {
        let index = populated(SortOrder::Eav);
        assert!(index.find(&td(1, 10, 5, 0)));
        assert!(index.find(&td(1, 10, 5, 999)));
        assert!(!index.find(&td(1, 10, 6, 0)));
    }

    #[test]
    fn delete_by_eav() {
        let mut index = populated(SortOrder::Eav);
        assert!(index.delete(&td(1, 10, 7, 0)));
        assert!(!index.delete(&td(1, 10, 7, 0)));
        assert!(!index.find(&td(1, 10, 7, 0)));
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn select_by_entity_prefix() {
        let index = populated(SortOrder::Eav);
        let hits: Vec<(u64, u64, i64)> = index
            .select(Prefix::E, TypedDatum::seed(Id(1), Id::NONE))
            .map(|d| (d.e.as_u64(), d.a.as_u64(), d.v))
            .collect();
        assert_eq!(hits, vec![(1, 10, 5), (1, 10, 7), (1, 11, 5)]);
    }

    #[test]
    fn select_by_ea_prefix() {
        let index = populated(SortOrder::Eav);
        let hits: Vec<i64> = index
            .select(Prefix::Ea, TypedDatum::seed(Id(1), Id(10)))
            .map(|d| d.v)
            .collect();
        assert_eq!(hits, vec![5, 7]);
    }

    #[test]
    fn ave_sorts_value_before_entity() {
        let index = populated(SortOrder::Ave);
        let hits: Vec<(i64, u64)> = index
            .select(Prefix::A, TypedDatum::seed(Id::NONE, Id(10)))
            .map(|d| (d.v, d.e.as_u64()))
            .collect();
        assert_eq!(hits, vec![(5, 1), (5, 2), (5, 3), (7, 1)]);
    }

    #[test]
    fn ave_av_prefix_finds_owners() {
        let index = populated(SortOrder::Ave);
        let seed = TypedDatum {
            e: Id::NONE,
            a: Id(10),
            v: 5,
            t: Id::NONE,
        };
        let owners: Vec<u64> = index
            .select(Prefix::Av, seed)
            .map(|d| d.e.as_u64())
            .collect();
        assert_eq!(owners, vec![1, 2, 3]);
    }

    #[test]
    fn first_and_count() {
        let index = populated(SortOrder::Aev);
        let seed = TypedDatum::seed(Id::NONE, Id(10));
        assert_eq!(index.first(Prefix::A, seed.clone()).map(|d| d.e), Some(Id(1)));
        assert_eq!(index.count(Prefix::A, seed), 4);
        assert_eq!(index.count(Prefix::A, TypedDatum::seed(Id::NONE, Id(99))), 0);
    }
}
