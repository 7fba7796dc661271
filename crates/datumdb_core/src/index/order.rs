//! Sort orders and scan prefixes over typed datums.
//!
//! Each composite index sorts by one permutation of (E, A, V); the
//! transaction id never participates in ordering. The comparator families
//! are written once over [`StorageKey`] and instantiated per storage type.

use crate::index::typed::{StorageKey, TypedDatum};
use crate::index::tree::Cmp;
use std::cmp::Ordering;

/// The sort order of an index: which permutation of (E, A, V) it uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Entity, attribute, value. The primary index.
    Eav,
    /// Attribute, entity, value.
    Aev,
    /// Attribute, value, entity. Maintained for unique attributes.
    Ave,
    /// Value, attribute, entity. Maintained for reference attributes.
    Vae,
}

impl SortOrder {
    /// Returns the full-tuple comparator for this order over a storage type.
    #[must_use]
    pub fn comparator<X: StorageKey>(self) -> Cmp<TypedDatum<X>> {
        match self {
            SortOrder::Eav => cmp_eav::<X>,
            SortOrder::Aev => cmp_aev::<X>,
            SortOrder::Ave => cmp_ave::<X>,
            SortOrder::Vae => cmp_vae::<X>,
        }
    }
}

/// A partial-index key shape for range scans.
///
/// The shape must be a prefix of the target index's sort order; matching
/// datums are then contiguous in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    /// All datums of an entity. Only meaningful against EAV, with fan-out.
    E,
    /// All datums of an entity and attribute, against EAV.
    Ea,
    /// All datums of an attribute and entity, against AEV.
    Ae,
    /// All datums of an attribute, against AEV or AVE.
    A,
    /// All datums of an attribute and value, against AVE.
    Av,
    /// All datums of a value and attribute, against VAE.
    Va,
}

impl Prefix {
    /// Compares the populated positions of `prefix` against a stored datum.
    pub(crate) fn compare<X: StorageKey>(
        self,
        prefix: &TypedDatum<X>,
        datum: &TypedDatum<X>,
    ) -> Ordering {
        match self {
            Prefix::E => cmp_e(prefix, datum),
            Prefix::Ea => cmp_e(prefix, datum).then_with(|| cmp_a(prefix, datum)),
            Prefix::Ae => cmp_a(prefix, datum).then_with(|| cmp_e(prefix, datum)),
            Prefix::A => cmp_a(prefix, datum),
            Prefix::Av => cmp_a(prefix, datum).then_with(|| cmp_v(prefix, datum)),
            Prefix::Va => cmp_v(prefix, datum).then_with(|| cmp_a(prefix, datum)),
        }
    }
}

fn cmp_e<X: StorageKey>(d1: &TypedDatum<X>, d2: &TypedDatum<X>) -> Ordering {
    d1.e.cmp(&d2.e)
}

fn cmp_a<X: StorageKey>(d1: &TypedDatum<X>, d2: &TypedDatum<X>) -> Ordering {
    d1.a.cmp(&d2.a)
}

fn cmp_v<X: StorageKey>(d1: &TypedDatum<X>, d2: &TypedDatum<X>) -> Ordering {
    d1.v.key_cmp(&d2.v)
}

fn cmp_eav<X: StorageKey>(d1: &TypedDatum<X>, d2: &TypedDatum<X>) -> Ordering {
    cmp_e(d1, d2)
        .then_with(|| cmp_a(d1, d2))
        .then_with(|| cmp_v(d1, d2))
}

fn cmp_aev<X: StorageKey>(d1: &TypedDatum<X>, d2: &TypedDatum<X>) -> Ordering {
    cmp_a(d1, d2)
        .then_with(|| cmp_e(d1, d2))
        .then_with(|| cmp_v(d1, d2))
}

fn cmp_ave<X: StorageKey>(d1: &TypedDatum<X>, d2: &TypedDatum<X>) -> Ordering {
    cmp_a(d1, d2)
        .then_with(|| cmp_v(d1, d2))
        .then_with(|| cmp_e(d1, d2))
}

fn cmp_vae<X: StorageKey>(d1: &TypedDatum<X>, d2: &TypedDatum<X>) -> Ordering {
    cmp_v(d1, d2)
        .then_with(|| cmp_a(d1, d2))
        .then_with(|| cmp_e(d1, d2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Id;

    fn td(e: u64, a: u64, v: i64) -> TypedDatum<i64> {
        TypedDatum {
            e: Id(e),
            a: Id(a),
            v,
            t: Id::NONE,
        }
    }

    #[test]
    fn eav_orders_by_entity_first() {
        let cmp = SortOrder::Eav.comparator::<i64>();
        assert_eq!(cmp(&td(1, 9, 9), &td(2, 1, 1)), Ordering::Less);
        assert_eq!(cmp(&td(1, 2, 9), &td(1, 3, 1)), Ordering::Less);
        assert_eq!(cmp(&td(1, 2, 3), &td(1, 2, 4)), Ordering::Less);
        assert_eq!(cmp(&td(1, 2, 3), &td(1, 2, 3)), Ordering::Equal);
    }

    #[test]
    fn ave_orders_by_value_before_entity() {
        let cmp = SortOrder::Ave.comparator::<i64>();
        assert_eq!(cmp(&td(9, 1, 5), &td(1, 1, 6)), Ordering::Less);
        assert_eq!(cmp(&td(1, 1, 5), &td(2, 1, 5)), Ordering::Less);
        assert_eq!(cmp(&td(1, 1, 5), &td(1, 2, 0)), Ordering::Less);
    }

    #[test]
    fn vae_orders_by_value_first() {
        let cmp = SortOrder::Vae.comparator::<i64>();
        assert_eq!(cmp(&td(9, 9, 1), &td(1, 1, 2)), Ordering::Less);
        assert_eq!(cmp(&td(9, 1, 2), &td(1, 2, 2)), Ordering::Less);
    }

    #[test]
    fn comparators_ignore_transaction() {
        let cmp = SortOrder::Eav.comparator::<i64>();
        let mut d1 = td(1, 2, 3);
        let mut d2 = td(1, 2, 3);
        d1.t = Id(100);
        d2.t = Id(200);
        assert_eq!(cmp(&d1, &d2), Ordering::Equal);
    }

    #[test]
    fn prefix_compare_ignores_unpopulated_positions() {
        let prefix = td(1, 0, 0);
        assert_eq!(Prefix::E.compare(&prefix, &td(1, 9, 9)), Ordering::Equal);
        assert_eq!(Prefix::E.compare(&prefix, &td(2, 0, 0)), Ordering::Less);

        let prefix = td(1, 2, 0);
        assert_eq!(Prefix::Ea.compare(&prefix, &td(1, 2, 9)), Ordering::Equal);
        assert_eq!(Prefix::Ea.compare(&prefix, &td(1, 3, 0)), Ordering::Less);

        let prefix = td(0, 2, 7);
        assert_eq!(Prefix::Av.compare(&prefix, &td(9, 2, 7)), Ordering::Equal);
        assert_eq!(Prefix::Av.compare(&prefix, &td(9, 2, 8)), Ordering::Less);
    }

    #[test]
    fn float_ordering_is_total() {
        let cmp = SortOrder::Eav.comparator::<f64>();
        let low = TypedDatum {
            e: Id(1),
            a: Id(1),
            v: -1.5f64,
            t: Id::NONE,
        };
        let high = TypedDatum {
            e: Id(1),
            a: Id(1),
            v: 2.5f64,
            t: Id::NONE,
        };
        assert_eq!(cmp(&low, &high), Ordering::Less);
        assert_eq!(cmp(&high, &low), Ordering::Greater);
    }
}
