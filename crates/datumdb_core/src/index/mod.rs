//! Datum indexes on persistent copy-on-write B-trees.

mod composite;
mod order;
mod tree;
mod typed;

pub use composite::CompositeIndex;
pub use order::{Prefix, SortOrder};
pub use tree::{Ascend, BTree, Cmp};
pub use typed::{StorageKey, TypedDatum, TypedIndex};
