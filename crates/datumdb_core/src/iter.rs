//! Lazy, forward-only datum sequences.

use crate::datum::Datum;
use std::fmt;

/// A forward-only, single-pass sequence of datums.
///
/// Sequences are lazy: elements are produced on demand from the underlying
/// index cursors, and dropping a sequence before exhaustion releases them.
/// No restartability is guaranteed; construct a new scan to start over.
pub struct Datums<'a> {
    inner: Box<dyn Iterator<Item = Datum> + 'a>,
}

impl<'a> Datums<'a> {
    /// Wraps an iterator as a datum sequence.
    pub fn new(iter: impl Iterator<Item = Datum> + 'a) -> Self {
        Self {
            inner: Box::new(iter),
        }
    }

    /// An empty sequence.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    /// A one-element sequence.
    #[must_use]
    pub fn once(datum: Datum) -> Self {
        Self::new(std::iter::once(datum))
    }

    /// Concatenates two sequences, yielding this sequence's elements first.
    #[must_use]
    pub fn chain(self, other: Datums<'a>) -> Self {
        Self::new(self.inner.chain(other.inner))
    }
}

impl Iterator for Datums<'_> {
    type Item = Datum;

    fn next(&mut self) -> Option<Datum> {
        self.inner.next()
    }
}

impl fmt::Debug for Datums<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Datums(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Id, Value};

    fn datum(e: u64) -> Datum {
        Datum::new(Id(e), Id(1), Value::Int(0), Id(5))
    }

    #[test]
    fn empty_and_once() {
        assert_eq!(Datums::empty().count(), 0);
        let datums: Vec<Datum> = Datums::once(datum(1)).collect();
        assert_eq!(datums, vec![datum(1)]);
    }

    #[test]
    fn chain_preserves_order() {
        let first = Datums::new([datum(1), datum(2)].into_iter());
        let second = Datums::once(datum(3));
        let es: Vec<u64> = first.chain(second).map(|d| d.e.as_u64()).collect();
        assert_eq!(es, vec![1, 2, 3]);
    }

    #[test]
    fn partial_consumption() {
        let mut datums = Datums::new((1..100).map(datum));
        assert_eq!(datums.next().map(|d| d.e), Some(Id(1)));
        assert_eq!(datums.next().map(|d| d.e), Some(Id(2)));
        drop(datums);
    }
}
