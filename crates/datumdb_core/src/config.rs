//! Database configuration.

/// Configuration for constructing a database.
///
/// A zero value for any knob falls back to its default at construction.
#[derive(Debug, Clone)]
pub struct Config {
    /// Branching factor of the index trees (minimum B-tree degree).
    pub degree: usize,

    /// Expected number of user attributes, used to size the schema tables.
    pub attrs_capacity: usize,

    /// Expected number of idents, used to size the ident table.
    pub idents_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            degree: 64,
            attrs_capacity: 256,
            idents_capacity: 1024,
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the index tree degree.
    #[must_use]
    pub const fn degree(mut self, degree: usize) -> Self {
        self.degree = degree;
        self
    }

    /// Sets the expected attribute count.
    #[must_use]
    pub const fn attrs_capacity(mut self, capacity: usize) -> Self {
        self.attrs_capacity = capacity;
        self
    }

    /// Sets the expected ident count.
    #[must_use]
    pub const fn idents_capacity(mut self, capacity: usize) -> Self {
        self.idents_capacity = capacity;
        self
    }

    pub(crate) fn resolved(&self) -> Self {
        let defaults = Self::default();
        Self {
            degree: if self.degree == 0 {
                defaults.degree
            } else {
                self.degree
            },
            attrs_capacity: if self.attrs_capacity == 0 {
                defaults.attrs_capacity
            } else {
                self.attrs_capacity
            },
            idents_capacity: if self.idents_capacity == 0 {
                defaults.idents_capacity
            } else {
                self.idents_capacity
            },
        }
    }
}
