use const_fnv1a_hash::fnv1a_hash_64;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// A unique identifier for a component, model instance or simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Id(u64);

impl Id {
    /// Creates a new ID with the given number.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Creates a pseudorandom ID by hashing a name. Equal names always hash
    /// to equal IDs.
    pub const fn from_name(name: &str) -> Self {
        Self(fnv1a_hash_64(name.as_bytes(), None))
    }

    /// Gets the underlying ID number.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl From<u64> for Id {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

impl From<Id> for u64 {
    fn from(id: Id) -> Self {
        id.0
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
