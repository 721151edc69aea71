//! The bidirectional mapping between external port names and model-native
//! port indices.

use crate::atomic::PortIndex;
use std::collections::BTreeMap;

/// A bijection between port names and port indices.
///
/// Every name maps to exactly one index and every index to exactly one name.
/// Attempts to break that are refused with a [`PortError`] and leave the
/// table unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortTable {
    by_name: BTreeMap<String, PortIndex>,
    by_index: BTreeMap<PortIndex, String>,
}

impl PortTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `(name, index)` pairs, failing on the first pair
    /// that would break the bijection.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, PortError>
    where
        I: IntoIterator<Item = (S, PortIndex)>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (name, index) in pairs {
            table.insert(name, index)?;
        }
        Ok(table)
    }

    /// Declares a port. Re-declaring an identical pair is a no-op.
    pub fn insert(&mut self, name: impl Into<String>, index: PortIndex) -> Result<(), PortError> {
        let name = name.into();
        match (self.by_name.get(&name), self.by_index.get(&index)) {
            (Some(&existing), _) if existing == index => Ok(()),
            (Some(&existing), _) => Err(PortError::DuplicateName { name, existing }),
            (None, Some(existing)) => Err(PortError::DuplicateIndex {
                index,
                existing: existing.clone(),
            }),
            (None, None) => {
                self.by_index.insert(index, name.clone());
                self.by_name.insert(name, index);
                Ok(())
            }
        }
    }

    /// Resolves an external port name.
    pub fn to_internal(&self, name: &str) -> Option<PortIndex> {
        self.by_name.get(name).copied()
    }

    /// Resolves a native port index.
    pub fn to_external(&self, index: PortIndex) -> Option<&str> {
        self.by_index.get(&index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Iterates the declared ports in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, PortIndex)> {
        self.by_name.iter().map(|(name, index)| (name.as_str(), *index))
    }

    /// The name-to-index half of the table.
    pub fn as_map(&self) -> &BTreeMap<String, PortIndex> {
        &self.by_name
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("Port name <{name}> is already mapped to index {existing}")]
    DuplicateName { name: String, existing: PortIndex },
    #[error("Port index {index} is already mapped to name <{existing}>")]
    DuplicateIndex { index: PortIndex, existing: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_both_directions() {
        let table = PortTable::from_pairs([("in", 0), ("out", 1)]).unwrap();
        assert_eq!(table.to_internal("in"), Some(0));
        assert_eq!(table.to_external(1), Some("out"));
        assert_eq!(table.to_internal("nope"), None);
        assert_eq!(table.to_external(7), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn rejects_broken_bijection() {
        let mut table = PortTable::new();
        table.insert("in", 0).unwrap();
        table.insert("in", 0).unwrap();

        assert_eq!(
            table.insert("in", 3),
            Err(PortError::DuplicateName {
                name: "in".into(),
                existing: 0
            })
        );
        assert_eq!(
            table.insert("other", 0),
            Err(PortError::DuplicateIndex {
                index: 0,
                existing: "in".into()
            })
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.to_external(3), None);
    }

    #[test]
    fn from_pairs_fails_on_collision() {
        assert!(PortTable::from_pairs([("a", 0), ("b", 0)]).is_err());
        assert!(PortTable::from_pairs([("a", 0), ("a", 1)]).is_err());
    }
}
