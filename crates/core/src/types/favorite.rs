//! Favorite cars of a visitor.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::id::CarId;

/// Identity a favorite set belongs to.
///
/// Public visitors are anonymous; the storefront mints a stable id per
/// session and uses it as the owner key in the `favorites` table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FavoriteOwner(String);

impl FavoriteOwner {
    /// Wrap an owner key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FavoriteOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Set of favorited car ids. Membership is the only semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FavoriteSet(BTreeSet<CarId>);

impl FavoriteSet {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Returns `true` if the id was not already present.
    pub fn insert(&mut self, id: CarId) -> bool {
        self.0.insert(id)
    }

    /// Returns `true` if the id was present.
    pub fn remove(&mut self, id: CarId) -> bool {
        self.0.remove(&id)
    }

    /// Flip membership of `id`, returning whether it is now a favorite.
    pub fn toggle(&mut self, id: CarId) -> bool {
        if self.0.remove(&id) {
            false
        } else {
            self.0.insert(id);
            true
        }
    }

    #[must_use]
    pub fn contains(&self, id: CarId) -> bool {
        self.0.contains(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = CarId> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<CarId> for FavoriteSet {
    fn from_iter<T: IntoIterator<Item = CarId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for FavoriteSet {
    type Item = CarId;
    type IntoIter = std::collections::btree_set::IntoIter<CarId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle() {
        let id = CarId::generate();
        let mut set = FavoriteSet::new();
        assert!(set.toggle(id));
        assert!(set.contains(id));
        assert!(!set.toggle(id));
        assert!(set.is_empty());
    }

    #[test]
    fn test_duplicates_collapse() {
        let id = CarId::generate();
        let set: FavoriteSet = [id, id, CarId::generate()].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_serializes_as_array() {
        let id = CarId::generate();
        let set: FavoriteSet = std::iter::once(id).collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, format!("[\"{id}\"]"));
        let back: FavoriteSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
