// src/packages/set.rs

//! Ordered, de-duplicated collection of package units

use crate::packages::keys::ContentKey;
use crate::packages::unit::PackageUnit;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::sync::Arc;

/// Set of package units keyed by [`ContentKey`]
///
/// Iteration follows key order, so anything computed from a `PackageSet`
/// comes out the same way for the same input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageSet {
    units: BTreeMap<ContentKey, Arc<PackageUnit>>,
}

impl PackageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit; returns false if a unit with the same key was present
    pub fn insert(&mut self, unit: Arc<PackageUnit>) -> bool {
        match self.units.entry(unit.content_key()) {
            btree_map::Entry::Occupied(_) => false,
            btree_map::Entry::Vacant(slot) => {
                slot.insert(unit);
                true
            }
        }
    }

    pub fn contains(&self, key: &ContentKey) -> bool {
        self.units.contains_key(key)
    }

    pub fn get(&self, key: &ContentKey) -> Option<&Arc<PackageUnit>> {
        self.units.get(key)
    }

    pub fn remove(&mut self, key: &ContentKey) -> Option<Arc<PackageUnit>> {
        self.units.remove(key)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<PackageUnit>> {
        self.units.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ContentKey> {
        self.units.keys()
    }

    /// Keep only the units for which `keep` returns true
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&PackageUnit) -> bool,
    {
        self.units.retain(|_, unit| keep(unit));
    }

    /// Units in `self` whose key is not in `other`
    pub fn difference(&self, other: &PackageSet) -> PackageSet {
        self.units
            .iter()
            .filter(|(key, _)| !other.contains(key))
            .map(|(_, unit)| Arc::clone(unit))
            .collect()
    }
}

impl Extend<Arc<PackageUnit>> for PackageSet {
    fn extend<I: IntoIterator<Item = Arc<PackageUnit>>>(&mut self, iter: I) {
        for unit in iter {
            self.insert(unit);
        }
    }
}

impl FromIterator<Arc<PackageUnit>> for PackageSet {
    fn from_iter<I: IntoIterator<Item = Arc<PackageUnit>>>(iter: I) -> Self {
        let mut set = PackageSet::new();
        set.extend(iter);
        set
    }
}

impl FromIterator<PackageUnit> for PackageSet {
    fn from_iter<I: IntoIterator<Item = PackageUnit>>(iter: I) -> Self {
        iter.into_iter().map(Arc::new).collect()
    }
}

impl IntoIterator for PackageSet {
    type Item = Arc<PackageUnit>;
    type IntoIter = btree_map::IntoValues<ContentKey, Arc<PackageUnit>>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.into_values()
    }
}

impl<'a> IntoIterator for &'a PackageSet {
    type Item = &'a Arc<PackageUnit>;
    type IntoIter = btree_map::Values<'a, ContentKey, Arc<PackageUnit>>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::ChecksumType;

    fn unit(name: &str, checksum: &str) -> PackageUnit {
        PackageUnit::new(name, "0", "1.0", "1", "noarch").with_checksum(ChecksumType::Sha256, checksum)
    }

    #[test]
    fn test_insert_deduplicates_by_content_key() {
        let mut set = PackageSet::new();
        assert!(set.insert(Arc::new(unit("a", "1"))));
        assert!(!set.insert(Arc::new(unit("a", "1"))));
        // Same NEVRA, different checksum is different content
        assert!(set.insert(Arc::new(unit("a", "2"))));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_iteration_is_ordered() {
        let set: PackageSet = vec![unit("c", "1"), unit("a", "1"), unit("b", "1")]
            .into_iter()
            .collect();
        let names: Vec<_> = set.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_difference() {
        let left: PackageSet = vec![unit("a", "1"), unit("b", "1")].into_iter().collect();
        let right: PackageSet = vec![unit("b", "1")].into_iter().collect();
        let diff = left.difference(&right);
        assert_eq!(diff.len(), 1);
        assert!(diff.contains(&unit("a", "1").content_key()));
    }
}
