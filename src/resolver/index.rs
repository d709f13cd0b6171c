// src/resolver/index.rs

//! Provides and package-name indexes over one repository catalog

use crate::error::Result;
use crate::packages::{PackageUnit, Versioned};
use crate::version::compare_evr;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// capability name -> package name -> newest unit of that package providing it
pub type ProvidesIndex = HashMap<String, HashMap<String, Arc<PackageUnit>>>;

/// package name -> every version in the catalog, in catalog order
pub type PackagesIndex = HashMap<String, Vec<Arc<PackageUnit>>>;

/// Both lookup structures the solver needs, built in one pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageIndex {
    provides: ProvidesIndex,
    packages: PackagesIndex,
    unit_count: usize,
}

impl PackageIndex {
    /// Build the index from a catalog, consuming it once
    pub fn build<I, U>(catalog: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<Arc<PackageUnit>>,
    {
        let mut index = Self::default();
        for unit in catalog {
            index.insert(unit.into());
        }
        info!(
            "Built package index: {} units, {} package names, {} capabilities",
            index.unit_count,
            index.packages.len(),
            index.provides.len()
        );
        index
    }

    /// Build the index from a fallible stream such as a primary parser
    ///
    /// Stops at the first error; the partial index is dropped.
    pub fn try_build<I>(catalog: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<PackageUnit>>,
    {
        let mut index = Self::default();
        for unit in catalog {
            index.insert(Arc::new(unit?));
        }
        info!(
            "Built package index: {} units, {} package names, {} capabilities",
            index.unit_count,
            index.packages.len(),
            index.provides.len()
        );
        Ok(index)
    }

    /// Register one unit under its name and under every capability it provides
    ///
    /// For a given (capability, package name) pair the first unit seen is kept
    /// unless a later one is strictly newer.
    pub fn insert(&mut self, unit: Arc<PackageUnit>) {
        for provide in &unit.provides {
            let providers = self.provides.entry(provide.name.clone()).or_default();
            let newer = providers.get(&unit.name).map_or(true, |current| {
                compare_evr(&unit.evr(), &current.evr()) == Ordering::Greater
            });
            if newer {
                providers.insert(unit.name.clone(), Arc::clone(&unit));
            }
        }

        debug!("Indexed {}", unit);
        self.packages
            .entry(unit.name.clone())
            .or_default()
            .push(unit);
        self.unit_count += 1;
    }

    /// Newest providers of a capability, one per providing package name
    pub fn providers(&self, capability: &str) -> impl Iterator<Item = &Arc<PackageUnit>> {
        self.provides
            .get(capability)
            .into_iter()
            .flat_map(|by_name| by_name.values())
    }

    /// Every version of a package
    pub fn versions(&self, name: &str) -> &[Arc<PackageUnit>] {
        self.packages.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Newest version of a package; the first encountered wins ties
    pub fn newest(&self, name: &str) -> Option<&Arc<PackageUnit>> {
        newest_of(self.versions(name).iter())
    }

    pub fn provides(&self) -> &ProvidesIndex {
        &self.provides
    }

    pub fn packages(&self) -> &PackagesIndex {
        &self.packages
    }

    /// Number of units indexed
    pub fn len(&self) -> usize {
        self.unit_count
    }

    pub fn is_empty(&self) -> bool {
        self.unit_count == 0
    }

    /// Every indexed unit, grouped by package name
    pub fn units(&self) -> impl Iterator<Item = &Arc<PackageUnit>> {
        self.packages.values().flatten()
    }
}

/// Maximum by EVR, keeping the earliest of equal candidates
pub(crate) fn newest_of<'a, T, I>(candidates: I) -> Option<&'a T>
where
    T: Versioned + 'a,
    I: IntoIterator<Item = &'a T>,
{
    candidates.into_iter().fold(None, |best, candidate| match best {
        Some(current) if compare_evr(&candidate.evr(), &current.evr()) != Ordering::Greater => {
            Some(current)
        }
        _ => Some(candidate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::{Capability, ChecksumType};

    fn unit(name: &str, version: &str, provides: &[&str]) -> PackageUnit {
        PackageUnit::new(name, "0", version, "1", "x86_64")
            .with_checksum(ChecksumType::Sha256, format!("{}-{}", name, version))
            .with_provides(provides.iter().map(|p| Capability::named(*p)).collect())
    }

    fn catalog() -> Vec<PackageUnit> {
        vec![
            unit("httpd", "2.4.1", &["httpd", "webserver"]),
            unit("httpd", "2.4.10", &["httpd", "webserver"]),
            unit("httpd", "2.4.2", &["httpd", "webserver"]),
            unit("nginx", "1.20", &["nginx", "webserver"]),
        ]
    }

    #[test]
    fn test_provides_keeps_newest_per_package() {
        let index = PackageIndex::build(catalog());
        let web = &index.provides()["webserver"];
        assert_eq!(web.len(), 2);
        assert_eq!(web["httpd"].version, "2.4.10");
        assert_eq!(web["nginx"].version, "1.20");
    }

    #[test]
    fn test_packages_keeps_every_version() {
        let index = PackageIndex::build(catalog());
        assert_eq!(index.versions("httpd").len(), 3);
        assert_eq!(index.versions("missing").len(), 0);
        assert_eq!(index.len(), 4);
        assert_eq!(index.newest("httpd").unwrap().version, "2.4.10");
    }

    #[test]
    fn test_build_is_idempotent() {
        assert_eq!(PackageIndex::build(catalog()), PackageIndex::build(catalog()));
    }

    #[test]
    fn test_equal_versions_keep_first_seen() {
        let first = unit("foo", "1.0", &["foo"]).with_checksum(ChecksumType::Sha256, "first");
        let second = unit("foo", "1.0", &["foo"]).with_checksum(ChecksumType::Sha256, "second");
        let index = PackageIndex::build(vec![first, second]);
        assert_eq!(index.provides()["foo"]["foo"].checksum, "first");
        assert_eq!(index.newest("foo").unwrap().checksum, "first");
    }

    #[test]
    fn test_try_build_propagates_errors() {
        let stream = vec![
            Ok(unit("foo", "1.0", &["foo"])),
            Err(crate::Error::ParseError("broken".to_string())),
        ];
        assert!(PackageIndex::try_build(stream).is_err());
    }
}
