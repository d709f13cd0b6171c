// src/repository/retention.rs

//! Version retention
//!
//! Keeps the newest N versions of every package and reports the rest for
//! removal. Binary and source packages are counted separately.

use crate::error::{Error, Result};
use crate::packages::{PackageSet, PackageUnit, Versioned};
use crate::version::compare_evr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, info};

/// Number of versions to keep per package; always at least one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct RetentionPolicy {
    keep: NonZeroUsize,
}

impl RetentionPolicy {
    /// Validate a configured count
    pub fn new(keep: i64) -> Result<Self> {
        usize::try_from(keep)
            .ok()
            .and_then(NonZeroUsize::new)
            .map(|keep| Self { keep })
            .ok_or(Error::InvalidRetention(keep))
    }

    pub fn keep(&self) -> usize {
        self.keep.get()
    }

    /// Units that fall outside the policy
    pub fn apply(&self, units: &PackageSet) -> PackageSet {
        retain_newest(*self, units.iter())
    }
}

impl TryFrom<i64> for RetentionPolicy {
    type Error = Error;

    fn try_from(keep: i64) -> Result<Self> {
        Self::new(keep)
    }
}

impl From<RetentionPolicy> for i64 {
    fn from(policy: RetentionPolicy) -> Self {
        policy.keep() as i64
    }
}

/// Group key: source packages never compete with binaries of the same name
type RetentionGroup<'a> = (bool, &'a str, &'a str);

/// Units to remove so that at most `policy.keep()` versions remain per
/// `(name, arch)`, newest first
///
/// Equal versions keep their input order, so the result is stable for a
/// given input.
pub fn retain_newest<'a, I>(policy: RetentionPolicy, units: I) -> PackageSet
where
    I: IntoIterator<Item = &'a Arc<PackageUnit>>,
{
    let mut groups: BTreeMap<RetentionGroup<'a>, Vec<&'a Arc<PackageUnit>>> = BTreeMap::new();
    for unit in units {
        groups
            .entry((unit.is_source(), unit.name.as_str(), unit.arch.as_str()))
            .or_default()
            .push(unit);
    }

    let mut removed = PackageSet::new();
    for ((_, name, arch), mut versions) in groups {
        if versions.len() <= policy.keep() {
            continue;
        }
        versions.sort_by(|a, b| compare_evr(&b.evr(), &a.evr()));
        debug!(
            "{}.{}: keeping {} of {} version(s)",
            name,
            arch,
            policy.keep(),
            versions.len()
        );
        removed.extend(versions.into_iter().skip(policy.keep()).cloned());
    }

    info!("Retention marks {} unit(s) for removal", removed.len());
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::ChecksumType;

    fn unit(name: &str, version: &str, arch: &str) -> Arc<PackageUnit> {
        Arc::new(
            PackageUnit::new(name, "0", version, "1", arch)
                .with_checksum(ChecksumType::Sha256, format!("{}-{}-{}", name, version, arch)),
        )
    }

    fn versions(set: &PackageSet) -> Vec<String> {
        let mut versions: Vec<String> = set.iter().map(|u| u.version.clone()).collect();
        versions.sort();
        versions
    }

    #[test]
    fn test_policy_validation() {
        assert!(matches!(RetentionPolicy::new(0), Err(Error::InvalidRetention(0))));
        assert!(matches!(RetentionPolicy::new(-3), Err(Error::InvalidRetention(-3))));
        assert_eq!(RetentionPolicy::new(2).unwrap().keep(), 2);
    }

    #[test]
    fn test_keeps_newest_versions() {
        let units: PackageSet = ["1.0", "1.10", "1.2", "1.9", "1.3"]
            .iter()
            .map(|v| unit("foo", v, "x86_64"))
            .collect();
        let removed = RetentionPolicy::new(2).unwrap().apply(&units);
        assert_eq!(removed.len(), 3);
        assert_eq!(versions(&removed), vec!["1.0", "1.2", "1.3"]);
    }

    #[test]
    fn test_groups_by_arch_and_source() {
        let units: PackageSet = vec![
            unit("foo", "1", "x86_64"),
            unit("foo", "2", "x86_64"),
            unit("foo", "1", "aarch64"),
            unit("foo", "1", "src"),
            unit("foo", "2", "src"),
        ]
        .into_iter()
        .collect();

        let removed = RetentionPolicy::new(1).unwrap().apply(&units);
        let mut names: Vec<String> = removed.iter().map(|u| u.to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["foo-1-1.src", "foo-1-1.x86_64"]);
    }

    #[test]
    fn test_nothing_removed_under_limit() {
        let units: PackageSet = vec![unit("foo", "1", "noarch")].into_iter().collect();
        assert!(RetentionPolicy::new(5).unwrap().apply(&units).is_empty());
    }

    #[test]
    fn test_policy_deserializes_from_integer() {
        let policy: RetentionPolicy = serde_json::from_str("3").unwrap();
        assert_eq!(policy.keep(), 3);
        assert!(serde_json::from_str::<RetentionPolicy>("0").is_err());
    }
}
