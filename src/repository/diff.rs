// src/repository/diff.rs

//! Reconciliation of local content against a remote catalog
//!
//! [`reconcile`] is generic over the identity key. Catalog membership is
//! compared with [`ContentKey`](crate::packages::ContentKey) (checksum
//! included); dependency references such as advisory package lists only
//! carry a [`ReferenceKey`](crate::packages::ReferenceKey). The two types do
//! not mix, so a comparison of normalized with non-normalized keys cannot be
//! written by accident.

use crate::packages::{ContentKey, PackageSet, PackageUnit, UnitKind};
use crate::repository::retention::RetentionPolicy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::info;

/// Outcome of comparing a remote catalog with local content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult<K: Ord> {
    /// In the remote catalog, not stored locally
    pub missing_locally: BTreeSet<K>,
    /// Stored locally and in the remote catalog, not associated yet
    pub available_not_associated: BTreeSet<K>,
    /// Associated locally, gone from the remote catalog
    pub missing_remotely: BTreeSet<K>,
}

impl<K: Ord> Default for DiffResult<K> {
    fn default() -> Self {
        Self {
            missing_locally: BTreeSet::new(),
            available_not_associated: BTreeSet::new(),
            missing_remotely: BTreeSet::new(),
        }
    }
}

impl<K: Ord> DiffResult<K> {
    /// True when local content already matches the remote catalog
    pub fn is_empty(&self) -> bool {
        self.missing_locally.is_empty()
            && self.available_not_associated.is_empty()
            && self.missing_remotely.is_empty()
    }
}

/// Compare a remote catalog with the local store and the local association
///
/// - `missing_locally = remote - local_all`
/// - `available_not_associated = (remote & local_all) - local_associated`
/// - `missing_remotely = local_associated - remote`
pub fn reconcile<K>(
    remote: &BTreeSet<K>,
    local_all: &BTreeSet<K>,
    local_associated: &BTreeSet<K>,
) -> DiffResult<K>
where
    K: Ord + Clone,
{
    DiffResult {
        missing_locally: remote.difference(local_all).cloned().collect(),
        available_not_associated: remote
            .intersection(local_all)
            .filter(|key| !local_associated.contains(*key))
            .cloned()
            .collect(),
        missing_remotely: local_associated.difference(remote).cloned().collect(),
    }
}

/// How a sync turns a diff into actions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Unassociate units the remote no longer lists
    pub remove_missing: bool,
    /// Versions to keep per package after the sync
    pub retention: Option<RetentionPolicy>,
    /// Unit kinds the sync leaves alone
    pub skip: BTreeSet<UnitKind>,
}

/// Actions a package sync has to perform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPlan {
    /// Fetch and associate
    pub to_download: BTreeSet<ContentKey>,
    /// Already stored; associate only
    pub to_associate: BTreeSet<ContentKey>,
    /// Unassociate: gone from the remote catalog
    pub to_remove: BTreeSet<ContentKey>,
    /// Unassociate: outside the retention policy once the sync is done
    pub to_purge: BTreeSet<ContentKey>,
}

impl SyncPlan {
    /// Plan a package sync of `remote` into a repository
    ///
    /// `local_all` is everything stored locally, `local_associated` what the
    /// repository currently holds. Retention runs over the content the
    /// repository will hold after the other actions, and never purges units
    /// already scheduled for removal. Remote units retention would drop are
    /// left out of the download and association sets.
    pub fn compute(
        remote: &PackageSet,
        local_all: &PackageSet,
        local_associated: &PackageSet,
        options: &SyncOptions,
    ) -> Self {
        if options.skip.contains(&UnitKind::Package) {
            info!("Package sync skipped by configuration");
            return Self::default();
        }

        let keys = |set: &PackageSet| set.keys().cloned().collect::<BTreeSet<_>>();
        let diff = reconcile(&keys(remote), &keys(local_all), &keys(local_associated));

        let to_remove = if options.remove_missing {
            diff.missing_remotely.clone()
        } else {
            BTreeSet::new()
        };

        let retired: BTreeSet<ContentKey> = match options.retention {
            Some(policy) => {
                let mut after_sync = PackageSet::new();
                after_sync.extend(
                    local_associated
                        .iter()
                        .filter(|unit| !to_remove.contains(&unit.content_key()))
                        .cloned(),
                );
                after_sync.extend(remote.iter().cloned());
                policy.apply(&after_sync).keys().cloned().collect()
            }
            None => BTreeSet::new(),
        };

        // Retired remote units are never fetched or associated, so only
        // content the repository already holds is left to purge
        let plan = Self {
            to_download: diff.missing_locally.difference(&retired).cloned().collect(),
            to_associate: diff
                .available_not_associated
                .difference(&retired)
                .cloned()
                .collect(),
            to_remove,
            to_purge: retired
                .into_iter()
                .filter(|key| local_associated.contains(key))
                .collect(),
        };
        info!(
            "Sync plan: {} to download, {} to associate, {} to remove, {} to purge",
            plan.to_download.len(),
            plan.to_associate.len(),
            plan.to_remove.len(),
            plan.to_purge.len()
        );
        plan
    }

    /// Units a caller has to fetch, looked up in the remote catalog
    pub fn downloads<'a>(
        &'a self,
        remote: &'a PackageSet,
    ) -> impl Iterator<Item = &'a Arc<PackageUnit>> + 'a {
        self.to_download.iter().filter_map(|key| remote.get(key))
    }

    /// Whether the plan changes nothing
    pub fn is_empty(&self) -> bool {
        self.to_download.is_empty()
            && self.to_associate.is_empty()
            && self.to_remove.is_empty()
            && self.to_purge.is_empty()
    }

    /// Content associated after the plan is carried out
    pub fn associated_after(&self, local_associated: &PackageSet) -> HashSet<ContentKey> {
        local_associated
            .keys()
            .cloned()
            .chain(self.to_download.iter().cloned())
            .chain(self.to_associate.iter().cloned())
            .filter(|key| !self.to_remove.contains(key) && !self.to_purge.contains(key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::{ChecksumType, ErratumPackage, ReferenceKey};

    fn unit(name: &str, version: &str) -> Arc<PackageUnit> {
        Arc::new(
            PackageUnit::new(name, "0", version, "1", "noarch")
                .with_checksum(ChecksumType::Sha256, format!("{}-{}", name, version)),
        )
    }

    fn set(units: &[&Arc<PackageUnit>]) -> PackageSet {
        units.iter().map(|u| Arc::clone(u)).collect()
    }

    fn names(keys: &BTreeSet<ContentKey>) -> Vec<String> {
        keys.iter().map(|k| k.nevra.name.clone()).collect()
    }

    #[test]
    fn test_reconcile() {
        let remote: BTreeSet<&str> = ["x", "y", "z"].into_iter().collect();
        let local_all: BTreeSet<&str> = ["y", "z", "w"].into_iter().collect();
        let local_associated: BTreeSet<&str> = ["y"].into_iter().collect();

        let diff = reconcile(&remote, &local_all, &local_associated);
        assert_eq!(diff.missing_locally, ["x"].into_iter().collect());
        assert_eq!(diff.available_not_associated, ["z"].into_iter().collect());
        // w is stored but not associated, so it is not reported
        assert!(diff.missing_remotely.is_empty());

        let with_w: BTreeSet<&str> = ["y", "w"].into_iter().collect();
        let diff = reconcile(&remote, &local_all, &with_w);
        assert_eq!(diff.missing_remotely, ["w"].into_iter().collect());
    }

    #[test]
    fn test_reference_keys_ignore_checksums() {
        // An advisory references a package without its checksum; the same
        // NEVRA is stored locally under two different checksums
        let a = PackageUnit::new("bash", "0", "5.2", "1", "x86_64").with_checksum(ChecksumType::Sha256, "aa");
        let b = a.clone().with_checksum(ChecksumType::Sha1, "bb");
        let erratum = ErratumPackage {
            key: ReferenceKey::new("bash", "", "5.2", "1", "x86_64"),
            filename: None,
            sum: None,
            source_rpm: None,
        };

        let content: BTreeSet<ContentKey> = [a.content_key(), b.content_key()].into_iter().collect();
        assert_eq!(content.len(), 2);

        let references: BTreeSet<ReferenceKey> = content.iter().map(ReferenceKey::from).collect();
        let remote: BTreeSet<ReferenceKey> = [erratum.key].into_iter().collect();
        let diff = reconcile(&remote, &references, &references);
        assert!(diff.is_empty());
    }

    #[test]
    fn test_sync_plan() {
        let (x, y, z, w) = (unit("x", "1"), unit("y", "1"), unit("z", "1"), unit("w", "1"));
        let remote = set(&[&x, &y, &z]);
        let local_all = set(&[&y, &z, &w]);
        let local_associated = set(&[&y, &w]);

        let plan = SyncPlan::compute(&remote, &local_all, &local_associated, &SyncOptions::default());
        assert_eq!(names(&plan.to_download), vec!["x"]);
        assert_eq!(names(&plan.to_associate), vec!["z"]);
        assert!(plan.to_remove.is_empty());
        assert!(plan.to_purge.is_empty());
        assert_eq!(plan.downloads(&remote).count(), 1);

        let options = SyncOptions {
            remove_missing: true,
            ..Default::default()
        };
        let plan = SyncPlan::compute(&remote, &local_all, &local_associated, &options);
        assert_eq!(names(&plan.to_remove), vec!["w"]);
        assert_eq!(plan.associated_after(&local_associated).len(), 3);
    }

    #[test]
    fn test_sync_plan_retention() {
        let old = unit("foo", "1");
        let mid = unit("foo", "2");
        let new = unit("foo", "3");
        let remote = set(&[&mid, &new]);
        let local = set(&[&old]);

        let options = SyncOptions {
            retention: Some(RetentionPolicy::new(2).unwrap()),
            ..Default::default()
        };
        let plan = SyncPlan::compute(&remote, &local, &local, &options);
        assert_eq!(plan.to_download.len(), 2);
        assert_eq!(plan.to_purge.len(), 1);
        assert!(plan.to_purge.contains(&old.content_key()));
    }

    #[test]
    fn test_sync_plan_retention_skips_retired_downloads() {
        let (v1, v2, v3) = (unit("foo", "1"), unit("foo", "2"), unit("foo", "3"));
        let stored = unit("foo", "0");
        let remote = set(&[&v1, &v2, &v3]);
        let local_all = set(&[&v2, &stored]);
        let local_associated = set(&[&stored]);

        let options = SyncOptions {
            retention: Some(RetentionPolicy::new(1).unwrap()),
            ..Default::default()
        };
        let plan = SyncPlan::compute(&remote, &local_all, &local_associated, &options);
        assert_eq!(
            plan.to_download,
            BTreeSet::from([v3.content_key()]),
            "Older remote versions are not fetched only to be purged"
        );
        assert!(plan.to_associate.is_empty());
        assert_eq!(plan.to_purge, BTreeSet::from([stored.content_key()]));

        let after = plan.associated_after(&local_associated);
        assert_eq!(after.len(), 1);
        assert!(after.contains(&v3.content_key()));
    }

    #[test]
    fn test_sync_plan_skip_packages() {
        let remote = set(&[&unit("x", "1")]);
        let options = SyncOptions {
            skip: [UnitKind::Package].into_iter().collect(),
            ..Default::default()
        };
        let plan = SyncPlan::compute(&remote, &PackageSet::new(), &PackageSet::new(), &options);
        assert!(plan.is_empty());
    }
}
