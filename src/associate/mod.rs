// src/associate/mod.rs

//! Copy of content from one repository into another
//!
//! [`associate`] takes the units a caller asked for and works out everything
//! the destination must receive:
//!
//! 1. Requested units are classified by kind. Errata are associated as is,
//!    groups/categories/environments are cloned into the destination,
//!    metadata files are copied byte for byte and packages are collected
//!    into one batch.
//! 2. The package batch is associated, followed by its dependency closure
//!    when the copy is recursive.
//! 3. A recursive copy then follows references: group ids named by
//!    categories/environments go back to step 1, package names from groups
//!    and package keys from errata are resolved against the source and
//!    copied as in step 2.
//!
//! The loop ends once a round discovers nothing new. Membership is checked
//! by [`UnitKey`], so a repeated copy into an unchanged destination
//! associates nothing.

pub mod conduit;

pub use conduit::{ContentConduit, InMemoryConduit};

use crate::error::Result;
use crate::packages::{
    ContentKey, MetadataFileUnit, PackageSet, PackageUnit, ReferenceKey, Unit, UnitKey, UnitKind,
};
use crate::resolver::index::newest_of;
use crate::resolver::{PackageIndex, Solver};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fs::{self, File};
use std::io;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Options of one copy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyOptions {
    /// Copy dependencies and referenced units as well
    pub recursive: bool,
    /// Unit kinds left out of the copy
    pub skip: BTreeSet<UnitKind>,
}

/// A unit that could not be copied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyFailure {
    pub unit: UnitKey,
    pub reason: String,
}

/// Outcome of a copy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyReport {
    /// Units associated because they were requested or referenced
    pub resolved: usize,
    /// Packages associated as dependencies
    pub deps: usize,
    pub failed: usize,
    pub failures: Vec<CopyFailure>,
    /// Every unit this copy associated, in association order
    pub associated: Vec<UnitKey>,
}

impl CopyReport {
    fn fail(&mut self, unit: UnitKey, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("Failed to copy {:?}: {}", unit, reason);
        self.failed += 1;
        self.failures.push(CopyFailure { unit, reason });
    }
}

/// References collected from non-package units of one round
#[derive(Default)]
struct Children {
    group_ids: BTreeSet<String>,
    package_names: BTreeSet<String>,
    search_keys: BTreeSet<ReferenceKey>,
}

impl Children {
    fn is_empty(&self) -> bool {
        self.group_ids.is_empty() && self.package_names.is_empty() && self.search_keys.is_empty()
    }
}

/// State of one copy
struct Associator<'c, C: ContentConduit> {
    conduit: &'c mut C,
    options: &'c CopyOptions,
    repo_id: String,
    source: Vec<Unit>,
    source_index: Option<PackageIndex>,
    present: HashSet<UnitKey>,
    installed: HashSet<ContentKey>,
    visited_groups: HashSet<String>,
    report: CopyReport,
}

impl<'c, C: ContentConduit> Associator<'c, C> {
    fn new(conduit: &'c mut C, options: &'c CopyOptions) -> Result<Self> {
        let source = conduit.source_units()?;
        let destination = conduit.destination_units()?;
        let repo_id = conduit.destination_repo_id().to_string();

        let present: HashSet<UnitKey> = destination.iter().map(Unit::key).collect();
        let installed = destination
            .iter()
            .filter_map(Unit::as_package)
            .map(PackageUnit::content_key)
            .collect();

        // Only recursive copies consult the solver
        let source_index = options.recursive.then(|| {
            PackageIndex::build(source.iter().filter_map(Unit::as_package).cloned())
        });

        Ok(Self {
            conduit,
            options,
            repo_id,
            source,
            source_index,
            present,
            installed,
            visited_groups: HashSet::new(),
            report: CopyReport::default(),
        })
    }

    fn associate(&mut self, unit: Unit) -> Result<bool> {
        let key = unit.key();
        if self.present.contains(&key) {
            debug!("{:?} already in {}", key, self.repo_id);
            return Ok(false);
        }
        if let Unit::Package(package) = &unit {
            self.installed.insert(package.content_key());
        }
        self.conduit.associate_unit(unit)?;
        self.present.insert(key.clone());
        self.report.associated.push(key);
        Ok(true)
    }

    fn run(mut self, units: Vec<Unit>) -> Result<CopyReport> {
        let mut pending: VecDeque<Unit> = units.into();
        let mut round = 0;

        loop {
            round += 1;
            let mut packages = PackageSet::new();
            let mut children = Children::default();

            while let Some(unit) = pending.pop_front() {
                if self.options.skip.contains(&unit.kind()) {
                    debug!("Skipping {} unit {:?}", unit.kind(), unit.key());
                    continue;
                }
                self.classify(unit, &mut packages, &mut children)?;
            }
            self.copy_packages(packages)?;

            if !self.options.recursive || children.is_empty() {
                break;
            }
            debug!(
                "Copy round {}: {} group id(s), {} package name(s), {} package key(s)",
                round,
                children.group_ids.len(),
                children.package_names.len(),
                children.search_keys.len()
            );

            pending.extend(self.referenced_groups(&children.group_ids));
            let mut referenced = self.packages_by_name(&children.package_names);
            referenced.extend(self.packages_by_key(&children.search_keys));
            self.copy_packages(referenced)?;

            if pending.is_empty() {
                break;
            }
        }

        info!(
            "Copied into {}: {} resolved, {} dependencies, {} failed",
            self.repo_id, self.report.resolved, self.report.deps, self.report.failed
        );
        Ok(self.report)
    }

    fn classify(
        &mut self,
        unit: Unit,
        packages: &mut PackageSet,
        children: &mut Children,
    ) -> Result<()> {
        match unit {
            Unit::Package(package) => {
                packages.insert(Arc::new(package));
            }
            Unit::Erratum(erratum) => {
                children.search_keys.extend(erratum.search_keys().cloned());
                if self.associate(Unit::Erratum(erratum))? {
                    self.report.resolved += 1;
                }
            }
            Unit::Group(mut group) => {
                self.visited_groups.insert(group.id.clone());
                children
                    .package_names
                    .extend(group.package_names().map(str::to_string));
                group.repo_id = self.repo_id.clone();
                if self.associate(Unit::Group(group))? {
                    self.report.resolved += 1;
                }
            }
            Unit::Category(mut category) => {
                children.group_ids.extend(category.group_ids.iter().cloned());
                category.repo_id = self.repo_id.clone();
                if self.associate(Unit::Category(category))? {
                    self.report.resolved += 1;
                }
            }
            Unit::Environment(mut environment) => {
                children
                    .group_ids
                    .extend(environment.referenced_group_ids().map(str::to_string));
                environment.repo_id = self.repo_id.clone();
                if self.associate(Unit::Environment(environment))? {
                    self.report.resolved += 1;
                }
            }
            Unit::MetadataFile(file) => self.copy_metadata_file(&file)?,
        }
        Ok(())
    }

    /// Clone a metadata file into the destination
    ///
    /// A unit without a readable backing file is reported as a failure.
    /// I/O errors while writing the copy are returned.
    fn copy_metadata_file(&mut self, file: &MetadataFileUnit) -> Result<()> {
        let mut clone = file.clone_for(&self.repo_id);
        let key = Unit::MetadataFile(clone.clone()).key();
        if self.present.contains(&key) {
            return Ok(());
        }

        let Some(source_path) = file.storage_path.as_deref() else {
            self.report.fail(key, "no stored file");
            return Ok(());
        };
        let mut source = match File::open(source_path) {
            Ok(source) => source,
            Err(e) => {
                self.report
                    .fail(key, format!("cannot read {}: {}", source_path.display(), e));
                return Ok(());
            }
        };

        let target = self.conduit.init_unit(&clone)?;
        let parent = target
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| ".".into());
        fs::create_dir_all(&parent)?;
        let mut staged = NamedTempFile::new_in(&parent)?;
        io::copy(&mut source, &mut staged)?;
        staged.persist(&target).map_err(|e| e.error)?;
        debug!("Copied {} to {}", source_path.display(), target.display());

        clone.storage_path = Some(target);
        let unit = Unit::MetadataFile(clone);
        self.conduit.save_unit(&unit)?;
        if self.associate(unit)? {
            self.report.resolved += 1;
        }
        Ok(())
    }

    /// Associate a package batch, then its dependencies for recursive copies
    ///
    /// Units of the batch already in the destination are not associated
    /// again, but their dependencies are still expanded.
    fn copy_packages(&mut self, batch: PackageSet) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        for unit in batch.iter() {
            if self.associate(Unit::Package(PackageUnit::clone(unit)))? {
                self.report.resolved += 1;
            }
        }

        let Some(index) = self.source_index.as_ref() else {
            return Ok(());
        };
        let closure = Solver::new(index)
            .with_installed(self.installed.iter().cloned())
            .closure(&batch);
        for wave in closure.waves {
            for unit in wave {
                if self.associate(Unit::Package(PackageUnit::clone(&unit)))? {
                    self.report.deps += 1;
                }
            }
        }
        Ok(())
    }

    fn referenced_groups(&mut self, ids: &BTreeSet<String>) -> Vec<Unit> {
        let mut groups = Vec::new();
        for unit in &self.source {
            if let Unit::Group(group) = unit {
                if ids.contains(&group.id) && self.visited_groups.insert(group.id.clone()) {
                    groups.push(unit.clone());
                }
            }
        }
        groups
    }

    /// Newest source package of each name the destination holds no version of
    fn packages_by_name(&self, names: &BTreeSet<String>) -> PackageSet {
        let Some(index) = self.source_index.as_ref() else {
            return PackageSet::new();
        };
        let present: HashSet<&str> = self
            .installed
            .iter()
            .map(|key| key.reference().name.as_str())
            .collect();
        names
            .iter()
            .filter_map(|name| {
                if present.contains(name.as_str()) {
                    debug!("{} already in {}", name, self.repo_id);
                    return None;
                }
                let newest = newest_of(index.versions(name).iter());
                if newest.is_none() {
                    debug!("No package named {} in the source", name);
                }
                newest.cloned()
            })
            .collect()
    }

    /// Source packages matching advisory package references
    fn packages_by_key(&self, keys: &BTreeSet<ReferenceKey>) -> PackageSet {
        if keys.is_empty() {
            return PackageSet::new();
        }
        self.source
            .iter()
            .filter_map(Unit::as_package)
            .filter(|unit| keys.contains(&unit.reference_key()))
            .filter(|unit| !self.installed.contains(&unit.content_key()))
            .map(|unit| Arc::new(unit.clone()))
            .collect()
    }
}

/// Copy `units` from the conduit's source into its destination
///
/// Structural problems (the conduit failing, I/O errors while writing a
/// copied file) are returned as errors. Units that cannot be copied on
/// their own are listed in [`CopyReport::failures`] and do not stop the
/// copy; unsatisfiable dependencies are not failures.
pub fn associate<C: ContentConduit>(
    conduit: &mut C,
    units: Vec<Unit>,
    options: &CopyOptions,
) -> Result<CopyReport> {
    info!(
        "Copying {} unit(s) into {} (recursive: {})",
        units.len(),
        conduit.destination_repo_id(),
        options.recursive
    );
    Associator::new(conduit, options)?.run(units)
}
