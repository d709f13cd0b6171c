// src/resolver/solver.rs

//! Dependency solver over a source repository index
//!
//! The solver answers "which packages of the source repository satisfy these
//! requirements" and expands a set of units to its transitive dependencies.
//! Requirements nothing in the source satisfies are dropped without error:
//! source repositories are routinely incomplete (base OS packages live
//! elsewhere), and a copy must still go ahead.

use crate::packages::{ContentKey, PackageSet, PackageUnit, Requirement};
use crate::resolver::index::{PackageIndex, newest_of};
use crate::resolver::matcher::fills_requirement;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of a recursive dependency expansion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Closure {
    /// Starting units plus every dependency discovered
    pub units: PackageSet,
    /// Newly discovered units, one set per round that found something
    pub waves: Vec<PackageSet>,
    /// Number of expansion rounds run, including the final empty one
    pub rounds: usize,
}

impl Closure {
    /// Dependencies only, without the starting units
    pub fn dependencies(&self) -> PackageSet {
        self.waves.iter().flatten().cloned().collect()
    }
}

/// Requirement solver bound to one source index
pub struct Solver<'a> {
    index: &'a PackageIndex,
    installed: HashSet<ContentKey>,
}

impl<'a> Solver<'a> {
    pub fn new(index: &'a PackageIndex) -> Self {
        Self {
            index,
            installed: HashSet::new(),
        }
    }

    /// Content already present at the destination; never returned by [`Solver::closure`]
    pub fn with_installed<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = ContentKey>,
    {
        self.installed.extend(keys);
        self
    }

    pub fn is_installed(&self, key: &ContentKey) -> bool {
        self.installed.contains(key)
    }

    /// Source packages satisfying any of the requirements
    ///
    /// Unversioned requirements pull in every provider of the capability (one
    /// newest unit per providing package). Every requirement additionally
    /// matches packages by name, adding only the newest matching version.
    pub fn match_requirements<'r, I>(&self, requirements: I) -> PackageSet
    where
        I: IntoIterator<Item = &'r Requirement>,
    {
        let mut seen = HashSet::new();
        let mut deps = PackageSet::new();

        for req in requirements {
            if !seen.insert(req) {
                continue;
            }

            if !req.is_versioned() {
                deps.extend(self.index.providers(&req.name).cloned());
            }

            let candidates = self
                .index
                .versions(&req.name)
                .iter()
                .filter(|unit| fills_requirement(req, *unit));
            match newest_of(candidates) {
                Some(best) => {
                    deps.insert(Arc::clone(best));
                }
                None => debug!("No package satisfies {}", req),
            }
        }

        deps
    }

    /// Packages satisfying the requires of the given units (one level)
    pub fn find_dependent_rpms<'u, I>(&self, units: I) -> PackageSet
    where
        I: IntoIterator<Item = &'u PackageUnit>,
    {
        let requirements: HashSet<Requirement> =
            units.into_iter().flat_map(PackageUnit::requirements).collect();
        self.match_requirements(&requirements)
    }

    /// Expand `units` to all transitive dependencies not yet installed
    ///
    /// Each round resolves only the units discovered by the previous one.
    /// Units already installed or already collected are not revisited, so the
    /// loop ends even when the dependency graph has cycles.
    pub fn closure(&self, units: &PackageSet) -> Closure {
        let mut closure = Closure {
            units: units.clone(),
            waves: Vec::new(),
            rounds: 0,
        };
        let mut frontier = units.clone();

        while !frontier.is_empty() {
            closure.rounds += 1;

            let mut wave = self.find_dependent_rpms(frontier.iter().map(Arc::as_ref));
            wave.retain(|unit| {
                let key = unit.content_key();
                !self.installed.contains(&key) && !closure.units.contains(&key)
            });

            debug!(
                "Dependency round {}: {} new unit(s)",
                closure.rounds,
                wave.len()
            );
            if wave.is_empty() {
                break;
            }

            closure.units.extend(wave.iter().cloned());
            closure.waves.push(wave.clone());
            frontier = wave;
        }

        info!(
            "Dependency closure: {} unit(s) after {} round(s)",
            closure.units.len(),
            closure.rounds
        );
        closure
    }
}
