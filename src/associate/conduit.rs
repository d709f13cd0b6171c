// src/associate/conduit.rs

//! Host collaborators of the copy orchestrator

use crate::error::{Error, Result};
use crate::packages::{MetadataFileUnit, Unit, UnitKey};
use crate::repository::RepositorySnapshot;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Access to the source and destination repositories of a copy
///
/// The orchestrator only reads and associates through this trait; storage
/// layout, persistence and locking belong to the implementation.
pub trait ContentConduit {
    /// Every unit of the source repository
    fn source_units(&self) -> Result<Vec<Unit>>;

    /// Every unit currently associated with the destination
    fn destination_units(&self) -> Result<Vec<Unit>>;

    fn destination_repo_id(&self) -> &str;

    /// Associate a unit with the destination
    fn associate_unit(&mut self, unit: Unit) -> Result<()>;

    /// Reserve storage for a cloned metadata file; returns where its content goes
    fn init_unit(&mut self, unit: &MetadataFileUnit) -> Result<PathBuf>;

    /// Persist a cloned unit once its content is in place
    fn save_unit(&mut self, unit: &Unit) -> Result<()>;
}

/// Conduit over two in-memory snapshots, with cloned files stored under a
/// directory
#[derive(Debug, Clone)]
pub struct InMemoryConduit {
    source: RepositorySnapshot,
    destination: RepositorySnapshot,
    storage_dir: PathBuf,
    saved: Vec<UnitKey>,
}

impl InMemoryConduit {
    pub fn new(
        source: RepositorySnapshot,
        destination: RepositorySnapshot,
        storage_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            destination,
            storage_dir: storage_dir.into(),
            saved: Vec::new(),
        }
    }

    pub fn source(&self) -> &RepositorySnapshot {
        &self.source
    }

    pub fn destination(&self) -> &RepositorySnapshot {
        &self.destination
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Units saved through [`ContentConduit::save_unit`], in order
    pub fn saved(&self) -> &[UnitKey] {
        &self.saved
    }

    pub fn into_destination(self) -> RepositorySnapshot {
        self.destination
    }
}

impl ContentConduit for InMemoryConduit {
    fn source_units(&self) -> Result<Vec<Unit>> {
        Ok(self.source.units.clone())
    }

    fn destination_units(&self) -> Result<Vec<Unit>> {
        Ok(self.destination.units.clone())
    }

    fn destination_repo_id(&self) -> &str {
        &self.destination.repo_id
    }

    fn associate_unit(&mut self, unit: Unit) -> Result<()> {
        let key = unit.key();
        if !self.destination.add(unit) {
            debug!("{:?} already associated with {}", key, self.destination.repo_id);
        }
        Ok(())
    }

    fn init_unit(&mut self, unit: &MetadataFileUnit) -> Result<PathBuf> {
        let file_name = Path::new(&unit.relative_path)
            .file_name()
            .ok_or_else(|| {
                Error::NotFoundError(format!(
                    "metadata file '{}' has no file name",
                    unit.relative_path
                ))
            })?;
        Ok(self
            .storage_dir
            .join(&unit.repo_id)
            .join(&unit.data_type)
            .join(file_name))
    }

    fn save_unit(&mut self, unit: &Unit) -> Result<()> {
        self.saved.push(unit.key());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::GroupUnit;

    #[test]
    fn test_associate_is_idempotent() {
        let mut conduit = InMemoryConduit::new(
            RepositorySnapshot::new("src"),
            RepositorySnapshot::new("dest"),
            "/tmp/unused",
        );
        conduit.associate_unit(GroupUnit::new("core", "dest").into()).unwrap();
        conduit.associate_unit(GroupUnit::new("core", "dest").into()).unwrap();
        assert_eq!(conduit.destination().len(), 1);
        assert_eq!(conduit.destination_repo_id(), "dest");
    }

    #[test]
    fn test_init_unit_path() {
        let mut conduit = InMemoryConduit::new(
            RepositorySnapshot::new("src"),
            RepositorySnapshot::new("dest"),
            "/var/lib/mirror",
        );
        let unit = MetadataFileUnit::new("productid", "dest", "repodata/productid.gz");
        assert_eq!(
            conduit.init_unit(&unit).unwrap(),
            PathBuf::from("/var/lib/mirror/dest/productid/productid.gz")
        );
    }
}
