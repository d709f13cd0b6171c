// src/repository/mod.rs

//! Repository metadata and content reconciliation
//!
//! This module provides functionality for:
//! - Opening staged metadata sections, compressed or not
//! - Verifying sections against the checksums repomd.xml declares
//! - Holding a repository's content as a snapshot the engines work on
//! - Reconciling local content against a remote catalog ([`diff`])
//! - Version retention ([`retention`])
//!
//! Fetching metadata and packages is left to the caller; everything here
//! reads files that are already on disk.

pub mod diff;
pub mod parsers;
pub mod retention;

use crate::error::{Error, Result};
use crate::packages::{Checksum, ChecksumType, PackageSet, Unit, UnitKey, UnitKind};
use crate::repository::parsers::{MetadataParser, PrimaryReader, RepomdRecord};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use xz2::read::XzDecoder;

pub use diff::{DiffResult, SyncOptions, SyncPlan, reconcile};
pub use retention::{RetentionPolicy, retain_newest};

/// Open a staged metadata file for streaming
///
/// The decoder is picked by extension: `.gz`, `.zst` and `.xz` are
/// decompressed on the fly, anything else is read as is.
pub fn open_metadata(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();

    let reader: Box<dyn BufRead> = match extension {
        "gz" => Box::new(BufReader::new(GzDecoder::new(file))),
        "zst" => Box::new(BufReader::new(zstd::Decoder::new(file)?)),
        "xz" => Box::new(BufReader::new(XzDecoder::new(file))),
        _ => Box::new(BufReader::new(file)),
    };
    debug!("Opened metadata {} ({})", path.display(), if extension.is_empty() { "plain" } else { extension });
    Ok(reader)
}

fn hash_stream<D, R>(mut hasher: D, reader: &mut R) -> Result<(String, u64)>
where
    D: Digest + io::Write,
    sha2::digest::Output<D>: std::fmt::LowerHex,
    R: Read + ?Sized,
{
    let size = io::copy(reader, &mut hasher)?;
    let digest = format!("{:x}", hasher.finalize());
    Ok((digest, size))
}

/// Hash a stream with the algorithm of `expected` and compare
///
/// Returns the number of bytes read. Only the SHA-2 family is computed;
/// md5 and sha1 sections are rejected as unsupported.
pub fn verify_section<R: Read + ?Sized>(reader: &mut R, expected: &Checksum) -> Result<u64> {
    let (actual, size) = match expected.algorithm {
        ChecksumType::Sha224 => hash_stream(Sha224::new(), reader)?,
        ChecksumType::Sha256 => hash_stream(Sha256::new(), reader)?,
        ChecksumType::Sha384 => hash_stream(Sha384::new(), reader)?,
        ChecksumType::Sha512 => hash_stream(Sha512::new(), reader)?,
        other => return Err(Error::UnsupportedChecksum(other.to_string())),
    };

    if !actual.eq_ignore_ascii_case(&expected.digest) {
        return Err(Error::ChecksumMismatch {
            expected: expected.digest.clone(),
            actual,
        });
    }

    debug!("Checksum verified: {} {}", expected.algorithm, expected.digest);
    Ok(size)
}

fn check_size(declared: Option<u64>, actual: u64) -> Result<()> {
    match declared {
        Some(declared) if declared != actual => Err(Error::ChecksumMismatch {
            expected: format!("{} bytes", declared),
            actual: format!("{} bytes", actual),
        }),
        _ => Ok(()),
    }
}

/// Verify a staged section file against its repomd.xml record
///
/// The stored file is checked against `checksum`/`size`, the decompressed
/// stream against `open_checksum`/`open_size` when those are declared.
pub fn verify_record(path: &Path, record: &RepomdRecord) -> Result<()> {
    if let Some(checksum) = &record.checksum {
        let mut file = File::open(path)?;
        let size = verify_section(&mut file, checksum)?;
        check_size(record.size, size)?;
    }
    if let Some(open_checksum) = &record.open_checksum {
        let mut stream = open_metadata(path)?;
        let size = verify_section(&mut stream, open_checksum)?;
        check_size(record.open_size, size)?;
    }
    info!("Verified {} section {}", record.data_type, path.display());
    Ok(())
}

/// Content of one repository at a point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    pub repo_id: String,
    pub units: Vec<Unit>,
}

impl RepositorySnapshot {
    pub fn new(repo_id: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            units: Vec::new(),
        }
    }

    pub fn with_units<I, U>(mut self, units: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<Unit>,
    {
        self.units.extend(units.into_iter().map(Into::into));
        self
    }

    /// Snapshot of every package in a staged primary.xml
    pub fn from_primary(repo_id: impl Into<String>, path: &Path) -> Result<Self> {
        let reader: PrimaryReader<_> = parsers::open(path)?;
        let units = reader.collect_records()?;
        let snapshot = Self::new(repo_id).with_units(units);
        info!(
            "Loaded {} package(s) into snapshot of {}",
            snapshot.units.len(),
            snapshot.repo_id
        );
        Ok(snapshot)
    }

    /// Add a unit unless one with the same identity is already present
    pub fn add(&mut self, unit: Unit) -> bool {
        let key = unit.key();
        if self.units.iter().any(|u| u.key() == key) {
            return false;
        }
        self.units.push(unit);
        true
    }

    pub fn contains(&self, key: &UnitKey) -> bool {
        self.units.iter().any(|u| &u.key() == key)
    }

    pub fn keys(&self) -> HashSet<UnitKey> {
        self.units.iter().map(Unit::key).collect()
    }

    /// Package units only
    pub fn packages(&self) -> PackageSet {
        self.units
            .iter()
            .filter_map(Unit::as_package)
            .map(|p| Arc::new(p.clone()))
            .collect()
    }

    pub fn units_of(&self, kind: UnitKind) -> impl Iterator<Item = &Unit> {
        self.units.iter().filter(move |u| u.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
