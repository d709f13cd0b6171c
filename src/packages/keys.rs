// src/packages/keys.rs

//! Identity keys for package set operations
//!
//! Two kinds of key exist on purpose. A [`ContentKey`] names exact content
//! (NEVRA plus checksum) and is what catalog membership is compared on. A
//! [`ReferenceKey`] is a bare NEVRA, which is all that secondary metadata such
//! as advisory package lists carries. The only conversion is
//! `ContentKey -> ReferenceKey`, so comparing a reference against catalog
//! content always goes through an explicit strip.

use crate::packages::traits::Versioned;
use crate::packages::unit::ChecksumType;
use crate::version::Evr;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name/epoch/version/release/arch without checksum
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReferenceKey {
    pub name: String,
    pub epoch: String,
    pub version: String,
    pub release: String,
    pub arch: String,
}

impl ReferenceKey {
    /// Build a key; an empty epoch is stored as "0"
    pub fn new(name: &str, epoch: &str, version: &str, release: &str, arch: &str) -> Self {
        Self {
            name: name.to_string(),
            epoch: if epoch.is_empty() { "0" } else { epoch }.to_string(),
            version: version.to_string(),
            release: release.to_string(),
            arch: arch.to_string(),
        }
    }
}

impl Versioned for ReferenceKey {
    fn name(&self) -> &str {
        &self.name
    }

    fn arch(&self) -> &str {
        &self.arch
    }

    fn evr(&self) -> Evr<'_> {
        Evr::new(Some(&self.epoch), &self.version, Some(&self.release))
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}.{}", self.name, self.evr(), self.arch)
    }
}

/// NEVRA plus checksum: one exact content generation of a package
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentKey {
    #[serde(flatten)]
    pub nevra: ReferenceKey,
    pub checksum_type: ChecksumType,
    pub checksum: String,
}

impl ContentKey {
    pub fn new(nevra: ReferenceKey, checksum_type: ChecksumType, checksum: &str) -> Self {
        Self {
            nevra,
            checksum_type,
            checksum: checksum.to_string(),
        }
    }

    /// The NEVRA part of this key
    pub fn reference(&self) -> &ReferenceKey {
        &self.nevra
    }
}

impl From<ContentKey> for ReferenceKey {
    fn from(key: ContentKey) -> Self {
        key.nevra
    }
}

impl From<&ContentKey> for ReferenceKey {
    fn from(key: &ContentKey) -> Self {
        key.nevra.clone()
    }
}

impl Versioned for ContentKey {
    fn name(&self) -> &str {
        &self.nevra.name
    }

    fn arch(&self) -> &str {
        &self.nevra.arch
    }

    fn evr(&self) -> Evr<'_> {
        self.nevra.evr()
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.nevra, self.checksum_type, self.checksum)
    }
}
