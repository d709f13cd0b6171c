// src/packages/unit.rs

//! Package units and their capabilities

use crate::error::{Error, Result};
use crate::packages::keys::{ContentKey, ReferenceKey};
use crate::packages::traits::Versioned;
use crate::version::Evr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Placeholder written in place of the checksum value in package templates
pub const CHECKSUM_TEMPLATE: &str = "{{ checksum }}";

/// Placeholder written in place of the checksum algorithm in package templates
pub const CHECKSUMTYPE_TEMPLATE: &str = "{{ checksumtype }}";

/// Checksum algorithm type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumType {
    /// MD5 (legacy, not for security)
    Md5,
    /// SHA-1, spelled "sha" by older createrepo
    Sha1,
    Sha224,
    /// SHA-256 (preferred)
    Sha256,
    Sha384,
    Sha512,
}

impl ChecksumType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumType::Md5 => "md5",
            ChecksumType::Sha1 => "sha1",
            ChecksumType::Sha224 => "sha224",
            ChecksumType::Sha256 => "sha256",
            ChecksumType::Sha384 => "sha384",
            ChecksumType::Sha512 => "sha512",
        }
    }
}

impl FromStr for ChecksumType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(ChecksumType::Md5),
            "sha" | "sha1" => Ok(ChecksumType::Sha1),
            "sha224" => Ok(ChecksumType::Sha224),
            "sha256" => Ok(ChecksumType::Sha256),
            "sha384" => Ok(ChecksumType::Sha384),
            "sha512" => Ok(ChecksumType::Sha512),
            _ => Err(Error::UnsupportedChecksum(s.to_string())),
        }
    }
}

impl fmt::Display for ChecksumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A digest together with the algorithm that produced it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum {
    pub algorithm: ChecksumType,
    pub digest: String,
}

impl Checksum {
    pub fn new(algorithm: ChecksumType, digest: impl Into<String>) -> Self {
        Self {
            algorithm,
            digest: digest.into(),
        }
    }
}

/// Comparison operator of a versioned capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Flags {
    #[default]
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Flags {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flags::Eq => "EQ",
            Flags::Lt => "LT",
            Flags::Le => "LE",
            Flags::Gt => "GT",
            Flags::Ge => "GE",
        }
    }

    /// Operator as it appears in spec files (`>=`, `<` ...)
    pub fn symbol(&self) -> &'static str {
        match self {
            Flags::Eq => "=",
            Flags::Lt => "<",
            Flags::Le => "<=",
            Flags::Gt => ">",
            Flags::Ge => ">=",
        }
    }
}

impl FromStr for Flags {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "EQ" => Ok(Flags::Eq),
            "LT" => Ok(Flags::Lt),
            "LE" => Ok(Flags::Le),
            "GT" => Ok(Flags::Gt),
            "GE" => Ok(Flags::Ge),
            _ => Err(Error::ParseError(format!("Unknown comparison flag: {}", s))),
        }
    }
}

/// A provides/requires/recommends entry as declared by a package
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub epoch: Option<String>,
    pub version: Option<String>,
    pub release: Option<String>,
    pub flags: Option<Flags>,
}

impl Capability {
    /// Unversioned capability
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            epoch: None,
            version: None,
            release: None,
            flags: None,
        }
    }

    /// Versioned capability; `evr` is `[epoch:]version[-release]`
    pub fn versioned(name: impl Into<String>, flags: Flags, evr: &str) -> Self {
        let parsed = Evr::parse(evr);
        Self {
            name: name.into(),
            epoch: parsed.epoch.map(str::to_string),
            version: Some(parsed.version.to_string()),
            release: parsed.release.map(str::to_string),
            flags: Some(flags),
        }
    }

    pub fn is_versioned(&self) -> bool {
        self.version.is_some()
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(version) = &self.version {
            let evr = Evr::new(self.epoch.as_deref(), version, self.release.as_deref());
            write!(f, " {} {}", self.flags.unwrap_or_default().symbol(), evr)?;
        }
        Ok(())
    }
}

/// A capability a package needs, normalized for matching
///
/// Unlike [`Capability`] the operator is always present; entries that did
/// not declare one compare with `EQ`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    pub name: String,
    pub epoch: Option<String>,
    pub version: Option<String>,
    pub release: Option<String>,
    pub flags: Flags,
}

impl Requirement {
    /// Requirement satisfied by any package of that name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            epoch: None,
            version: None,
            release: None,
            flags: Flags::Eq,
        }
    }

    /// Versioned requirement; `evr` is `[epoch:]version[-release]`
    pub fn versioned(name: impl Into<String>, flags: Flags, evr: &str) -> Self {
        Self::from(Capability::versioned(name, flags, evr))
    }

    pub fn is_versioned(&self) -> bool {
        self.version.is_some()
    }

    /// EVR of a versioned requirement
    pub fn evr(&self) -> Option<Evr<'_>> {
        self.version
            .as_deref()
            .map(|v| Evr::new(self.epoch.as_deref(), v, self.release.as_deref()))
    }
}

impl From<Capability> for Requirement {
    fn from(cap: Capability) -> Self {
        Self {
            name: cap.name,
            epoch: cap.epoch,
            version: cap.version,
            release: cap.release,
            flags: cap.flags.unwrap_or_default(),
        }
    }
}

impl From<&Capability> for Requirement {
    fn from(cap: &Capability) -> Self {
        Self::from(cap.clone())
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(evr) = self.evr() {
            write!(f, " {} {}", self.flags.symbol(), evr)?;
        }
        Ok(())
    }
}

/// Byte range of the RPM header inside the package file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderRange {
    pub start: u64,
    pub end: u64,
}

/// One package artifact as described by a repository's primary metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageUnit {
    pub name: String,
    pub epoch: String,
    pub version: String,
    pub release: String,
    pub arch: String,

    pub checksum: String,
    pub checksum_type: ChecksumType,

    pub summary: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,

    /// Build timestamp (seconds since the epoch)
    pub build_time: Option<u64>,
    /// File modification timestamp
    pub file_time: Option<u64>,

    /// Package file size in bytes
    pub size: u64,
    pub installed_size: Option<u64>,
    pub archive_size: Option<u64>,

    /// Location of the package file relative to the repository root
    pub relative_path: String,

    pub license: Option<String>,
    pub vendor: Option<String>,
    pub group: Option<String>,
    pub build_host: Option<String>,
    pub source_rpm: Option<String>,
    pub header_range: Option<HeaderRange>,

    pub provides: Vec<Capability>,
    pub requires: Vec<Capability>,
    pub recommends: Vec<Capability>,
    pub files: BTreeSet<String>,

    /// `<package>` element with checksum placeholders, for re-emission
    pub primary_template: Option<String>,
}

impl PackageUnit {
    /// Create a minimal package unit; remaining fields start empty
    pub fn new(
        name: impl Into<String>,
        epoch: impl Into<String>,
        version: impl Into<String>,
        release: impl Into<String>,
        arch: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let version = version.into();
        let release = release.into();
        let arch = arch.into();
        let relative_path = format!("Packages/{}-{}-{}.{}.rpm", name, version, release, arch);
        Self {
            name,
            epoch: epoch.into(),
            version,
            release,
            arch,
            checksum: String::new(),
            checksum_type: ChecksumType::Sha256,
            summary: None,
            description: None,
            url: None,
            build_time: None,
            file_time: None,
            size: 0,
            installed_size: None,
            archive_size: None,
            relative_path,
            license: None,
            vendor: None,
            group: None,
            build_host: None,
            source_rpm: None,
            header_range: None,
            provides: Vec::new(),
            requires: Vec::new(),
            recommends: Vec::new(),
            files: BTreeSet::new(),
            primary_template: None,
        }
    }

    pub fn with_checksum(mut self, checksum_type: ChecksumType, checksum: impl Into<String>) -> Self {
        self.checksum_type = checksum_type;
        self.checksum = checksum.into();
        self
    }

    pub fn with_provides(mut self, provides: Vec<Capability>) -> Self {
        self.provides = provides;
        self
    }

    pub fn with_requires(mut self, requires: Vec<Capability>) -> Self {
        self.requires = requires;
        self
    }

    /// NEVRA without checksum, as used by dependency references
    pub fn reference_key(&self) -> ReferenceKey {
        ReferenceKey::new(&self.name, &self.epoch, &self.version, &self.release, &self.arch)
    }

    /// NEVRA plus checksum, as used for catalog membership
    pub fn content_key(&self) -> ContentKey {
        ContentKey::new(self.reference_key(), self.checksum_type, &self.checksum)
    }

    /// Requirements built from this unit's requires entries
    pub fn requirements(&self) -> impl Iterator<Item = Requirement> + '_ {
        self.requires.iter().map(Requirement::from)
    }

    /// Render the stored `<package>` template with a concrete checksum
    ///
    /// Returns `None` for units that were not parsed from primary metadata.
    pub fn render_primary(&self, checksum_type: ChecksumType, checksum: &str) -> Option<String> {
        self.primary_template.as_ref().map(|template| {
            template
                .replace(CHECKSUMTYPE_TEMPLATE, checksum_type.as_str())
                .replace(CHECKSUM_TEMPLATE, checksum)
        })
    }
}

impl Versioned for PackageUnit {
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

impl fmt::Display for PackageUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}.{}", self.name, self.evr(), self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_type_parse() {
        assert_eq!("sha256".parse::<ChecksumType>().unwrap(), ChecksumType::Sha256);
        assert_eq!("SHA512".parse::<ChecksumType>().unwrap(), ChecksumType::Sha512);
        assert_eq!("sha".parse::<ChecksumType>().unwrap(), ChecksumType::Sha1);
        assert!(matches!(
            "crc32".parse::<ChecksumType>(),
            Err(Error::UnsupportedChecksum(_))
        ));
    }

    #[test]
    fn test_requirement_defaults_to_eq() {
        let cap = Capability {
            name: "foo".to_string(),
            epoch: None,
            version: Some("1.0".to_string()),
            release: None,
            flags: None,
        };
        let req = Requirement::from(&cap);
        assert_eq!(req.flags, Flags::Eq);
        assert!(req.is_versioned());
        assert!(!Requirement::named("foo").is_versioned());
    }

    #[test]
    fn test_capability_display() {
        let cap = Capability::versioned("libfoo.so.1", Flags::Ge, "1:2.0-3");
        assert_eq!(cap.to_string(), "libfoo.so.1 >= 1:2.0-3");
        assert_eq!(Capability::named("webserver").to_string(), "webserver");
    }

    #[test]
    fn test_package_keys() {
        let pkg = PackageUnit::new("bash", "0", "5.2", "1.fc39", "x86_64")
            .with_checksum(ChecksumType::Sha256, "abc");
        let key = pkg.content_key();
        assert_eq!(key.checksum, "abc");
        assert_eq!(key.reference(), &pkg.reference_key());
        assert_eq!(pkg.to_string(), "bash-5.2-1.fc39.x86_64");
    }

    #[test]
    fn test_render_primary_substitutes_placeholders() {
        let mut pkg = PackageUnit::new("bash", "0", "5.2", "1", "x86_64");
        assert!(pkg.render_primary(ChecksumType::Sha1, "ff").is_none());

        pkg.primary_template = Some(format!(
            "<checksum type=\"{}\" pkgid=\"YES\">{}</checksum>",
            CHECKSUMTYPE_TEMPLATE, CHECKSUM_TEMPLATE
        ));
        assert_eq!(
            pkg.render_primary(ChecksumType::Sha1, "ff").unwrap(),
            "<checksum type=\"sha1\" pkgid=\"YES\">ff</checksum>"
        );
    }
}
