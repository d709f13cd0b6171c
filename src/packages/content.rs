// src/packages/content.rs

//! Non-package content units and the closed `Unit` enum
//!
//! The copy orchestrator decides what to do with a unit by matching on
//! [`Unit`]; there is no open-ended type registry.

use crate::packages::keys::{ContentKey, ReferenceKey};
use crate::packages::unit::{Checksum, PackageUnit};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Metadata keys starting with this marker are internal to the host
pub const INTERNAL_KEY_MARKER: char = '_';

/// Kind of content unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Package,
    Group,
    Category,
    Environment,
    Erratum,
    MetadataFile,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Package => "package",
            UnitKind::Group => "group",
            UnitKind::Category => "category",
            UnitKind::Environment => "environment",
            UnitKind::Erratum => "erratum",
            UnitKind::MetadataFile => "metadata_file",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How strongly a group wants one of its packages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageReqType {
    Mandatory,
    #[default]
    Default,
    Optional,
    Conditional,
}

impl PackageReqType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mandatory" => Some(PackageReqType::Mandatory),
            "default" => Some(PackageReqType::Default),
            "optional" => Some(PackageReqType::Optional),
            "conditional" => Some(PackageReqType::Conditional),
            _ => None,
        }
    }
}

/// A package named by a group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageReq {
    pub name: String,
    pub req_type: PackageReqType,
    /// For conditional packages: install only if this package is present
    pub requires: Option<String>,
}

/// Package group (comps `<group>`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupUnit {
    pub id: String,
    pub repo_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub default: bool,
    pub user_visible: bool,
    pub display_order: Option<u32>,
    pub packages: Vec<PackageReq>,
}

impl GroupUnit {
    pub fn new(id: impl Into<String>, repo_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            repo_id: repo_id.into(),
            name: None,
            description: None,
            default: false,
            user_visible: true,
            display_order: None,
            packages: Vec::new(),
        }
    }

    /// Names of every package this group refers to, in declaration order
    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.packages.iter().map(|p| p.name.as_str())
    }
}

/// Group category (comps `<category>`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUnit {
    pub id: String,
    pub repo_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub display_order: Option<u32>,
    pub group_ids: Vec<String>,
}

impl CategoryUnit {
    pub fn new(id: impl Into<String>, repo_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            repo_id: repo_id.into(),
            name: None,
            description: None,
            display_order: None,
            group_ids: Vec::new(),
        }
    }
}

/// Optional group offered by an environment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvironmentOption {
    pub group_id: String,
    pub default: bool,
}

/// Environment (comps `<environment>`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentUnit {
    pub id: String,
    pub repo_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub display_order: Option<u32>,
    pub group_ids: Vec<String>,
    pub options: Vec<EnvironmentOption>,
}

impl EnvironmentUnit {
    pub fn new(id: impl Into<String>, repo_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            repo_id: repo_id.into(),
            name: None,
            description: None,
            display_order: None,
            group_ids: Vec::new(),
            options: Vec::new(),
        }
    }

    /// Mandatory groups followed by optional ones
    pub fn referenced_group_ids(&self) -> impl Iterator<Item = &str> {
        self.group_ids
            .iter()
            .map(String::as_str)
            .chain(self.options.iter().map(|o| o.group_id.as_str()))
    }
}

/// External reference (CVE, bugzilla ...) attached to an advisory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErratumReference {
    pub href: Option<String>,
    pub id: Option<String>,
    pub ref_type: Option<String>,
    pub title: Option<String>,
}

/// Package listed by an advisory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErratumPackage {
    pub key: ReferenceKey,
    pub filename: Option<String>,
    pub sum: Option<Checksum>,
    pub source_rpm: Option<String>,
}

/// Advisory (updateinfo `<update>`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErratumUnit {
    pub id: String,
    pub title: Option<String>,
    pub erratum_type: Option<String>,
    pub status: Option<String>,
    pub severity: Option<String>,
    pub version: Option<String>,
    pub from: Option<String>,
    pub issued: Option<String>,
    pub updated: Option<String>,
    pub description: Option<String>,
    pub references: Vec<ErratumReference>,
    pub packages: Vec<ErratumPackage>,
}

impl ErratumUnit {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            erratum_type: None,
            status: None,
            severity: None,
            version: None,
            from: None,
            issued: None,
            updated: None,
            description: None,
            references: Vec::new(),
            packages: Vec::new(),
        }
    }

    /// NEVRAs of the packages this advisory ships
    pub fn search_keys(&self) -> impl Iterator<Item = &ReferenceKey> {
        self.packages.iter().map(|p| &p.key)
    }

    pub fn issued_at(&self) -> Option<NaiveDateTime> {
        self.issued.as_deref().and_then(parse_advisory_date)
    }

    pub fn updated_at(&self) -> Option<NaiveDateTime> {
        self.updated.as_deref().and_then(parse_advisory_date)
    }
}

/// Advisory dates show up as "2023-01-31 10:00:00", "2023-01-31" or RFC 3339
fn parse_advisory_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

/// A repository metadata file carried as opaque content (e.g. productid)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataFileUnit {
    pub data_type: String,
    pub repo_id: String,
    pub checksum: Option<Checksum>,
    pub relative_path: String,
    /// Where the host keeps the file; `None` if nothing was ever stored
    pub storage_path: Option<PathBuf>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl MetadataFileUnit {
    pub fn new(
        data_type: impl Into<String>,
        repo_id: impl Into<String>,
        relative_path: impl Into<String>,
    ) -> Self {
        Self {
            data_type: data_type.into(),
            repo_id: repo_id.into(),
            checksum: None,
            relative_path: relative_path.into(),
            storage_path: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Copy of this unit owned by another repository
    ///
    /// Internal metadata keys are dropped and the storage path cleared; the
    /// host assigns a new one when the clone is initialized.
    pub fn clone_for(&self, repo_id: &str) -> Self {
        Self {
            data_type: self.data_type.clone(),
            repo_id: repo_id.to_string(),
            checksum: self.checksum.clone(),
            relative_path: self.relative_path.clone(),
            storage_path: None,
            metadata: self
                .metadata
                .iter()
                .filter(|(k, _)| !k.starts_with(INTERNAL_KEY_MARKER))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// Identity of any unit, for membership checks
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnitKey {
    Package(ContentKey),
    Group { repo_id: String, id: String },
    Category { repo_id: String, id: String },
    Environment { repo_id: String, id: String },
    Erratum { id: String },
    MetadataFile { repo_id: String, data_type: String },
}

/// Any content unit a repository can hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Unit {
    Package(PackageUnit),
    Group(GroupUnit),
    Category(CategoryUnit),
    Environment(EnvironmentUnit),
    Erratum(ErratumUnit),
    MetadataFile(MetadataFileUnit),
}

impl Unit {
    pub fn kind(&self) -> UnitKind {
        match self {
            Unit::Package(_) => UnitKind::Package,
            Unit::Group(_) => UnitKind::Group,
            Unit::Category(_) => UnitKind::Category,
            Unit::Environment(_) => UnitKind::Environment,
            Unit::Erratum(_) => UnitKind::Erratum,
            Unit::MetadataFile(_) => UnitKind::MetadataFile,
        }
    }

    pub fn key(&self) -> UnitKey {
        match self {
            Unit::Package(p) => UnitKey::Package(p.content_key()),
            Unit::Group(g) => UnitKey::Group {
                repo_id: g.repo_id.clone(),
                id: g.id.clone(),
            },
            Unit::Category(c) => UnitKey::Category {
                repo_id: c.repo_id.clone(),
                id: c.id.clone(),
            },
            Unit::Environment(e) => UnitKey::Environment {
                repo_id: e.repo_id.clone(),
                id: e.id.clone(),
            },
            Unit::Erratum(e) => UnitKey::Erratum { id: e.id.clone() },
            Unit::MetadataFile(m) => UnitKey::MetadataFile {
                repo_id: m.repo_id.clone(),
                data_type: m.data_type.clone(),
            },
        }
    }

    pub fn as_package(&self) -> Option<&PackageUnit> {
        match self {
            Unit::Package(p) => Some(p),
            _ => None,
        }
    }
}

impl From<PackageUnit> for Unit {
    fn from(unit: PackageUnit) -> Self {
        Unit::Package(unit)
    }
}

impl From<GroupUnit> for Unit {
    fn from(unit: GroupUnit) -> Self {
        Unit::Group(unit)
    }
}

impl From<CategoryUnit> for Unit {
    fn from(unit: CategoryUnit) -> Self {
        Unit::Category(unit)
    }
}

impl From<EnvironmentUnit> for Unit {
    fn from(unit: EnvironmentUnit) -> Self {
        Unit::Environment(unit)
    }
}

impl From<ErratumUnit> for Unit {
    fn from(unit: ErratumUnit) -> Self {
        Unit::Erratum(unit)
    }
}

impl From<MetadataFileUnit> for Unit {
    fn from(unit: MetadataFileUnit) -> Self {
        Unit::MetadataFile(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_file_clone_strips_internal_keys() {
        let mut unit = MetadataFileUnit::new("productid", "src-repo", "repodata/productid.gz");
        unit.storage_path = Some(PathBuf::from("/var/lib/content/productid.gz"));
        unit.metadata
            .insert("_storage_id".to_string(), serde_json::json!("abc"));
        unit.metadata
            .insert("compressed".to_string(), serde_json::json!(true));

        let clone = unit.clone_for("dest-repo");
        assert_eq!(clone.repo_id, "dest-repo");
        assert!(clone.storage_path.is_none());
        assert!(!clone.metadata.contains_key("_storage_id"));
        assert_eq!(clone.metadata.get("compressed"), Some(&serde_json::json!(true)));
    }

    #[test]
    fn test_group_keys_include_repository() {
        let a = Unit::from(GroupUnit::new("core", "one"));
        let b = Unit::from(GroupUnit::new("core", "two"));
        assert_ne!(a.key(), b.key());
        assert_eq!(a.kind(), UnitKind::Group);
    }

    #[test]
    fn test_environment_group_ids() {
        let mut env = EnvironmentUnit::new("server", "repo");
        env.group_ids = vec!["core".to_string()];
        env.options.push(EnvironmentOption {
            group_id: "web".to_string(),
            default: true,
        });
        let ids: Vec<_> = env.referenced_group_ids().collect();
        assert_eq!(ids, vec!["core", "web"]);
    }

    #[test]
    fn test_advisory_dates() {
        let mut erratum = ErratumUnit::new("RHSA-2023:0001");
        erratum.issued = Some("2023-01-31 10:00:00".to_string());
        erratum.updated = Some("2023-02-01".to_string());
        assert_eq!(
            erratum.issued_at().unwrap().to_string(),
            "2023-01-31 10:00:00"
        );
        assert_eq!(erratum.updated_at().unwrap().to_string(), "2023-02-01 00:00:00");

        erratum.issued = Some("not a date".to_string());
        assert!(erratum.issued_at().is_none());
    }
}
