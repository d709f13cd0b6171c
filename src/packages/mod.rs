// src/packages/mod.rs

//! Content units handled by the mirror
//!
//! This module defines the entities that flow between the parsers, the
//! resolver and the copy orchestrator: package units with their
//! capabilities, the identity keys used for set operations, and the closed
//! set of non-package unit kinds (groups, categories, environments, errata,
//! metadata files).

pub mod content;
pub mod keys;
pub mod set;
pub mod traits;
pub mod unit;

pub use content::{
    CategoryUnit, EnvironmentOption, EnvironmentUnit, ErratumPackage, ErratumReference,
    ErratumUnit, GroupUnit, MetadataFileUnit, PackageReq, PackageReqType, Unit, UnitKey, UnitKind,
};
pub use keys::{ContentKey, ReferenceKey};
pub use set::PackageSet;
pub use traits::Versioned;
pub use unit::{
    Capability, Checksum, ChecksumType, Flags, HeaderRange, PackageUnit, Requirement,
    CHECKSUMTYPE_TEMPLATE, CHECKSUM_TEMPLATE,
};
