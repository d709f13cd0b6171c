// src/lib.rs

//! Repomirror
//!
//! Mirroring and curation engine for RPM repositories.
//!
//! # Architecture
//!
//! - Streaming metadata: repomd/primary/comps/updateinfo are read one record
//!   at a time, never as a whole document tree
//! - Explicit index: provides and package-name lookups are built once per
//!   catalog and handed to the solver
//! - Typed identity: content keys (with checksum) and reference keys
//!   (without) are distinct types
//! - Closed unit set: the copy orchestrator matches on [`packages::Unit`]
//! - No I/O beyond staged files: downloading and publishing are up to the
//!   host

pub mod associate;
pub mod config;
mod error;
pub mod packages;
pub mod repository;
pub mod resolver;
pub mod version;

pub use error::{Error, Result};
