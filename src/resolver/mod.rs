// src/resolver/mod.rs

//! Dependency resolution between repositories
//!
//! - [`matcher`]: does a package satisfy a requirement
//! - [`index`]: provides/package-name lookup tables built once per catalog
//! - [`solver`]: requirement matching and transitive dependency expansion

pub mod index;
pub mod matcher;
pub mod solver;

pub use index::{PackageIndex, PackagesIndex, ProvidesIndex};
pub use matcher::fills_requirement;
pub use solver::{Closure, Solver};
