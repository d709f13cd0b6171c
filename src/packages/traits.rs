// src/packages/traits.rs

//! Common traits for versioned package identities

use crate::version::Evr;
use std::sync::Arc;

/// Anything that names one build of a package: full units and bare keys
///
/// Retention and newest-version selection only need name, arch and EVR, so
/// they are written against this trait rather than a concrete unit type.
pub trait Versioned {
    /// Get the package name
    fn name(&self) -> &str;

    /// Get the package architecture (e.g., "x86_64", "noarch", "src")
    fn arch(&self) -> &str;

    /// Get the epoch/version/release triple
    fn evr(&self) -> Evr<'_>;

    /// Whether this is a source package
    fn is_source(&self) -> bool {
        matches!(self.arch(), "src" | "nosrc")
    }
}

impl<T: Versioned + ?Sized> Versioned for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn arch(&self) -> &str {
        (**self).arch()
    }

    fn evr(&self) -> Evr<'_> {
        (**self).evr()
    }
}

impl<T: Versioned + ?Sized> Versioned for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn arch(&self) -> &str {
        (**self).arch()
    }

    fn evr(&self) -> Evr<'_> {
        (**self).evr()
    }
}
