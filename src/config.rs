// src/config.rs
//! Mirror configuration
//!
//! ```toml
//! [sync]
//! retain_newest = 3
//! remove_missing = true
//! skip = ["erratum"]
//!
//! [copy]
//! recursive = true
//! ```

use crate::associate::CopyOptions;
use crate::error::{Error, Result};
use crate::packages::UnitKind;
use crate::repository::{RetentionPolicy, SyncOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Sync behaviour
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Versions kept per package; unset keeps everything
    #[serde(default)]
    pub retain_newest: Option<i64>,

    /// Unassociate units the remote no longer lists
    #[serde(default)]
    pub remove_missing: bool,

    /// Unit kinds ignored by sync and copy
    #[serde(default)]
    pub skip: Vec<UnitKind>,
}

/// Copy behaviour
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyConfig {
    /// Copy dependencies and referenced units along with the requested ones
    #[serde(default)]
    pub recursive: bool,
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub copy: CopyConfig,
}

impl Config {
    /// Load a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {}", e)))?;
        // Reject a bad retention count at load time rather than mid-sync
        config.retention_policy()?;
        Ok(config)
    }

    /// Validated retention policy, if one is configured
    pub fn retention_policy(&self) -> Result<Option<RetentionPolicy>> {
        self.sync.retain_newest.map(RetentionPolicy::new).transpose()
    }

    pub fn copy_options(&self) -> CopyOptions {
        CopyOptions {
            recursive: self.copy.recursive,
            skip: self.sync.skip.iter().copied().collect(),
        }
    }

    pub fn sync_options(&self) -> Result<SyncOptions> {
        Ok(SyncOptions {
            remove_missing: self.sync.remove_missing,
            retention: self.retention_policy()?,
            skip: self.sync.skip.iter().copied().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_is_valid() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(!config.copy_options().recursive);
        assert_eq!(config.retention_policy().unwrap(), None);
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml_str(
            r#"
[sync]
retain_newest = 3
remove_missing = true
skip = ["erratum", "metadata_file"]

[copy]
recursive = true
"#,
        )
        .unwrap();

        let sync = config.sync_options().unwrap();
        assert!(sync.remove_missing);
        assert_eq!(sync.retention.unwrap().keep(), 3);
        assert!(sync.skip.contains(&UnitKind::MetadataFile));

        let copy = config.copy_options();
        assert!(copy.recursive);
        assert!(copy.skip.contains(&UnitKind::Erratum));
    }

    #[test]
    fn test_invalid_retention_rejected() {
        let result = Config::from_toml_str("[sync]\nretain_newest = 0\n");
        assert!(matches!(result, Err(Error::InvalidRetention(0))));
    }

    #[test]
    fn test_unknown_unit_kind_rejected() {
        let result = Config::from_toml_str("[sync]\nskip = [\"rpm\"]\n");
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[copy]\nrecursive = true").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert!(config.copy.recursive);

        assert!(Config::load(Path::new("/nonexistent/repomirror.toml")).is_err());
    }
}
