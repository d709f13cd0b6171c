// src/repository/parsers/manifest.rs

//! Manifest list parser for plain file mirrors
//!
//! One record per line: `name,checksum,size`. The checksum is a SHA-256 hex
//! digest. Blank lines and `#` comments are skipped; any other line must
//! carry all three fields.

use super::MetadataParser;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use tracing::info;

/// File listed by a manifest
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the manifest's directory
    pub name: String,
    pub checksum: String,
    pub size: u64,
}

impl ManifestEntry {
    fn parse(line: &str, line_number: usize) -> Result<Self> {
        let malformed = |reason: &str| Error::MalformedManifest {
            line: line_number,
            reason: reason.to_string(),
        };

        let mut fields = line.split(',').map(str::trim);
        let name = fields.next().filter(|f| !f.is_empty()).ok_or_else(|| malformed("missing name"))?;
        let checksum = fields
            .next()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| malformed("missing checksum"))?;
        let size = fields
            .next()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| malformed("missing size"))?;
        if fields.next().is_some() {
            return Err(malformed("too many fields"));
        }

        let size = size
            .parse()
            .map_err(|e| malformed(&format!("invalid size '{}': {}", size, e)))?;
        if !checksum.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(malformed(&format!("checksum '{}' is not hexadecimal", checksum)));
        }

        Ok(Self {
            name: name.to_string(),
            checksum: checksum.to_ascii_lowercase(),
            size,
        })
    }
}

/// Line-at-a-time manifest reader
pub struct ManifestReader<R: BufRead> {
    reader: R,
    line: String,
    line_number: usize,
    done: bool,
}

impl<R: BufRead> ManifestReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            line_number: 0,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for ManifestReader<R> {
    type Item = Result<ManifestEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line_number += 1;
                    let line = self.line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    return Some(ManifestEntry::parse(line, self.line_number));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }
        None
    }
}

impl<R: BufRead> MetadataParser<R> for ManifestReader<R> {
    type Record = ManifestEntry;

    fn from_reader(reader: R) -> Self {
        Self::new(reader)
    }
}

/// Read a whole manifest, rejecting it at the first malformed record
pub fn parse_manifest<R: BufRead>(reader: R) -> Result<Vec<ManifestEntry>> {
    let entries = ManifestReader::new(reader).collect_records()?;
    info!("Parsed manifest: {} entr(ies)", entries.len());
    Ok(entries)
}
