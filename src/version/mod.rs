// src/version/mod.rs

//! RPM version comparison
//!
//! This module implements the segment comparison RPM uses for version and
//! release strings (`rpmvercmp`) and the epoch/version/release ordering built
//! on top of it.
//!
//! Rules, in order:
//! - Separators (anything that is not alphanumeric, `~` or `^`) only split segments
//! - `~` sorts before everything, including the end of the string
//! - `^` sorts after the end of the string but before any other segment
//! - Numeric segments compare as integers, leading zeros ignored
//! - Alphabetic segments compare bytewise
//! - A numeric segment is always newer than an alphabetic one

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Compare two version (or release) strings with RPM segment semantics
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let mut one = a.as_bytes();
    let mut two = b.as_bytes();

    loop {
        one = skip_separators(one);
        two = skip_separators(two);

        // Tilde sorts before anything, even the end of the string
        if one.first() == Some(&b'~') || two.first() == Some(&b'~') {
            if one.first() != Some(&b'~') {
                return Ordering::Greater;
            }
            if two.first() != Some(&b'~') {
                return Ordering::Less;
            }
            one = &one[1..];
            two = &two[1..];
            continue;
        }

        // Caret sorts after the end of the string, before any other segment
        if one.first() == Some(&b'^') || two.first() == Some(&b'^') {
            if one.is_empty() {
                return Ordering::Less;
            }
            if two.is_empty() {
                return Ordering::Greater;
            }
            if one[0] != b'^' {
                return Ordering::Greater;
            }
            if two[0] != b'^' {
                return Ordering::Less;
            }
            one = &one[1..];
            two = &two[1..];
            continue;
        }

        if one.is_empty() || two.is_empty() {
            break;
        }

        let numeric = one[0].is_ascii_digit();
        let (seg1, rest1) = split_segment(one, numeric);
        let (seg2, rest2) = split_segment(two, numeric);

        // Segment types differ: numeric beats alpha
        if seg2.is_empty() {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let ord = if numeric {
            compare_numeric(seg1, seg2)
        } else {
            seg1.cmp(seg2)
        };
        if ord != Ordering::Equal {
            return ord;
        }

        one = rest1;
        two = rest2;
    }

    match (one.is_empty(), two.is_empty()) {
        (true, true) => Ordering::Equal,
        (false, _) => Ordering::Greater,
        (true, false) => Ordering::Less,
    }
}

fn skip_separators(s: &[u8]) -> &[u8] {
    let start = s
        .iter()
        .position(|&c| c.is_ascii_alphanumeric() || c == b'~' || c == b'^')
        .unwrap_or(s.len());
    &s[start..]
}

fn split_segment(s: &[u8], numeric: bool) -> (&[u8], &[u8]) {
    let end = s
        .iter()
        .position(|&c| {
            if numeric {
                !c.is_ascii_digit()
            } else {
                !c.is_ascii_alphabetic()
            }
        })
        .unwrap_or(s.len());
    s.split_at(end)
}

fn compare_numeric(a: &[u8], b: &[u8]) -> Ordering {
    let a = strip_leading_zeros(a);
    let b = strip_leading_zeros(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn strip_leading_zeros(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|&c| c != b'0').unwrap_or(s.len());
    &s[start..]
}

/// Borrowed epoch/version/release triple
///
/// A missing epoch compares as `0`. A missing release on either side drops
/// the release from the comparison, which is how RPM treats requirements
/// such as `foo >= 1.2` that do not name a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Evr<'a> {
    pub epoch: Option<&'a str>,
    pub version: &'a str,
    pub release: Option<&'a str>,
}

impl<'a> Evr<'a> {
    pub fn new(epoch: Option<&'a str>, version: &'a str, release: Option<&'a str>) -> Self {
        Self {
            epoch,
            version,
            release,
        }
    }

    /// Parse `[epoch:]version[-release]`
    ///
    /// The release is everything after the last `-`, so versions that
    /// contain dashes of their own must carry an explicit release.
    pub fn parse(s: &'a str) -> Self {
        let (epoch, rest) = match s.split_once(':') {
            Some((e, r)) => (Some(e), r),
            None => (None, s),
        };
        let (version, release) = match rest.rsplit_once('-') {
            Some((v, r)) => (v, Some(r)),
            None => (rest, None),
        };
        Self {
            epoch,
            version,
            release,
        }
    }

    /// Epoch with the implicit default applied
    pub fn epoch_or_zero(&self) -> &'a str {
        match self.epoch {
            Some(e) if !e.is_empty() => e,
            _ => "0",
        }
    }

    /// Total comparison for units that all carry a release
    pub fn compare(&self, other: &Evr<'_>) -> Ordering {
        compare_evr(self, other)
    }
}

/// Compare two EVRs: epoch, then version, then release when both have one
pub fn compare_evr(a: &Evr<'_>, b: &Evr<'_>) -> Ordering {
    rpmvercmp(a.epoch_or_zero(), b.epoch_or_zero())
        .then_with(|| rpmvercmp(a.version, b.version))
        .then_with(|| match (a.release, b.release) {
            (Some(ra), Some(rb)) => rpmvercmp(ra, rb),
            _ => Ordering::Equal,
        })
}

impl fmt::Display for Evr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(epoch) = self.epoch.filter(|e| !e.is_empty() && *e != "0") {
            write!(f, "{}:", epoch)?;
        }
        write!(f, "{}", self.version)?;
        if let Some(release) = self.release {
            write!(f, "-{}", release)?;
        }
        Ok(())
    }
}

/// Owned EVR, for places that need to keep one around
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvrString {
    pub epoch: Option<String>,
    pub version: String,
    pub release: Option<String>,
}

impl EvrString {
    pub fn as_evr(&self) -> Evr<'_> {
        Evr::new(
            self.epoch.as_deref(),
            &self.version,
            self.release.as_deref(),
        )
    }
}

impl From<Evr<'_>> for EvrString {
    fn from(evr: Evr<'_>) -> Self {
        Self {
            epoch: evr.epoch.map(str::to_string),
            version: evr.version.to_string(),
            release: evr.release.map(str::to_string),
        }
    }
}

impl fmt::Display for EvrString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_evr().fmt(f)
    }
}
