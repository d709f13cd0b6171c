// src/repository/parsers/mod.rs

//! Repository metadata parsers
//!
//! This module provides streaming parsers for the metadata a yum/dnf
//! repository publishes:
//! - repomd.xml: index of the other metadata sections
//! - primary.xml: one record per package
//! - comps.xml: groups, categories and environments
//! - updateinfo.xml: advisories
//! - Manifest lists (`name,checksum,size` per line) for plain file mirrors
//!
//! The XML parsers are iterators: each call to `next` reads just far enough
//! to produce one record, and nothing of a record is kept once it has been
//! handed out. Stopping iteration early is the cancellation point.

pub mod comps;
pub mod manifest;
pub mod primary;
pub mod repomd;
pub mod updateinfo;

use crate::error::{Error, Result};
use crate::repository::open_metadata;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesStart, BytesText, Event};
use std::io::BufRead;
use std::path::Path;

pub use comps::{CompsEntry, CompsReader};
pub use manifest::{ManifestEntry, ManifestReader, parse_manifest};
pub use primary::PrimaryReader;
pub use repomd::{Repomd, RepomdReader, RepomdRecord, parse_repomd};
pub use updateinfo::UpdateInfoReader;

/// Streaming parser over one metadata document
pub trait MetadataParser<R: BufRead>: Iterator<Item = Result<Self::Record>> + Sized {
    /// Record produced per element
    type Record;

    /// Start parsing a document
    fn from_reader(reader: R) -> Self;

    /// Drain the whole document; fails on the first bad record
    fn collect_records(self) -> Result<Vec<Self::Record>> {
        self.collect()
    }
}

/// Open a staged metadata file (compressed or not) with the given parser
pub fn open<P>(path: &Path) -> Result<P>
where
    P: MetadataParser<Box<dyn BufRead>>,
{
    Ok(P::from_reader(open_metadata(path)?))
}

/// XML reader configured the way every parser here expects
pub(crate) fn xml_reader<R: BufRead>(reader: R) -> Reader<R> {
    let mut reader = Reader::from_reader(reader);
    reader.trim_text(true);
    reader
}

/// Element name without namespace prefix (`rpm:entry` -> `entry`)
pub(crate) fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Unescaped value of an attribute, if present
pub(crate) fn attribute(e: &BytesStart, key: &str) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.local_name().as_ref() == key.as_bytes())
        .map(|a| match a.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&a.value).into_owned(),
        })
}

/// Unescaped text content
pub(crate) fn text(e: &BytesText) -> Result<String> {
    Ok(e.unescape()?.into_owned())
}

/// Parse an optional numeric attribute, rejecting garbage
pub(crate) fn numeric_attribute(e: &BytesStart, key: &str) -> Result<Option<u64>> {
    attribute(e, key)
        .map(|value| {
            value.trim().parse::<u64>().map_err(|err| {
                Error::ParseError(format!("Invalid {} attribute '{}': {}", key, value, err))
            })
        })
        .transpose()
}

/// Write one event into a re-serialization buffer
pub(crate) fn emit(writer: &mut Writer<Vec<u8>>, event: &Event) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::ParseError(format!("Failed to re-serialize XML: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(xml: &str) -> BytesStart<'static> {
        let mut reader = xml_reader(xml.as_bytes());
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf).unwrap() {
                Event::Start(e) | Event::Empty(e) => return e.into_owned(),
                Event::Eof => panic!("no element in {}", xml),
                _ => {}
            }
        }
    }

    #[test]
    fn test_local_name_strips_prefix() {
        let e = start(r#"<rpm:entry name="foo"/>"#);
        assert_eq!(local_name(&e), "entry");
        assert_eq!(attribute(&e, "name").as_deref(), Some("foo"));
        assert_eq!(attribute(&e, "flags"), None);
    }

    #[test]
    fn test_attribute_unescapes() {
        let e = start(r#"<entry name="a&amp;b"/>"#);
        assert_eq!(attribute(&e, "name").as_deref(), Some("a&b"));
    }

    #[test]
    fn test_numeric_attribute() {
        let e = start(r#"<size package="1024" installed="x"/>"#);
        assert_eq!(numeric_attribute(&e, "package").unwrap(), Some(1024));
        assert_eq!(numeric_attribute(&e, "archive").unwrap(), None);
        assert!(numeric_attribute(&e, "installed").is_err());
    }
}
