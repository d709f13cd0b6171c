// src/repository/parsers/repomd.rs

//! repomd.xml parser
//!
//! repomd.xml lists the metadata sections of a repository (primary,
//! filelists, other, group, updateinfo, ...) with their location, size and
//! checksums. Optional fields that are missing stay `None`.

use super::{MetadataParser, attribute, local_name, text, xml_reader};
use crate::error::{Error, Result};
use crate::packages::{Checksum, ChecksumType};
use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use tracing::{debug, info, warn};

/// One `<data>` section of repomd.xml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepomdRecord {
    /// Section type (`primary`, `updateinfo`, `group_gz` ...)
    pub data_type: String,
    /// Location relative to the repository root
    pub relative_path: String,
    pub checksum: Option<Checksum>,
    pub open_checksum: Option<Checksum>,
    pub size: Option<u64>,
    pub open_size: Option<u64>,
    pub timestamp: Option<i64>,
}

impl RepomdRecord {
    pub fn timestamp_datetime(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    /// Whether the section is stored compressed
    pub fn is_compressed(&self) -> bool {
        [".gz", ".bz2", ".xz", ".zst"]
            .iter()
            .any(|ext| self.relative_path.ends_with(ext))
    }
}

/// Fully read repomd.xml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repomd {
    pub revision: Option<String>,
    pub records: Vec<RepomdRecord>,
}

impl Repomd {
    /// Look up a section by type
    pub fn find(&self, data_type: &str) -> Option<&RepomdRecord> {
        self.records.iter().find(|r| r.data_type == data_type)
    }
}

/// Read a whole repomd.xml; the document is small, but sections still stream
pub fn parse_repomd<R: BufRead>(reader: R) -> Result<Repomd> {
    let mut sections = RepomdReader::from_reader(reader);
    let mut records = Vec::new();
    for record in sections.by_ref() {
        records.push(record?);
    }
    info!("Parsed repomd.xml: {} section(s)", records.len());
    Ok(Repomd {
        revision: sections.revision().map(str::to_string),
        records,
    })
}

#[derive(Default)]
struct RecordBuilder {
    data_type: Option<String>,
    location: Option<String>,
    checksum: Option<Checksum>,
    open_checksum: Option<Checksum>,
    size: Option<u64>,
    open_size: Option<u64>,
    timestamp: Option<i64>,
    /// checksum type attribute of the checksum element being read
    pending_checksum_type: Option<String>,
}

impl RecordBuilder {
    fn build(self) -> Result<RepomdRecord> {
        let data_type = self.data_type.ok_or_else(|| Error::missing("repomd data", "type"))?;
        let relative_path = self
            .location
            .ok_or_else(|| Error::missing(format!("repomd data '{}'", data_type), "location"))?;
        Ok(RepomdRecord {
            data_type,
            relative_path,
            checksum: self.checksum,
            open_checksum: self.open_checksum,
            size: self.size,
            open_size: self.open_size,
            timestamp: self.timestamp,
        })
    }

    fn checksum(&mut self, digest: String) -> Option<Checksum> {
        let kind = self.pending_checksum_type.take()?;
        match kind.parse::<ChecksumType>() {
            Ok(algorithm) => Some(Checksum::new(algorithm, digest)),
            Err(e) => {
                warn!("Ignoring checksum in repomd.xml: {}", e);
                None
            }
        }
    }
}

/// Streaming reader over the `<data>` sections of repomd.xml
pub struct RepomdReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    revision: Option<String>,
    done: bool,
}

impl<R: BufRead> RepomdReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: xml_reader(reader),
            buf: Vec::new(),
            revision: None,
            done: false,
        }
    }

    /// Repository revision, once the parser has passed `<revision>`
    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    fn next_record(&mut self) -> Result<Option<RepomdRecord>> {
        let mut current: Option<RecordBuilder> = None;
        let mut element = String::new();
        let mut content = String::new();

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => {
                    element = local_name(&e);
                    content.clear();
                    start_element(&mut current, &element, &e);
                }
                Event::Empty(e) => {
                    let name = local_name(&e);
                    start_element(&mut current, &name, &e);
                }
                Event::Text(e) => content.push_str(&text(&e)?),
                Event::End(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    let value = std::mem::take(&mut content);
                    match (name.as_str(), current.as_mut()) {
                        ("data", Some(_)) => {
                            if let Some(builder) = current.take() {
                                let record = builder.build()?;
                                debug!("repomd section {} at {}", record.data_type, record.relative_path);
                                return Ok(Some(record));
                            }
                        }
                        ("revision", None) => self.revision = Some(value),
                        ("checksum", Some(b)) => b.checksum = b.checksum(value),
                        ("open-checksum", Some(b)) => b.open_checksum = b.checksum(value),
                        ("size", Some(b)) => b.size = parse_number(&name, &value)?,
                        ("open-size", Some(b)) => b.open_size = parse_number(&name, &value)?,
                        ("timestamp", Some(b)) => b.timestamp = parse_timestamp(&value)?,
                        _ => {}
                    }
                    element.clear();
                }
                Event::Eof => {
                    if current.is_some() {
                        return Err(Error::ParseError(
                            "repomd.xml ended inside a <data> element".to_string(),
                        ));
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

fn start_element(current: &mut Option<RecordBuilder>, name: &str, e: &BytesStart) {
    match (name, current.as_mut()) {
        ("data", None) => {
            *current = Some(RecordBuilder {
                data_type: attribute(e, "type"),
                ..Default::default()
            });
        }
        ("location", Some(b)) => b.location = attribute(e, "href"),
        ("checksum" | "open-checksum", Some(b)) => b.pending_checksum_type = attribute(e, "type"),
        _ => {}
    }
}

fn parse_number(field: &str, value: &str) -> Result<Option<u64>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<u64>()
        .map(Some)
        .map_err(|e| Error::ParseError(format!("Invalid {} '{}' in repomd.xml: {}", field, value, e)))
}

/// Timestamps are integers, occasionally with a fractional part
fn parse_timestamp(value: &str) -> Result<Option<i64>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if let Ok(ts) = value.parse::<i64>() {
        return Ok(Some(ts));
    }
    value
        .parse::<f64>()
        .map(|ts| Some(ts as i64))
        .map_err(|e| Error::ParseError(format!("Invalid timestamp '{}' in repomd.xml: {}", value, e)))
}

impl<R: BufRead> Iterator for RepomdReader<R> {
    type Item = Result<RepomdRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: BufRead> MetadataParser<R> for RepomdReader<R> {
    type Record = RepomdRecord;

    fn from_reader(reader: R) -> Self {
        Self::new(reader)
    }
}
