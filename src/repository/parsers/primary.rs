// src/repository/parsers/primary.rs

//! primary.xml parser
//!
//! primary.xml carries one `<package>` element per RPM in the repository,
//! which makes it the largest metadata document by far. The reader keeps
//! only the package currently being built: each `<package>` element is
//! turned into a [`PackageUnit`] as soon as its end tag is read.
//!
//! While reading a package the element is also re-serialized into
//! `PackageUnit::primary_template`, with the checksum text and its `type`
//! attribute replaced by placeholders so the record can be emitted again
//! with a different checksum algorithm.

use super::{MetadataParser, attribute, emit, local_name, numeric_attribute, text, xml_reader};
use crate::error::{Error, Result};
use crate::packages::{
    CHECKSUM_TEMPLATE, CHECKSUMTYPE_TEMPLATE, Capability, ChecksumType, Flags, HeaderRange,
    PackageUnit,
};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeSet;
use std::io::BufRead;
use tracing::{debug, info, warn};

/// Dependency list an `<rpm:entry>` belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryList {
    Provides,
    Requires,
    Recommends,
}

impl EntryList {
    fn from_element(name: &str) -> Option<Self> {
        match name {
            "provides" => Some(EntryList::Provides),
            "requires" => Some(EntryList::Requires),
            "recommends" => Some(EntryList::Recommends),
            _ => None,
        }
    }
}

/// Lists whose entries are not kept
const IGNORED_LISTS: &[&str] = &["conflicts", "obsoletes", "suggests", "supplements", "enhances"];

/// Accumulates one `<package>` element
struct PackageBuilder {
    name: Option<String>,
    arch: Option<String>,
    epoch: Option<String>,
    version: Option<String>,
    release: Option<String>,
    checksum: Option<String>,
    checksum_type: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    url: Option<String>,
    build_time: Option<u64>,
    file_time: Option<u64>,
    size: Option<u64>,
    installed_size: Option<u64>,
    archive_size: Option<u64>,
    location: Option<String>,
    license: Option<String>,
    vendor: Option<String>,
    group: Option<String>,
    build_host: Option<String>,
    source_rpm: Option<String>,
    header_range: Option<HeaderRange>,
    provides: Vec<Capability>,
    requires: Vec<Capability>,
    recommends: Vec<Capability>,
    files: BTreeSet<String>,

    entries: Option<EntryList>,
    element: String,
    content: String,
    template: Writer<Vec<u8>>,
    /// First record-level problem; reported when the element closes
    error: Option<Error>,
}

impl PackageBuilder {
    fn new() -> Self {
        Self {
            name: None,
            arch: None,
            epoch: None,
            version: None,
            release: None,
            checksum: None,
            checksum_type: None,
            summary: None,
            description: None,
            url: None,
            build_time: None,
            file_time: None,
            size: None,
            installed_size: None,
            archive_size: None,
            location: None,
            license: None,
            vendor: None,
            group: None,
            build_host: None,
            source_rpm: None,
            header_range: None,
            provides: Vec::new(),
            requires: Vec::new(),
            recommends: Vec::new(),
            files: BTreeSet::new(),
            entries: None,
            element: String::new(),
            content: String::new(),
            template: Writer::new(Vec::new()),
            error: None,
        }
    }

    fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn number(&mut self, e: &BytesStart, key: &str) -> Option<u64> {
        match numeric_attribute(e, key) {
            Ok(value) => value,
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    fn start(&mut self, name: &str, e: &BytesStart, empty: bool) -> Result<()> {
        if name == "checksum" {
            self.checksum_type = attribute(e, "type");
            let mut rewritten = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            for attr in e.attributes().filter_map(|a| a.ok()) {
                if attr.key.local_name().as_ref() == b"type" {
                    rewritten.push_attribute(("type", CHECKSUMTYPE_TEMPLATE));
                } else {
                    rewritten.push_attribute(attr);
                }
            }
            let event = if empty {
                Event::Empty(rewritten)
            } else {
                Event::Start(rewritten)
            };
            emit(&mut self.template, &event)?;
        } else {
            let event = if empty {
                Event::Empty(e.clone())
            } else {
                Event::Start(e.clone())
            };
            emit(&mut self.template, &event)?;
        }

        if !empty {
            self.element = name.to_string();
            self.content.clear();
        }

        match name {
            "version" => {
                self.epoch = attribute(e, "epoch");
                self.version = attribute(e, "ver");
                self.release = attribute(e, "rel");
            }
            "time" => {
                self.file_time = self.number(e, "file");
                self.build_time = self.number(e, "build");
            }
            "size" => {
                self.size = self.number(e, "package");
                self.installed_size = self.number(e, "installed");
                self.archive_size = self.number(e, "archive");
            }
            "location" => self.location = attribute(e, "href"),
            "header-range" => {
                let start = self.number(e, "start");
                let end = self.number(e, "end");
                if let (Some(start), Some(end)) = (start, end) {
                    self.header_range = Some(HeaderRange { start, end });
                }
            }
            "entry" => self.entry(e),
            list if IGNORED_LISTS.contains(&list) => self.entries = None,
            list => {
                if let Some(kind) = EntryList::from_element(list) {
                    self.entries = Some(kind);
                }
            }
        }
        Ok(())
    }

    fn entry(&mut self, e: &BytesStart) {
        let Some(list) = self.entries else {
            return;
        };
        let Some(name) = attribute(e, "name") else {
            self.fail(Error::missing("rpm:entry", "name"));
            return;
        };
        let flags = match attribute(e, "flags").map(|f| f.parse::<Flags>()).transpose() {
            Ok(flags) => flags,
            Err(err) => {
                self.fail(err);
                return;
            }
        };
        let capability = Capability {
            name,
            epoch: attribute(e, "epoch"),
            version: attribute(e, "ver"),
            release: attribute(e, "rel"),
            flags,
        };
        match list {
            EntryList::Provides => self.provides.push(capability),
            EntryList::Requires => self.requires.push(capability),
            EntryList::Recommends => self.recommends.push(capability),
        }
    }

    fn text(&mut self, value: &str, event: &Event) -> Result<()> {
        if self.element == "checksum" {
            emit(&mut self.template, &Event::Text(BytesText::new(CHECKSUM_TEMPLATE)))?;
        } else {
            emit(&mut self.template, event)?;
        }
        self.content.push_str(value);
        Ok(())
    }

    fn end(&mut self, name: &str, e: &BytesEnd) -> Result<()> {
        emit(&mut self.template, &Event::End(e.clone()))?;

        if name == self.element {
            let value = std::mem::take(&mut self.content);
            match name {
                "name" => self.name = Some(value),
                "arch" => self.arch = Some(value),
                "checksum" => self.checksum = Some(value),
                "summary" => self.summary = Some(value),
                "description" => self.description = Some(value),
                "url" => self.url = Some(value),
                "license" => self.license = Some(value),
                "vendor" => self.vendor = Some(value),
                "group" => self.group = Some(value),
                "buildhost" => self.build_host = Some(value),
                "sourcerpm" => self.source_rpm = Some(value),
                "file" => {
                    self.files.insert(value);
                }
                _ => {}
            }
            self.element.clear();
        }

        if EntryList::from_element(name).is_some() || IGNORED_LISTS.contains(&name) {
            self.entries = None;
        }
        Ok(())
    }

    fn build(self) -> Result<PackageUnit> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let name = self.name.ok_or_else(|| Error::missing("package", "name"))?;
        let record = format!("package '{}'", name);
        let arch = self.arch.ok_or_else(|| Error::missing(&record, "arch"))?;
        let version = self.version.ok_or_else(|| Error::missing(&record, "version/ver"))?;
        let release = self.release.ok_or_else(|| Error::missing(&record, "version/rel"))?;
        let checksum = self.checksum.ok_or_else(|| Error::missing(&record, "checksum"))?;
        let checksum_type: ChecksumType = self
            .checksum_type
            .ok_or_else(|| Error::missing(&record, "checksum/type"))?
            .parse()?;
        let relative_path = self.location.ok_or_else(|| Error::missing(&record, "location"))?;

        let epoch = self
            .epoch
            .filter(|epoch| !epoch.is_empty())
            .unwrap_or_else(|| "0".to_string());

        let primary_template = String::from_utf8(self.template.into_inner())
            .map_err(|e| Error::ParseError(format!("Package template is not UTF-8: {}", e)))?;

        let mut unit = PackageUnit::new(name, epoch, version, release, arch)
            .with_checksum(checksum_type, checksum)
            .with_provides(self.provides)
            .with_requires(self.requires);
        unit.summary = self.summary;
        unit.description = self.description;
        unit.url = self.url;
        unit.build_time = self.build_time;
        unit.file_time = self.file_time;
        unit.size = self.size.unwrap_or(0);
        unit.installed_size = self.installed_size;
        unit.archive_size = self.archive_size;
        unit.relative_path = relative_path;
        unit.license = self.license;
        unit.vendor = self.vendor;
        unit.group = self.group;
        unit.build_host = self.build_host;
        unit.source_rpm = self.source_rpm;
        unit.header_range = self.header_range;
        unit.recommends = self.recommends;
        unit.files = self.files;
        unit.primary_template = Some(primary_template);
        Ok(unit)
    }
}

/// Streaming reader over the packages of a primary.xml document
///
/// A package record that lacks a required field is yielded as an `Err` and
/// the reader moves on to the next one. Malformed XML ends the stream.
pub struct PrimaryReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    current: Option<PackageBuilder>,
    declared: Option<u64>,
    parsed: u64,
    done: bool,
}

impl<R: BufRead> PrimaryReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: xml_reader(reader),
            buf: Vec::new(),
            current: None,
            declared: None,
            parsed: 0,
            done: false,
        }
    }

    /// Package count announced by the `<metadata packages="N">` root
    pub fn declared_count(&self) -> Option<u64> {
        self.declared
    }

    /// Records yielded so far, failed ones included
    pub fn parsed_count(&self) -> u64 {
        self.parsed
    }

    /// Read up to the end of the next `<package>`
    ///
    /// The outer `Result` is fatal for the document; the inner one only for
    /// the record.
    fn next_record(&mut self) -> Result<Option<Result<PackageUnit>>> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => {
                    let name = local_name(&e);
                    match self.current.as_mut() {
                        Some(builder) => builder.start(&name, &e, false)?,
                        None if name == "package" => {
                            let mut builder = PackageBuilder::new();
                            builder.start(&name, &e, false)?;
                            self.current = Some(builder);
                        }
                        None if name == "metadata" => {
                            self.declared = numeric_attribute(&e, "packages")?;
                        }
                        None => {}
                    }
                }
                Event::Empty(e) => {
                    if let Some(builder) = self.current.as_mut() {
                        let name = local_name(&e);
                        builder.start(&name, &e, true)?;
                    }
                }
                event @ Event::Text(_) => {
                    if let (Some(builder), Event::Text(e)) = (self.current.as_mut(), &event) {
                        let value = text(e)?;
                        builder.text(&value, &event)?;
                    }
                }
                event @ Event::CData(_) => {
                    if let (Some(builder), Event::CData(e)) = (self.current.as_mut(), &event) {
                        let value = String::from_utf8_lossy(e).into_owned();
                        builder.text(&value, &event)?;
                    }
                }
                Event::End(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    if let Some(builder) = self.current.as_mut() {
                        builder.end(&name, &e)?;
                        if name == "package" {
                            if let Some(builder) = self.current.take() {
                                self.parsed += 1;
                                return Ok(Some(builder.build()));
                            }
                        }
                    }
                }
                Event::Eof => {
                    if self.current.is_some() {
                        return Err(Error::ParseError(
                            "primary.xml ended inside a <package> element".to_string(),
                        ));
                    }
                    match self.declared {
                        Some(declared) if declared != self.parsed => warn!(
                            "primary.xml declares {} packages but contains {}",
                            declared, self.parsed
                        ),
                        _ => {}
                    }
                    info!("Parsed {} package record(s) from primary.xml", self.parsed);
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for PrimaryReader<R> {
    type Item = Result<PackageUnit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => {
                match &record {
                    Ok(unit) => debug!("Parsed package {}", unit),
                    Err(e) => warn!("Skipping package record: {}", e),
                }
                Some(record)
            }
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

impl<R: BufRead> MetadataParser<R> for PrimaryReader<R> {
    type Record = PackageUnit;

    fn from_reader(reader: R) -> Self {
        Self::new(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIMARY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata xmlns="http://linux.duke.edu/metadata/common" xmlns:rpm="http://linux.duke.edu/metadata/rpm" packages="2">
<package type="rpm">
  <name>bash</name>
  <arch>x86_64</arch>
  <version epoch="0" ver="5.2.15" rel="1.fc39"/>
  <checksum type="sha256" pkgid="YES">abc123</checksum>
  <summary>The GNU Bourne Again shell</summary>
  <description>The GNU Bourne Again shell (Bash) is a shell &amp; command language interpreter.</description>
  <packager>Fedora Project</packager>
  <url>https://www.gnu.org/software/bash</url>
  <time file="1690000000" build="1689000000"/>
  <size package="1900000" installed="8000000" archive="8100000"/>
  <location href="Packages/b/bash-5.2.15-1.fc39.x86_64.rpm"/>
  <format>
    <rpm:license>GPL-3.0-or-later</rpm:license>
    <rpm:vendor>Fedora Project</rpm:vendor>
    <rpm:group>Unspecified</rpm:group>
    <rpm:buildhost>buildvm-x86-01</rpm:buildhost>
    <rpm:sourcerpm>bash-5.2.15-1.fc39.src.rpm</rpm:sourcerpm>
    <rpm:header-range start="4504" end="80000"/>
    <rpm:provides>
      <rpm:entry name="bash" flags="EQ" epoch="0" ver="5.2.15" rel="1.fc39"/>
      <rpm:entry name="/bin/sh"/>
    </rpm:provides>
    <rpm:requires>
      <rpm:entry name="libc.so.6()(64bit)"/>
      <rpm:entry name="filesystem" flags="GE" epoch="0" ver="3" pre="1"/>
    </rpm:requires>
    <rpm:conflicts>
      <rpm:entry name="old-shell"/>
    </rpm:conflicts>
    <rpm:recommends>
      <rpm:entry name="bash-completion"/>
    </rpm:recommends>
    <file>/usr/bin/bash</file>
    <file type="dir">/etc/skel</file>
  </format>
</package>
<package type="rpm">
  <name>filesystem</name>
  <arch>x86_64</arch>
  <version ver="3.18" rel="6.fc39"/>
  <checksum type="sha" pkgid="YES">def456</checksum>
  <size package="1"/>
  <location href="Packages/f/filesystem-3.18-6.fc39.x86_64.rpm"/>
  <format/>
</package>
</metadata>
"#;

    fn parse(xml: &str) -> Vec<Result<PackageUnit>> {
        PrimaryReader::new(xml.as_bytes()).collect()
    }

    #[test]
    fn test_parse_package_fields() {
        let units = PrimaryReader::new(PRIMARY.as_bytes()).collect_records().unwrap();
        assert_eq!(units.len(), 2);

        let bash = &units[0];
        assert_eq!(bash.to_string(), "bash-5.2.15-1.fc39.x86_64");
        assert_eq!(bash.checksum, "abc123");
        assert_eq!(bash.checksum_type, ChecksumType::Sha256);
        assert_eq!(bash.summary.as_deref(), Some("The GNU Bourne Again shell"));
        assert!(bash.description.as_deref().unwrap().contains("shell & command"));
        assert_eq!(bash.file_time, Some(1690000000));
        assert_eq!(bash.build_time, Some(1689000000));
        assert_eq!(bash.size, 1900000);
        assert_eq!(bash.installed_size, Some(8000000));
        assert_eq!(bash.relative_path, "Packages/b/bash-5.2.15-1.fc39.x86_64.rpm");
        assert_eq!(bash.license.as_deref(), Some("GPL-3.0-or-later"));
        assert_eq!(bash.build_host.as_deref(), Some("buildvm-x86-01"));
        assert_eq!(bash.source_rpm.as_deref(), Some("bash-5.2.15-1.fc39.src.rpm"));
        assert_eq!(bash.header_range, Some(HeaderRange { start: 4504, end: 80000 }));
        assert_eq!(bash.files.len(), 2);
        assert!(bash.files.contains("/usr/bin/bash"));
    }

    #[test]
    fn test_parse_entry_lists() {
        let units = PrimaryReader::new(PRIMARY.as_bytes()).collect_records().unwrap();
        let bash = &units[0];

        assert_eq!(bash.provides.len(), 2);
        assert_eq!(bash.provides[0].flags, Some(Flags::Eq));
        assert_eq!(bash.provides[0].release.as_deref(), Some("1.fc39"));
        assert!(!bash.provides[1].is_versioned());

        assert_eq!(bash.requires.len(), 2);
        assert_eq!(bash.requires[1].to_string(), "filesystem >= 3");

        // conflicts are not kept and do not leak into other lists
        assert_eq!(bash.recommends.len(), 1);
        assert_eq!(bash.recommends[0].name, "bash-completion");
    }

    #[test]
    fn test_missing_epoch_defaults_to_zero() {
        let units = PrimaryReader::new(PRIMARY.as_bytes()).collect_records().unwrap();
        let filesystem = &units[1];
        assert_eq!(filesystem.epoch, "0");
        assert_eq!(filesystem.checksum_type, ChecksumType::Sha1);
        assert_eq!(filesystem.installed_size, None);
    }

    #[test]
    fn test_template_replaces_checksum() {
        let units = PrimaryReader::new(PRIMARY.as_bytes()).collect_records().unwrap();
        let template = units[0].primary_template.as_deref().unwrap();
        assert!(template.starts_with("<package type=\"rpm\">"));
        assert!(template.ends_with("</package>"));
        assert!(template.contains(CHECKSUM_TEMPLATE));
        assert!(template.contains(CHECKSUMTYPE_TEMPLATE));
        assert!(!template.contains("abc123"));
        assert!(template.contains("pkgid=\"YES\""));

        let rendered = units[0].render_primary(ChecksumType::Sha512, "ffff").unwrap();
        assert!(rendered.contains("<checksum type=\"sha512\" pkgid=\"YES\">ffff</checksum>"));
    }

    #[test]
    fn test_bad_record_does_not_stop_stream() {
        let xml = r#"<metadata packages="2">
<package type="rpm"><name>broken</name><arch>noarch</arch><version ver="1" rel="1"/></package>
<package type="rpm"><name>ok</name><arch>noarch</arch><version ver="1" rel="1"/>
  <checksum type="sha256">aa</checksum><location href="ok.rpm"/></package>
</metadata>"#;
        let records = parse(xml);
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], Err(Error::MissingField { .. })));
        assert_eq!(records[1].as_ref().unwrap().name, "ok");
    }

    #[test]
    fn test_unknown_checksum_type_rejects_record() {
        let xml = r#"<metadata><package><name>x</name><arch>noarch</arch><version ver="1" rel="1"/>
  <checksum type="crc32">aa</checksum><location href="x.rpm"/></package></metadata>"#;
        let records = parse(xml);
        assert!(matches!(records[0], Err(Error::UnsupportedChecksum(_))));
    }

    #[test]
    fn test_truncated_document_is_fatal() {
        let xml = r#"<metadata><package><name>x</name>"#;
        let records = parse(xml);
        assert_eq!(records.len(), 1);
        assert!(records[0].is_err());
    }

    #[test]
    fn test_declared_count() {
        let mut reader = PrimaryReader::new(PRIMARY.as_bytes());
        assert!(reader.next().is_some());
        assert_eq!(reader.declared_count(), Some(2));
        assert_eq!(reader.parsed_count(), 1);
    }
}
