// src/repository/parsers/updateinfo.rs

//! updateinfo.xml parser (advisories)

use super::{MetadataParser, attribute, local_name, text, xml_reader};
use crate::error::{Error, Result};
use crate::packages::{Checksum, ErratumPackage, ErratumReference, ErratumUnit, ReferenceKey};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::io::BufRead;
use tracing::{debug, info, warn};

/// Package entry of a `<pkglist>` being read
#[derive(Default)]
struct PackageEntry {
    name: Option<String>,
    epoch: Option<String>,
    version: Option<String>,
    release: Option<String>,
    arch: Option<String>,
    source_rpm: Option<String>,
    filename: Option<String>,
    sum: Option<Checksum>,
    sum_type: Option<String>,
}

impl PackageEntry {
    fn from_element(e: &BytesStart) -> Self {
        Self {
            name: attribute(e, "name"),
            epoch: attribute(e, "epoch"),
            version: attribute(e, "version"),
            release: attribute(e, "release"),
            arch: attribute(e, "arch"),
            source_rpm: attribute(e, "src"),
            ..Default::default()
        }
    }

    fn build(self, advisory: &str) -> Result<ErratumPackage> {
        let record = format!("advisory '{}' package", advisory);
        let name = self.name.ok_or_else(|| Error::missing(&record, "name"))?;
        let version = self.version.ok_or_else(|| Error::missing(&record, "version"))?;
        let release = self.release.ok_or_else(|| Error::missing(&record, "release"))?;
        let arch = self.arch.ok_or_else(|| Error::missing(&record, "arch"))?;
        let epoch = self.epoch.unwrap_or_default();
        Ok(ErratumPackage {
            key: ReferenceKey::new(&name, &epoch, &version, &release, &arch),
            filename: self.filename,
            sum: self.sum,
            source_rpm: self.source_rpm,
        })
    }
}

/// Accumulates one `<update>` element
struct UpdateBuilder {
    unit: ErratumUnit,
    id: Option<String>,
    package: Option<PackageEntry>,
    error: Option<Error>,
    element: String,
    content: String,
}

impl UpdateBuilder {
    fn new(e: &BytesStart) -> Self {
        let mut unit = ErratumUnit::new("");
        unit.erratum_type = attribute(e, "type");
        unit.status = attribute(e, "status");
        unit.version = attribute(e, "version");
        unit.from = attribute(e, "from");
        Self {
            unit,
            id: None,
            package: None,
            error: None,
            element: String::new(),
            content: String::new(),
        }
    }

    fn start(&mut self, name: &str, e: &BytesStart) {
        self.element = name.to_string();
        self.content.clear();

        match name {
            "issued" => self.unit.issued = attribute(e, "date"),
            "updated" => self.unit.updated = attribute(e, "date"),
            "reference" => self.unit.references.push(ErratumReference {
                href: attribute(e, "href"),
                id: attribute(e, "id"),
                ref_type: attribute(e, "type"),
                title: attribute(e, "title"),
            }),
            "package" => self.package = Some(PackageEntry::from_element(e)),
            "sum" => {
                if let Some(package) = self.package.as_mut() {
                    package.sum_type = attribute(e, "type");
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, name: &str) {
        if name == "package" {
            if let Some(entry) = self.package.take() {
                let advisory = self.id.as_deref().unwrap_or("?");
                match entry.build(advisory) {
                    Ok(package) => self.unit.packages.push(package),
                    Err(e) => {
                        if self.error.is_none() {
                            self.error = Some(e);
                        }
                    }
                }
            }
            return;
        }
        if name != self.element {
            return;
        }

        let value = std::mem::take(&mut self.content);
        self.element.clear();
        if value.trim().is_empty() {
            return;
        }

        if let Some(package) = self.package.as_mut() {
            match name {
                "filename" => package.filename = Some(value),
                "sum" => {
                    package.sum = package.sum_type.take().and_then(|kind| match kind.parse() {
                        Ok(algorithm) => Some(Checksum::new(algorithm, value)),
                        Err(e) => {
                            warn!("Ignoring package sum in updateinfo.xml: {}", e);
                            None
                        }
                    })
                }
                _ => {}
            }
            return;
        }

        match name {
            "id" => self.id = Some(value),
            "title" => self.unit.title = Some(value),
            "severity" => self.unit.severity = Some(value),
            "description" => self.unit.description = Some(value),
            _ => {}
        }
    }

    fn build(self) -> Result<ErratumUnit> {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::missing("update", "id"))?;
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(ErratumUnit { id, ..self.unit })
    }
}

/// Streaming reader over the `<update>` elements of updateinfo.xml
pub struct UpdateInfoReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    current: Option<UpdateBuilder>,
    parsed: usize,
    done: bool,
}

impl<R: BufRead> UpdateInfoReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: xml_reader(reader),
            buf: Vec::new(),
            current: None,
            parsed: 0,
            done: false,
        }
    }

    fn next_update(&mut self) -> Result<Option<Result<ErratumUnit>>> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => {
                    let name = local_name(&e);
                    match self.current.as_mut() {
                        Some(builder) => builder.start(&name, &e),
                        None if name == "update" => self.current = Some(UpdateBuilder::new(&e)),
                        None => {}
                    }
                }
                Event::Empty(e) => {
                    if let Some(builder) = self.current.as_mut() {
                        let name = local_name(&e);
                        builder.start(&name, &e);
                        builder.end(&name);
                    }
                }
                Event::Text(e) => {
                    if let Some(builder) = self.current.as_mut() {
                        builder.content.push_str(&text(&e)?);
                    }
                }
                Event::End(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    if name == "update" {
                        if let Some(builder) = self.current.take() {
                            self.parsed += 1;
                            return Ok(Some(builder.build()));
                        }
                    } else if let Some(builder) = self.current.as_mut() {
                        builder.end(&name);
                    }
                }
                Event::Eof => {
                    if self.current.is_some() {
                        return Err(Error::ParseError(
                            "updateinfo.xml ended inside an <update> element".to_string(),
                        ));
                    }
                    info!("Parsed {} advisor(ies) from updateinfo.xml", self.parsed);
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for UpdateInfoReader<R> {
    type Item = Result<ErratumUnit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_update() {
            Ok(Some(update)) => {
                match &update {
                    Ok(erratum) => debug!(
                        "Parsed advisory {} ({} package(s))",
                        erratum.id,
                        erratum.packages.len()
                    ),
                    Err(e) => warn!("Skipping advisory: {}", e),
                }
                Some(update)
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

impl<R: BufRead> MetadataParser<R> for UpdateInfoReader<R> {
    type Record = ErratumUnit;

    fn from_reader(reader: R) -> Self {
        Self::new(reader)
    }
}
