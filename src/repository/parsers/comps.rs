// src/repository/parsers/comps.rs

//! comps.xml parser (package groups)
//!
//! Yields groups, categories and environments in document order. Only the
//! untranslated `<name>`/`<description>` are kept; `xml:lang` variants are
//! skipped. Sections this mirror does not carry (`langpacks`,
//! `blacklist` ...) are ignored.

use super::{MetadataParser, attribute, local_name, text, xml_reader};
use crate::error::{Error, Result};
use crate::packages::{
    CategoryUnit, EnvironmentOption, EnvironmentUnit, GroupUnit, PackageReq, PackageReqType, Unit,
};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::io::BufRead;
use tracing::{debug, info, warn};

/// One top-level comps element
#[derive(Debug, Clone, PartialEq)]
pub enum CompsEntry {
    Group(GroupUnit),
    Category(CategoryUnit),
    Environment(EnvironmentUnit),
}

impl CompsEntry {
    pub fn id(&self) -> &str {
        match self {
            CompsEntry::Group(g) => &g.id,
            CompsEntry::Category(c) => &c.id,
            CompsEntry::Environment(e) => &e.id,
        }
    }
}

impl From<CompsEntry> for Unit {
    fn from(entry: CompsEntry) -> Self {
        match entry {
            CompsEntry::Group(g) => Unit::Group(g),
            CompsEntry::Category(c) => Unit::Category(c),
            CompsEntry::Environment(e) => Unit::Environment(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Group,
    Category,
    Environment,
}

impl EntryKind {
    fn from_element(name: &str) -> Option<Self> {
        match name {
            "group" => Some(EntryKind::Group),
            "category" => Some(EntryKind::Category),
            "environment" => Some(EntryKind::Environment),
            _ => None,
        }
    }

    fn element(&self) -> &'static str {
        match self {
            EntryKind::Group => "group",
            EntryKind::Category => "category",
            EntryKind::Environment => "environment",
        }
    }
}

struct EntryBuilder {
    kind: EntryKind,
    id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    default: Option<bool>,
    user_visible: Option<bool>,
    display_order: Option<u32>,
    packages: Vec<PackageReq>,
    group_ids: Vec<String>,
    options: Vec<EnvironmentOption>,

    in_options: bool,
    /// Translated text element being skipped
    translated: bool,
    req_type: PackageReqType,
    requires: Option<String>,
    option_default: bool,
    element: String,
    content: String,
}

impl EntryBuilder {
    fn new(kind: EntryKind) -> Self {
        Self {
            kind,
            id: None,
            name: None,
            description: None,
            default: None,
            user_visible: None,
            display_order: None,
            packages: Vec::new(),
            group_ids: Vec::new(),
            options: Vec::new(),
            in_options: false,
            translated: false,
            req_type: PackageReqType::default(),
            requires: None,
            option_default: false,
            element: String::new(),
            content: String::new(),
        }
    }

    fn start(&mut self, name: &str, e: &BytesStart) {
        self.element = name.to_string();
        self.content.clear();
        self.translated = attribute(e, "lang").is_some();

        match name {
            "optionlist" => self.in_options = true,
            "packagereq" => {
                self.req_type = attribute(e, "type")
                    .and_then(|t| PackageReqType::parse(&t))
                    .unwrap_or_default();
                self.requires = attribute(e, "requires");
            }
            "groupid" => {
                self.option_default = attribute(e, "default").is_some_and(|d| parse_bool(&d));
            }
            _ => {}
        }
    }

    fn end(&mut self, name: &str) {
        if name == "optionlist" {
            self.in_options = false;
        }
        if name != self.element {
            return;
        }

        let value = std::mem::take(&mut self.content);
        let translated = std::mem::replace(&mut self.translated, false);
        self.element.clear();
        if value.trim().is_empty() {
            return;
        }

        match name {
            "id" => self.id = Some(value),
            "name" if !translated => self.name = Some(value),
            "description" if !translated => self.description = Some(value),
            "default" => self.default = Some(parse_bool(&value)),
            "uservisible" => self.user_visible = Some(parse_bool(&value)),
            "display_order" => match value.trim().parse() {
                Ok(order) => self.display_order = Some(order),
                Err(_) => warn!("Ignoring display_order '{}' in comps.xml", value),
            },
            "packagereq" => self.packages.push(PackageReq {
                name: value,
                req_type: self.req_type,
                requires: self.requires.take(),
            }),
            "groupid" if self.in_options => self.options.push(EnvironmentOption {
                group_id: value,
                default: self.option_default,
            }),
            "groupid" => self.group_ids.push(value),
            _ => {}
        }
    }

    fn build(self, repo_id: &str) -> Result<CompsEntry> {
        let element = self.kind.element();
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::missing(element, "id"))?;

        let entry = match self.kind {
            EntryKind::Group => {
                let mut group = GroupUnit::new(id, repo_id);
                group.name = self.name;
                group.description = self.description;
                group.default = self.default.unwrap_or(false);
                group.user_visible = self.user_visible.unwrap_or(true);
                group.display_order = self.display_order;
                group.packages = self.packages;
                CompsEntry::Group(group)
            }
            EntryKind::Category => {
                let mut category = CategoryUnit::new(id, repo_id);
                category.name = self.name;
                category.description = self.description;
                category.display_order = self.display_order;
                category.group_ids = self.group_ids;
                CompsEntry::Category(category)
            }
            EntryKind::Environment => {
                let mut environment = EnvironmentUnit::new(id, repo_id);
                environment.name = self.name;
                environment.description = self.description;
                environment.display_order = self.display_order;
                environment.group_ids = self.group_ids;
                environment.options = self.options;
                CompsEntry::Environment(environment)
            }
        };
        Ok(entry)
    }
}

fn parse_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Streaming reader over comps.xml for one repository
pub struct CompsReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    repo_id: String,
    current: Option<EntryBuilder>,
    parsed: usize,
    done: bool,
}

impl<R: BufRead> CompsReader<R> {
    /// Units are created as owned by `repo_id`
    pub fn new(reader: R, repo_id: impl Into<String>) -> Self {
        Self {
            reader: xml_reader(reader),
            buf: Vec::new(),
            repo_id: repo_id.into(),
            current: None,
            parsed: 0,
            done: false,
        }
    }

    fn next_entry(&mut self) -> Result<Option<Result<CompsEntry>>> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => {
                    let name = local_name(&e);
                    match self.current.as_mut() {
                        Some(builder) => builder.start(&name, &e),
                        None => self.current = EntryKind::from_element(&name).map(EntryBuilder::new),
                    }
                }
                Event::Empty(e) => {
                    // Self-closing elements have no text; `end` drops them
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
                    let closes = matches!(&self.current, Some(b) if b.kind.element() == name);
                    if closes {
                        if let Some(builder) = self.current.take() {
                            self.parsed += 1;
                            return Ok(Some(builder.build(&self.repo_id)));
                        }
                    } else if let Some(builder) = self.current.as_mut() {
                        builder.end(&name);
                    }
                }
                Event::Eof => {
                    if let Some(builder) = &self.current {
                        return Err(Error::ParseError(format!(
                            "comps.xml ended inside a <{}> element",
                            builder.kind.element()
                        )));
                    }
                    info!("Parsed {} comps entr(ies) for {}", self.parsed, self.repo_id);
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for CompsReader<R> {
    type Item = Result<CompsEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_entry() {
            Ok(Some(entry)) => {
                match &entry {
                    Ok(entry) => debug!("Parsed comps entry {}", entry.id()),
                    Err(e) => warn!("Skipping comps entry: {}", e),
                }
                Some(entry)
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

impl<R: BufRead> MetadataParser<R> for CompsReader<R> {
    type Record = CompsEntry;

    /// Reader for a repository with an empty id; use [`CompsReader::new`]
    /// to assign ownership
    fn from_reader(reader: R) -> Self {
        Self::new(reader, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE comps PUBLIC "-//Red Hat, Inc.//DTD Comps info//EN" "comps.dtd">
<comps>
  <group>
    <id>core</id>
    <name>Core</name>
    <name xml:lang="de">Kern</name>
    <description>Smallest possible installation</description>
    <default>true</default>
    <uservisible>false</uservisible>
    <display_order>10</display_order>
    <packagelist>
      <packagereq type="mandatory">bash</packagereq>
      <packagereq>coreutils</packagereq>
      <packagereq type="conditional" requires="NetworkManager">NetworkManager-wifi</packagereq>
    </packagelist>
  </group>
  <category>
    <id>base-system</id>
    <name>Base System</name>
    <display_order>1</display_order>
    <grouplist>
      <groupid>core</groupid>
      <groupid>standard</groupid>
    </grouplist>
  </category>
  <environment>
    <id>minimal-environment</id>
    <name>Minimal Install</name>
    <grouplist>
      <groupid>core</groupid>
    </grouplist>
    <optionlist>
      <groupid default="true">standard</groupid>
      <groupid>guest-agents</groupid>
    </optionlist>
  </environment>
  <langpacks>
    <match install="hunspell-%s" name="hunspell"/>
  </langpacks>
</comps>
"#;

    fn entries() -> Vec<CompsEntry> {
        CompsReader::new(COMPS.as_bytes(), "fedora").collect_records().unwrap()
    }

    #[test]
    fn test_parse_group() {
        let entries = entries();
        assert_eq!(entries.len(), 3);
        let CompsEntry::Group(group) = &entries[0] else {
            panic!("expected a group, got {:?}", entries[0]);
        };
        assert_eq!(group.id, "core");
        assert_eq!(group.repo_id, "fedora");
        assert_eq!(group.name.as_deref(), Some("Core"));
        assert!(group.default);
        assert!(!group.user_visible);
        assert_eq!(group.display_order, Some(10));
        assert_eq!(
            group.package_names().collect::<Vec<_>>(),
            vec!["bash", "coreutils", "NetworkManager-wifi"]
        );
        assert_eq!(group.packages[0].req_type, PackageReqType::Mandatory);
        assert_eq!(group.packages[1].req_type, PackageReqType::Default);
        assert_eq!(group.packages[2].requires.as_deref(), Some("NetworkManager"));
    }

    #[test]
    fn test_parse_category_and_environment() {
        let entries = entries();
        let CompsEntry::Category(category) = &entries[1] else {
            panic!("expected a category");
        };
        assert_eq!(category.group_ids, vec!["core", "standard"]);

        let CompsEntry::Environment(environment) = &entries[2] else {
            panic!("expected an environment");
        };
        assert_eq!(environment.group_ids, vec!["core"]);
        assert_eq!(environment.options.len(), 2);
        assert!(environment.options[0].default);
        assert!(!environment.options[1].default);
        assert_eq!(
            environment.referenced_group_ids().collect::<Vec<_>>(),
            vec!["core", "standard", "guest-agents"]
        );
    }

    #[test]
    fn test_missing_id_rejects_entry_only() {
        let xml = r#"<comps><group><name>No id</name></group><group><id>ok</id></group></comps>"#;
        let records: Vec<_> = CompsReader::new(xml.as_bytes(), "r").collect();
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], Err(Error::MissingField { .. })));
        assert_eq!(records[1].as_ref().unwrap().id(), "ok");
    }

    #[test]
    fn test_self_closing_entries_are_dropped() {
        let xml = r#"<comps>
<group><id>core</id><packagelist>
  <packagereq type="mandatory"/>
  <packagereq type="default">bash</packagereq>
</packagelist></group>
<environment><id>server</id>
  <grouplist><groupid/><groupid>core</groupid></grouplist>
  <optionlist><groupid default="true"/></optionlist>
</environment>
</comps>"#;
        let entries = CompsReader::new(xml.as_bytes(), "r").collect_records().unwrap();

        let CompsEntry::Group(group) = &entries[0] else {
            panic!("expected a group");
        };
        assert_eq!(group.package_names().collect::<Vec<_>>(), vec!["bash"]);
        assert_eq!(group.packages[0].req_type, PackageReqType::Default);

        let CompsEntry::Environment(environment) = &entries[1] else {
            panic!("expected an environment");
        };
        assert_eq!(environment.group_ids, vec!["core"]);
        assert!(environment.options.is_empty());
    }

    #[test]
    fn test_into_unit() {
        let unit: Unit = entries().remove(0).into();
        assert_eq!(unit.kind(), crate::packages::UnitKind::Group);
    }
}
