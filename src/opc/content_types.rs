//! Content type table backing the `[Content_Types].xml` item.
//!
//! Implements the two-tier discovery scheme of ISO/IEC 29500-2 §10.1.2: a part's
//! content type is its `Override` entry if one exists, else the `Default`
//! entry registered for its extension.

use crate::opc::constants::{XML_DECLARATION, namespace};
use crate::opc::error::{OpcError, Result};
use crate::opc::media_type::MediaType;
use crate::opc::packuri::extension_of;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::io::{Cursor, Write};

/// One child element of `<Types>`, keyed by its tag name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentTypeEntry {
    /// `<Default Extension="xml" ContentType="application/xml"/>`
    Default {
        extension: String,
        content_type: String,
    },
    /// `<Override PartName="/word/document.xml" ContentType="..."/>`
    Override {
        part_name: String,
        content_type: String,
    },
}

/// Maps extensions to default content types and part names to overrides.
///
/// Both maps are ordered so serialization is reproducible. Extensions are
/// stored lowercase; overrides are keyed by the uppercase part name and keep
/// the part name as it was registered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    /// Default content types by lowercase extension
    defaults: BTreeMap<String, String>,

    /// Override content types by uppercase partname: (partname, content type)
    overrides: BTreeMap<String, (String, String)>,
}

impl ContentTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the content type of a part (ISO/IEC 29500-2 §10.1.2.3).
    ///
    /// The content type is canonicalized first. A part without an extension
    /// always gets an override. Otherwise the first content type seen for an
    /// extension becomes its default, and a part whose type differs from an
    /// existing default gets an override.
    ///
    /// # Errors
    /// Returns [`OpcError::InvalidMediaType`] if the content type does not
    /// parse; the table is left unchanged.
    pub fn add(&mut self, part_name: &str, content_type: &str) -> Result<()> {
        let content_type = MediaType::canonicalize(content_type)?;

        let ext = extension_of(part_name).to_ascii_lowercase();
        if ext.is_empty() {
            tracing::trace!(part = part_name, %content_type, "override for extensionless part");
            self.add_override(part_name, content_type);
            return Ok(());
        }

        match self.defaults.get(&ext) {
            Some(current) if *current != content_type => {
                tracing::trace!(part = part_name, %content_type, "override differs from default");
                self.add_override(part_name, content_type);
            },
            Some(_) => {},
            None => {
                tracing::trace!(extension = %ext, %content_type, "new default");
                self.defaults.insert(ext, content_type);
            },
        }
        Ok(())
    }

    /// Resolve the effective content type of a part: override first, then
    /// default by lowercase extension.
    ///
    /// # Errors
    /// Returns [`OpcError::ContentTypeNotFound`] if neither resolves.
    pub fn find_type(&self, part_name: &str) -> Result<&str> {
        if let Some((_, content_type)) = self.overrides.get(&part_name.to_ascii_uppercase()) {
            return Ok(content_type);
        }

        let ext = extension_of(part_name);
        if !ext.is_empty()
            && let Some(content_type) = self.defaults.get(&ext.to_ascii_lowercase())
        {
            return Ok(content_type);
        }

        Err(OpcError::ContentTypeNotFound(part_name.to_string()))
    }

    /// Default content type registered for an extension, if any.
    pub fn default_for(&self, extension: &str) -> Option<&str> {
        self.defaults
            .get(&extension.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Override content type registered for a part name, if any.
    pub fn override_for(&self, part_name: &str) -> Option<&str> {
        self.overrides
            .get(&part_name.to_ascii_uppercase())
            .map(|(_, content_type)| content_type.as_str())
    }

    /// Iterate over the entries in serialization order: defaults sorted by
    /// extension, then overrides sorted by part name.
    pub fn entries(&self) -> impl Iterator<Item = ContentTypeEntry> + '_ {
        let defaults = self
            .defaults
            .iter()
            .map(|(extension, content_type)| ContentTypeEntry::Default {
                extension: extension.clone(),
                content_type: content_type.clone(),
            });
        let overrides = self
            .overrides
            .values()
            .map(|(part_name, content_type)| ContentTypeEntry::Override {
                part_name: part_name.clone(),
                content_type: content_type.clone(),
            });
        defaults.chain(overrides)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty() && self.overrides.is_empty()
    }

    fn add_override(&mut self, part_name: &str, content_type: String) {
        self.overrides.insert(
            part_name.to_ascii_uppercase(),
            (part_name.to_string(), content_type),
        );
    }

    /// Generate the XML for `[Content_Types].xml`, declaration included.
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Cursor::new(Vec::with_capacity(1024)));
        writer
            .get_mut()
            .write_all(XML_DECLARATION.as_bytes())?;

        let mut types = BytesStart::new("Types");
        types.push_attribute(("xmlns", namespace::OPC_CONTENT_TYPES));
        writer
            .write_event(Event::Start(types))
            .map_err(|e| OpcError::xml("Failed to write Types element", e))?;

        for entry in self.entries() {
            let elem = match &entry {
                ContentTypeEntry::Default {
                    extension,
                    content_type,
                } => {
                    let mut elem = BytesStart::new("Default");
                    elem.push_attribute(("Extension", extension.as_str()));
                    elem.push_attribute(("ContentType", content_type.as_str()));
                    elem
                },
                ContentTypeEntry::Override {
                    part_name,
                    content_type,
                } => {
                    let mut elem = BytesStart::new("Override");
                    elem.push_attribute(("PartName", part_name.as_str()));
                    elem.push_attribute(("ContentType", content_type.as_str()));
                    elem
                },
            };
            writer
                .write_event(Event::Empty(elem))
                .map_err(|e| OpcError::xml("Failed to write content type entry", e))?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("Types")))
            .map_err(|e| OpcError::xml("Failed to close Types element", e))?;

        Ok(writer.into_inner().into_inner())
    }

    /// Serialize into `sink`.
    pub fn write_to<W: Write>(&self, sink: &mut W) -> Result<()> {
        sink.write_all(&self.to_xml()?)?;
        Ok(())
    }

    /// Parse content types from `[Content_Types].xml`.
    ///
    /// Entries are taken as written (content types are not re-canonicalized).
    ///
    /// # Errors
    /// - [`OpcError::XmlError`] for malformed XML, a missing `Types` root, an
    ///   unknown element, a missing attribute, or a `Default` with an empty
    ///   extension
    /// - [`OpcError::DuplicateContentType`] for a repeated extension or part
    ///   name (both compared case-insensitively)
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut table = Self::new();
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut seen_root = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    if e.local_name().as_ref() == b"Types" {
                        seen_root = true;
                    } else {
                        let entry = Self::parse_entry(e)?;
                        table.insert_decoded(entry)?;
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(OpcError::xml("Content types parse error", e)),
                _ => {},
            }
            buf.clear();
        }

        if !seen_root {
            return Err(OpcError::XmlError(
                "Content types item has no Types element".to_string(),
            ));
        }
        Ok(table)
    }

    fn parse_entry(e: &BytesStart<'_>) -> Result<ContentTypeEntry> {
        let tag = e.local_name();
        let (key_attr, is_default): (&[u8], bool) = match tag.as_ref() {
            b"Default" => (&b"Extension"[..], true),
            b"Override" => (&b"PartName"[..], false),
            other => {
                return Err(OpcError::XmlError(format!(
                    "Unexpected element in content types: {}",
                    String::from_utf8_lossy(other)
                )));
            },
        };

        let mut key = None;
        let mut content_type = None;
        for attr in e.attributes() {
            let attr = attr.map_err(|e| OpcError::xml("Content types attribute error", e))?;
            let value = attr
                .unescape_value()
                .map_err(|e| OpcError::xml("Content types attribute error", e))?
                .to_string();
            if attr.key.as_ref() == key_attr {
                key = Some(value);
            } else if attr.key.as_ref() == b"ContentType" {
                content_type = Some(value);
            }
        }

        let (Some(key), Some(content_type)) = (key, content_type) else {
            return Err(OpcError::XmlError(format!(
                "{} element is missing {} or ContentType",
                if is_default { "Default" } else { "Override" },
                String::from_utf8_lossy(key_attr)
            )));
        };

        Ok(if is_default {
            ContentTypeEntry::Default {
                extension: key,
                content_type,
            }
        } else {
            ContentTypeEntry::Override {
                part_name: key,
                content_type,
            }
        })
    }

    fn insert_decoded(&mut self, entry: ContentTypeEntry) -> Result<()> {
        match entry {
            ContentTypeEntry::Default {
                extension,
                content_type,
            } => {
                let ext = extension.to_ascii_lowercase();
                if ext.is_empty() {
                    return Err(OpcError::XmlError(
                        "Default element has an empty Extension".to_string(),
                    ));
                }
                if self.defaults.contains_key(&ext) {
                    return Err(OpcError::DuplicateContentType(format!("extension '{}'", ext)));
                }
                self.defaults.insert(ext, content_type);
            },
            ContentTypeEntry::Override {
                part_name,
                content_type,
            } => {
                if self.overrides.contains_key(&part_name.to_ascii_uppercase()) {
                    return Err(OpcError::DuplicateContentType(format!(
                        "part name '{}'",
                        part_name
                    )));
                }
                self.add_override(&part_name, content_type);
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::error::ErrorKind;

    #[test]
    fn test_first_type_becomes_default() {
        let mut ct = ContentTypes::new();
        ct.add("/a.xml", "text/plain").unwrap();
        ct.add("/b.xml", "text/plain").unwrap();

        assert_eq!(ct.default_for("xml"), Some("text/plain"));
        assert_eq!(ct.entries().count(), 1);

        ct.add("/c.xml", "text/html").unwrap();
        assert_eq!(ct.default_for("xml"), Some("text/plain"));
        assert_eq!(ct.override_for("/c.xml"), Some("text/html"));
        assert_eq!(ct.find_type("/c.xml").unwrap(), "text/html");
        assert_eq!(ct.find_type("/b.xml").unwrap(), "text/plain");
    }

    #[test]
    fn test_extensionless_part_gets_override() {
        let mut ct = ContentTypes::new();
        ct.add("/docs/readme", "text/plain").unwrap();
        assert_eq!(ct.override_for("/docs/readme"), Some("text/plain"));
        assert!(ct.default_for("").is_none());
    }

    #[test]
    fn test_content_type_is_canonicalized() {
        let mut ct = ContentTypes::new();
        ct.add("/a.txt", "TEXT/Plain;Charset=UTF-8").unwrap();
        ct.add("/b.txt", "text/plain; charset=UTF-8").unwrap();
        assert_eq!(ct.default_for("txt"), Some("text/plain; charset=UTF-8"));
        assert!(ct.override_for("/b.txt").is_none());
    }

    #[test]
    fn test_invalid_content_type_leaves_table_unchanged() {
        let mut ct = ContentTypes::new();
        assert!(ct.add("/a.xml", "application").is_err());
        assert!(ct.is_empty());
    }

    #[test]
    fn test_find_type_is_case_insensitive() {
        let mut ct = ContentTypes::new();
        ct.add("/Docs/A.XML", "a/b").unwrap();
        ct.add("/docs/b.xml", "c/d").unwrap();
        assert_eq!(ct.find_type("/docs/a.xml").unwrap(), "a/b");
        assert_eq!(ct.find_type("/DOCS/B.XML").unwrap(), "c/d");
    }

    #[test]
    fn test_find_type_not_found() {
        let mut ct = ContentTypes::new();
        ct.add("/a.xml", "a/b").unwrap();
        let err = ct.find_type("/a.bin").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(ct.find_type("/noext").is_err());
    }

    #[test]
    fn test_content_types_xml() {
        let mut ct = ContentTypes::new();
        ct.add("/image.png", "image/png").unwrap();
        ct.add("/word/document.xml", "application/xml").unwrap();
        ct.add("/word/styles.xml", "text/xml").unwrap();

        let xml = String::from_utf8(ct.to_xml().unwrap()).unwrap();
        assert!(xml.starts_with(XML_DECLARATION));
        assert!(xml.contains(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#
        ));
        assert!(xml.contains(r#"<Default Extension="png" ContentType="image/png"/>"#));
        assert!(xml.contains(r#"<Default Extension="xml" ContentType="application/xml"/>"#));
        assert!(xml.contains(r#"<Override PartName="/word/styles.xml" ContentType="text/xml"/>"#));
        assert!(xml.ends_with("</Types>"));
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let mut first = ContentTypes::new();
        let mut second = ContentTypes::new();
        for (name, ct) in [("/b.bin", "a/b"), ("/a.xml", "c/d"), ("/z", "e/f")] {
            first.add(name, ct).unwrap();
        }
        for (name, ct) in [("/z", "e/f"), ("/a.xml", "c/d"), ("/b.bin", "a/b")] {
            second.add(name, ct).unwrap();
        }
        assert_eq!(first.to_xml().unwrap(), second.to_xml().unwrap());
    }

    #[test]
    fn test_round_trip_preserves_resolution() {
        let mut ct = ContentTypes::new();
        let names = [
            ("/a.xml", "text/plain"),
            ("/b.xml", "text/html"),
            ("/docs/readme", "text/markdown"),
            ("/img/logo.PNG", "image/png"),
        ];
        for (name, content_type) in names {
            ct.add(name, content_type).unwrap();
        }

        let decoded = ContentTypes::from_xml(&ct.to_xml().unwrap()).unwrap();
        for (name, _) in names {
            assert_eq!(decoded.find_type(name).unwrap(), ct.find_type(name).unwrap());
        }
        assert_eq!(decoded, ct);
    }

    #[test]
    fn test_from_xml() {
        let xml = br#"<?xml version="1.0"?>
            <Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
                <Default Extension="XML" ContentType="application/xml"/>
                <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
                <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"></Override>
            </Types>"#;

        let ct = ContentTypes::from_xml(xml).unwrap();
        assert_eq!(ct.find_type("/test.xml").unwrap(), "application/xml");
        assert_eq!(
            ct.find_type("/WORD/document.xml").unwrap(),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"
        );
    }

    #[test]
    fn test_from_xml_rejects() {
        let empty_ext = br#"<Types><Default Extension="" ContentType="a/b"/></Types>"#;
        assert_eq!(ContentTypes::from_xml(empty_ext).unwrap_err().kind(), ErrorKind::Format);

        let dup_ext = br#"<Types><Default Extension="xml" ContentType="a/b"/><Default Extension="XML" ContentType="c/d"/></Types>"#;
        assert!(matches!(
            ContentTypes::from_xml(dup_ext),
            Err(OpcError::DuplicateContentType(_))
        ));

        let dup_override = br#"<Types><Override PartName="/a.xml" ContentType="a/b"/><Override PartName="/A.XML" ContentType="a/b"/></Types>"#;
        assert!(matches!(
            ContentTypes::from_xml(dup_override),
            Err(OpcError::DuplicateContentType(_))
        ));

        let unknown = br#"<Types><Other Extension="xml" ContentType="a/b"/></Types>"#;
        assert!(ContentTypes::from_xml(unknown).is_err());

        let missing_attr = br#"<Types><Default Extension="xml"/></Types>"#;
        assert!(ContentTypes::from_xml(missing_attr).is_err());

        assert!(ContentTypes::from_xml(b"").is_err());
    }

    #[test]
    fn test_empty_table_xml() {
        let xml = String::from_utf8(ContentTypes::new().to_xml().unwrap()).unwrap();
        assert_eq!(
            xml,
            format!(
                "{}<Types xmlns=\"{}\"></Types>",
                XML_DECLARATION,
                namespace::OPC_CONTENT_TYPES
            )
        );
        assert!(ContentTypes::from_xml(xml.as_bytes()).unwrap().is_empty());
    }
}
