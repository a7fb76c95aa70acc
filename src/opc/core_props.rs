//! Core properties part (ISO/IEC 29500-2 §11).
//!
//! Core properties are a flat set of Dublin Core and OPC metadata fields
//! stored in their own part, `/props/core.xml` by default, related from the
//! package root by the core-properties relationship type.

use crate::opc::constants::{XML_DECLARATION, namespace};
use crate::opc::error::{OpcError, Result};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::{Cursor, Write};

const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Package metadata.
///
/// Dates are kept as the W3CDTF strings found in the part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreProperties {
    pub category: Option<String>,
    /// Content status (e.g., "Draft", "Final")
    pub content_status: Option<String>,
    /// Creation date
    pub created: Option<String>,
    /// Document creator/author
    pub creator: Option<String>,
    pub description: Option<String>,
    pub identifier: Option<String>,
    /// Keywords (delimited as the producer chose)
    pub keywords: Option<String>,
    pub language: Option<String>,
    pub last_modified_by: Option<String>,
    pub last_printed: Option<String>,
    /// Last modification date
    pub modified: Option<String>,
    pub revision: Option<String>,
    pub subject: Option<String>,
    pub title: Option<String>,
    pub version: Option<String>,

    /// Part holding the properties; `/props/core.xml` when unset
    pub part_name: Option<String>,
}

/// Prefix an element is written with.
#[derive(Clone, Copy)]
enum Ns {
    Cp,
    Dc,
    Dcterms,
}

impl CoreProperties {
    /// Create a new empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title.
    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    /// Set the creator/author.
    pub fn creator(mut self, creator: &str) -> Self {
        self.creator = Some(creator.to_string());
        self
    }

    /// Set the creation date (W3CDTF, e.g. `2024-05-01T10:00:00Z`).
    pub fn created(mut self, created: &str) -> Self {
        self.created = Some(created.to_string());
        self
    }

    /// Set the modification date (W3CDTF).
    pub fn modified(mut self, modified: &str) -> Self {
        self.modified = Some(modified.to_string());
        self
    }

    /// Store the properties in `part_name` instead of `/props/core.xml`.
    pub fn part_name(mut self, part_name: &str) -> Self {
        self.part_name = Some(part_name.to_string());
        self
    }

    /// Fields in serialization order with their prefix and local name.
    fn fields(&self) -> [(Ns, &'static str, &Option<String>); 15] {
        [
            (Ns::Cp, "category", &self.category),
            (Ns::Cp, "contentStatus", &self.content_status),
            (Ns::Dcterms, "created", &self.created),
            (Ns::Dc, "creator", &self.creator),
            (Ns::Dc, "description", &self.description),
            (Ns::Dc, "identifier", &self.identifier),
            (Ns::Cp, "keywords", &self.keywords),
            (Ns::Dc, "language", &self.language),
            (Ns::Cp, "lastModifiedBy", &self.last_modified_by),
            (Ns::Cp, "lastPrinted", &self.last_printed),
            (Ns::Dcterms, "modified", &self.modified),
            (Ns::Cp, "revision", &self.revision),
            (Ns::Dc, "subject", &self.subject),
            (Ns::Dc, "title", &self.title),
            (Ns::Cp, "version", &self.version),
        ]
    }

    fn field_mut(&mut self, local_name: &[u8]) -> Option<&mut Option<String>> {
        let field = match local_name {
            b"category" => &mut self.category,
            b"contentStatus" => &mut self.content_status,
            b"created" => &mut self.created,
            b"creator" => &mut self.creator,
            b"description" => &mut self.description,
            b"identifier" => &mut self.identifier,
            b"keywords" => &mut self.keywords,
            b"language" => &mut self.language,
            b"lastModifiedBy" => &mut self.last_modified_by,
            b"lastPrinted" => &mut self.last_printed,
            b"modified" => &mut self.modified,
            b"revision" => &mut self.revision,
            b"subject" => &mut self.subject,
            b"title" => &mut self.title,
            b"version" => &mut self.version,
            _ => return None,
        };
        Some(field)
    }

    /// Generate the core properties XML, declaration included.
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(1024);
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Write the core properties XML into `sink`.
    pub fn write_to<W: Write>(&self, sink: &mut W) -> Result<()> {
        let mut writer = Writer::new(Cursor::new(Vec::with_capacity(1024)));
        writer.get_mut().write_all(XML_DECLARATION.as_bytes())?;

        let mut root = BytesStart::new("cp:coreProperties");
        root.push_attribute(("xmlns:cp", namespace::OPC_CORE_PROPERTIES));
        root.push_attribute(("xmlns:dc", namespace::DC));
        root.push_attribute(("xmlns:dcterms", namespace::DCTERMS));
        root.push_attribute(("xmlns:xsi", XSI_NAMESPACE));
        writer
            .write_event(Event::Start(root))
            .map_err(|e| OpcError::xml("Failed to write coreProperties element", e))?;

        for (ns, local_name, value) in self.fields() {
            let Some(value) = value else {
                continue;
            };
            let name = match ns {
                Ns::Cp => format!("cp:{}", local_name),
                Ns::Dc => format!("dc:{}", local_name),
                Ns::Dcterms => format!("dcterms:{}", local_name),
            };

            let mut elem = BytesStart::new(name.as_str());
            if matches!(ns, Ns::Dcterms) {
                elem.push_attribute(("xsi:type", "dcterms:W3CDTF"));
            }
            writer
                .write_event(Event::Start(elem))
                .and_then(|_| writer.write_event(Event::Text(BytesText::new(value))))
                .and_then(|_| writer.write_event(Event::End(BytesEnd::new(name.as_str()))))
                .map_err(|e| OpcError::xml("Failed to write core property", e))?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("cp:coreProperties")))
            .map_err(|e| OpcError::xml("Failed to close coreProperties element", e))?;

        sink.write_all(&writer.into_inner().into_inner())?;
        Ok(())
    }

    /// Parse core properties XML.
    ///
    /// Elements are matched by local name, so any prefix binding is accepted.
    /// Unknown elements are skipped and empty elements leave the field unset.
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        // Text is not trimmed: entity references split it into several events
        let mut reader = Reader::from_reader(xml);

        let mut props = CoreProperties::default();
        let mut buf = Vec::new();
        let mut seen_root = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    let local_name = e.local_name().as_ref().to_vec();
                    if local_name == b"coreProperties" {
                        seen_root = true;
                    } else if let Some(field) = props.field_mut(&local_name) {
                        let text = read_text_element(&mut reader)?;
                        *field = (!text.is_empty()).then_some(text);
                    }
                },
                Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"coreProperties" => {
                    seen_root = true;
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(OpcError::xml("Core properties parse error", e)),
                _ => {},
            }
            buf.clear();
        }

        if !seen_root {
            return Err(OpcError::XmlError(
                "core properties part has no coreProperties element".to_string(),
            ));
        }
        Ok(props)
    }
}

/// Read the text content of the element just opened, consuming its end tag.
fn read_text_element(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut text = String::new();
    let mut buf = Vec::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(e)) => {
                let content = e
                    .decode()
                    .map_err(|e| OpcError::xml("Invalid text in core properties", e))?;
                text.push_str(&content);
            },
            Ok(Event::CData(e)) => {
                let content = std::str::from_utf8(e.as_ref())
                    .map_err(|e| OpcError::xml("Invalid UTF-8 in core properties", e))?;
                text.push_str(content);
            },
            Ok(Event::GeneralRef(e)) => {
                if let Some(c) = e
                    .resolve_char_ref()
                    .map_err(|e| OpcError::xml("Invalid character reference", e))?
                {
                    text.push(c);
                } else {
                    let name = e
                        .decode()
                        .map_err(|e| OpcError::xml("Invalid entity reference", e))?;
                    let resolved = quick_xml::escape::resolve_predefined_entity(&name).ok_or_else(
                        || OpcError::XmlError(format!("Unknown entity '&{};' in core properties", name)),
                    )?;
                    text.push_str(resolved);
                }
            },
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) if depth == 0 => break,
            Ok(Event::End(_)) => depth -= 1,
            Ok(Event::Eof) => {
                return Err(OpcError::XmlError(
                    "Unexpected end of core properties".to_string(),
                ));
            },
            Err(e) => return Err(OpcError::xml("Core properties parse error", e)),
            _ => {},
        }
        buf.clear();
    }

    Ok(text)
}
