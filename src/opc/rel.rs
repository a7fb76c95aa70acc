//! Relationship-related objects for OPC packages.
//!
//! This module provides types for managing relationships between parts in an OPC package,
//! including internal and external relationships, the per-source relationship
//! store, relationship ID generation and the `.rels` XML codec.

use crate::opc::constants::{XML_DECLARATION, namespace, target_mode};
use crate::opc::error::{OpcError, Result};
use crate::opc::packuri::{PackURI, check_escapes, has_scheme, is_relationships_uri, resolve_reference};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::{Cursor, Write};

/// How many generated IDs are tried before giving up on a source.
const MAX_ID_ATTEMPTS: usize = 16;

/// Whether a relationship target lives inside the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TargetMode {
    /// Target is a part in the package; the target URI must be a relative reference.
    #[default]
    Internal,
    /// Target is a resource outside the package; any URI is allowed.
    External,
}

impl TargetMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetMode::Internal => target_mode::INTERNAL,
            TargetMode::External => target_mode::EXTERNAL,
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value {
            target_mode::INTERNAL => Ok(TargetMode::Internal),
            target_mode::EXTERNAL => Ok(TargetMode::External),
            other => Err(OpcError::InvalidRelationship(format!(
                "unknown TargetMode '{}'",
                other
            ))),
        }
    }
}

/// The owner of a set of relationships: the package root or a part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelSource {
    Package,
    Part(PackURI),
}

impl RelSource {
    /// Base URI against which internal targets are resolved.
    pub fn base_uri(&self) -> &str {
        match self {
            RelSource::Package => "/",
            RelSource::Part(partname) => partname.base_uri(),
        }
    }

    /// Name of the relationships part that serializes this source's relationships.
    pub fn rels_uri(&self) -> PackURI {
        match self {
            RelSource::Package => PackURI::package_rels(),
            RelSource::Part(partname) => partname.rels_uri(),
        }
    }

    fn key(&self) -> String {
        match self {
            RelSource::Package => "/".to_string(),
            RelSource::Part(partname) => partname.key(),
        }
    }
}

impl fmt::Display for RelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelSource::Package => f.write_str("/"),
            RelSource::Part(partname) => write!(f, "{}", partname),
        }
    }
}

impl From<PackURI> for RelSource {
    fn from(partname: PackURI) -> Self {
        RelSource::Part(partname)
    }
}

/// A single relationship from a source to a target.
///
/// Represents a typed connection identified by an ID (e.g. "rId1"). Can be
/// either internal (pointing to another part) or external (pointing to an
/// external URL). Relationships are created through [`RelationshipStore`],
/// which validates them against the rest of their source's set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1", "rId2")
    r_id: String,

    /// Relationship type URI
    reltype: String,

    /// Target reference - either a part URI or external URL
    target_ref: String,

    target_mode: TargetMode,

    source: RelSource,
}

impl Relationship {
    /// Get the relationship ID.
    #[inline]
    pub fn r_id(&self) -> &str {
        &self.r_id
    }

    /// Get the relationship type.
    #[inline]
    pub fn reltype(&self) -> &str {
        &self.reltype
    }

    /// Get the target reference exactly as it was given.
    #[inline]
    pub fn target_ref(&self) -> &str {
        &self.target_ref
    }

    #[inline]
    pub fn target_mode(&self) -> TargetMode {
        self.target_mode
    }

    /// Check if this is an external relationship.
    #[inline]
    pub fn is_external(&self) -> bool {
        self.target_mode == TargetMode::External
    }

    #[inline]
    pub fn source(&self) -> &RelSource {
        &self.source
    }

    /// Get the absolute target partname for internal relationships.
    ///
    /// Returns an error if this is an external relationship or the resolved
    /// target is not a legal part name.
    pub fn target_partname(&self) -> Result<PackURI> {
        if self.is_external() {
            return Err(OpcError::InvalidRelationship(
                "Cannot get target_partname for external relationship".to_string(),
            ));
        }
        PackURI::from_rel_ref(self.source.base_uri(), self.target_ref.trim())
    }
}

/// Relationship as read from a `.rels` part, not yet attached to a source.
///
/// A decoded relationship carries no owner; [`RelationshipStore::attach`]
/// binds it to its source and validates it there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedRelationship {
    /// Relationship ID (e.g., "rId1")
    pub r_id: String,

    /// Relationship type URI
    pub reltype: String,

    /// Target reference (relative URI or external URL)
    pub target_ref: String,

    /// Target mode; Internal when the attribute is absent
    pub target_mode: TargetMode,
}

impl SerializedRelationship {
    /// Check if this is an external relationship.
    #[inline]
    pub fn is_external(&self) -> bool {
        self.target_mode == TargetMode::External
    }
}

/// Source of relationship IDs for relationships created without one.
///
/// Generated IDs are checked against the source's current set like any
/// caller-supplied ID, so an implementation may return a taken ID; the store
/// then asks again.
pub trait IdSource: fmt::Debug {
    /// Propose an ID for a new relationship in `existing`.
    fn next_id(&mut self, existing: &Relationships) -> String;
}

/// Generates "rId1", "rId2", ... filling the lowest gap first.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialIds;

impl IdSource for SequentialIds {
    fn next_id(&mut self, existing: &Relationships) -> String {
        let mut used_numbers: Vec<u32> = existing
            .iter()
            .filter_map(|rel| {
                let r_id = rel.r_id();
                // Extract number from "rId123" format
                if r_id.len() > 3 && r_id.starts_with("rId") {
                    atoi_simd::parse::<u32, false, false>(&r_id.as_bytes()[3..]).ok()
                } else {
                    None
                }
            })
            .collect();

        // Sort to find gaps efficiently
        used_numbers.sort_unstable();

        let mut next_num = 1u32;
        for &num in &used_numbers {
            match num.cmp(&next_num) {
                std::cmp::Ordering::Equal => next_num += 1,
                std::cmp::Ordering::Greater => break,
                std::cmp::Ordering::Less => {},
            }
        }

        format!("rId{}", next_num)
    }
}

/// Generates random IDs: "R" followed by 16 lowercase hex digits.
///
/// The leading letter keeps the ID a valid `xsd:ID`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&mut self, _existing: &Relationships) -> String {
        use rand::RngExt;

        let mut rng = rand::rng();
        format!("R{:016x}", rng.random::<u64>())
    }
}

/// Selects a built-in [`IdSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdSourceKind {
    #[default]
    Sequential,
    Random,
}

impl IdSourceKind {
    pub fn build(self) -> Box<dyn IdSource> {
        match self {
            IdSourceKind::Sequential => Box::new(SequentialIds),
            IdSourceKind::Random => Box::new(RandomIds),
        }
    }
}

/// Ordered collection of relationships from a single source.
///
/// Relationships keep their creation order, which is also their
/// serialization order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationships {
    source: RelSource,
    rels: Vec<Relationship>,
}

impl Relationships {
    /// Create a new empty relationships collection.
    pub fn new(source: RelSource) -> Self {
        Self {
            source,
            rels: Vec::new(),
        }
    }

    #[inline]
    pub fn source(&self) -> &RelSource {
        &self.source
    }

    /// Get a relationship by its ID.
    pub fn get(&self, r_id: &str) -> Option<&Relationship> {
        self.rels.iter().find(|rel| rel.r_id == r_id)
    }

    #[inline]
    pub fn contains_id(&self, r_id: &str) -> bool {
        self.get(r_id).is_some()
    }

    /// Get an iterator over all relationships in creation order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Relationship] {
        &self.rels
    }

    /// Get the number of relationships in the collection.
    #[inline]
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    /// Check if the collection is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    /// Get the relationships of a specific type.
    pub fn with_reltype<'a>(&'a self, reltype: &'a str) -> impl Iterator<Item = &'a Relationship> {
        self.rels.iter().filter(move |rel| rel.reltype == reltype)
    }

    /// Serialize relationships to `.rels` XML, declaration included.
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(512);
        write_relationships(&mut buf, &self.rels)?;
        Ok(buf)
    }

    /// Parse the relationships XML of a `.rels` part.
    ///
    /// The result is detached; see [`RelationshipStore::attach`].
    pub fn from_xml(xml: &[u8]) -> Result<Vec<SerializedRelationship>> {
        parse_relationships(xml)
    }
}

/// Owns every relationship of a package, keyed by source.
///
/// Relationship IDs are unique within one source only.
#[derive(Debug)]
pub struct RelationshipStore {
    sets: HashMap<String, Relationships>,
    id_source: Box<dyn IdSource>,
}

impl Default for RelationshipStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RelationshipStore {
    /// Create an empty store generating sequential "rIdN" IDs.
    pub fn new() -> Self {
        Self::with_id_source(Box::new(SequentialIds))
    }

    /// Create an empty store with a custom ID generator.
    pub fn with_id_source(id_source: Box<dyn IdSource>) -> Self {
        Self {
            sets: HashMap::new(),
            id_source,
        }
    }

    /// Create a relationship owned by `source`.
    ///
    /// When `r_id` is `None` an ID is generated and checked against the
    /// source's existing IDs.
    ///
    /// # Errors
    /// - [`OpcError::InvalidRelationship`] for a blank ID or type
    /// - [`OpcError::InvalidTargetUri`] for an empty or unparsable target
    /// - [`OpcError::IllegalRelationshipTarget`] for an absolute internal
    ///   target, a target resolving to a relationships part, or a source that
    ///   is itself a relationships part
    /// - [`OpcError::DuplicateRelationshipId`] if the ID is taken in this source
    ///
    /// The store is unchanged on error.
    pub fn create(
        &mut self,
        source: &RelSource,
        r_id: Option<&str>,
        reltype: &str,
        target_ref: &str,
        target_mode: TargetMode,
    ) -> Result<&Relationship> {
        validate_relationship(source, reltype, target_ref, target_mode)?;

        let key = source.key();
        let r_id = match r_id {
            Some(r_id) => {
                validate_id(r_id)?;
                if self.sets.get(&key).is_some_and(|set| set.contains_id(r_id)) {
                    return Err(OpcError::DuplicateRelationshipId {
                        owner: source.to_string(),
                        id: r_id.to_string(),
                    });
                }
                r_id.to_string()
            },
            None => self.generate_id(source, &key)?,
        };

        let set = self
            .sets
            .entry(key)
            .or_insert_with(|| Relationships::new(source.clone()));
        let index = set.rels.len();
        set.rels.push(Relationship {
            r_id,
            reltype: reltype.to_string(),
            target_ref: target_ref.to_string(),
            target_mode,
            source: source.clone(),
        });
        Ok(&set.rels[index])
    }

    fn generate_id(&mut self, source: &RelSource, key: &str) -> Result<String> {
        let empty = Relationships::new(source.clone());
        let existing = self.sets.get(key).unwrap_or(&empty);

        let mut candidate = String::new();
        for _ in 0..MAX_ID_ATTEMPTS {
            candidate = self.id_source.next_id(existing);
            if validate_id(&candidate).is_ok() && !existing.contains_id(&candidate) {
                return Ok(candidate);
            }
        }
        Err(OpcError::DuplicateRelationshipId {
            owner: source.to_string(),
            id: candidate,
        })
    }

    /// Attach decoded relationships to `source`.
    ///
    /// Every relationship is validated as if it were created on `source`,
    /// including ID uniqueness against what the source already holds. Either
    /// all are attached or none.
    pub fn attach(&mut self, source: &RelSource, srels: Vec<SerializedRelationship>) -> Result<()> {
        let key = source.key();
        let mut ids: HashSet<&str> = self
            .sets
            .get(&key)
            .map(|set| set.iter().map(Relationship::r_id).collect())
            .unwrap_or_default();

        for srel in &srels {
            validate_id(&srel.r_id)?;
            validate_relationship(source, &srel.reltype, &srel.target_ref, srel.target_mode)?;
            if !ids.insert(srel.r_id.as_str()) {
                return Err(OpcError::DuplicateRelationshipId {
                    owner: source.to_string(),
                    id: srel.r_id.clone(),
                });
            }
        }

        let set = self
            .sets
            .entry(key)
            .or_insert_with(|| Relationships::new(source.clone()));
        set.rels.extend(srels.into_iter().map(|srel| Relationship {
            r_id: srel.r_id,
            reltype: srel.reltype,
            target_ref: srel.target_ref,
            target_mode: srel.target_mode,
            source: source.clone(),
        }));
        Ok(())
    }

    /// Relationships of `source` in creation order; empty if it has none.
    pub fn find(&self, source: &RelSource) -> &[Relationship] {
        self.sets
            .get(&source.key())
            .map(Relationships::as_slice)
            .unwrap_or(&[])
    }

    /// The relationship collection of `source`, if it has one.
    pub fn relationships(&self, source: &RelSource) -> Option<&Relationships> {
        self.sets.get(&source.key())
    }

    pub fn get(&self, source: &RelSource, r_id: &str) -> Option<&Relationship> {
        self.sets.get(&source.key())?.get(r_id)
    }

    /// Remove one relationship.
    pub fn remove(&mut self, source: &RelSource, r_id: &str) -> Option<Relationship> {
        let set = self.sets.get_mut(&source.key())?;
        let index = set.rels.iter().position(|rel| rel.r_id == r_id)?;
        Some(set.rels.remove(index))
    }

    /// Remove every relationship owned by `source`.
    pub fn remove_source(&mut self, source: &RelSource) -> Option<Relationships> {
        self.sets.remove(&source.key())
    }

    /// Iterate over every non-empty relationship set.
    pub fn iter(&self) -> impl Iterator<Item = &Relationships> {
        self.sets.values().filter(|set| !set.is_empty())
    }
}

fn validate_id(r_id: &str) -> Result<()> {
    // ISO/IEC 29500-2 M1.26
    if r_id.trim().is_empty() {
        return Err(OpcError::InvalidRelationship(
            "relationship identifier cannot be empty string or a string with just spaces"
                .to_string(),
        ));
    }
    Ok(())
}

/// Check a relationship's type, target and source against ISO/IEC 29500-2 §9.3.
fn validate_relationship(
    source: &RelSource,
    reltype: &str,
    target_ref: &str,
    target_mode: TargetMode,
) -> Result<()> {
    if reltype.trim().is_empty() {
        return Err(OpcError::InvalidRelationship(
            "relationship type cannot be empty string or a string with just spaces".to_string(),
        ));
    }

    // ISO/IEC 29500-2 M1.25
    if let RelSource::Part(partname) = source
        && partname.is_relationships_part()
    {
        return Err(OpcError::IllegalRelationshipTarget(format!(
            "relationships part {} cannot have relationships",
            partname
        )));
    }

    // ISO/IEC 29500-2 M1.28
    let target = target_ref.trim();
    if target.is_empty() {
        return Err(OpcError::InvalidTargetUri(
            "relationship target URI reference cannot be empty".to_string(),
        ));
    }
    if target.bytes().any(|b| b.is_ascii_control()) {
        return Err(OpcError::InvalidTargetUri(format!(
            "'{}' contains control characters",
            target_ref
        )));
    }
    check_escapes(target)
        .map_err(|reason| OpcError::InvalidTargetUri(format!("'{}': {}", target_ref, reason)))?;

    if target_mode == TargetMode::External {
        return Ok(());
    }

    // ISO/IEC 29500-2 M1.29
    if has_scheme(target) {
        return Err(OpcError::IllegalRelationshipTarget(format!(
            "target '{}' must be relative if the TargetMode is Internal",
            target_ref
        )));
    }

    // ISO/IEC 29500-2 M1.26
    let resolved = resolve_reference(source.base_uri(), target);
    if is_relationships_uri(&resolved) {
        return Err(OpcError::IllegalRelationshipTarget(format!(
            "target {} is a relationships part",
            resolved
        )));
    }
    Ok(())
}

/// Serialize `rels` as a `.rels` part into `sink`.
///
/// `TargetMode` is written only for external relationships.
pub fn write_relationships<W: Write>(sink: &mut W, rels: &[Relationship]) -> Result<()> {
    let mut writer = Writer::new(Cursor::new(Vec::with_capacity(512)));
    writer.get_mut().write_all(XML_DECLARATION.as_bytes())?;

    let mut root = BytesStart::new("Relationships");
    root.push_attribute(("xmlns", namespace::OPC_RELATIONSHIPS));
    writer
        .write_event(Event::Start(root))
        .map_err(|e| OpcError::xml("Failed to write Relationships element", e))?;

    for rel in rels {
        let mut elem = BytesStart::new("Relationship");
        elem.push_attribute(("Id", rel.r_id()));
        elem.push_attribute(("Type", rel.reltype()));
        elem.push_attribute(("Target", rel.target_ref()));
        if rel.is_external() {
            elem.push_attribute(("TargetMode", target_mode::EXTERNAL));
        }
        writer
            .write_event(Event::Empty(elem))
            .map_err(|e| OpcError::xml("Failed to write Relationship element", e))?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("Relationships")))
        .map_err(|e| OpcError::xml("Failed to close Relationships element", e))?;

    sink.write_all(&writer.into_inner().into_inner())?;
    Ok(())
}

/// Parse relationships XML into detached [`SerializedRelationship`]s.
pub fn parse_relationships(xml: &[u8]) -> Result<Vec<SerializedRelationship>> {
    let mut srels = Vec::new();
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut seen_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"Relationships" => seen_root = true,
                b"Relationship" => {
                    let mut r_id = None;
                    let mut reltype = None;
                    let mut target_ref = None;
                    let mut mode = TargetMode::Internal;

                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| OpcError::xml("Rels attribute error", e))?;
                        let value = attr
                            .unescape_value()
                            .map_err(|e| OpcError::xml("Rels attribute error", e))?;
                        match attr.key.as_ref() {
                            b"Id" => r_id = Some(value.to_string()),
                            b"Type" => reltype = Some(value.to_string()),
                            b"Target" => target_ref = Some(value.to_string()),
                            b"TargetMode" => mode = TargetMode::parse(&value)?,
                            _ => {},
                        }
                    }

                    let (Some(r_id), Some(reltype), Some(target_ref)) = (r_id, reltype, target_ref)
                    else {
                        return Err(OpcError::XmlError(
                            "Relationship element is missing Id, Type or Target".to_string(),
                        ));
                    };
                    srels.push(SerializedRelationship {
                        r_id,
                        reltype,
                        target_ref,
                        target_mode: mode,
                    });
                },
                _ => {},
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpcError::xml("Rels parse error", e)),
            _ => {},
        }
        buf.clear();
    }

    if !seen_root {
        return Err(OpcError::XmlError(
            "Relationships part has no Relationships element".to_string(),
        ));
    }
    Ok(srels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::error::ErrorKind;

    const REL_TYPE: &str = "http://example.com/rel";

    fn part(name: &str) -> RelSource {
        RelSource::Part(PackURI::new(name).unwrap())
    }

    #[test]
    fn test_create_and_find() {
        let mut store = RelationshipStore::new();
        let source = part("/word/document.xml");

        let rel = store
            .create(&source, Some("rId7"), REL_TYPE, "styles.xml", TargetMode::Internal)
            .unwrap();
        assert_eq!(rel.r_id(), "rId7");
        assert_eq!(rel.target_partname().unwrap().as_str(), "/word/styles.xml");

        store
            .create(&source, None, REL_TYPE, "http://example.com", TargetMode::External)
            .unwrap();

        let ids: Vec<&str> = store.find(&source).iter().map(Relationship::r_id).collect();
        assert_eq!(ids, ["rId7", "rId1"]);
        assert!(store.find(&RelSource::Package).is_empty());
    }

    #[test]
    fn test_duplicate_id_in_same_source() {
        let mut store = RelationshipStore::new();
        let source = part("/a.xml");
        store
            .create(&source, Some("x"), REL_TYPE, "b.xml", TargetMode::Internal)
            .unwrap();
        let err = store
            .create(&source, Some("x"), REL_TYPE, "c.xml", TargetMode::Internal)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Duplicate);
        assert_eq!(store.find(&source).len(), 1);
    }

    #[test]
    fn test_same_id_in_different_sources() {
        let mut store = RelationshipStore::new();
        store
            .create(&part("/a.xml"), Some("rId1"), REL_TYPE, "b.xml", TargetMode::Internal)
            .unwrap();
        store
            .create(&part("/b.xml"), Some("rId1"), REL_TYPE, "a.xml", TargetMode::Internal)
            .unwrap();
        store
            .create(&RelSource::Package, Some("rId1"), REL_TYPE, "a.xml", TargetMode::Internal)
            .unwrap();
    }

    #[test]
    fn test_internal_target_to_relationships_part() {
        let mut store = RelationshipStore::new();
        let source = part("/a.xml");

        for target in ["_rels/b.xml.rels", "/_rels/.rels", "../_rels/.rels", "/docs/_RELS/x.xml.RELS"] {
            let err = store
                .create(&source, None, REL_TYPE, target, TargetMode::Internal)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Constraint, "target {:?}", target);
        }

        store
            .create(&source, None, REL_TYPE, "_rels/b.xml.rels", TargetMode::External)
            .unwrap();
    }

    #[test]
    fn test_relationships_part_cannot_hold_relationships() {
        let mut store = RelationshipStore::new();
        let err = store
            .create(&part("/_rels/a.xml.rels"), None, REL_TYPE, "/a.xml", TargetMode::Internal)
            .unwrap_err();
        assert!(matches!(err, OpcError::IllegalRelationshipTarget(_)));
    }

    #[test]
    fn test_rejects_invalid_fields() {
        let mut store = RelationshipStore::new();
        let source = RelSource::Package;

        let blank_id = store.create(&source, Some("  "), REL_TYPE, "a.xml", TargetMode::Internal);
        assert!(matches!(blank_id, Err(OpcError::InvalidRelationship(_))));

        let blank_type = store.create(&source, None, " ", "a.xml", TargetMode::Internal);
        assert!(matches!(blank_type, Err(OpcError::InvalidRelationship(_))));

        let empty_target = store.create(&source, None, REL_TYPE, "  ", TargetMode::Internal);
        assert!(matches!(empty_target, Err(OpcError::InvalidTargetUri(_))));

        let bad_escape = store.create(&source, None, REL_TYPE, "a%zz.xml", TargetMode::External);
        assert!(matches!(bad_escape, Err(OpcError::InvalidTargetUri(_))));

        let absolute = store.create(&source, None, REL_TYPE, "http://a.com/x", TargetMode::Internal);
        assert!(matches!(absolute, Err(OpcError::IllegalRelationshipTarget(_))));

        assert!(store.find(&source).is_empty());
    }

    #[test]
    fn test_sequential_ids_fill_gaps() {
        let mut store = RelationshipStore::new();
        let source = RelSource::Package;
        store
            .create(&source, Some("rId1"), REL_TYPE, "a.xml", TargetMode::Internal)
            .unwrap();
        store
            .create(&source, Some("rId3"), REL_TYPE, "b.xml", TargetMode::Internal)
            .unwrap();

        let generated = store
            .create(&source, None, REL_TYPE, "c.xml", TargetMode::Internal)
            .unwrap();
        assert_eq!(generated.r_id(), "rId2");
        let generated = store
            .create(&source, None, REL_TYPE, "d.xml", TargetMode::Internal)
            .unwrap();
        assert_eq!(generated.r_id(), "rId4");
    }

    #[derive(Debug)]
    struct FixedIds(&'static str);

    impl IdSource for FixedIds {
        fn next_id(&mut self, _existing: &Relationships) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn test_generated_ids_are_checked_for_uniqueness() {
        let mut store = RelationshipStore::with_id_source(Box::new(FixedIds("dup")));
        let source = RelSource::Package;
        store
            .create(&source, None, REL_TYPE, "a.xml", TargetMode::Internal)
            .unwrap();
        let err = store
            .create(&source, None, REL_TYPE, "b.xml", TargetMode::Internal)
            .unwrap_err();
        assert!(matches!(err, OpcError::DuplicateRelationshipId { .. }));
    }

    #[test]
    fn test_generated_ids_avoid_attached_ids() {
        let mut store = RelationshipStore::new();
        let source = part("/a.xml");
        let decoded = vec![SerializedRelationship {
            r_id: "rId1".to_string(),
            reltype: REL_TYPE.to_string(),
            target_ref: "b.xml".to_string(),
            target_mode: TargetMode::Internal,
        }];
        store.attach(&source, decoded).unwrap();

        let rel = store
            .create(&source, None, REL_TYPE, "c.xml", TargetMode::Internal)
            .unwrap();
        assert_eq!(rel.r_id(), "rId2");
    }

    #[test]
    fn test_random_ids() {
        let mut ids = RandomIds;
        let existing = Relationships::new(RelSource::Package);
        let id = ids.next_id(&existing);
        assert_eq!(id.len(), 17);
        assert!(id.starts_with('R'));
        assert!(id[1..].bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_attach_is_all_or_nothing() {
        let mut store = RelationshipStore::new();
        let source = part("/a.xml");
        let srel = |id: &str, target: &str| SerializedRelationship {
            r_id: id.to_string(),
            reltype: REL_TYPE.to_string(),
            target_ref: target.to_string(),
            target_mode: TargetMode::Internal,
        };

        let err = store
            .attach(&source, vec![srel("rId1", "b.xml"), srel("rId1", "c.xml")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Duplicate);
        assert!(store.find(&source).is_empty());

        let err = store
            .attach(&source, vec![srel("rId1", "b.xml"), srel("rId2", "_rels/.rels")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Constraint);
        assert!(store.find(&source).is_empty());
    }

    #[test]
    fn test_remove() {
        let mut store = RelationshipStore::new();
        let source = part("/a.xml");
        store
            .create(&source, Some("rId1"), REL_TYPE, "b.xml", TargetMode::Internal)
            .unwrap();
        store
            .create(&source, Some("rId2"), REL_TYPE, "c.xml", TargetMode::Internal)
            .unwrap();

        assert_eq!(store.remove(&source, "rId1").unwrap().target_ref(), "b.xml");
        assert!(store.remove(&source, "rId1").is_none());
        assert_eq!(store.find(&source).len(), 1);

        assert!(store.remove_source(&source).is_some());
        assert!(store.find(&source).is_empty());
    }

    #[test]
    fn test_rels_xml() {
        let mut store = RelationshipStore::new();
        let source = part("/word/document.xml");
        store
            .create(&source, Some("rId1"), REL_TYPE, "styles.xml", TargetMode::Internal)
            .unwrap();
        store
            .create(&source, Some("rId2"), REL_TYPE, "http://a.com/?x=1&y=2", TargetMode::External)
            .unwrap();

        let xml = String::from_utf8(store.relationships(&source).unwrap().to_xml().unwrap()).unwrap();
        assert!(xml.starts_with(XML_DECLARATION));
        assert!(xml.contains(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#
        ));
        assert!(xml.contains(
            r#"<Relationship Id="rId1" Type="http://example.com/rel" Target="styles.xml"/>"#
        ));
        assert!(xml.contains(r#"Target="http://a.com/?x=1&amp;y=2" TargetMode="External"/>"#));
        assert!(!xml.contains("Internal"));

        let decoded = Relationships::from_xml(xml.as_bytes()).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].target_mode, TargetMode::Internal);
        assert!(decoded[1].is_external());
        assert_eq!(decoded[1].target_ref, "http://a.com/?x=1&y=2");
    }

    #[test]
    fn test_parse_rels_xml() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
            <Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
                <Relationship Id="rId1" Type="t" Target="a.xml" TargetMode="Internal"/>
                <Relationship Id="rId2" Type="t" Target="b.xml"></Relationship>
            </Relationships>"#;
        let srels = parse_relationships(xml).unwrap();
        assert_eq!(srels.len(), 2);
        assert!(srels.iter().all(|srel| !srel.is_external()));

        let bad_mode = br#"<Relationships><Relationship Id="a" Type="t" Target="x" TargetMode="Elsewhere"/></Relationships>"#;
        assert!(parse_relationships(bad_mode).is_err());

        let missing = br#"<Relationships><Relationship Id="a" Target="x"/></Relationships>"#;
        assert!(parse_relationships(missing).is_err());

        assert!(parse_relationships(b"<Other/>").is_err());
    }
}
