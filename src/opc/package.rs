//! The in-memory package: part registry, content types and relationships.
//!
//! [`Package`] owns every piece of mutable package state. It enforces the part
//! naming rules of ISO/IEC 29500-2 §9.1.1: names are unique ignoring ASCII
//! case, and no name may be a segment-boundary prefix of another (`/docs`
//! and `/docs/a.xml` cannot coexist).

use crate::opc::content_types::ContentTypes;
use crate::opc::core_props::CoreProperties;
use crate::opc::error::{OpcError, Result};
use crate::opc::part::Part;
use crate::opc::rel::{RelSource, Relationship, RelationshipStore, TargetMode};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

/// Uppercased part name ordered segment by segment.
///
/// Comparing segment-wise makes `/` sort below every other character, so a
/// name sorts immediately before the names it is a prefix of. With plain
/// string ordering `/A-B` would sort between `/A` and `/A/X`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NameKey(String);

impl Ord for NameKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.split('/').cmp(other.0.split('/'))
    }
}

impl PartialOrd for NameKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Whether `shorter` names a folder that contains `longer`.
fn is_segment_prefix(shorter: &str, longer: &str) -> bool {
    longer.len() > shorter.len()
        && longer.starts_with(shorter)
        && longer.as_bytes()[shorter.len()] == b'/'
}

/// An OPC package held in memory.
///
/// Single-threaded: nothing here is synchronized, callers sharing a package
/// across threads must lock around it.
#[derive(Debug, Default)]
pub struct Package {
    /// Parts by uppercase partname
    parts: HashMap<String, Part>,

    /// Segment-ordered index of `parts` keys for prefix-collision checks
    index: BTreeSet<NameKey>,

    content_types: ContentTypes,

    relationships: RelationshipStore,

    core_properties: Option<CoreProperties>,
}

impl Package {
    /// Create a new empty package.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty package whose relationships use the given store.
    pub fn with_relationships(relationships: RelationshipStore) -> Self {
        Self {
            relationships,
            ..Self::default()
        }
    }

    /// Create an empty package around a decoded content type table.
    ///
    /// Parts are then registered with [`Package::add_existing`], which leaves
    /// the table as decoded.
    pub(crate) fn with_content_types(content_types: ContentTypes) -> Self {
        Self {
            content_types,
            ..Self::default()
        }
    }

    /// Register a part and its content type.
    ///
    /// # Errors
    /// - [`OpcError::InvalidPackUri`] / [`OpcError::InvalidMediaType`] if the
    ///   part does not validate
    /// - [`OpcError::DuplicatePart`] if the name is taken, ignoring case
    /// - [`OpcError::PartNameCollision`] if the name is a folder of an
    ///   existing name or the other way round
    ///
    /// Nothing is modified on error.
    pub fn add(&mut self, part: Part) -> Result<()> {
        let key = self.check_insert(&part)?;
        self.content_types
            .add(part.partname().as_str(), part.content_type())?;
        self.insert(key, part);
        Ok(())
    }

    /// Register a part whose content type is already in the table.
    pub(crate) fn add_existing(&mut self, part: Part) -> Result<()> {
        let key = self.check_insert(&part)?;
        self.insert(key, part);
        Ok(())
    }

    /// Check that `part` would be accepted by [`Package::add`], without
    /// registering it.
    pub(crate) fn check_add(&self, part: &Part) -> Result<()> {
        self.check_insert(part).map(|_| ())
    }

    fn check_insert(&self, part: &Part) -> Result<NameKey> {
        part.validate()?;

        let key = NameKey(part.partname().key());
        if self.parts.contains_key(&key.0) {
            return Err(OpcError::DuplicatePart(part.partname().to_string()));
        }

        if let Some(existing) = self.colliding_name(&key) {
            return Err(OpcError::PartNameCollision {
                name: part.partname().to_string(),
                existing,
            });
        }

        Ok(key)
    }

    /// Find an existing name colliding with `key` under the prefix rule.
    ///
    /// The index holds no colliding pair, so only the names immediately
    /// before and after `key` in segment order need checking.
    fn colliding_name(&self, key: &NameKey) -> Option<String> {
        let predecessor = self.index.range(..key).next_back();
        let successor = self
            .index
            .range((Bound::Excluded(key), Bound::Unbounded))
            .next();

        let colliding = match (predecessor, successor) {
            (Some(prev), _) if is_segment_prefix(&prev.0, &key.0) => prev,
            (_, Some(next)) if is_segment_prefix(&key.0, &next.0) => next,
            _ => return None,
        };
        self.parts
            .get(&colliding.0)
            .map(|part| part.partname().to_string())
    }

    fn insert(&mut self, key: NameKey, part: Part) {
        tracing::trace!(part = %part.partname(), content_type = part.content_type(), "registered part");
        self.parts.insert(key.0.clone(), part);
        self.index.insert(key);
    }

    /// Remove a part from the registry.
    ///
    /// Its content type entry and its relationships stay in place; use
    /// [`RelationshipStore::remove_source`] to drop the relationships.
    pub fn delete(&mut self, partname: &str) -> Option<Part> {
        let key = partname.to_ascii_uppercase();
        let part = self.parts.remove(&key)?;
        self.index.remove(&NameKey(key));
        Some(part)
    }

    /// Look up a part by name, ignoring ASCII case.
    pub fn get_part(&self, partname: &str) -> Option<&Part> {
        self.parts.get(&partname.to_ascii_uppercase())
    }

    #[inline]
    pub fn contains(&self, partname: &str) -> bool {
        self.get_part(partname).is_some()
    }

    /// Iterate over parts in segment order of their names.
    pub fn iter_parts(&self) -> impl Iterator<Item = &Part> {
        self.index.iter().filter_map(|key| self.parts.get(&key.0))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    #[inline]
    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    #[inline]
    pub fn relationships(&self) -> &RelationshipStore {
        &self.relationships
    }

    #[inline]
    pub fn relationships_mut(&mut self) -> &mut RelationshipStore {
        &mut self.relationships
    }

    /// Create a relationship from the package root or a registered part.
    ///
    /// # Errors
    /// [`OpcError::PartNotFound`] if a part source is not registered, plus
    /// everything [`RelationshipStore::create`] rejects.
    pub fn create_relationship(
        &mut self,
        source: &RelSource,
        r_id: Option<&str>,
        reltype: &str,
        target_ref: &str,
        target_mode: TargetMode,
    ) -> Result<&Relationship> {
        if let RelSource::Part(partname) = source
            && !self.contains(partname.as_str())
        {
            return Err(OpcError::PartNotFound(partname.to_string()));
        }
        self.relationships
            .create(source, r_id, reltype, target_ref, target_mode)
    }

    /// Relationships owned by the package root, in creation order.
    pub fn package_relationships(&self) -> &[Relationship] {
        self.relationships.find(&RelSource::Package)
    }

    pub fn core_properties(&self) -> Option<&CoreProperties> {
        self.core_properties.as_ref()
    }

    pub fn set_core_properties(&mut self, props: CoreProperties) {
        self.core_properties = Some(props);
    }
}
