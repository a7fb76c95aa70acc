//! Package writer for OPC packages.
//!
//! [`PackageWriter`] streams parts into a ZIP archive one at a time. Each
//! part's relationships are written right after the part, as soon as the next
//! part is created or the writer is closed. Closing writes the core
//! properties, the package relationships and `[Content_Types].xml`, then
//! finalizes the archive.
//!
//! ```
//! use litchi_opc::opc::{PackageWriter, CompressionOption, RelSource, TargetMode};
//! use std::io::{Cursor, Write};
//!
//! let mut writer = PackageWriter::new(Cursor::new(Vec::new()));
//! writer
//!     .create_part("/doc.xml", "application/xml", CompressionOption::Normal)?
//!     .write_all(b"<doc/>")?;
//! writer.create_relationship(
//!     &RelSource::Package,
//!     None,
//!     "http://example.com/rel/doc",
//!     "doc.xml",
//!     TargetMode::Internal,
//! )?;
//! let zip_bytes = writer.into_inner()?.into_inner();
//! assert!(!zip_bytes.is_empty());
//! # Ok::<(), litchi_opc::opc::OpcError>(())
//! ```

use crate::opc::constants::{CORE_PROPERTIES_URI, content_type as ct, relationship_type};
use crate::opc::core_props::CoreProperties;
use crate::opc::error::{OpcError, Result};
use crate::opc::package::Package;
use crate::opc::packuri::PackURI;
use crate::opc::part::Part;
use crate::opc::phys_pkg::PhysPkgWriter;
use crate::opc::rel::{IdSourceKind, RelSource, Relationship, RelationshipStore, TargetMode};
use std::io::{Seek, Write};
use tracing::debug;
use zip::CompressionMethod;

/// Compression applied to one archive entry.
///
/// `Maximum`, `Fast` and `SuperFast` correspond to the deflate speed/ratio
/// bits of the ZIP general-purpose flag (`0x2`, `0x4`, `0x6`). The `zip`
/// crate does not expose that flag, so the deflate level stands in for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionOption {
    /// Stored without compression
    None,
    /// Deflate at the default level
    #[default]
    Normal,
    /// Deflate at the best compression level
    Maximum,
    Fast,
    SuperFast,
}

impl CompressionOption {
    /// ZIP compression method for this option.
    pub fn method(self) -> CompressionMethod {
        match self {
            CompressionOption::None => CompressionMethod::Stored,
            _ => CompressionMethod::Deflated,
        }
    }

    /// Deflate level; `None` leaves the encoder default.
    pub fn level(self) -> Option<i64> {
        match self {
            CompressionOption::None | CompressionOption::Normal => None,
            CompressionOption::Maximum => Some(9),
            CompressionOption::Fast => Some(3),
            CompressionOption::SuperFast => Some(1),
        }
    }
}

/// Configuration of a [`PackageWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriterOptions {
    /// Compression of `.rels` and core properties entries
    pub relationship_compression: CompressionOption,
    /// Compression of the `[Content_Types].xml` entry
    pub content_types_compression: CompressionOption,
    /// Generator for relationship IDs left to the writer
    pub id_source: IdSourceKind,
}

impl WriterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_relationship_compression(mut self, compression: CompressionOption) -> Self {
        self.relationship_compression = compression;
        self
    }

    pub fn with_content_types_compression(mut self, compression: CompressionOption) -> Self {
        self.content_types_compression = compression;
        self
    }

    pub fn with_id_source(mut self, id_source: IdSourceKind) -> Self {
        self.id_source = id_source;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Parts and relationships may still be added
    Open,
    /// Terminal
    Closed,
}

/// Byte sink for the part most recently created.
///
/// Borrows the writer, so it cannot outlive the next `create_part` or `close`.
pub struct PartWriter<'a, W: Write + Seek> {
    archive: &'a mut PhysPkgWriter<W>,
}

impl<W: Write + Seek> Write for PartWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.archive.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.archive.flush()
    }
}

/// Streaming writer of an OPC package.
///
/// Single-threaded; one writer owns its sink exclusively.
pub struct PackageWriter<W: Write + Seek> {
    /// `None` once the archive has been finished
    archive: Option<PhysPkgWriter<W>>,

    package: Package,

    /// Part being written, whose relationships are not flushed yet
    current: Option<PackURI>,

    state: WriterState,

    options: WriterOptions,

    finished: Option<W>,
}

impl<W: Write + Seek> PackageWriter<W> {
    /// Create a writer with default options.
    pub fn new(sink: W) -> Self {
        Self::with_options(sink, WriterOptions::default())
    }

    pub fn with_options(sink: W, options: WriterOptions) -> Self {
        let relationships = RelationshipStore::with_id_source(options.id_source.build());
        Self {
            archive: Some(PhysPkgWriter::new(sink)),
            package: Package::with_relationships(relationships),
            current: None,
            state: WriterState::Open,
            options,
            finished: None,
        }
    }

    #[inline]
    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Everything registered so far.
    #[inline]
    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Start a new part and return the sink for its bytes.
    ///
    /// The previous part is finalized first: its relationships, if any, are
    /// written as its `_rels/<name>.rels` entry.
    ///
    /// # Arguments
    /// * `name` - Part name; it must already be legal, use
    ///   [`PackURI::normalize`] to canonicalize arbitrary input
    /// * `content_type` - Media type of the part
    /// * `compression` - Compression of the part's archive entry
    ///
    /// # Returns
    /// A sink for the part's bytes, valid until the next call on the writer
    ///
    /// # Errors
    /// [`OpcError::WriterClosed`] after `close`, and every error of
    /// [`Package::add`]. The part is registered only once its archive entry
    /// has started, so a failed call leaves the package unchanged.
    pub fn create_part(
        &mut self,
        name: &str,
        content_type: &str,
        compression: CompressionOption,
    ) -> Result<PartWriter<'_, W>> {
        self.ensure_open()?;
        self.finalize_current_part()?;

        let part = Part::new(name, content_type)?;
        self.package.check_add(&part)?;
        let partname = part.partname().clone();

        self.archive_mut()?.start_member(&partname, compression)?;
        self.package.add(part)?;
        debug!(part = %partname, ?compression, "part opened");
        self.current = Some(partname);

        Ok(PartWriter {
            archive: self.archive_mut()?,
        })
    }

    /// Add a relationship from the package root or from the open part.
    ///
    /// Relationships of a part are written when the part is finalized, so a
    /// part source must be the part currently being written.
    pub fn create_relationship(
        &mut self,
        source: &RelSource,
        r_id: Option<&str>,
        reltype: &str,
        target_ref: &str,
        target_mode: TargetMode,
    ) -> Result<&Relationship> {
        self.ensure_open()?;
        if let RelSource::Part(partname) = source {
            let is_current = self
                .current
                .as_ref()
                .is_some_and(|current| current.key() == partname.key());
            if !is_current {
                return Err(OpcError::PartNotOpen(partname.to_string()));
            }
        }
        self.package
            .create_relationship(source, r_id, reltype, target_ref, target_mode)
    }

    /// Core properties to write at close, replacing any set before.
    pub fn set_core_properties(&mut self, props: CoreProperties) -> Result<()> {
        self.ensure_open()?;
        self.package.set_core_properties(props);
        Ok(())
    }

    /// Finish the package.
    ///
    /// Flushes the open part's relationships, writes the core properties and
    /// their root relationship, the root relationships and
    /// `[Content_Types].xml`, then finalizes the archive. The first failure
    /// aborts the rest; the output is then incomplete.
    ///
    /// The writer is closed after the first call whatever its outcome, and
    /// later calls return `Ok(())` without touching the output.
    ///
    /// # Returns
    /// `Ok(())` once the archive is finalized; the sink is then available
    /// through [`PackageWriter::into_inner`]
    pub fn close(&mut self) -> Result<()> {
        if self.state == WriterState::Closed {
            return Ok(());
        }
        self.state = WriterState::Closed;

        self.finalize_current_part()?;
        self.write_core_properties()?;
        self.flush_relationships(&RelSource::Package)?;
        self.write_content_types()?;

        let archive = self.archive.take().ok_or(OpcError::WriterClosed)?;
        self.finished = Some(archive.finish()?);
        debug!(parts = self.package.len(), "package closed");
        Ok(())
    }

    /// Close the writer if needed and return the sink.
    ///
    /// # Errors
    /// The error of `close`, or [`OpcError::WriterClosed`] if an earlier
    /// `close` failed before the archive was finalized.
    pub fn into_inner(mut self) -> Result<W> {
        self.close()?;
        self.finished.take().ok_or(OpcError::WriterClosed)
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            WriterState::Open => Ok(()),
            WriterState::Closed => Err(OpcError::WriterClosed),
        }
    }

    fn archive_mut(&mut self) -> Result<&mut PhysPkgWriter<W>> {
        self.archive.as_mut().ok_or(OpcError::WriterClosed)
    }

    /// Leave the open part: its entry ends and its relationships follow it.
    fn finalize_current_part(&mut self) -> Result<()> {
        let Some(partname) = self.current.take() else {
            return Ok(());
        };
        self.flush_relationships(&RelSource::Part(partname))
    }

    /// Write the relationships of `source` as its `.rels` entry, if it has any.
    fn flush_relationships(&mut self, source: &RelSource) -> Result<()> {
        let blob = match self.package.relationships().relationships(source) {
            Some(rels) if !rels.is_empty() => rels.to_xml()?,
            _ => return Ok(()),
        };

        let rels_uri = source.rels_uri();
        let part = Part::from_partname(rels_uri.clone(), ct::OPC_RELATIONSHIPS)?;
        self.package.check_add(&part)?;

        let compression = self.options.relationship_compression;
        self.archive_mut()?
            .write_member(&rels_uri, &blob, compression)?;
        self.package.add(part)?;
        debug!(source = %source, part = %rels_uri, "relationships flushed");
        Ok(())
    }

    fn write_core_properties(&mut self) -> Result<()> {
        let Some(props) = self.package.core_properties() else {
            return Ok(());
        };
        let blob = props.to_xml()?;
        let partname = PackURI::new(props.part_name.as_deref().unwrap_or(CORE_PROPERTIES_URI))?;

        let part = Part::from_partname(partname.clone(), ct::OPC_CORE_PROPERTIES)?;
        self.package.check_add(&part)?;

        let compression = self.options.relationship_compression;
        self.archive_mut()?
            .write_member(&partname, &blob, compression)?;
        self.package.add(part)?;
        self.package.create_relationship(
            &RelSource::Package,
            None,
            relationship_type::CORE_PROPERTIES,
            partname.as_str(),
            TargetMode::Internal,
        )?;
        debug!(part = %partname, "core properties written");
        Ok(())
    }

    fn write_content_types(&mut self) -> Result<()> {
        let blob = self.package.content_types().to_xml()?;
        let compression = self.options.content_types_compression;
        self.archive_mut()?
            .write_content_types(&blob, compression)?;
        debug!("content types written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::error::ErrorKind;
    use std::cell::{Cell, RefCell};
    use std::io::{Cursor, SeekFrom};
    use std::rc::Rc;

    const REL_TYPE: &str = "http://example.com/rel";

    fn writer() -> PackageWriter<Cursor<Vec<u8>>> {
        PackageWriter::new(Cursor::new(Vec::new()))
    }

    /// Sink that rejects every write once `failing` is set.
    #[derive(Clone, Default)]
    struct FailingSink {
        failing: Rc<Cell<bool>>,
        data: Rc<RefCell<Cursor<Vec<u8>>>>,
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.failing.get() {
                return Err(std::io::Error::other("disk full"));
            }
            self.data.borrow_mut().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Seek for FailingSink {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            self.data.borrow_mut().seek(pos)
        }
    }

    fn written(sink: &FailingSink, needle: &[u8]) -> bool {
        sink.data
            .borrow()
            .get_ref()
            .windows(needle.len())
            .any(|window| window == needle)
    }

    #[test]
    fn test_compression_levels() {
        assert_eq!(CompressionOption::None.method(), CompressionMethod::Stored);
        assert_eq!(CompressionOption::None.level(), None);
        assert_eq!(CompressionOption::Normal.method(), CompressionMethod::Deflated);
        assert_eq!(CompressionOption::Normal.level(), None);
        assert_eq!(CompressionOption::Maximum.level(), Some(9));
        assert_eq!(CompressionOption::Fast.level(), Some(3));
        assert_eq!(CompressionOption::SuperFast.level(), Some(1));
        assert_eq!(CompressionOption::default(), CompressionOption::Normal);
    }

    #[test]
    fn test_duplicate_part() {
        let mut writer = writer();
        writer
            .create_part("/doc.xml", "text/plain", CompressionOption::Normal)
            .unwrap()
            .write_all(b"hello")
            .unwrap();
        let err = writer
            .create_part("/doc.xml", "text/plain", CompressionOption::Normal)
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Duplicate);
        writer.close().unwrap();
    }

    #[test]
    fn test_invalid_name_is_not_normalized() {
        let mut writer = writer();
        let err = writer
            .create_part("doc.xml", "text/plain", CompressionOption::Normal)
            .err()
            .unwrap();
        assert!(matches!(err, OpcError::InvalidPackUri(_)));
        assert!(writer.package().is_empty());
    }

    #[test]
    fn test_relationship_source_must_be_open_part() {
        let mut writer = writer();
        let a = RelSource::Part(PackURI::new("/a.xml").unwrap());
        writer
            .create_part("/a.xml", "text/plain", CompressionOption::Normal)
            .unwrap();
        writer
            .create_relationship(&a, None, REL_TYPE, "b.xml", TargetMode::Internal)
            .unwrap();

        writer
            .create_part("/b.xml", "text/plain", CompressionOption::Normal)
            .unwrap();
        let err = writer
            .create_relationship(&a, None, REL_TYPE, "c.xml", TargetMode::Internal)
            .unwrap_err();
        assert!(matches!(err, OpcError::PartNotOpen(_)));

        // The flushed relationships part is registered like any part
        assert!(writer.package().contains("/_rels/a.xml.rels"));
        assert_eq!(
            writer
                .package()
                .content_types()
                .find_type("/_rels/a.xml.rels")
                .unwrap(),
            ct::OPC_RELATIONSHIPS
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut writer = writer();
        writer.close().unwrap();
        assert_eq!(writer.state(), WriterState::Closed);
        writer.close().unwrap();

        let err = writer
            .create_part("/a.xml", "text/plain", CompressionOption::Normal)
            .err()
            .unwrap();
        assert!(matches!(err, OpcError::WriterClosed));
        assert!(matches!(
            writer.set_core_properties(CoreProperties::new()),
            Err(OpcError::WriterClosed)
        ));

        let bytes = writer.into_inner().unwrap().into_inner();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn test_core_properties_registered_on_close() {
        let mut writer = writer();
        writer
            .set_core_properties(CoreProperties::new().title("T"))
            .unwrap();
        writer.close().unwrap();

        let package = writer.package();
        assert!(package.contains(CORE_PROPERTIES_URI));
        let rels = package.package_relationships();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].reltype(), relationship_type::CORE_PROPERTIES);
        assert_eq!(rels[0].target_partname().unwrap().as_str(), CORE_PROPERTIES_URI);
    }

    #[test]
    fn test_random_ids_option() {
        let options = WriterOptions::new().with_id_source(IdSourceKind::Random);
        let mut writer = PackageWriter::with_options(Cursor::new(Vec::new()), options);
        let rel = writer
            .create_relationship(&RelSource::Package, None, REL_TYPE, "a.xml", TargetMode::Internal)
            .unwrap();
        assert!(rel.r_id().starts_with('R'));
        assert_eq!(rel.r_id().len(), 17);
    }

    #[test]
    fn test_failed_entry_registers_nothing() {
        let sink = FailingSink::default();
        sink.failing.set(true);
        let mut writer = PackageWriter::new(sink.clone());

        let err = writer
            .create_part("/a.bin", "application/x-test", CompressionOption::None)
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!writer.package().contains("/a.bin"));
        assert_eq!(writer.package().content_types().default_for("bin"), None);
        assert!(writer.package().content_types().is_empty());
    }

    #[test]
    fn test_close_stops_at_first_failure() {
        let sink = FailingSink::default();
        let mut writer = PackageWriter::new(sink.clone());
        let a = RelSource::Part(PackURI::new("/a.xml").unwrap());
        writer
            .create_part("/a.xml", "application/xml", CompressionOption::None)
            .unwrap()
            .write_all(b"<a/>")
            .unwrap();
        writer
            .create_relationship(&a, None, REL_TYPE, "b.xml", TargetMode::Internal)
            .unwrap();
        writer
            .create_relationship(&RelSource::Package, None, REL_TYPE, "a.xml", TargetMode::Internal)
            .unwrap();
        writer
            .set_core_properties(CoreProperties::new().title("T"))
            .unwrap();

        sink.failing.set(true);
        let err = writer.close().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(writer.state(), WriterState::Closed);

        // Flushing the part's relationships failed, so nothing after it ran
        let package = writer.package();
        assert!(!package.contains("/_rels/a.xml.rels"));
        assert!(!package.contains(CORE_PROPERTIES_URI));
        assert_eq!(package.package_relationships().len(), 1);

        writer.close().unwrap();
        assert!(matches!(writer.into_inner(), Err(OpcError::WriterClosed)));

        sink.failing.set(false);
        assert!(written(&sink, b"a.xml"));
        assert!(!written(&sink, b"[Content_Types].xml"));
        assert!(!written(&sink, b"_rels/.rels"));
    }
}
