//! Provides a general interface to a physical OPC package (ZIP file).
//!
//! This module handles the low-level reading and writing of ZIP archive
//! members. It knows nothing about content types or relationships; part names
//! map to member names by dropping the leading slash.

use crate::opc::constants::CONTENT_TYPES_URI;
use crate::opc::error::{OpcError, Result};
use crate::opc::packuri::PackURI;
use crate::opc::pkgwriter::CompressionOption;
use crate::opc::rel::RelSource;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Read, Seek, Write};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Physical package reader over a ZIP archive.
///
/// Members are looked up ignoring ASCII case, as part names are.
pub struct PhysPkgReader<R> {
    archive: RefCell<ZipArchive<R>>,

    /// Member names by uppercase name, directories excluded
    members: HashMap<String, String>,
}

impl<R: Read + Seek> PhysPkgReader<R> {
    /// Open a ZIP archive from a reader.
    pub fn new(reader: R) -> Result<Self> {
        let archive = ZipArchive::new(reader)?;
        let members = archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(|name| (name.to_ascii_uppercase(), name.to_string()))
            .collect();
        Ok(Self {
            archive: RefCell::new(archive),
            members,
        })
    }

    /// Read a member by its archive name.
    ///
    /// # Errors
    /// [`OpcError::PartNotFound`] if no member has that name.
    pub fn read_member(&self, membername: &str) -> Result<Vec<u8>> {
        let Some(actual) = self.members.get(&membername.to_ascii_uppercase()) else {
            return Err(OpcError::PartNotFound(format!("/{}", membername)));
        };

        let mut archive = self.archive.borrow_mut();
        let mut file = archive.by_name(actual).map_err(|e| match e {
            ZipError::FileNotFound => OpcError::PartNotFound(format!("/{}", membername)),
            other => OpcError::ZipError(other),
        })?;

        let mut blob = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut blob)?;
        Ok(blob)
    }

    /// Get the binary content for a part by its PackURI.
    #[inline]
    pub fn blob_for(&self, pack_uri: &PackURI) -> Result<Vec<u8>> {
        self.read_member(pack_uri.membername())
    }

    /// Get the [Content_Types].xml content.
    ///
    /// This is a required part of every OPC package that maps parts to content types.
    pub fn content_types_xml(&self) -> Result<Vec<u8>> {
        self.read_member(&CONTENT_TYPES_URI[1..])
    }

    /// Get the relationships XML for a source, or `None` if it has no `.rels` member.
    pub fn rels_xml_for(&self, source: &RelSource) -> Result<Option<Vec<u8>>> {
        match self.blob_for(&source.rels_uri()) {
            Ok(blob) => Ok(Some(blob)),
            Err(OpcError::PartNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// List all member names in the package, directories excluded.
    pub fn member_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.members.values().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Check if a member exists, ignoring ASCII case.
    pub fn contains(&self, membername: &str) -> bool {
        self.members.contains_key(&membername.to_ascii_uppercase())
    }

    /// Get the number of files in the package (excluding directories).
    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Physical package writer: one ZIP member open at a time.
///
/// Bytes written through [`Write`] go to the member most recently started
/// with [`PhysPkgWriter::start_member`].
pub struct PhysPkgWriter<W: Write + Seek> {
    archive: ZipWriter<W>,
}

impl<W: Write + Seek> PhysPkgWriter<W> {
    /// Start a new archive on `sink`.
    pub fn new(sink: W) -> Self {
        Self {
            archive: ZipWriter::new(sink),
        }
    }

    /// Start a new member, implicitly finishing the previous one.
    pub fn start_member(&mut self, pack_uri: &PackURI, compression: CompressionOption) -> Result<()> {
        self.start_raw(pack_uri.membername(), compression)
    }

    fn start_raw(&mut self, membername: &str, compression: CompressionOption) -> Result<()> {
        let options = SimpleFileOptions::default()
            .compression_method(compression.method())
            .compression_level(compression.level());
        self.archive.start_file(membername, options)?;
        Ok(())
    }

    /// Write a whole member in one call.
    pub fn write_member(
        &mut self,
        pack_uri: &PackURI,
        blob: &[u8],
        compression: CompressionOption,
    ) -> Result<()> {
        self.start_member(pack_uri, compression)?;
        self.archive.write_all(blob)?;
        Ok(())
    }

    /// Write the `[Content_Types].xml` member.
    ///
    /// Its name is not a legal part name, so it bypasses [`PackURI`].
    pub fn write_content_types(&mut self, blob: &[u8], compression: CompressionOption) -> Result<()> {
        self.start_raw(&CONTENT_TYPES_URI[1..], compression)?;
        self.archive.write_all(blob)?;
        Ok(())
    }

    /// Write the central directory and return the sink.
    pub fn finish(self) -> Result<W> {
        Ok(self.archive.finish()?)
    }
}

impl<W: Write + Seek> Write for PhysPkgWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.archive.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.archive.flush()
    }
}
