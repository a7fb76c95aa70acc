//! Litchi OPC - Open Packaging Conventions core for Rust
//!
//! This library implements the container layer behind Office Open XML files
//! (.docx, .xlsx, .pptx): a ZIP archive of named, typed parts linked by
//! relationships, described by ISO/IEC 29500-2.
//!
//! # Features
//!
//! - **Part names**: Normalize arbitrary references and validate part names
//! - **Content types**: Default/override table with `[Content_Types].xml` encoding
//! - **Relationships**: Validated relationship store with pluggable ID generation
//! - **Registry**: Case-insensitive, prefix-collision-free part registry
//! - **Writer**: Streaming package writer with per-entry compression
//! - **Reader**: Rebuild a package and read part bytes on demand
//!
//! # Example - Writing a package
//!
//! ```
//! use litchi_opc::opc::{CompressionOption, PackageWriter, RelSource, TargetMode};
//! use std::io::{Cursor, Write};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut writer = PackageWriter::new(Cursor::new(Vec::new()));
//!
//! let mut part = writer.create_part("/word/document.xml", "application/xml", CompressionOption::Normal)?;
//! part.write_all(b"<document/>")?;
//!
//! writer.create_relationship(
//!     &RelSource::Package,
//!     None,
//!     "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument",
//!     "word/document.xml",
//!     TargetMode::Internal,
//! )?;
//!
//! let bytes = writer.into_inner()?.into_inner();
//! # assert!(!bytes.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Reading a package
//!
//! ```no_run
//! use litchi_opc::opc::PackageReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = PackageReader::new(std::fs::File::open("document.docx")?)?;
//! for part in reader.package().iter_parts() {
//!     println!("{} ({})", part.partname(), part.content_type());
//! }
//! let xml = reader.read_part("/word/document.xml")?;
//! # let _ = xml;
//! # Ok(())
//! # }
//! ```

/// Open Packaging Conventions (OPC) core
///
/// Part names, content types, relationships, the part registry, and the
/// package reader and writer.
pub mod opc;

// Re-export commonly used types for convenience
pub use opc::{OpcError, Package, PackageReader, PackageWriter, PackURI, Result};
