//! Open Packaging Conventions (OPC) implementation.
//!
//! This module implements the packaging layer of ISO/IEC 29500-2: the
//! container format shared by Office Open XML documents. It includes support for:
//!
//! - Part names: normalization, validation and relative reference resolution
//! - Content type management (`[Content_Types].xml`)
//! - Relationships between parts, with validated, injectable ID generation
//! - A part registry enforcing unique, non-overlapping part names
//! - Streaming ZIP output through a small writer state machine, and reading
//!   packages back
//!
//! # Implementation Notes
//!
//! - Uses `quick-xml` for the XML items
//! - Uses `zip` for the physical package
//! - Uses `atoi_simd` when scanning `rIdN` identifiers
//! - Emits `tracing` events; no subscriber is installed here

pub mod constants;
pub mod content_types;
pub mod core_props;
pub mod error;
pub mod media_type;
pub mod package;
pub mod packuri;
pub mod part;
pub mod phys_pkg;
pub mod pkgreader;
pub mod pkgwriter;
pub mod rel;

// Re-export commonly used types
pub use content_types::{ContentTypeEntry, ContentTypes};
pub use core_props::CoreProperties;
pub use error::{ErrorKind, OpcError, Result};
pub use media_type::MediaType;
pub use package::Package;
pub use packuri::PackURI;
pub use part::Part;
pub use pkgreader::PackageReader;
pub use pkgwriter::{CompressionOption, PackageWriter, PartWriter, WriterOptions, WriterState};
pub use rel::{
    IdSource, IdSourceKind, RandomIds, RelSource, Relationship, RelationshipStore, Relationships,
    SequentialIds, SerializedRelationship, TargetMode,
};
