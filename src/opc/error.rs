//! Error types for OPC package operations

use thiserror::Error;

/// Broad classification of an [`OpcError`].
///
/// Every validation failure maps to exactly one class, which lets callers
/// react to a category (for instance "the name is already taken") without
/// matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed part name, media type, URI or XML.
    Format,
    /// Repeated part name, relationship ID or content-type entry.
    Duplicate,
    /// Two part names where one is a segment-boundary prefix of the other.
    Collision,
    /// Unresolved content type or missing part.
    NotFound,
    /// Relationship pointing at (or held by) a relationships part.
    Constraint,
    /// Pass-through failure of the underlying archive or stream.
    Io,
    /// Operation not allowed in the writer's current state.
    State,
}

#[derive(Error, Debug)]
pub enum OpcError {
    #[error("Invalid pack URI: {0}")]
    InvalidPackUri(String),

    #[error("Invalid media type '{media_type}': {reason}")]
    InvalidMediaType { media_type: String, reason: String },

    #[error("Invalid relationship target URI: {0}")]
    InvalidTargetUri(String),

    #[error("Invalid relationship: {0}")]
    InvalidRelationship(String),

    #[error("Duplicate part name: {0}")]
    DuplicatePart(String),

    #[error("Duplicate relationship ID '{id}' in relationships of {owner}")]
    DuplicateRelationshipId { owner: String, id: String },

    #[error("Duplicate content type entry: {0}")]
    DuplicateContentType(String),

    #[error("Part name {name} collides with existing part {existing}")]
    PartNameCollision { name: String, existing: String },

    #[error("Content type not found for partname: {0}")]
    ContentTypeNotFound(String),

    #[error("Part not found: {0}")]
    PartNotFound(String),

    #[error("Illegal relationship target: {0}")]
    IllegalRelationshipTarget(String),

    #[error("XML parsing error: {0}")]
    XmlError(String),

    #[error("ZIP error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Package writer is closed")]
    WriterClosed,

    #[error("Part {0} is not the part currently being written")]
    PartNotOpen(String),
}

impl OpcError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OpcError::InvalidPackUri(_)
            | OpcError::InvalidMediaType { .. }
            | OpcError::InvalidTargetUri(_)
            | OpcError::InvalidRelationship(_)
            | OpcError::XmlError(_) => ErrorKind::Format,
            OpcError::DuplicatePart(_)
            | OpcError::DuplicateRelationshipId { .. }
            | OpcError::DuplicateContentType(_) => ErrorKind::Duplicate,
            OpcError::PartNameCollision { .. } => ErrorKind::Collision,
            OpcError::ContentTypeNotFound(_) | OpcError::PartNotFound(_) => ErrorKind::NotFound,
            OpcError::IllegalRelationshipTarget(_) => ErrorKind::Constraint,
            OpcError::ZipError(_) | OpcError::IoError(_) => ErrorKind::Io,
            OpcError::WriterClosed | OpcError::PartNotOpen(_) => ErrorKind::State,
        }
    }

    pub(crate) fn xml<E: std::fmt::Display>(context: &str, err: E) -> Self {
        OpcError::XmlError(format!("{}: {}", context, err))
    }
}

pub type Result<T> = std::result::Result<T, OpcError>;
