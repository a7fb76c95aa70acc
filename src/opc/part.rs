//! Open Packaging Convention (OPC) objects related to package parts.
//!
//! A [`Part`] is the registry's record of a named, typed byte stream. The
//! bytes themselves live in the archive; the writer streams them out and the
//! reader fetches them on demand.

use crate::opc::error::Result;
use crate::opc::media_type::MediaType;
use crate::opc::packuri::PackURI;
use crate::opc::rel::RelSource;

/// A part's name and content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    partname: PackURI,

    /// Canonical media type string
    content_type: String,
}

impl Part {
    /// Create a part record, validating both fields.
    ///
    /// The name must already be a legal part name (see [`PackURI::validate`]);
    /// the content type is parsed as a media type and stored in canonical form.
    pub fn new(partname: &str, content_type: &str) -> Result<Self> {
        let partname = PackURI::new(partname)?;
        let content_type = MediaType::canonicalize(content_type)?;
        Ok(Self {
            partname,
            content_type,
        })
    }

    /// Create a part record from an already validated name.
    pub fn from_partname(partname: PackURI, content_type: &str) -> Result<Self> {
        Ok(Self {
            partname,
            content_type: MediaType::canonicalize(content_type)?,
        })
    }

    /// Re-check this record's name and content type.
    pub fn validate(&self) -> Result<()> {
        PackURI::validate(self.partname.as_str())?;
        MediaType::parse(&self.content_type)?;
        Ok(())
    }

    #[inline]
    pub fn partname(&self) -> &PackURI {
        &self.partname
    }

    #[inline]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// The relationship source this part represents.
    pub fn as_source(&self) -> RelSource {
        RelSource::Part(self.partname.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::error::OpcError;

    #[test]
    fn test_new_canonicalizes_content_type() {
        let part = Part::new("/docs/a.xml", "Application/XML; Charset=UTF-8").unwrap();
        assert_eq!(part.partname().as_str(), "/docs/a.xml");
        assert_eq!(part.content_type(), "application/xml; charset=UTF-8");
        part.validate().unwrap();
    }

    #[test]
    fn test_new_rejects_bad_names() {
        for name in ["", "a.xml", "/docs/", "/docs//a.xml", "/docs/./a.xml", "/a.", "/a/%2F.xml"] {
            assert!(
                matches!(Part::new(name, "text/plain"), Err(OpcError::InvalidPackUri(_))),
                "name {:?}",
                name
            );
        }
    }

    #[test]
    fn test_new_rejects_bad_content_types() {
        for content_type in ["", "text", "text/", "TEXT /html", "a/b; c=d; c=e", "a/b; =x"] {
            assert!(
                matches!(
                    Part::new("/a.xml", content_type),
                    Err(OpcError::InvalidMediaType { .. })
                ),
                "content type {:?}",
                content_type
            );
        }
    }

    #[test]
    fn test_as_source() {
        let part = Part::new("/word/document.xml", "text/xml").unwrap();
        let source = part.as_source();
        assert_eq!(source.base_uri(), "/word");
        assert_eq!(source.rels_uri().as_str(), "/word/_rels/document.xml.rels");
    }
}
