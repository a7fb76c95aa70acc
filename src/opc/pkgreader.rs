//! Low-level, read-only API to a serialized Open Packaging Convention (OPC) package.
//!
//! [`PackageReader`] rebuilds a [`Package`] from a ZIP archive: the content
//! type table, one part per archive member, the relationships of the package
//! and of every part, and the core properties. Part bytes stay in the archive
//! until [`PackageReader::read_part`] asks for them.

use crate::opc::constants::{CONTENT_TYPES_URI, relationship_type};
use crate::opc::content_types::ContentTypes;
use crate::opc::core_props::CoreProperties;
use crate::opc::error::{OpcError, Result};
use crate::opc::package::Package;
use crate::opc::packuri::PackURI;
use crate::opc::part::Part;
use crate::opc::phys_pkg::PhysPkgReader;
use crate::opc::rel::{RelSource, parse_relationships};
use std::io::{Read, Seek};
use tracing::{debug, warn};

/// Read access to a serialized package.
pub struct PackageReader<R> {
    phys: PhysPkgReader<R>,
    package: Package,
}

impl<R: Read + Seek> PackageReader<R> {
    /// Open and index a package.
    ///
    /// Members whose names are not legal part names, or that clash with a
    /// member registered before them, are skipped with a warning.
    ///
    /// # Arguments
    /// * `reader` - A seekable source of the ZIP archive
    ///
    /// # Returns
    /// A reader holding the indexed package; part bytes are read on demand
    ///
    /// # Errors
    /// - [`OpcError::PartNotFound`] if `[Content_Types].xml` is missing
    /// - [`OpcError::ContentTypeNotFound`] if a member's type does not resolve
    /// - any decode or validation error of the content types, relationships
    ///   or core properties
    pub fn new(reader: R) -> Result<Self> {
        let phys = PhysPkgReader::new(reader)?;
        let content_types = ContentTypes::from_xml(&phys.content_types_xml()?)?;
        let mut package = Package::with_content_types(content_types);

        Self::load_parts(&phys, &mut package)?;
        Self::load_relationships(&phys, &mut package)?;
        Self::load_core_properties(&phys, &mut package)?;

        debug!(parts = package.len(), "package read");
        Ok(Self { phys, package })
    }

    fn load_parts(phys: &PhysPkgReader<R>, package: &mut Package) -> Result<()> {
        for membername in phys.member_names() {
            if membername.eq_ignore_ascii_case(&CONTENT_TYPES_URI[1..]) {
                continue;
            }

            let partname = match PackURI::new(format!("/{}", membername)) {
                Ok(partname) => partname,
                Err(e) => {
                    warn!(member = %membername, error = %e, "skipping archive member");
                    continue;
                },
            };
            let content_type = package
                .content_types()
                .find_type(partname.as_str())?
                .to_string();
            let part = Part::from_partname(partname, &content_type)?;

            match package.add_existing(part) {
                Ok(()) => {},
                Err(e @ (OpcError::DuplicatePart(_) | OpcError::PartNameCollision { .. })) => {
                    warn!(member = %membername, error = %e, "skipping archive member");
                },
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn load_relationships(phys: &PhysPkgReader<R>, package: &mut Package) -> Result<()> {
        let mut sources = vec![RelSource::Package];
        sources.extend(
            package
                .iter_parts()
                .filter(|part| !part.partname().is_relationships_part())
                .map(Part::as_source),
        );

        for source in sources {
            if let Some(xml) = phys.rels_xml_for(&source)? {
                let srels = parse_relationships(&xml)?;
                package.relationships_mut().attach(&source, srels)?;
            }
        }
        Ok(())
    }

    fn load_core_properties(phys: &PhysPkgReader<R>, package: &mut Package) -> Result<()> {
        let partname = package
            .package_relationships()
            .iter()
            .filter(|rel| rel.reltype() == relationship_type::CORE_PROPERTIES && !rel.is_external())
            .find_map(|rel| rel.target_partname().ok());
        let Some(partname) = partname.filter(|name| package.contains(name.as_str())) else {
            return Ok(());
        };

        let mut props = CoreProperties::from_xml(&phys.blob_for(&partname)?)?;
        props.part_name = Some(partname.to_string());
        package.set_core_properties(props);
        Ok(())
    }

    /// The package as read.
    #[inline]
    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Take the package, releasing the archive.
    pub fn into_package(self) -> Package {
        self.package
    }

    /// Read the bytes of a registered part, name compared ignoring case.
    pub fn read_part(&self, partname: &str) -> Result<Vec<u8>> {
        let part = self
            .package
            .get_part(partname)
            .ok_or_else(|| OpcError::PartNotFound(partname.to_string()))?;
        self.phys.blob_for(part.partname())
    }
}
