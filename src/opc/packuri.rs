//! Provides the PackURI value type and utilities for working with part names.
//!
//! A PackURI is a part name within an OPC package: an absolute path made of
//! non-empty, percent-encoded segments (ISO/IEC 29500-2 §9.1.1). Raw strings
//! become part names through [`PackURI::normalize`], which canonicalizes them,
//! or through [`PackURI::new`], which accepts only names that are already
//! legal.

use crate::opc::constants::PACKAGE_RELS_URI;
use crate::opc::error::{OpcError, Result};

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Represents a part name within an OPC package.
///
/// PackURIs always begin with a forward slash and use forward slashes as path separators.
/// Equality is byte-wise; the package compares names case-insensitively through
/// [`PackURI::key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackURI {
    /// The full pack URI string (e.g., "/word/document.xml")
    uri: String,
}

impl PackURI {
    /// Create a PackURI from a string that must already be a legal part name.
    ///
    /// # Errors
    /// Returns [`OpcError::InvalidPackUri`] if [`PackURI::validate`] rejects the name.
    pub fn new<S: Into<String>>(uri: S) -> Result<Self> {
        let uri = uri.into();
        Self::validate(&uri)?;
        Ok(PackURI { uri })
    }

    /// Canonicalize an arbitrary URI reference into a part name.
    ///
    /// - backslashes become forward slashes and repeated slashes collapse
    /// - a `#fragment` is dropped
    /// - `.` and `..` segments are removed literally; `/a/../b` becomes `/a/b`
    /// - percent-escapes are decoded and re-encoded canonically: unreserved
    ///   characters appear literally, everything else as uppercase `%HH`
    /// - a single leading slash is ensured and trailing slashes are dropped
    ///
    /// Normalizing twice yields the same name as normalizing once.
    ///
    /// # Errors
    /// Empty input, input with no segment left (such as `/`), an absolute URI
    /// with a scheme, and malformed percent-escapes are rejected.
    pub fn normalize(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(OpcError::InvalidPackUri(
                "part name cannot be empty".to_string(),
            ));
        }

        let slashed = raw.replace('\\', "/");
        let reference = match slashed.find('#') {
            Some(pos) => &slashed[..pos],
            None => slashed.as_str(),
        };

        if has_scheme(reference) {
            return Err(OpcError::InvalidPackUri(format!(
                "part name '{}' must be a relative reference, not an absolute URI",
                raw
            )));
        }

        let mut uri = String::with_capacity(reference.len() + 1);
        for segment in reference.split('/').filter(|s| !s.is_empty()) {
            let canonical = canonicalize_segment(segment)
                .map_err(|reason| OpcError::InvalidPackUri(format!("'{}': {}", raw, reason)))?;
            if canonical == "." || canonical == ".." {
                continue;
            }
            uri.push('/');
            uri.push_str(&canonical);
        }

        if uri.is_empty() {
            return Err(OpcError::InvalidPackUri(format!(
                "part name '{}' has no segments",
                raw
            )));
        }

        Ok(PackURI { uri })
    }

    /// Check that `name` is a legal part name without modifying it.
    ///
    /// Rules (ISO/IEC 29500-2 M1.1–M1.9): non-blank, starts with `/`, no empty
    /// segment, no trailing slash, no segment ending with a dot (which also
    /// excludes `.` and `..`), only `pchar` characters unescaped, and no
    /// escape of an unreserved character, `/` or `\`.
    pub fn validate(name: &str) -> Result<()> {
        let invalid = |reason: &str| Err(OpcError::InvalidPackUri(format!("'{}': {}", name, reason)));

        if name.trim().is_empty() {
            return invalid("part name cannot be empty");
        }
        if !name.starts_with('/') {
            return invalid("part name must start with a forward slash");
        }
        if name.ends_with('/') {
            return invalid("part name cannot end with a forward slash");
        }

        for segment in name[1..].split('/') {
            if segment.is_empty() {
                return invalid("part name cannot contain empty segments");
            }
            if segment.ends_with('.') {
                return invalid("part name segments cannot end with a dot");
            }
            if let Err(reason) = check_segment_chars(segment) {
                return invalid(reason);
            }
        }

        Ok(())
    }

    /// Create a PackURI from a relative reference and a base URI.
    ///
    /// This translates a relative reference (like "../styles.xml") onto a base URI
    /// (like "/word") to produce an absolute PackURI (like "/styles.xml").
    /// Unlike [`PackURI::normalize`], `..` is resolved against the base.
    pub fn from_rel_ref(base_uri: &str, relative_ref: &str) -> Result<Self> {
        Self::new(resolve_reference(base_uri, relative_ref))
    }

    /// Get the base URI (directory portion) of this PackURI.
    ///
    /// For example, "/ppt/slides" for "/ppt/slides/slide1.xml".
    pub fn base_uri(&self) -> &str {
        match self.uri.rfind('/') {
            Some(0) | None => "/",
            Some(pos) => &self.uri[..pos],
        }
    }

    /// Get the filename portion of this PackURI.
    ///
    /// For example, "slide1.xml" for "/ppt/slides/slide1.xml".
    pub fn filename(&self) -> &str {
        match self.uri.rfind('/') {
            Some(pos) => &self.uri[pos + 1..],
            None => "",
        }
    }

    /// Get the extension portion of this PackURI.
    ///
    /// For example, "xml" for "/word/document.xml" (note: no leading period).
    pub fn ext(&self) -> &str {
        extension_of(&self.uri)
    }

    /// Get the membername (URI with leading slash stripped).
    ///
    /// This is the form used as the Zip file membername for the package item.
    pub fn membername(&self) -> &str {
        &self.uri[1..]
    }

    /// Get the PackURI of the .rels part corresponding to this PackURI.
    ///
    /// For example, "/word/_rels/document.xml.rels" for "/word/document.xml".
    pub fn rels_uri(&self) -> PackURI {
        let base_uri = self.base_uri();
        let uri = if base_uri == "/" {
            format!("/_rels/{}.rels", self.filename())
        } else {
            format!("{}/_rels/{}.rels", base_uri, self.filename())
        };
        PackURI { uri }
    }

    /// Whether this name designates a relationships part.
    #[inline]
    pub fn is_relationships_part(&self) -> bool {
        is_relationships_uri(&self.uri)
    }

    /// Case-insensitive identity of this part name.
    #[inline]
    pub fn key(&self) -> String {
        self.uri.to_ascii_uppercase()
    }

    /// Get the full URI string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// The package-level relationships part name, `/_rels/.rels`.
    pub(crate) fn package_rels() -> PackURI {
        PackURI {
            uri: PACKAGE_RELS_URI.to_string(),
        }
    }
}

impl std::fmt::Display for PackURI {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.uri)
    }
}

impl AsRef<str> for PackURI {
    fn as_ref(&self) -> &str {
        &self.uri
    }
}

/// Extension of the last segment of `name`, without the dot.
pub(crate) fn extension_of(name: &str) -> &str {
    let filename = match name.rfind('/') {
        Some(pos) => &name[pos + 1..],
        None => name,
    };
    match filename.rfind('.') {
        Some(pos) => &filename[pos + 1..],
        None => "",
    }
}

/// Returns true if `uri` points to a relationships part.
///
/// Matches `/_rels/.rels`, `_rels/.rels` and any `XXX/_rels/YYY.rels` where
/// YYY is non-empty, ignoring case.
pub fn is_relationships_uri(uri: &str) -> bool {
    let upper = uri.to_ascii_uppercase();
    if !upper.ends_with(".RELS") {
        return false;
    }
    if upper == "/_RELS/.RELS" || upper == "_RELS/.RELS" {
        return true;
    }

    let segments: Vec<&str> = upper.split('/').collect();
    let count = segments.len();
    count >= 3 && segments[count - 1].len() > ".RELS".len() && segments[count - 2] == "_RELS"
}

/// Resolve `reference` against `base_uri` the way a URI resolver would:
/// fragment and query are dropped, an absolute path replaces the base, and
/// `.`/`..` segments are resolved.
pub(crate) fn resolve_reference(base_uri: &str, reference: &str) -> String {
    let end = reference.find(['#', '?']).unwrap_or(reference.len());
    let reference = &reference[..end];
    if reference.starts_with('/') {
        normalize_path(reference)
    } else {
        normalize_path(&join_paths(base_uri, reference))
    }
}

/// Whether `reference` starts with an RFC 3986 scheme (`ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ) ":"`).
pub(crate) fn has_scheme(reference: &str) -> bool {
    let Some(colon) = reference.find(':') else {
        return false;
    };
    let scheme = &reference.as_bytes()[..colon];
    match scheme.split_first() {
        Some((first, rest)) => {
            first.is_ascii_alphabetic()
                && rest
                    .iter()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
        },
        None => false,
    }
}

/// Check that every `%` in `s` starts a two-digit hex escape.
pub(crate) fn check_escapes(s: &str) -> std::result::Result<(), &'static str> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            decode_escape(bytes, i)?;
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}

/// Helper function to join two paths using forward slashes
fn join_paths(base: &str, rel: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, rel)
    } else {
        format!("{}/{}", base, rel)
    }
}

/// Helper function to normalize a path (resolve ".." and ".")
fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {},
            ".." => {
                parts.pop();
            },
            _ => parts.push(part),
        }
    }

    let mut normalized = String::with_capacity(path.len());
    for part in parts {
        normalized.push('/');
        normalized.push_str(part);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

#[inline]
fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

/// Characters that may appear unescaped in a part name segment (RFC 3986 `pchar` minus escapes).
#[inline]
fn is_pchar(b: u8) -> bool {
    is_unreserved(b)
        || matches!(
            b,
            b'!' | b'$' | b'&' | b'\'' | b'(' | b')' | b'*' | b'+' | b',' | b';' | b'=' | b':' | b'@'
        )
}

/// Characters that normalization leaves unescaped.
#[inline]
fn is_canonical_literal(b: u8) -> bool {
    is_unreserved(b) || matches!(b, b'$' | b'&' | b'+' | b',' | b':' | b';' | b'=' | b'@')
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decode the escape starting at `bytes[i] == b'%'`.
fn decode_escape(bytes: &[u8], i: usize) -> std::result::Result<u8, &'static str> {
    let hi = bytes.get(i + 1).copied().and_then(hex_value);
    let lo = bytes.get(i + 2).copied().and_then(hex_value);
    match (hi, lo) {
        (Some(hi), Some(lo)) => Ok((hi << 4) | lo),
        _ => Err("invalid percent-encoding"),
    }
}

/// Decode every escape in `segment` and re-encode the bytes canonically.
fn canonicalize_segment(segment: &str) -> std::result::Result<String, &'static str> {
    let bytes = segment.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            decoded.push(decode_escape(bytes, i)?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }

    let mut canonical = String::with_capacity(decoded.len());
    for b in decoded {
        if is_canonical_literal(b) {
            canonical.push(b as char);
        } else {
            canonical.push('%');
            canonical.push(HEX_UPPER[(b >> 4) as usize] as char);
            canonical.push(HEX_UPPER[(b & 0x0f) as usize] as char);
        }
    }
    Ok(canonical)
}

fn check_segment_chars(segment: &str) -> std::result::Result<(), &'static str> {
    let bytes = segment.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' {
            let decoded = decode_escape(bytes, i)?;
            if is_unreserved(decoded) {
                return Err("unreserved characters shall not be percent-encoded");
            }
            if decoded == b'/' || decoded == b'\\' {
                return Err("percent-encoded slash or backslash is not allowed");
            }
            i += 3;
        } else if is_pchar(b) {
            i += 1;
        } else {
            return Err("character must be percent-encoded");
        }
    }
    Ok(())
}
