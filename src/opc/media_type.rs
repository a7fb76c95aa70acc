//! Media type (MIME type) parsing and canonical formatting.
//!
//! Content types in an OPC package are RFC 2616 media types:
//! `type "/" subtype *( ";" parameter )`. The package canonicalizes every
//! content type it registers so that equal types compare equal as strings.

use crate::opc::error::{OpcError, Result};
use smallvec::SmallVec;
use std::fmt;

/// A parsed media type with lowercased type, subtype and parameter names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    type_: String,
    subtype: String,
    /// Parameters sorted by name
    params: SmallVec<[(String, String); 2]>,
}

impl MediaType {
    /// Parse a media type string.
    ///
    /// # Errors
    /// Returns [`OpcError::InvalidMediaType`] for a missing slash or subtype,
    /// whitespace between the type token and the slash, content after the
    /// subtype, a parameter without a name or value, text between
    /// parameters that is not separated by `;`, or a repeated parameter name.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = |reason: &str| OpcError::InvalidMediaType {
            media_type: value.to_string(),
            reason: reason.to_string(),
        };

        let (base, _) = value.split_once(';').unwrap_or((value, ""));
        let base = base.trim().to_ascii_lowercase();

        let (type_, rest) = consume_token(&base);
        if type_.is_empty() {
            return Err(invalid("no media type"));
        }
        let Some(rest) = rest.strip_prefix('/') else {
            return Err(invalid("expected slash after first token"));
        };
        let (subtype, rest) = consume_token(rest);
        if subtype.is_empty() {
            return Err(invalid("expected token after slash"));
        }
        if !rest.is_empty() {
            return Err(invalid("unexpected content after media subtype"));
        }

        let mut params: SmallVec<[(String, String); 2]> = SmallVec::new();
        let mut rest = &value[value.find(';').unwrap_or(value.len())..];
        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }
            match consume_param(rest) {
                Some((name, param_value, remaining)) => {
                    if params.iter().any(|(existing, _)| *existing == name) {
                        return Err(invalid("duplicate parameter name"));
                    }
                    params.push((name, param_value));
                    rest = remaining;
                },
                // Trailing semicolons are tolerated
                None if rest.trim() == ";" => break,
                None => return Err(invalid("invalid media parameter")),
            }
        }
        params.sort();

        Ok(Self {
            type_: type_.to_string(),
            subtype: subtype.to_string(),
            params,
        })
    }

    /// Parse and re-format `value` into its canonical string form.
    pub fn canonicalize(value: &str) -> Result<String> {
        Ok(Self::parse(value)?.to_string())
    }

    #[inline]
    pub fn type_(&self) -> &str {
        &self.type_
    }

    #[inline]
    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// Look up a parameter by (lowercase) name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)?;
        for (name, value) in &self.params {
            write!(f, "; {}=", name)?;
            if !value.is_empty() && value.bytes().all(is_token_char) {
                f.write_str(value)?;
            } else {
                f.write_str("\"")?;
                for c in value.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                f.write_str("\"")?;
            }
        }
        Ok(())
    }
}

#[inline]
fn is_token_char(b: u8) -> bool {
    b > 0x20
        && b < 0x7f
        && !matches!(
            b,
            b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':' | b'\\' | b'"' | b'/' | b'[' | b']' | b'?' | b'='
        )
}

/// Split `s` into its leading token and the remainder.
fn consume_token(s: &str) -> (&str, &str) {
    let end = s.bytes().position(|b| !is_token_char(b)).unwrap_or(s.len());
    s.split_at(end)
}

/// Split `s` into a token or quoted-string value and the remainder.
fn consume_value(s: &str) -> Option<(String, &str)> {
    let Some(quoted) = s.strip_prefix('"') else {
        let (token, rest) = consume_token(s);
        return (!token.is_empty()).then(|| (token.to_string(), rest));
    };

    let mut value = String::new();
    let mut chars = quoted.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((value, &quoted[i + 1..])),
            '\\' => {
                let (_, escaped) = chars.next()?;
                value.push(escaped);
            },
            '\r' | '\n' => return None,
            _ => value.push(c),
        }
    }
    None
}

/// Consume `; name=value` from the start of `s`.
fn consume_param(s: &str) -> Option<(String, String, &str)> {
    let rest = s.trim_start().strip_prefix(';')?.trim_start();
    let (name, rest) = consume_token(rest);
    if name.is_empty() {
        return None;
    }
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let (value, rest) = consume_value(rest)?;
    Some((name.to_ascii_lowercase(), value, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let mt = MediaType::parse("Application/XML").unwrap();
        assert_eq!(mt.type_(), "application");
        assert_eq!(mt.subtype(), "xml");
        assert_eq!(mt.to_string(), "application/xml");
    }

    #[test]
    fn test_parse_params_are_sorted_and_lowercased() {
        let mt = MediaType::parse("TEXT/html; Q=2;charset=ISO-8859-4").unwrap();
        assert_eq!(mt.param("charset"), Some("ISO-8859-4"));
        assert_eq!(mt.to_string(), "text/html; charset=ISO-8859-4; q=2");
    }

    #[test]
    fn test_quoted_values() {
        let mt = MediaType::parse(r#"text/plain; title="a \"b\" c""#).unwrap();
        assert_eq!(mt.param("title"), Some(r#"a "b" c"#));
        assert_eq!(mt.to_string(), r#"text/plain; title="a \"b\" c""#);
    }

    #[test]
    fn test_trailing_semicolon() {
        assert_eq!(MediaType::canonicalize("a/b;").unwrap(), "a/b");
        assert_eq!(MediaType::canonicalize("a/b; c=d;").unwrap(), "a/b; c=d");
    }

    #[test]
    fn test_rejects() {
        let invalid = [
            "TEXT/html; charset=ISO-8859-4 q=2",
            "TEXT/html; =ISO-8859-4",
            "TEXT/html; charset=ISO-8859-4; charset=ISO-8859-4",
            "TEXT /html; charset=ISO-8859-4;q=2",
            "application",
            "application/html/html",
            "/html",
            "application/",
            "",
            "a/b; c",
            "a/b; c=\"unterminated",
        ];
        for value in invalid {
            assert!(
                matches!(MediaType::parse(value), Err(OpcError::InvalidMediaType { .. })),
                "parse({:?}) should fail",
                value
            );
        }
    }

    #[test]
    fn test_canonical_form_is_stable() {
        let once = MediaType::canonicalize(" Text/Plain ;Charset=UTF-8").unwrap();
        assert_eq!(once, "text/plain; charset=UTF-8");
        assert_eq!(MediaType::canonicalize(&once).unwrap(), once);
    }
}
