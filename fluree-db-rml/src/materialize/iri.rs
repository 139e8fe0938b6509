//! IRI construction rules

use unicode_normalization::UnicodeNormalization;

use crate::error::{RmlError, RmlResult};

/// RFC 3987 `ucschar` ranges
const UCSCHAR: &[(u32, u32)] = &[
    (0xA0, 0xD7FF),
    (0xF900, 0xFDCF),
    (0xFDF0, 0xFFEF),
    (0x10000, 0x1FFFD),
    (0x20000, 0x2FFFD),
    (0x30000, 0x3FFFD),
    (0x40000, 0x4FFFD),
    (0x50000, 0x5FFFD),
    (0x60000, 0x6FFFD),
    (0x70000, 0x7FFFD),
    (0x80000, 0x8FFFD),
    (0x90000, 0x9FFFD),
    (0xA0000, 0xAFFFD),
    (0xB0000, 0xBFFFD),
    (0xC0000, 0xCFFFD),
    (0xD0000, 0xDFFFD),
    (0xE1000, 0xEFFFD),
];

fn is_ucschar(c: char) -> bool {
    let cp = c as u32;
    UCSCHAR.iter().any(|(lo, hi)| (*lo..=*hi).contains(&cp))
}

fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}

/// Percent-encode a value for substitution into an IRI template
///
/// The value is NFC-normalized first. Unreserved ASCII characters and
/// `ucschar` code points are kept; everything else is encoded byte by byte
/// as `%XX` with uppercase hex digits.
pub fn iri_safe(value: &str) -> String {
    let mut result = String::with_capacity(value.len());

    for c in value.nfc() {
        if is_unreserved(c) || is_ucschar(c) {
            result.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }

    result
}

/// Returns true if the IRI has an RFC 3986 scheme
pub fn is_absolute_iri(iri: &str) -> bool {
    match iri.find(':') {
        Some(colon_pos) => {
            let scheme = &iri[..colon_pos];
            !scheme.is_empty()
                && scheme.as_bytes()[0].is_ascii_alphabetic()
                && scheme
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'-' || b == b'.')
        }
        None => false,
    }
}

/// Absolute and free of characters IRIs cannot contain
pub fn is_valid_iri(iri: &str) -> bool {
    is_absolute_iri(iri)
        && !iri.chars().any(|c| {
            c.is_control()
                || matches!(c, ' ' | '<' | '>' | '"' | '{' | '}' | '|' | '\\' | '^' | '`')
        })
}

/// Turn a lexical form into a valid absolute IRI
///
/// Values that are already valid are used as-is; anything else is
/// prefixed with the base IRI and validated again.
pub fn resolve_iri(lexical: &str, base: Option<&str>) -> RmlResult<String> {
    if is_valid_iri(lexical) {
        return Ok(lexical.to_string());
    }
    if let Some(base) = base {
        let candidate = format!("{base}{lexical}");
        if is_valid_iri(&candidate) {
            return Ok(candidate);
        }
    }
    Err(RmlError::InvalidIri {
        lexical: lexical.to_string(),
        base: base.unwrap_or("<none>").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iri_safe() {
        assert_eq!(iri_safe("a b"), "a%20b");
        assert_eq!(iri_safe("~test"), "~test");
        assert_eq!(iri_safe("(test)"), "%28test%29");
        assert_eq!(iri_safe("a/b:c"), "a%2Fb%3Ac");
        assert_eq!(iri_safe("Zürich"), "Zürich");
        // U+0001 is outside ucschar
        assert_eq!(iri_safe("\u{1}"), "%01");
    }

    #[test]
    fn test_iri_safe_normalizes_nfc() {
        // "e" + combining acute accent composes to U+00E9
        assert_eq!(iri_safe("e\u{301}"), "\u{e9}");
    }

    #[test]
    fn test_is_absolute_iri() {
        assert!(is_absolute_iri("http://example.org"));
        assert!(is_absolute_iri("urn:isbn:0451450523"));
        assert!(is_absolute_iri("mailto:user@example.com"));
        assert!(!is_absolute_iri("localName"));
        assert!(!is_absolute_iri("1abc:def"));
        assert!(!is_absolute_iri(":abc"));
    }

    #[test]
    fn test_resolve_iri() {
        assert_eq!(
            resolve_iri("http://ex.org/a", None).unwrap(),
            "http://ex.org/a"
        );
        assert_eq!(
            resolve_iri("person/1", Some("http://ex.org/")).unwrap(),
            "http://ex.org/person/1"
        );

        let err = resolve_iri("person/1", None).unwrap_err();
        assert!(err.to_string().contains("person/1"));
        assert!(err.to_string().contains("<none>"));

        let err = resolve_iri("a b", Some("http://ex.org/")).unwrap_err();
        match err {
            RmlError::InvalidIri { lexical, base } => {
                assert_eq!(lexical, "a b");
                assert_eq!(base, "http://ex.org/");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
