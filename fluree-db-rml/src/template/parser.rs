//! Template parsing
//!
//! A template is a string with `{expression}` slots. The backslash escapes
//! `{`, `}` and `\`; any other escaped character is rejected. A bare `}`
//! outside a slot is an ordinary character.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ESCAPE: char = '\\';
const OPEN: char = '{';
const CLOSE: char = '}';

/// Errors raised while parsing a template string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateParseError {
    /// Input ended inside an open `{...}` slot
    #[error("unclosed expression in template '{template}'")]
    UnclosedExpression { template: String },

    /// Escape character followed by something other than `{`, `}` or `\`
    #[error("invalid escape sequence '\\{found}' at offset {offset} in template '{template}'")]
    InvalidEscape {
        template: String,
        found: String,
        offset: usize,
    },

    /// `{` encountered while already inside a slot
    #[error("unescaped '{{' inside expression at offset {offset} in template '{template}'")]
    NestedExpression { template: String, offset: usize },
}

/// Identity of an expression slot within its template
///
/// Two slots with identical expression text are still distinct slots and
/// are evaluated independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub usize);

/// An `{expression}` slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpressionSlot {
    /// Slot identity, strictly increasing in template order
    pub id: SlotId,
    /// Raw reference expression text (escapes already resolved)
    pub expression: String,
}

/// One template segment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Literal text
    Text(String),
    /// Reference expression slot
    Expression(ExpressionSlot),
}

/// A parsed template
///
/// Built once from a mapping rule string and shared read-only across
/// records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template string
    pub fn parse(text: &str) -> Result<Self, TemplateParseError> {
        let mut segments = Vec::new();
        let mut buf = String::new();
        // Text preceding an open slot; kept until the slot proves non-empty
        let mut pending_text = String::new();
        let mut in_expression = false;
        let mut next_id = 0usize;
        let mut chars = text.char_indices();

        while let Some((offset, c)) = chars.next() {
            match c {
                ESCAPE => match chars.next() {
                    Some((_, escaped @ (OPEN | CLOSE | ESCAPE))) => buf.push(escaped),
                    Some((_, other)) => {
                        return Err(TemplateParseError::InvalidEscape {
                            template: text.to_string(),
                            found: other.to_string(),
                            offset,
                        })
                    }
                    None => {
                        return Err(TemplateParseError::InvalidEscape {
                            template: text.to_string(),
                            found: String::new(),
                            offset,
                        })
                    }
                },
                OPEN if in_expression => {
                    return Err(TemplateParseError::NestedExpression {
                        template: text.to_string(),
                        offset,
                    })
                }
                OPEN => {
                    pending_text = std::mem::take(&mut buf);
                    in_expression = true;
                }
                CLOSE if in_expression => {
                    if buf.is_empty() {
                        buf = std::mem::take(&mut pending_text);
                    } else {
                        if !pending_text.is_empty() {
                            segments.push(Segment::Text(std::mem::take(&mut pending_text)));
                        }
                        segments.push(Segment::Expression(ExpressionSlot {
                            id: SlotId(next_id),
                            expression: std::mem::take(&mut buf),
                        }));
                        next_id += 1;
                    }
                    in_expression = false;
                }
                other => buf.push(other),
            }
        }

        if in_expression {
            return Err(TemplateParseError::UnclosedExpression {
                template: text.to_string(),
            });
        }
        if !buf.is_empty() {
            segments.push(Segment::Text(buf));
        }

        Ok(Self { segments })
    }

    /// All segments in template order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Expression slots in template order
    pub fn slots(&self) -> impl Iterator<Item = &ExpressionSlot> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Expression(slot) => Some(slot),
            Segment::Text(_) => None,
        })
    }

    /// Reference expressions in template order (duplicates preserved)
    pub fn expressions(&self) -> Vec<&str> {
        self.slots().map(|s| s.expression.as_str()).collect()
    }

    /// True if the template has no expression slots
    pub fn is_constant(&self) -> bool {
        self.slots().next().is_none()
    }

    /// Render back into template syntax, escaping as needed
    pub fn to_template_string(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => escape_into(text, &mut out),
                Segment::Expression(slot) => {
                    out.push(OPEN);
                    escape_into(&slot.expression, &mut out);
                    out.push(CLOSE);
                }
            }
        }
        out
    }
}

fn escape_into(value: &str, out: &mut String) {
    for c in value.chars() {
        if matches!(c, OPEN | CLOSE | ESCAPE) {
            out.push(ESCAPE);
        }
        out.push(c);
    }
}

impl FromStr for Template {
    type Err = TemplateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Template::parse(s)
    }
}

impl TryFrom<String> for Template {
    type Error = TemplateParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Template::parse(&value)
    }
}

impl From<Template> for String {
    fn from(template: Template) -> Self {
        template.to_template_string()
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_template_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Segment {
        Segment::Text(s.to_string())
    }

    fn slot(id: usize, expr: &str) -> Segment {
        Segment::Expression(ExpressionSlot {
            id: SlotId(id),
            expression: expr.to_string(),
        })
    }

    #[test]
    fn test_parse_simple() {
        let t = Template::parse("http://example.org/{id}").unwrap();
        assert_eq!(t.segments(), &[text("http://example.org/"), slot(0, "id")]);
        assert!(!t.is_constant());
    }

    #[test]
    fn test_parse_escaped_braces() {
        let t = Template::parse("a\\{b\\}c").unwrap();
        assert_eq!(t.segments(), &[text("a{b}c")]);
        assert!(t.is_constant());
    }

    #[test]
    fn test_parse_escaped_backslash_in_expression() {
        let t = Template::parse("{a\\\\b}").unwrap();
        assert_eq!(t.expressions(), vec!["a\\b"]);
    }

    #[test]
    fn test_bare_close_in_text_is_literal() {
        let t = Template::parse("a}b{c}").unwrap();
        assert_eq!(t.segments(), &[text("a}b"), slot(0, "c")]);
    }

    #[test]
    fn test_unclosed_expression() {
        let err = Template::parse("abc{def").unwrap_err();
        assert!(matches!(err, TemplateParseError::UnclosedExpression { .. }));
    }

    #[test]
    fn test_nested_expression() {
        let err = Template::parse("{a{b}").unwrap_err();
        assert_eq!(
            err,
            TemplateParseError::NestedExpression {
                template: "{a{b}".to_string(),
                offset: 2,
            }
        );
    }

    #[test]
    fn test_invalid_escape() {
        let err = Template::parse("a\\nb").unwrap_err();
        assert!(matches!(err, TemplateParseError::InvalidEscape { ref found, offset: 1, .. } if found == "n"));

        let err = Template::parse("dangling\\").unwrap_err();
        assert!(matches!(err, TemplateParseError::InvalidEscape { .. }));
    }

    #[test]
    fn test_empty_segments_dropped() {
        let t = Template::parse("{}x{}").unwrap();
        assert_eq!(t.segments(), &[text("x")]);

        // Text around an empty slot stays one segment
        let t = Template::parse("a{}b").unwrap();
        assert_eq!(t.segments(), &[text("ab")]);

        let t = Template::parse("").unwrap();
        assert!(t.segments().is_empty());
    }

    #[test]
    fn test_slot_ids_increase() {
        let t = Template::parse("{a}-{a}-{b}").unwrap();
        let ids: Vec<_> = t.slots().map(|s| s.id.0).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(t.expressions(), vec!["a", "a", "b"]);
    }

    #[test]
    fn test_round_trip() {
        for source in [
            "http://example.org/{id}",
            "a\\{b\\}c",
            "{first}{last}",
            "x}y{a\\}b}z",
            "back\\\\slash/{p\\{q}",
            "plain text",
            "a{}b",
            "{x}a{}b{y}",
        ] {
            let parsed = Template::parse(source).unwrap();
            let reparsed = Template::parse(&parsed.to_template_string()).unwrap();
            assert_eq!(parsed, reparsed, "round trip of {source}");
        }
    }

    #[test]
    fn test_serde_as_string() {
        let t: Template = serde_json::from_str("\"http://ex.org/{id}\"").unwrap();
        assert_eq!(t.expressions(), vec!["id"]);
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"http://ex.org/{id}\"");

        assert!(serde_json::from_str::<Template>("\"{open\"").is_err());
    }
}
