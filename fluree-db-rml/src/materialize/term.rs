//! Materialized RDF terms and mapped values

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

/// Materialized RDF term
///
/// Represents an RDF term generated from a source record according to a
/// term map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RdfTerm {
    /// An IRI
    Iri(String),
    /// A blank node with local identifier
    BlankNode(String),
    /// A literal with either a datatype or a language tag
    Literal {
        value: String,
        datatype: Option<String>,
        language: Option<String>,
    },
}

impl RdfTerm {
    /// Create an IRI term
    pub fn iri(iri: impl Into<String>) -> Self {
        RdfTerm::Iri(iri.into())
    }

    /// Create a blank node term
    pub fn blank_node(id: impl Into<String>) -> Self {
        RdfTerm::BlankNode(id.into())
    }

    /// Create a plain string literal
    pub fn string(value: impl Into<String>) -> Self {
        RdfTerm::Literal {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    /// Create a typed literal
    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        RdfTerm::Literal {
            value: value.into(),
            datatype: Some(datatype.into()),
            language: None,
        }
    }

    /// Create a language-tagged string
    pub fn lang_string(value: impl Into<String>, lang: impl Into<String>) -> Self {
        RdfTerm::Literal {
            value: value.into(),
            datatype: None,
            language: Some(lang.into()),
        }
    }

    /// Check if this is an IRI
    pub fn is_iri(&self) -> bool {
        matches!(self, RdfTerm::Iri(_))
    }

    /// Check if this is a blank node
    pub fn is_blank_node(&self) -> bool {
        matches!(self, RdfTerm::BlankNode(_))
    }

    /// Check if this is a literal
    pub fn is_literal(&self) -> bool {
        matches!(self, RdfTerm::Literal { .. })
    }

    /// Get as IRI string if this is an IRI
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            RdfTerm::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// Lexical value of the term (IRI text, blank node label, literal value)
    pub fn lexical(&self) -> &str {
        match self {
            RdfTerm::Iri(s) | RdfTerm::BlankNode(s) => s,
            RdfTerm::Literal { value, .. } => value,
        }
    }
}

/// N-Triples style rendering
impl fmt::Display for RdfTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RdfTerm::Iri(iri) => write!(f, "<{iri}>"),
            RdfTerm::BlankNode(id) => write!(f, "_:{id}"),
            RdfTerm::Literal {
                value,
                datatype,
                language,
            } => {
                f.write_str("\"")?;
                for c in value.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\r' => f.write_str("\\r")?,
                        c => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")?;
                match (language, datatype) {
                    (Some(lang), _) => write!(f, "@{lang}"),
                    (None, Some(dt)) => write!(f, "^^<{dt}>"),
                    (None, None) => Ok(()),
                }
            }
        }
    }
}

/// Blank node identifier for a lexical form
///
/// `"bnode"` followed by `-` and the lexical form restricted to
/// `[A-Za-z0-9_-]`; the suffix is omitted when nothing survives. Equal
/// lexical forms collapse to the same blank node within a run.
pub fn blank_node_id(lexical: &str) -> String {
    static DISALLOWED: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]").expect("valid regex"));

    let cleaned = DISALLOWED.replace_all(lexical, "");
    if cleaned.is_empty() {
        "bnode".to_string()
    } else {
        format!("bnode-{cleaned}")
    }
}

/// A generated term with its destination targets
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappedValue {
    pub term: RdfTerm,
    pub targets: Arc<BTreeSet<String>>,
}

impl MappedValue {
    pub fn new(term: RdfTerm, targets: Arc<BTreeSet<String>>) -> Self {
        Self { term, targets }
    }

    /// A value with no explicit targets
    pub fn untargeted(term: RdfTerm) -> Self {
        Self::new(term, Arc::new(BTreeSet::new()))
    }
}

impl fmt::Display for MappedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.term.fmt(f)
    }
}

/// A completed quad produced by the mapping pipeline
///
/// `graph` is `None` for the default graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappedQuad {
    pub subject: MappedValue,
    pub predicate: MappedValue,
    pub object: MappedValue,
    pub graph: Option<MappedValue>,
}

impl MappedQuad {
    /// Union of the targets of every position
    pub fn targets(&self) -> BTreeSet<String> {
        let mut targets = BTreeSet::new();
        for value in [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .chain(self.graph.as_ref())
        {
            targets.extend(value.targets.iter().cloned());
        }
        targets
    }
}

impl fmt::Display for MappedQuad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if let Some(graph) = &self.graph {
            write!(f, " {graph}")?;
        }
        f.write_str(" .")
    }
}
