//! RML term map structures
//!
//! Term maps define how RDF terms are generated from source records. Subject,
//! predicate, object and graph maps share one definition; the role a term
//! map plays is supplied where it is used and carries the allowed term types.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::template::Template;
use crate::vocab::RML;

/// RML term type
///
/// Specifies whether a term map generates IRIs, blank nodes, or literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TermType {
    /// Generate an IRI (default for subject and predicate maps)
    #[default]
    Iri,
    /// Generate a blank node
    BlankNode,
    /// Generate a literal
    Literal,
}

impl TermType {
    /// Parse term type from an RML or R2RML IRI
    pub fn from_iri(iri: &str) -> Option<Self> {
        match iri {
            RML::IRI | RML::R2RML_IRI => Some(TermType::Iri),
            RML::BLANK_NODE | RML::R2RML_BLANK_NODE => Some(TermType::BlankNode),
            RML::LITERAL | RML::R2RML_LITERAL => Some(TermType::Literal),
            _ => None,
        }
    }

    /// Check if this term type produces IRIs
    pub fn is_iri(&self) -> bool {
        matches!(self, TermType::Iri)
    }

    /// Check if this term type produces blank nodes
    pub fn is_blank_node(&self) -> bool {
        matches!(self, TermType::BlankNode)
    }

    /// Check if this term type produces literals
    pub fn is_literal(&self) -> bool {
        matches!(self, TermType::Literal)
    }
}

/// Position a term map fills in a generated quad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermMapRole {
    Subject,
    Predicate,
    Object,
    Graph,
}

impl TermMapRole {
    /// Term types a map in this role may produce
    pub fn allowed_term_types(&self) -> &'static [TermType] {
        match self {
            TermMapRole::Subject => &[TermType::Iri, TermType::BlankNode],
            TermMapRole::Predicate | TermMapRole::Graph => &[TermType::Iri],
            TermMapRole::Object => &[TermType::Iri, TermType::BlankNode, TermType::Literal],
        }
    }

    /// Check whether `term_type` is allowed for this role
    pub fn allows(&self, term_type: TermType) -> bool {
        self.allowed_term_types().contains(&term_type)
    }
}

impl fmt::Display for TermMapRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TermMapRole::Subject => "subject",
            TermMapRole::Predicate => "predicate",
            TermMapRole::Object => "object",
            TermMapRole::Graph => "graph",
        };
        f.write_str(name)
    }
}

/// Constant value of a term map
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstantValue {
    /// Constant IRI
    Iri(String),
    /// Constant blank node label
    BlankNode(String),
    /// Constant literal with optional datatype or language
    Literal {
        value: String,
        datatype: Option<String>,
        language: Option<String>,
    },
}

impl ConstantValue {
    /// Term type this constant produces
    pub fn term_type(&self) -> TermType {
        match self {
            ConstantValue::Iri(_) => TermType::Iri,
            ConstantValue::BlankNode(_) => TermType::BlankNode,
            ConstantValue::Literal { .. } => TermType::Literal,
        }
    }

    /// Short name of the value kind, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            ConstantValue::Iri(_) => "IRI",
            ConstantValue::BlankNode(_) => "blank node",
            ConstantValue::Literal { .. } => "literal",
        }
    }
}

/// A term map definition
///
/// Exactly one of `constant`, `reference`, `template` and `function_value`
/// must be set. This is checked when the term map is compiled into a
/// generator, not when the definition is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TermMap {
    /// `rml:constant`
    pub constant: Option<ConstantValue>,
    /// `rml:reference` - source-specific reference expression
    pub reference: Option<String>,
    /// `rml:template` - template string with `{expression}` slots
    pub template: Option<String>,
    /// `rml:functionValue` - IRI of the nested function TriplesMap
    pub function_value: Option<String>,
    /// `rml:termType` - explicit term type
    pub term_type: Option<TermType>,
    /// `rml:language` - language tag for generated literals
    pub language: Option<String>,
    /// `rml:datatype` - datatype IRI for generated literals
    pub datatype: Option<String>,
    /// `rml:logicalTarget` - destinations for generated terms
    pub targets: BTreeSet<String>,
}

impl TermMap {
    /// Create a constant term map
    pub fn constant(value: ConstantValue) -> Self {
        Self {
            constant: Some(value),
            ..Default::default()
        }
    }

    /// Create a constant IRI term map
    pub fn constant_iri(iri: impl Into<String>) -> Self {
        Self::constant(ConstantValue::Iri(iri.into()))
    }

    /// Create a constant plain literal term map
    pub fn constant_literal(value: impl Into<String>) -> Self {
        Self::constant(ConstantValue::Literal {
            value: value.into(),
            datatype: None,
            language: None,
        })
    }

    /// Create a reference term map
    pub fn reference(expression: impl Into<String>) -> Self {
        Self {
            reference: Some(expression.into()),
            ..Default::default()
        }
    }

    /// Create a template term map
    pub fn template(template: impl Into<String>) -> Self {
        Self {
            template: Some(template.into()),
            ..Default::default()
        }
    }

    /// Create a function-valued term map
    pub fn function_value(triples_map_iri: impl Into<String>) -> Self {
        Self {
            function_value: Some(triples_map_iri.into()),
            ..Default::default()
        }
    }

    /// Set an explicit term type
    pub fn with_term_type(mut self, term_type: TermType) -> Self {
        self.term_type = Some(term_type);
        self
    }

    /// Set a language tag
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Set a datatype IRI
    pub fn with_datatype(mut self, datatype: impl Into<String>) -> Self {
        self.datatype = Some(datatype.into());
        self
    }

    /// Add a logical target
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.targets.insert(target.into());
        self
    }

    /// Number of generation strategies declared
    pub fn strategy_count(&self) -> usize {
        [
            self.constant.is_some(),
            self.reference.is_some(),
            self.template.is_some(),
            self.function_value.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }

    /// Check if this term map generates a constant value
    pub fn is_constant(&self) -> bool {
        self.constant.is_some()
    }

    /// Get the constant IRI if this is a constant IRI term map
    pub fn as_constant_iri(&self) -> Option<&str> {
        match &self.constant {
            Some(ConstantValue::Iri(iri)) => Some(iri),
            _ => None,
        }
    }

    /// Reference expressions read directly by this term map
    ///
    /// Expressions used by a nested function map are not included.
    pub fn referenced_expressions(&self) -> Vec<String> {
        if let Some(reference) = &self.reference {
            return vec![reference.clone()];
        }
        if let Some(template) = &self.template {
            return Template::parse(template)
                .map(|t| t.expressions().into_iter().map(str::to_string).collect())
                .unwrap_or_default();
        }
        vec![]
    }
}
