//! RML error types

use thiserror::Error;

use crate::mapping::{TermMapRole, TermType};
use crate::template::TemplateParseError;

/// Coarse classification of an [`RmlError`]
///
/// Embedding pipelines use this to decide policy (abort, skip record, ...)
/// without matching on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Rule graph is invalid; detected before any record is read
    Construction,
    /// A template string could not be parsed
    TemplateParse,
    /// A template could not be applied to one record
    TemplateEvaluation,
    /// A record produced a value that cannot become a valid term
    Data,
    /// The logical source resolver or an expression evaluator failed
    Source,
    /// A registered function failed during invocation
    Function,
    /// The mapping run was cancelled
    Cancelled,
    /// Broken internal invariant
    Internal,
}

/// RML-specific errors
#[derive(Debug, Error)]
pub enum RmlError {
    /// Invalid template syntax
    #[error("Invalid template: {0}")]
    Template(#[from] TemplateParseError),

    /// A term map declares zero or several generation strategies
    #[error(
        "Term map {term_map} must declare exactly one of constant, reference, template or \
         functionValue (found {found})"
    )]
    StrategyCount { term_map: String, found: usize },

    /// Term type not permitted for the term map role
    #[error("Term type {term_type:?} is not allowed for {role} maps ({term_map})")]
    DisallowedTermType {
        term_map: String,
        role: TermMapRole,
        term_type: TermType,
    },

    /// Constant value kind not permitted for the term map role
    #[error("Constant {kind} value is not allowed for {role} maps ({term_map})")]
    DisallowedConstant {
        term_map: String,
        role: TermMapRole,
        kind: &'static str,
    },

    /// A FunctionValue refers to a function IRI with no registered implementation
    #[error("No function registered for {0}")]
    UnknownFunction(String),

    /// Reference to a non-existent TriplesMap
    #[error("Unknown TriplesMap: {0}")]
    UnknownTriplesMap(String),

    /// Missing required property in a mapping definition
    #[error("Missing required property: {0}")]
    MissingProperty(String),

    /// Invalid property value
    #[error("Invalid value for {property}: {message}")]
    InvalidValue { property: String, message: String },

    /// Every construction error found while validating a rule graph
    #[error("Mapping validation failed with {} error(s): {}", .0.len(), join_errors(.0))]
    Validation(Vec<RmlError>),

    /// Reference expressions of one template yielded lists of different lengths
    #[error(
        "Reference expressions do not yield an equal amount of values in template '{template}' \
         (counts: {counts:?})"
    )]
    TemplateEvaluation { template: String, counts: Vec<usize> },

    /// IRI could not be made absolute, even after prefixing with the base IRI
    #[error("Cannot generate a valid IRI from '{lexical}' with base IRI {base}")]
    InvalidIri { lexical: String, base: String },

    /// Expression evaluation against a record failed
    #[error("Failed to evaluate expression '{expression}': {message}")]
    Expression { expression: String, message: String },

    /// A registered function returned an error
    #[error("Function {function} failed: {message}")]
    Function { function: String, message: String },

    /// Logical source resolver failure
    #[error("Logical source error: {0}")]
    Source(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Join resolution invariant violated
    #[error("Join error: {0}")]
    Join(String),

    /// The run was cancelled before completion
    #[error("Mapping run cancelled")]
    Cancelled,

    /// A mapping task failed outside of term generation (panic, shutdown)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RmlError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RmlError::Template(_) => ErrorKind::TemplateParse,
            RmlError::StrategyCount { .. }
            | RmlError::DisallowedTermType { .. }
            | RmlError::DisallowedConstant { .. }
            | RmlError::UnknownFunction(_)
            | RmlError::UnknownTriplesMap(_)
            | RmlError::MissingProperty(_)
            | RmlError::InvalidValue { .. }
            | RmlError::Validation(_)
            | RmlError::Config(_) => ErrorKind::Construction,
            RmlError::TemplateEvaluation { .. } => ErrorKind::TemplateEvaluation,
            RmlError::InvalidIri { .. } => ErrorKind::Data,
            RmlError::Expression { .. } | RmlError::Source(_) => ErrorKind::Source,
            RmlError::Function { .. } => ErrorKind::Function,
            RmlError::Cancelled => ErrorKind::Cancelled,
            RmlError::Join(_) | RmlError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True for errors raised before any record is processed
    pub fn is_construction(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Construction | ErrorKind::TemplateParse
        )
    }

    /// Errors carried by a [`RmlError::Validation`], or this error alone
    pub fn errors(&self) -> Vec<&RmlError> {
        match self {
            RmlError::Validation(errors) => errors.iter().collect(),
            other => vec![other],
        }
    }
}

fn join_errors(errors: &[RmlError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for RML operations
pub type RmlResult<T> = Result<T, RmlError>;
