//! Term materialization module
//!
//! This module turns term maps into RDF terms for individual records:
//!
//! - [`TermGenerator`]: a term map compiled for one role, applied per record
//! - [`RdfTerm`], [`MappedValue`], [`MappedQuad`]: generated output
//! - IRI-safety percent-encoding, base IRI resolution and blank node
//!   identifiers

mod generator;
mod iri;
mod term;

pub use generator::{effective_term_type, GeneratorContext, TermGenerator};
pub use iri::{iri_safe, is_absolute_iri, is_valid_iri, resolve_iri};
pub use term::{blank_node_id, MappedQuad, MappedValue, RdfTerm};
