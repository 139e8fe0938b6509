//! RML mapping structures
//!
//! This module provides the rule-graph representation of RML mappings:
//! TriplesMap definitions and their term maps, plus the compiled arena
//! used by term generation and the mapping pipeline.

mod compiled;
mod ref_object_map;
mod term_map;
mod triples_map;

pub use compiled::{CompiledRmlMapping, TriplesMapId};
pub use ref_object_map::{JoinCondition, RefObjectMap};
pub use term_map::{ConstantValue, TermMap, TermMapRole, TermType};
pub use triples_map::{LogicalSource, ObjectMap, PredicateObjectMap, SubjectMap, TriplesMap};
