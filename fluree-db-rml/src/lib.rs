//! RML mapping engine for Fluree DB
//!
//! This crate turns heterogeneous records into RDF quads according to an
//! RML rule graph. A mapping is compiled once into term generators, then
//! executed as an asynchronous pipeline over the logical sources supplied
//! by a [`LogicalSourceResolver`].
//!
//! # Key Features
//!
//! - **Templates**: `{expression}` slots with `\` escapes; multi-valued
//!   slots are combined index by index
//! - **Term generation**: constant, reference, template and function-valued
//!   term maps, with IRI-safe encoding of template values
//! - **Joins**: RefObjectMaps with join conditions are resolved once the
//!   parent's record stream is exhausted
//! - **Async pipeline**: every TriplesMap is driven concurrently with
//!   bounded output buffering and cooperative cancellation
//!
//! # Usage
//!
//! Build a [`CompiledRmlMapping`] (from JSON or programmatically), register
//! functions in a [`FunctionRegistry`], then create a [`MappingPipeline`]
//! and consume the [`MappingRun`] stream. All construction errors are
//! reported by [`MappingPipeline::new`] before any source is opened.

pub mod config;
pub mod error;
pub mod function;
pub mod join;
pub mod mapping;
pub mod materialize;
pub mod pipeline;
pub mod source;
pub mod template;
pub mod vocab;

pub use config::RmlConfig;
pub use error::{ErrorKind, RmlError, RmlResult};
pub use function::{FunctionParameters, FunctionRegistry, RmlFunction};
pub use join::{JoinPhase, JoinResolver, ParentJoinStore};
pub use mapping::{
    CompiledRmlMapping, ConstantValue, JoinCondition, LogicalSource, ObjectMap,
    PredicateObjectMap, RefObjectMap, SubjectMap, TermMap, TermMapRole, TermType, TriplesMap,
    TriplesMapId,
};
pub use materialize::{MappedQuad, MappedValue, RdfTerm, TermGenerator};
pub use pipeline::{MappingPipeline, MappingPlan, MappingRun};
pub use source::{
    ExpressionEvaluator, InMemoryResolver, JsonRecord, LogicalSourceResolver, RawValue, Record,
    RecordSource,
};
pub use template::Template;
pub use vocab::RML;
