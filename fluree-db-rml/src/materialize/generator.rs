//! Term generation
//!
//! A [`TermGenerator`] is compiled once per term map, before any record is
//! read. Construction checks the strategy count, the term type against the
//! role, and resolves nested function maps and their registered functions.
//! Applying a generator to a record is synchronous and performs no I/O.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use super::iri::{iri_safe, resolve_iri};
use super::term::{blank_node_id, MappedValue, RdfTerm};
use crate::error::{RmlError, RmlResult};
use crate::function::{FunctionExecution, FunctionParameters, FunctionRegistry, RmlFunction};
use crate::mapping::{
    CompiledRmlMapping, ConstantValue, ObjectMap, TermMap, TermMapRole, TermType, TriplesMap,
    TriplesMapId,
};
use crate::source::{lexical_values, ExpressionEvaluator, RawValue};
use crate::template::{SlotValues, Template};
use crate::vocab::RML;

/// Everything term map compilation needs from the surrounding mapping
pub struct GeneratorContext<'a> {
    pub mapping: &'a CompiledRmlMapping,
    pub functions: &'a FunctionRegistry,
    pub base_iri: Option<&'a str>,
    /// Function maps currently being compiled, for cycle detection
    visiting: Vec<TriplesMapId>,
}

impl<'a> GeneratorContext<'a> {
    pub fn new(
        mapping: &'a CompiledRmlMapping,
        functions: &'a FunctionRegistry,
        base_iri: Option<&'a str>,
    ) -> Self {
        Self {
            mapping,
            functions,
            base_iri,
            visiting: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
enum Strategy {
    Constant(RdfTerm),
    Reference(String),
    Template(Template),
    Function(Arc<FunctionCall>),
}

/// Compiled generator for one term map
#[derive(Debug, Clone)]
pub struct TermGenerator {
    label: String,
    role: TermMapRole,
    term_type: TermType,
    strategy: Strategy,
    language: Option<String>,
    datatype: Option<String>,
    base_iri: Option<String>,
    targets: Arc<BTreeSet<String>>,
}

/// Resolve the term type a term map produces
///
/// An explicit term type wins. Constants produce their own kind. Object
/// maps default to literals when they read values (reference or function)
/// or carry a language or datatype; everything else defaults to IRIs.
pub fn effective_term_type(term_map: &TermMap, role: TermMapRole) -> TermType {
    if let Some(term_type) = term_map.term_type {
        return term_type;
    }
    if let Some(constant) = &term_map.constant {
        return constant.term_type();
    }
    let reads_values = term_map.reference.is_some() || term_map.function_value.is_some();
    let literal_config = term_map.language.is_some() || term_map.datatype.is_some();
    if role == TermMapRole::Object && (reads_values || literal_config) {
        TermType::Literal
    } else {
        TermType::Iri
    }
}

impl TermGenerator {
    /// Compile a term map for a role
    ///
    /// `label` names the term map in error messages.
    pub fn construct(
        label: impl Into<String>,
        term_map: &TermMap,
        role: TermMapRole,
        ctx: &mut GeneratorContext<'_>,
    ) -> RmlResult<Self> {
        let label = label.into();

        let found = term_map.strategy_count();
        if found != 1 {
            return Err(RmlError::StrategyCount {
                term_map: label,
                found,
            });
        }

        if let Some(term_type) = term_map.term_type {
            if !role.allows(term_type) {
                return Err(RmlError::DisallowedTermType {
                    term_map: label,
                    role,
                    term_type,
                });
            }
        }

        if let (Some(constant), Some(explicit)) = (&term_map.constant, term_map.term_type) {
            if constant.term_type() != explicit {
                return Err(RmlError::InvalidValue {
                    property: "rml:termType".to_string(),
                    message: format!(
                        "{label} declares {explicit:?} for a constant {} value",
                        constant.kind()
                    ),
                });
            }
        }

        let term_type = effective_term_type(term_map, role);
        match &term_map.constant {
            Some(constant) if !role.allows(constant.term_type()) => {
                return Err(RmlError::DisallowedConstant {
                    term_map: label,
                    role,
                    kind: constant.kind(),
                });
            }
            None if !role.allows(term_type) => {
                return Err(RmlError::DisallowedTermType {
                    term_map: label,
                    role,
                    term_type,
                });
            }
            _ => {}
        }

        if term_map.language.is_some() && term_map.datatype.is_some() {
            return Err(RmlError::InvalidValue {
                property: "rml:language".to_string(),
                message: format!("{label} declares both a language tag and a datatype"),
            });
        }
        if (term_map.language.is_some() || term_map.datatype.is_some()) && !term_type.is_literal()
        {
            return Err(RmlError::InvalidValue {
                property: "rml:datatype".to_string(),
                message: format!("{label} declares literal options but generates {term_type:?}"),
            });
        }

        let strategy = if let Some(constant) = &term_map.constant {
            Strategy::Constant(constant_term(constant, term_map))
        } else if let Some(reference) = &term_map.reference {
            Strategy::Reference(reference.clone())
        } else if let Some(template) = &term_map.template {
            Strategy::Template(Template::parse(template)?)
        } else if let Some(function_map) = &term_map.function_value {
            Strategy::Function(Arc::new(FunctionCall::compile(function_map, ctx)?))
        } else {
            return Err(RmlError::StrategyCount {
                term_map: label,
                found: 0,
            });
        };

        Ok(Self {
            label,
            role,
            term_type,
            strategy,
            language: term_map.language.clone(),
            datatype: term_map.datatype.clone(),
            base_iri: ctx.base_iri.map(str::to_string),
            targets: Arc::new(term_map.targets.clone()),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn role(&self) -> TermMapRole {
        self.role
    }

    pub fn term_type(&self) -> TermType {
        self.term_type
    }

    pub fn targets(&self) -> &Arc<BTreeSet<String>> {
        &self.targets
    }

    /// The fixed term of a constant generator
    pub fn constant_term(&self) -> Option<&RdfTerm> {
        match &self.strategy {
            Strategy::Constant(term) => Some(term),
            _ => None,
        }
    }

    /// Generate the terms for one record
    ///
    /// Returns an empty list, not an error, when the strategy yields no
    /// value. Duplicate terms are removed; first occurrence order is kept.
    pub fn apply(&self, record: &dyn ExpressionEvaluator) -> RmlResult<Vec<MappedValue>> {
        let (lexicals, inferred) = match &self.strategy {
            Strategy::Constant(term) => {
                return Ok(vec![MappedValue::new(term.clone(), Arc::clone(&self.targets))]);
            }
            Strategy::Reference(expression) => {
                let raw = record.evaluate(expression)?;
                let inferred = if self.needs_inferred_datatype() {
                    record.datatype(expression)
                } else {
                    None
                };
                (lexical_values(&raw), inferred)
            }
            Strategy::Template(template) => {
                let values = self.evaluate_template(template, record)?;
                (values.into_iter().map(Some).collect(), None)
            }
            Strategy::Function(call) => {
                let raw = call.invoke(record)?;
                let inferred = if self.needs_inferred_datatype() {
                    natural_datatype(&raw).map(str::to_string)
                } else {
                    None
                };
                (lexical_values(std::slice::from_ref(&raw)), inferred)
            }
        };

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for lexical in lexicals.into_iter().flatten() {
            let term = self.make_term(lexical, inferred.as_deref())?;
            if seen.insert(term.clone()) {
                out.push(MappedValue::new(term, Arc::clone(&self.targets)));
            }
        }
        Ok(out)
    }

    /// Raw values of this generator, before term construction
    ///
    /// Used for function parameter bindings, where the registered function
    /// receives values rather than terms.
    pub fn raw_values(&self, record: &dyn ExpressionEvaluator) -> RmlResult<Vec<RawValue>> {
        match &self.strategy {
            Strategy::Constant(term) => Ok(vec![RawValue::String(term.lexical().to_string())]),
            Strategy::Reference(expression) => record.evaluate(expression),
            Strategy::Template(template) => Ok(self
                .evaluate_template(template, record)?
                .into_iter()
                .map(RawValue::String)
                .collect()),
            Strategy::Function(call) => Ok(vec![call.invoke(record)?]),
        }
    }

    fn needs_inferred_datatype(&self) -> bool {
        self.term_type.is_literal() && self.language.is_none() && self.datatype.is_none()
    }

    fn evaluate_template(
        &self,
        template: &Template,
        record: &dyn ExpressionEvaluator,
    ) -> RmlResult<Vec<String>> {
        let encode = self.term_type.is_iri();
        let values = template.evaluate(|slot| {
            let raw = record.evaluate(&slot.expression)?;
            let values: SlotValues = lexical_values(&raw)
                .into_iter()
                .map(|v| v.map(|s| if encode { iri_safe(&s) } else { s }))
                .collect();
            Ok(values)
        })?;
        Ok(values.unwrap_or_default())
    }

    fn make_term(&self, lexical: String, inferred: Option<&str>) -> RmlResult<RdfTerm> {
        Ok(match self.term_type {
            TermType::Iri => RdfTerm::Iri(resolve_iri(&lexical, self.base_iri.as_deref())?),
            TermType::BlankNode => RdfTerm::BlankNode(blank_node_id(&lexical)),
            TermType::Literal => match (&self.language, &self.datatype, inferred) {
                (Some(lang), _, _) => RdfTerm::lang_string(lexical, lang.clone()),
                (None, Some(dt), _) => RdfTerm::typed(lexical, dt.clone()),
                (None, None, Some(dt)) => RdfTerm::typed(lexical, dt),
                (None, None, None) => RdfTerm::string(lexical),
            },
        })
    }
}

fn natural_datatype(raw: &RawValue) -> Option<&'static str> {
    match raw {
        RawValue::List(items) => items.iter().find_map(natural_datatype),
        other => other.natural_datatype(),
    }
}

/// Constant term, used as-is
fn constant_term(constant: &ConstantValue, term_map: &TermMap) -> RdfTerm {
    match constant {
        ConstantValue::Iri(iri) => RdfTerm::Iri(iri.clone()),
        ConstantValue::BlankNode(label) => RdfTerm::BlankNode(label.clone()),
        ConstantValue::Literal {
            value,
            datatype,
            language,
        } => {
            let language = language.clone().or_else(|| term_map.language.clone());
            let datatype = if language.is_some() {
                None
            } else {
                datatype.clone().or_else(|| term_map.datatype.clone())
            };
            RdfTerm::Literal {
                value: value.clone(),
                datatype,
                language,
            }
        }
    }
}

/// A compiled function-valued term map
struct FunctionCall {
    function_iri: String,
    function: Arc<dyn RmlFunction>,
    parameters: Vec<(String, TermGenerator)>,
}

impl fmt::Debug for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionCall")
            .field("function_iri", &self.function_iri)
            .field("parameters", &self.parameters)
            .finish()
    }
}

impl FunctionCall {
    fn compile(function_map: &str, ctx: &mut GeneratorContext<'_>) -> RmlResult<Self> {
        let id = ctx
            .mapping
            .id_of(function_map)
            .ok_or_else(|| RmlError::UnknownTriplesMap(function_map.to_string()))?;
        if ctx.visiting.contains(&id) {
            return Err(RmlError::InvalidValue {
                property: "rml:functionValue".to_string(),
                message: format!("function map {function_map} refers to itself"),
            });
        }
        let triples_map = ctx
            .mapping
            .get(id)
            .ok_or_else(|| RmlError::UnknownTriplesMap(function_map.to_string()))?;

        ctx.visiting.push(id);
        let result = Self::compile_map(triples_map, ctx);
        ctx.visiting.pop();
        result
    }

    fn compile_map(triples_map: &TriplesMap, ctx: &mut GeneratorContext<'_>) -> RmlResult<Self> {
        let mut function_iri = None;
        let mut parameters = Vec::new();

        for (pom_idx, pom) in triples_map.predicate_object_maps.iter().enumerate() {
            for predicate_map in &pom.predicate_maps {
                let predicate =
                    predicate_map
                        .as_constant_iri()
                        .ok_or_else(|| RmlError::InvalidValue {
                            property: "rml:predicate".to_string(),
                            message: format!(
                                "function map {} must use constant predicate IRIs",
                                triples_map.iri
                            ),
                        })?;

                for (om_idx, object_map) in pom.object_maps.iter().enumerate() {
                    let term_map = match object_map {
                        ObjectMap::Term(term_map) => term_map,
                        ObjectMap::RefObjectMap(_) => {
                            return Err(RmlError::InvalidValue {
                                property: "rml:parentTriplesMap".to_string(),
                                message: format!(
                                    "function map {} cannot join other maps",
                                    triples_map.iri
                                ),
                            })
                        }
                    };

                    if RML::is_executes(predicate) {
                        let iri = term_map.as_constant_iri().ok_or_else(|| {
                            RmlError::InvalidValue {
                                property: "rml:executes".to_string(),
                                message: format!(
                                    "function map {} must name its function with a constant IRI",
                                    triples_map.iri
                                ),
                            }
                        })?;
                        function_iri = Some(iri.to_string());
                    } else {
                        let label = format!("{} parameter {pom_idx}.{om_idx}", triples_map.iri);
                        let generator =
                            TermGenerator::construct(label, term_map, TermMapRole::Object, ctx)?;
                        parameters.push((predicate.to_string(), generator));
                    }
                }
            }
        }

        let function_iri = function_iri.ok_or_else(|| {
            RmlError::MissingProperty(format!("rml:executes in function map {}", triples_map.iri))
        })?;
        let function = ctx.functions.resolve(&function_iri)?;

        Ok(Self {
            function_iri,
            function,
            parameters,
        })
    }

    /// Map the nested function map against a record
    fn execution(&self, record: &dyn ExpressionEvaluator) -> RmlResult<FunctionExecution> {
        let mut parameters = FunctionParameters::new();
        for (parameter, generator) in &self.parameters {
            parameters.bind(parameter.clone(), generator.raw_values(record)?);
        }
        Ok(FunctionExecution {
            function: self.function_iri.clone(),
            parameters,
        })
    }

    fn invoke(&self, record: &dyn ExpressionEvaluator) -> RmlResult<RawValue> {
        let execution = self.execution(record)?;
        tracing::trace!(function = %execution.function, "invoking function");
        self.function.call(&execution.parameters)
    }
}
